//! # tabcast-wasm
//!
//! wasm-bindgen エクスポート：ブラウザのページから呼び出す公開 API。
//!
//! ## 使用方法（TypeScript）
//!
//! ```typescript
//! import { NotifyClient, init_panic_hook, initLogging } from '../tabcast-pkg/tabcast_wasm';
//!
//! // パニック時のスタックトレースを有効化（開発時）
//! init_panic_hook();
//! initLogging("debug");
//!
//! // URL 省略時はページの origin から ws(s)://host/ を使う
//! const client = new NotifyClient(
//!     undefined,
//!     JSON.stringify({ heartbeatIntervalMs: 45000 }),
//!     (view, params, opts) => router.go(view, params, opts),
//!     (message) => toast.error(message),
//! );
//!
//! // 通知以外のフィールドもここで受け取れる
//! client.subscribe((message) => store.dispatch(message));
//! client.connect();
//!
//! window.addEventListener("beforeunload", () => client.dispose());
//! ```
//!
//! ## 構成
//!
//! - `session`: ホスト非依存の結線（ネイティブでテスト可能）
//! - `client`: `Session` をブラウザの API に結線する `NotifyClient`
//! - `socket` / `storage` / `notifier` / `scheduler`: 各ブラウザ API のアダプター

use wasm_bindgen::prelude::*;

pub mod client;
pub mod event;
pub mod logging;
pub mod notifier;
pub mod options;
pub mod scheduler;
pub mod session;
pub mod socket;
pub mod storage;

pub use client::NotifyClient;
pub use options::{endpoint_for, ClientOptions, OptionsError};
pub use session::Session;

/// パニック時にブラウザコンソールにスタックトレースを出力する
///
/// 開発時に必ず呼び出すこと。本番ビルドでは feature flag で無効化可能。
#[wasm_bindgen]
pub fn init_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// tracing のログをブラウザコンソールに出す
///
/// # 引数
/// - `level`: `"error"` / `"warn"` / `"info"` / `"debug"` / `"trace"`。省略時は `"info"`
///
/// # エラー
/// - 未知のレベル名
#[wasm_bindgen(js_name = "initLogging")]
pub fn init_logging(level: Option<String>) -> Result<(), JsError> {
    let level = match level.as_deref() {
        None | Some("") => tracing::Level::INFO,
        Some(name) => name
            .parse::<tracing::Level>()
            .map_err(|e| JsError::new(&format!("{name}: {e}")))?,
    };
    logging::install(level);
    Ok(())
}
