//! # tabcast-dispatch
//!
//! 通知ペイロードを受け取り、このタブがリーダーのときだけ
//! デスクトップ通知を出す。
//!
//! ## 配信フロー
//!
//! ```text
//! deliver(payload)
//!   ├─ リーダーでない        → NotLeader（副作用なし）
//!   ├─ Notification 非対応   → エラー表示 → Unsupported
//!   ├─ 許可: denied          → Denied（黙って捨てる）
//!   ├─ 許可: default         → 許可要求（非同期）→ AwaitingPermission
//!   │                            └─ on_permission_result(granted) → 表示
//!   └─ 許可: granted         → 表示 → 4 秒後に自動で閉じる
//!                                 └─ クリック → フォーカス + 画面遷移
//! ```
//!
//! キューイングはしない。`deliver` 1 回につき通知は高々 1 つ。

pub mod dispatcher;
pub mod error;
pub mod host;

pub use dispatcher::{Delivery, DispatchPolicy, Dispatcher};
pub use error::DispatchError;
pub use host::{DesktopNotifier, HandleId, Navigator, Permission, PermissionTicket};

/// 通知を自動で閉じるまでの時間（ミリ秒）
pub const DISPLAY_MS: u32 = 4000;

/// Notification API 非対応時にユーザーへ出すメッセージ
pub const UNSUPPORTED_MESSAGE: &str = "This browser does not support desktop notification";
