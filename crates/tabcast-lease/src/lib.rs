//! # tabcast-lease
//!
//! 同じオリジンの全タブが共有するキーバリューストア（ブラウザでは
//! `localStorage`）を使って、デスクトップ通知を出す「リーダー」タブを 1 つ選ぶ。
//!
//! ## 仕組み
//!
//! ```text
//! ストア: notificationTab.timestamp = <最終更新時刻 ms>
//!
//! ensure_leadership(now):
//!   自分がリーダー              → そのまま true
//!   レコードなし / 3 秒以上古い → now を書き込み、1 秒ごとの更新タイマー開始 → true
//!   それ以外                    → false
//! ```
//!
//! 閉じたタブは更新を止めるだけ。レコードが古くなれば次にチェックした
//! タブが引き継ぐ。読み取り・判定・書き込みはタブ間でアトミックではないので、
//! 同時にチェックした 2 タブが両方リーダーになる競合はあり得る。
//! その間の重複通知は許容する（見た目上の問題でしかない）。

pub mod election;
pub mod error;
pub mod store;

pub use election::{LeaderElection, LeasePolicy};
pub use error::LeaseError;
pub use store::{LeaseRecord, LeaseStore, MemoryLeaseStore};

/// リーダーがレコードを更新する間隔（ミリ秒）
pub const RENEW_INTERVAL_MS: u32 = 1000;

/// これ以上古いレコードは放棄されたとみなす（ミリ秒）
pub const STALE_AFTER_MS: u64 = 3000;

/// ストアの名前空間
pub const DEFAULT_NAMESPACE: &str = "notificationTab";

/// レコードのキー
pub const DEFAULT_KEY: &str = "timestamp";
