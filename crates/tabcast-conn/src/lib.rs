//! # tabcast-conn
//!
//! サーバーとの単一の双方向接続を監視する。
//!
//! ## ハートビート
//!
//! ```text
//! on_open        → missed = 0, interval_ms ごとのタイマー開始
//! タイマー tick  → missed += 1
//!                   missed >= max_missed → タイマー停止 → transport.refresh()
//!                   それ以外             → センチネル送信
//! センチネル受信 → missed = 0（サーバーのエコー）
//! ```
//!
//! デフォルトでは 45 秒ごとに送信し、5 回続けて応答がなければ張り直す。
//! ダイヤルの再試行・バックオフはトランスポート側の責任で、このクレートは
//! 「開いているはずのソケットが生きているか」だけを見る。
//!
//! ## 状態遷移
//!
//! ```text
//! Closed ─open()→ Connecting ─on_open→ Open ─(missed 上限)→ Closing → Connecting
//!                     ↑                  │
//!                     └─on_transport_closed┘
//! 任意 ─shutdown()→ Closing → Closed
//! ```

pub mod error;
pub mod manager;
pub mod policy;
pub mod transport;

pub use error::{ConfigError, TransportError};
pub use manager::{ConnectionManager, ConnectionState, Inbound, TickOutcome};
pub use policy::HeartbeatPolicy;
pub use transport::{MessageConsumer, Transport};

/// ハートビート送信間隔（ミリ秒）
pub const HEARTBEAT_INTERVAL_MS: u32 = 45_000;

/// 再接続までに許容する未応答ハートビート数
pub const MAX_MISSED_HEARTBEATS: u32 = 5;
