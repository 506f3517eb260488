//! tabcast-proto エラー型

use thiserror::Error;

/// フレームのデコード・設定検証のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtoError {
    /// JSON として解釈できないフレーム
    #[error("malformed application frame: {0}")]
    Malformed(String),
    /// JSON だがオブジェクトではない（配列・数値など）
    #[error("application frame is not a JSON object")]
    NotAnObject,
    /// `notification` フィールドの形が不正
    #[error("invalid notification payload: {0}")]
    InvalidNotification(String),
    /// センチネルが空
    #[error("heartbeat sentinel must not be empty")]
    EmptySentinel,
    /// センチネルが JSON として解釈できてしまう
    #[error("heartbeat sentinel {0:?} collides with the JSON payload encoding")]
    SentinelIsJson(String),
}
