//! tabcast-conn エラー型

use tabcast_proto::ProtoError;
use thiserror::Error;

/// ハートビート設定のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("heartbeat interval must be greater than zero")]
    ZeroInterval,
    #[error("max missed heartbeats must be greater than zero")]
    ZeroMaxMissed,
    #[error(transparent)]
    Sentinel(#[from] ProtoError),
}

/// トランスポートのエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// ソケットが開いていない
    #[error("socket is not open")]
    NotOpen,
    /// 送信時に例外が発生した
    #[error("send failed: {0}")]
    SendFailed(String),
}
