//! tabcast-lease エラー型

use thiserror::Error;

/// 共有ストアのエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeaseError {
    /// ストアが使えない（プライベートモード、容量超過など）
    #[error("coordination store unavailable: {0}")]
    Unavailable(String),
    /// 保存されている値が時刻として解釈できない
    #[error("corrupt lease record: {0:?}")]
    Corrupt(String),
}
