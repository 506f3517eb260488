//! tabcast-dispatch エラー型

use thiserror::Error;

/// 通知ホストのエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// 通知の生成に失敗（ブラウザが例外を投げた等）
    #[error("notification could not be shown: {0}")]
    ShowFailed(String),
}
