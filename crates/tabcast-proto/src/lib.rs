//! # tabcast-proto
//!
//! サーバーとの双方向ソケットで流れるテキストフレームの分類と、
//! デスクトップ通知ペイロードの型定義。
//!
//! ## フレームの種類
//!
//! ```text
//! "❤️"                          → Frame::Heartbeat（ハートビート / その応答）
//! {"notification": {...}, ...}  → Frame::Message(AppMessage)
//! それ以外                       → ProtoError（フレーム単位で破棄）
//! ```
//!
//! ハートビートのセンチネルは JSON として解釈できない値でなければならない。
//! これにより、アプリケーションペイロードと衝突しないことが保証される。

pub mod error;
pub mod frame;
pub mod payload;
pub mod usage;

pub use error::ProtoError;
pub use frame::{AppMessage, Frame};
pub use payload::{Link, LinkId, NavRequest, NotificationPayload};
pub use usage::{NoopUsage, UsageEvent, UsageTracker};

/// デフォルトのハートビートセンチネル
///
/// 1 文字の絵文字。JSON のどの値とも一致しない。
pub const DEFAULT_SENTINEL: &str = "❤️";

/// センチネルとして使える文字列か検証する
///
/// 空文字列と、JSON として解釈できる文字列は不可。
pub fn validate_sentinel(sentinel: &str) -> Result<(), ProtoError> {
    if sentinel.is_empty() {
        return Err(ProtoError::EmptySentinel);
    }
    if serde_json::from_str::<serde_json::Value>(sentinel).is_ok() {
        return Err(ProtoError::SentinelIsJson(sentinel.to_owned()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sentinel_is_valid() {
        assert!(validate_sentinel(DEFAULT_SENTINEL).is_ok());
    }

    #[test]
    fn test_json_sentinel_rejected() {
        assert_eq!(
            validate_sentinel("42"),
            Err(ProtoError::SentinelIsJson("42".into()))
        );
        assert!(validate_sentinel("\"ping\"").is_err());
        assert!(validate_sentinel("{}").is_err());
        assert!(validate_sentinel("null").is_err());
    }

    #[test]
    fn test_empty_sentinel_rejected() {
        assert_eq!(validate_sentinel(""), Err(ProtoError::EmptySentinel));
    }

    #[test]
    fn test_plain_word_sentinel_allowed() {
        // 引用符なしの単語は JSON ではない
        assert!(validate_sentinel("ping").is_ok());
    }
}
