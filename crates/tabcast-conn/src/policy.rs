//! ハートビート設定

use tabcast_proto::{validate_sentinel, DEFAULT_SENTINEL};

use crate::error::ConfigError;
use crate::{HEARTBEAT_INTERVAL_MS, MAX_MISSED_HEARTBEATS};

/// ハートビートの不変設定
///
/// 生成時に検証するので、保持している値は常に有効。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatPolicy {
    interval_ms: u32,
    max_missed: u32,
    sentinel: String,
}

impl HeartbeatPolicy {
    /// 設定を検証して生成する
    ///
    /// # エラー
    /// - `interval_ms` / `max_missed` が 0
    /// - センチネルが空、または JSON として解釈できる
    pub fn new(
        interval_ms: u32,
        max_missed: u32,
        sentinel: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        if interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if max_missed == 0 {
            return Err(ConfigError::ZeroMaxMissed);
        }
        let sentinel = sentinel.into();
        validate_sentinel(&sentinel)?;
        Ok(HeartbeatPolicy {
            interval_ms,
            max_missed,
            sentinel,
        })
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub fn max_missed(&self) -> u32 {
        self.max_missed
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    /// 死んだ接続を検出するまでの最大時間（ミリ秒）
    pub fn detection_latency_ms(&self) -> u64 {
        u64::from(self.interval_ms) * u64::from(self.max_missed)
    }
}

impl Default for HeartbeatPolicy {
    fn default() -> Self {
        HeartbeatPolicy {
            interval_ms: HEARTBEAT_INTERVAL_MS,
            max_missed: MAX_MISSED_HEARTBEATS,
            sentinel: DEFAULT_SENTINEL.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabcast_proto::ProtoError;

    #[test]
    fn test_default_policy() {
        let policy = HeartbeatPolicy::default();
        assert_eq!(policy.interval_ms(), 45_000);
        assert_eq!(policy.max_missed(), 5);
        assert_eq!(policy.sentinel(), "❤️");
        assert_eq!(policy.detection_latency_ms(), 225_000);
    }

    #[test]
    fn test_validation() {
        assert_eq!(HeartbeatPolicy::new(0, 5, "x"), Err(ConfigError::ZeroInterval));
        assert_eq!(HeartbeatPolicy::new(10, 0, "x"), Err(ConfigError::ZeroMaxMissed));
        assert_eq!(
            HeartbeatPolicy::new(10, 5, "1"),
            Err(ConfigError::Sentinel(ProtoError::SentinelIsJson("1".into())))
        );
        assert!(HeartbeatPolicy::new(10, 5, "♥").is_ok());
    }
}
