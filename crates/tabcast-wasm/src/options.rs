//! クライアント設定
//!
//! JS からは JSON 文字列で渡す。省略したキーはデフォルト値になる。
//!
//! ```json
//! {
//!   "heartbeatIntervalMs": 45000,
//!   "maxMissedHeartbeats": 5,
//!   "heartbeatSentinel": "❤️",
//!   "renewIntervalMs": 1000,
//!   "staleAfterMs": 3000,
//!   "displayMs": 4000,
//!   "namespace": "notificationTab",
//!   "key": "timestamp"
//! }
//! ```

use serde::Deserialize;
use thiserror::Error;

use tabcast_conn::{ConfigError, HeartbeatPolicy, HEARTBEAT_INTERVAL_MS, MAX_MISSED_HEARTBEATS};
use tabcast_dispatch::{DispatchPolicy, DISPLAY_MS};
use tabcast_lease::{LeasePolicy, DEFAULT_KEY, DEFAULT_NAMESPACE, RENEW_INTERVAL_MS, STALE_AFTER_MS};
use tabcast_proto::DEFAULT_SENTINEL;

/// 設定のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError {
    #[error("invalid options JSON: {0}")]
    Json(String),
    #[error(transparent)]
    Heartbeat(#[from] ConfigError),
    /// 放棄判定が更新間隔以下だと、生きているリーダーからも奪えてしまう
    #[error("staleAfterMs ({stale_after_ms}) must exceed renewIntervalMs ({renew_interval_ms})")]
    StaleWindowTooShort {
        stale_after_ms: u64,
        renew_interval_ms: u32,
    },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// クライアント設定
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ClientOptions {
    pub heartbeat_interval_ms: u32,
    pub max_missed_heartbeats: u32,
    pub heartbeat_sentinel: String,
    pub renew_interval_ms: u32,
    pub stale_after_ms: u64,
    pub display_ms: u32,
    pub namespace: String,
    pub key: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            heartbeat_interval_ms: HEARTBEAT_INTERVAL_MS,
            max_missed_heartbeats: MAX_MISSED_HEARTBEATS,
            heartbeat_sentinel: DEFAULT_SENTINEL.to_owned(),
            renew_interval_ms: RENEW_INTERVAL_MS,
            stale_after_ms: STALE_AFTER_MS,
            display_ms: DISPLAY_MS,
            namespace: DEFAULT_NAMESPACE.to_owned(),
            key: DEFAULT_KEY.to_owned(),
        }
    }
}

impl ClientOptions {
    /// JSON 文字列から読み込んで検証する（`None` / 空文字列はデフォルト）
    pub fn from_json(json: Option<&str>) -> Result<Self, OptionsError> {
        let options = match json.map(str::trim) {
            None | Some("") => ClientOptions::default(),
            Some(text) => {
                serde_json::from_str(text).map_err(|e| OptionsError::Json(e.to_string()))?
            }
        };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        self.heartbeat_policy()?;
        if self.renew_interval_ms == 0 {
            return Err(OptionsError::Zero("renewIntervalMs"));
        }
        if self.display_ms == 0 {
            return Err(OptionsError::Zero("displayMs"));
        }
        if self.stale_after_ms <= u64::from(self.renew_interval_ms) {
            return Err(OptionsError::StaleWindowTooShort {
                stale_after_ms: self.stale_after_ms,
                renew_interval_ms: self.renew_interval_ms,
            });
        }
        Ok(())
    }

    pub fn heartbeat_policy(&self) -> Result<HeartbeatPolicy, ConfigError> {
        HeartbeatPolicy::new(
            self.heartbeat_interval_ms,
            self.max_missed_heartbeats,
            self.heartbeat_sentinel.clone(),
        )
    }

    pub fn lease_policy(&self) -> LeasePolicy {
        LeasePolicy {
            renew_interval_ms: self.renew_interval_ms,
            stale_after_ms: self.stale_after_ms,
            namespace: self.namespace.clone(),
            key: self.key.clone(),
        }
    }

    pub fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            display_ms: self.display_ms,
        }
    }
}

/// ページのプロトコルとホストからソケットのエンドポイントを決める
///
/// `https:` のページでは `wss`、それ以外は `ws`。パスはルート固定。
pub fn endpoint_for(protocol: &str, host: &str) -> String {
    let scheme = if protocol == "https:" { "wss" } else { "ws" };
    format!("{scheme}://{host}/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ClientOptions::from_json(None).unwrap();
        assert_eq!(options, ClientOptions::default());
        assert_eq!(options.heartbeat_policy().unwrap(), HeartbeatPolicy::default());
        assert_eq!(options.lease_policy(), LeasePolicy::default());
        assert_eq!(options.dispatch_policy().display_ms, 4000);
    }

    #[test]
    fn test_partial_override() {
        let options =
            ClientOptions::from_json(Some(r#"{"heartbeatIntervalMs": 10000, "displayMs": 6000}"#))
                .unwrap();
        assert_eq!(options.heartbeat_interval_ms, 10_000);
        assert_eq!(options.display_ms, 6000);
        assert_eq!(options.max_missed_heartbeats, 5);
    }

    #[test]
    fn test_blank_is_default() {
        assert_eq!(ClientOptions::from_json(Some("  ")).unwrap(), ClientOptions::default());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(
            ClientOptions::from_json(Some(r#"{"heartbeatIntervalMS": 1}"#)),
            Err(OptionsError::Json(_))
        ));
    }

    #[test]
    fn test_json_sentinel_rejected() {
        assert!(matches!(
            ClientOptions::from_json(Some(r#"{"heartbeatSentinel": "{}"}"#)),
            Err(OptionsError::Heartbeat(ConfigError::Sentinel(_)))
        ));
    }

    #[test]
    fn test_stale_window_must_exceed_renewal() {
        assert_eq!(
            ClientOptions::from_json(Some(r#"{"renewIntervalMs": 3000, "staleAfterMs": 3000}"#)),
            Err(OptionsError::StaleWindowTooShort {
                stale_after_ms: 3000,
                renew_interval_ms: 3000
            })
        );
    }

    #[test]
    fn test_endpoint_scheme_follows_page() {
        assert_eq!(endpoint_for("https:", "app.example.com"), "wss://app.example.com/");
        assert_eq!(endpoint_for("http:", "localhost:8000"), "ws://localhost:8000/");
    }
}
