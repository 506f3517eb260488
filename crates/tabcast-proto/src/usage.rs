//! 利用状況トラッキング（サイドチャネル）
//!
//! 配信の成否には一切影響しない。ブラウザでは analytics に流す。

/// トラッキングイベント
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageEvent {
    pub category: &'static str,
    pub action: &'static str,
    pub label: &'static str,
}

impl UsageEvent {
    /// アプリケーションメッセージを受信した
    pub const MESSAGE_RECEIVED: UsageEvent = UsageEvent {
        category: "Caller info",
        action: "Answer",
        label: "Incoming call",
    };

    /// 通知がクリックされた
    pub const NOTIFICATION_OPENED: UsageEvent = UsageEvent {
        category: "Caller info",
        action: "Open",
        label: "Popup",
    };
}

/// トラッキング先
pub trait UsageTracker {
    fn record(&mut self, event: UsageEvent);
}

/// 何もしないトラッカー
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUsage;

impl UsageTracker for NoopUsage {
    fn record(&mut self, _event: UsageEvent) {}
}
