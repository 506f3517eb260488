//! 接続マネージャー
//!
//! ハートビートタイマーは `ConnectionState::Open` の中にしか存在しない。
//! Open から抜ける遷移は必ずタイマーをキャンセルしてから行う。

use tabcast_proto::{AppMessage, Frame, NoopUsage, ProtoError, UsageEvent, UsageTracker};
use tabcast_timer::{Scheduler, TimerId};

use crate::policy::HeartbeatPolicy;
use crate::transport::{MessageConsumer, Transport};

/// 接続の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// ダイヤル中（トランスポートの open イベント待ち）
    Connecting,
    /// 開いている。ハートビートタイマーを所有する
    Open {
        heartbeat: TimerId,
        /// 連続で応答のなかったハートビート数
        missed: u32,
    },
    /// 切断処理中
    Closing,
    /// 閉じている（open() 前、または shutdown() 後）
    Closed,
}

impl ConnectionState {
    /// JS 向けの状態名
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open { .. } => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        }
    }
}

/// ハートビートタイマー 1 回分の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// センチネルを送った
    HeartbeatSent { missed: u32 },
    /// 送信に失敗した（未応答 1 回として数える）
    SendFailed { missed: u32 },
    /// 上限に達したので張り直しを開始した
    Reconnecting,
}

/// 受信フレーム 1 件の処理結果
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// ハートビート応答
    HeartbeatAck,
    /// アプリケーションメッセージ（コンシューマーに配送済み）
    Message(AppMessage),
    /// 不正なフレーム（破棄した）
    Dropped(ProtoError),
    /// 閉じた接続に届いたフレーム
    Ignored,
}

/// 単一の双方向接続を所有し、生存監視する
pub struct ConnectionManager<T: Transport> {
    transport: T,
    url: String,
    policy: HeartbeatPolicy,
    state: ConnectionState,
    /// 強制再接続のたびに増える世代番号
    generation: u64,
    /// 強制再接続の回数（統計用）
    reconnects: u64,
    consumers: Vec<Box<dyn MessageConsumer>>,
    usage: Box<dyn UsageTracker>,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, url: impl Into<String>, policy: HeartbeatPolicy) -> Self {
        ConnectionManager {
            transport,
            url: url.into(),
            policy,
            state: ConnectionState::Closed,
            generation: 0,
            reconnects: 0,
            consumers: Vec::new(),
            usage: Box::new(NoopUsage),
        }
    }

    /// トラッキング先を差し替える
    pub fn with_usage(mut self, usage: Box<dyn UsageTracker>) -> Self {
        self.usage = usage;
        self
    }

    /// メッセージの受け手を登録する（登録順に配送）
    pub fn subscribe(&mut self, consumer: Box<dyn MessageConsumer>) {
        self.consumers.push(consumer);
    }

    /// 接続を開始する
    ///
    /// 既に Connecting / Open の場合は何もしない。
    pub fn open(&mut self) {
        if !matches!(self.state, ConnectionState::Closed) {
            return;
        }
        tracing::debug!(url = %self.url, "dialing");
        self.state = ConnectionState::Connecting;
        self.transport.dial(&self.url);
    }

    /// トランスポートの open イベント
    ///
    /// 前の接続のタイマーが残っていれば必ず先に止める。
    pub fn on_open(&mut self, timers: &mut dyn Scheduler) {
        match self.state {
            ConnectionState::Closed | ConnectionState::Closing => {
                tracing::debug!("open event after shutdown, ignoring");
                return;
            }
            ConnectionState::Open { heartbeat, .. } => timers.cancel(heartbeat),
            ConnectionState::Connecting => {}
        }

        let heartbeat = timers.start_interval(self.policy.interval_ms());
        self.state = ConnectionState::Open {
            heartbeat,
            missed: 0,
        };
        tracing::debug!(generation = self.generation, %heartbeat, "connection open");
    }

    /// タイマー発火を処理する
    ///
    /// # 戻り値
    /// 現在のハートビートタイマーでなければ `None`（キャンセル済みの遅延発火など）
    pub fn on_timer(&mut self, id: TimerId, timers: &mut dyn Scheduler) -> Option<TickOutcome> {
        let ConnectionState::Open { heartbeat, missed } = &mut self.state else {
            return None;
        };
        if *heartbeat != id {
            return None;
        }

        *missed += 1;
        let missed = *missed;
        let heartbeat = *heartbeat;

        if missed >= self.policy.max_missed() {
            tracing::warn!(
                missed,
                generation = self.generation,
                "too many missed heartbeats, reconnecting"
            );
            timers.cancel(heartbeat);
            self.state = ConnectionState::Closing;
            self.transport.refresh();
            self.state = ConnectionState::Connecting;
            self.generation += 1;
            self.reconnects += 1;
            return Some(TickOutcome::Reconnecting);
        }

        match self.transport.send_text(self.policy.sentinel()) {
            Ok(()) => Some(TickOutcome::HeartbeatSent { missed }),
            Err(e) => {
                tracing::warn!(error = %e, missed, "heartbeat send failed");
                Some(TickOutcome::SendFailed { missed })
            }
        }
    }

    /// 受信フレームを処理する
    pub fn on_frame(&mut self, text: &str) -> Inbound {
        if matches!(self.state, ConnectionState::Closed) {
            return Inbound::Ignored;
        }

        match Frame::decode(text, self.policy.sentinel()) {
            Ok(Frame::Heartbeat) => {
                if let ConnectionState::Open { missed, .. } = &mut self.state {
                    *missed = 0;
                }
                Inbound::HeartbeatAck
            }
            Ok(Frame::Message(message)) => {
                for consumer in &mut self.consumers {
                    consumer.consume(&message);
                }
                self.usage.record(UsageEvent::MESSAGE_RECEIVED);
                Inbound::Message(message)
            }
            Err(e) => {
                tracing::warn!(error = %e, len = text.len(), "dropping malformed frame");
                Inbound::Dropped(e)
            }
        }
    }

    /// トランスポートが close / error を通知した
    ///
    /// 再ダイヤルはトランスポートに任せる。タイマーだけ止めて次の open を待つ。
    pub fn on_transport_closed(&mut self, timers: &mut dyn Scheduler) {
        match self.state {
            ConnectionState::Open { heartbeat, .. } => {
                timers.cancel(heartbeat);
                self.state = ConnectionState::Connecting;
                tracing::debug!("transport closed, waiting for redial");
            }
            ConnectionState::Connecting => {}
            ConnectionState::Closing | ConnectionState::Closed => {}
        }
    }

    /// 接続を終了する（再接続しない）
    pub fn shutdown(&mut self, timers: &mut dyn Scheduler) {
        if let ConnectionState::Open { heartbeat, .. } = self.state {
            timers.cancel(heartbeat);
        }
        if matches!(self.state, ConnectionState::Closed) {
            return;
        }
        self.state = ConnectionState::Closing;
        self.transport.close();
        self.state = ConnectionState::Closed;
        tracing::debug!("connection shut down");
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// 連続で応答のなかったハートビート数（Open 以外では 0）
    pub fn missed_heartbeats(&self) -> u32 {
        match self.state {
            ConnectionState::Open { missed, .. } => missed,
            _ => 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn reconnects(&self) -> u64 {
        self.reconnects
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn policy(&self) -> &HeartbeatPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
