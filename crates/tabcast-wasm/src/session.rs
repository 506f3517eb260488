//! ホスト非依存のイベントルーター
//!
//! 接続マネージャーとディスパッチャーを 1 つのスケジューラーで束ね、
//! ホスト（ブラウザ or テスト）から届くイベントを正しい持ち主に配送する。
//!
//! ```text
//! on_frame ──→ ConnectionManager ──Message(notification)──→ Dispatcher
//! on_timer ──→ ConnectionManager（ハートビート）
//!          └─→ Dispatcher（自動クローズ / リーダー更新）
//! ```

use tabcast_conn::{ConnectionManager, Inbound, TickOutcome, Transport};
use tabcast_dispatch::{
    Delivery, DesktopNotifier, Dispatcher, HandleId, Navigator, Permission, PermissionTicket,
};
use tabcast_lease::LeaseStore;
use tabcast_proto::NotificationPayload;
use tabcast_timer::{Scheduler, TimerId};

/// 1 タブ分のリアルタイム配信セッション
pub struct Session<T, L, N, V, S>
where
    T: Transport,
    L: LeaseStore,
    N: DesktopNotifier,
    V: Navigator,
    S: Scheduler,
{
    conn: ConnectionManager<T>,
    dispatcher: Dispatcher<L, N, V>,
    timers: S,
}

impl<T, L, N, V, S> Session<T, L, N, V, S>
where
    T: Transport,
    L: LeaseStore,
    N: DesktopNotifier,
    V: Navigator,
    S: Scheduler,
{
    pub fn new(conn: ConnectionManager<T>, dispatcher: Dispatcher<L, N, V>, timers: S) -> Self {
        Session {
            conn,
            dispatcher,
            timers,
        }
    }

    /// 接続を開始する
    pub fn connect(&mut self) {
        self.conn.open();
    }

    pub fn on_open(&mut self) {
        self.conn.on_open(&mut self.timers);
    }

    /// 受信フレームを処理し、通知があれば配信する
    pub fn on_frame(&mut self, text: &str, now_ms: u64) -> Inbound {
        let inbound = self.conn.on_frame(text);
        if let Inbound::Message(message) = &inbound {
            if let Some(payload) = &message.notification {
                self.dispatcher.deliver(payload.clone(), now_ms, &mut self.timers);
            }
        }
        inbound
    }

    pub fn on_transport_closed(&mut self) {
        self.conn.on_transport_closed(&mut self.timers);
    }

    /// タイマー発火を持ち主に配送する
    ///
    /// # 戻り値
    /// どのコンポーネントのタイマーでもなければ `false`
    pub fn on_timer(&mut self, id: TimerId, now_ms: u64) -> bool {
        if let Some(outcome) = self.conn.on_timer(id, &mut self.timers) {
            if outcome == TickOutcome::Reconnecting {
                tracing::info!(
                    reconnects = self.conn.reconnects(),
                    "socket refreshed after missed heartbeats"
                );
            }
            return true;
        }
        self.dispatcher.on_timer(id, now_ms)
    }

    /// アプリケーションコードから直接通知を配信する
    pub fn deliver(&mut self, payload: NotificationPayload, now_ms: u64) -> Delivery {
        self.dispatcher.deliver(payload, now_ms, &mut self.timers)
    }

    pub fn on_permission_result(
        &mut self,
        ticket: PermissionTicket,
        permission: Permission,
    ) -> Vec<Delivery> {
        self.dispatcher
            .on_permission_result(ticket, permission, &mut self.timers)
    }

    pub fn on_click(&mut self, handle: HandleId) -> bool {
        self.dispatcher.on_click(handle)
    }

    pub fn on_closed(&mut self, handle: HandleId) {
        self.dispatcher.on_closed(handle, &mut self.timers);
    }

    /// タブ終了：接続を閉じ、通知を片付け、リーダーを降りる
    pub fn shutdown(&mut self) {
        self.conn.shutdown(&mut self.timers);
        self.dispatcher.shutdown(&mut self.timers);
    }

    pub fn conn(&self) -> &ConnectionManager<T> {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut ConnectionManager<T> {
        &mut self.conn
    }

    pub fn dispatcher(&self) -> &Dispatcher<L, N, V> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher<L, N, V> {
        &mut self.dispatcher
    }

    pub fn timers(&self) -> &S {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut S {
        &mut self.timers
    }
}
