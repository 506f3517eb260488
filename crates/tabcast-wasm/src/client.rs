//! NotifyClient wasm-bindgen エクスポート
//!
//! ページから 1 つだけ生成する、リアルタイム配信クライアントの主エントリポイント。
//! ソケット・localStorage・Notification API を [`Session`] に結線する。

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use js_sys::Function;
use wasm_bindgen::prelude::*;

use tabcast_conn::{ConnectionManager, Inbound};
use tabcast_dispatch::{Delivery, Dispatcher};
use tabcast_lease::LeaderElection;
use tabcast_proto::NotificationPayload;
use tabcast_timer::{Scheduler, TimerId};

use crate::event::{EventSink, HostEvent};
use crate::notifier::{BrowserNotifier, GaUsage, JsListener, JsNavigator};
use crate::options::{endpoint_for, ClientOptions};
use crate::scheduler::WindowScheduler;
use crate::session::Session;
use crate::socket::SocketTransport;
use crate::storage::LocalLeaseStore;

type BrowserSession =
    Session<SocketTransport, LocalLeaseStore, BrowserNotifier, JsNavigator, WindowScheduler>;

/// リアルタイム配信クライアント
///
/// ## 内部アーキテクチャ
///
/// ```text
/// NotifyClient
///   └── Rc<RefCell<Inner>>
///         └── Session
///               ├── ConnectionManager (tabcast-conn)     - ソケット + ハートビート
///               ├── Dispatcher        (tabcast-dispatch) - リーダー判定 + 通知
///               └── WindowScheduler                      - setInterval / setTimeout
/// ```
///
/// JS のコールバック（ソケット・タイマー・通知）は `Weak` 経由でイベントを送るだけ。
/// 処理中に同期的に届いたイベントはマイクロタスクに回して後で処理する。
///
/// ## 再入
///
/// `navigate` / `subscribe` のコールバックの中から、このクライアントの
/// メソッドを同期的に呼ぶとエラーになる。
#[wasm_bindgen]
pub struct NotifyClient {
    inner: Rc<RefCell<Inner>>,
}

struct Inner {
    session: BrowserSession,
    /// ソケット再ダイヤル待ちのタイマー
    redial: Option<TimerId>,
    disposed: bool,
}

#[wasm_bindgen]
impl NotifyClient {
    /// クライアントを初期化する（まだ接続はしない）
    ///
    /// # 引数
    /// - `url`: ソケットのエンドポイント。省略時はページの origin から決める
    ///   （`https:` なら `wss://host/`、それ以外は `ws://host/`）
    /// - `options_json`: 設定の JSON 文字列（[`ClientOptions`] 参照）
    /// - `navigate`: `(view, params, { reload }) => void` 形式のルーター関数
    /// - `on_error`: ユーザー向けエラー表示関数（省略時はコンソール）
    ///
    /// # エラー
    /// - `window` がない環境（Worker など）
    /// - 設定 JSON の解析・検証エラー
    #[wasm_bindgen(constructor)]
    pub fn new(
        url: Option<String>,
        options_json: Option<String>,
        navigate: Function,
        on_error: Option<Function>,
    ) -> Result<NotifyClient, JsError> {
        let window = web_sys::window().ok_or_else(|| JsError::new("no global window"))?;
        let options = ClientOptions::from_json(options_json.as_deref())
            .map_err(|e| JsError::new(&e.to_string()))?;
        let heartbeat = options
            .heartbeat_policy()
            .map_err(|e| JsError::new(&e.to_string()))?;
        let url = match url {
            Some(url) => url,
            None => page_endpoint(&window)?,
        };
        tracing::debug!(%url, "creating notify client");

        let inner = Rc::new_cyclic(|weak: &Weak<RefCell<Inner>>| {
            let sink = event_sink(weak.clone());

            let lease_policy = options.lease_policy();
            let store = LocalLeaseStore::new(window.clone(), &lease_policy);
            let dispatcher = Dispatcher::new(
                LeaderElection::new(store, lease_policy),
                BrowserNotifier::new(window.clone(), sink.clone(), on_error),
                JsNavigator::new(navigate),
                options.dispatch_policy(),
            )
            .with_usage(Box::new(GaUsage::new(window.clone())));

            let conn = ConnectionManager::new(SocketTransport::new(sink.clone()), url, heartbeat)
                .with_usage(Box::new(GaUsage::new(window.clone())));

            let timers = WindowScheduler::new(window, sink);
            RefCell::new(Inner {
                session: Session::new(conn, dispatcher, timers),
                redial: None,
                disposed: false,
            })
        });

        Ok(NotifyClient { inner })
    }

    /// ソケット接続を開始する
    pub fn connect(&self) -> Result<(), JsError> {
        self.with_inner(|inner| {
            if inner.disposed {
                return Err(JsError::new("NotifyClient is disposed"));
            }
            inner.session.connect();
            Ok(())
        })?
    }

    /// 受信したアプリケーションメッセージの購読関数を登録する
    ///
    /// `listener` には JSON をパースしたオブジェクトが渡される。
    pub fn subscribe(&self, listener: Function) -> Result<(), JsError> {
        self.with_inner(|inner| {
            inner
                .session
                .conn_mut()
                .subscribe(Box::new(JsListener::new(listener)))
        })
    }

    /// 通知ペイロードを直接配信する
    ///
    /// # 戻り値
    /// 配信結果（`"shown"`, `"notLeader"`, `"awaitingPermission"` など）
    ///
    /// # エラー
    /// - ペイロード JSON の解析エラー
    pub fn deliver(&self, payload_json: &str) -> Result<String, JsError> {
        let payload: NotificationPayload =
            serde_json::from_str(payload_json).map_err(|e| JsError::new(&e.to_string()))?;
        self.with_inner(|inner| {
            let delivery = inner.session.deliver(payload, now_ms());
            delivery_name(delivery).to_owned()
        })
    }

    /// このタブが通知担当（リーダー）か
    #[wasm_bindgen(js_name = "isLeader")]
    pub fn is_leader(&self) -> Result<bool, JsError> {
        self.with_inner(|inner| inner.session.dispatcher().is_leader())
    }

    /// 接続状態（`"connecting"`, `"open"`, `"closing"`, `"closed"`）
    pub fn state(&self) -> Result<String, JsError> {
        self.with_inner(|inner| inner.session.conn().state().name().to_owned())
    }

    /// 連続で応答のなかったハートビート数
    #[wasm_bindgen(js_name = "missedHeartbeats")]
    pub fn missed_heartbeats(&self) -> Result<u32, JsError> {
        self.with_inner(|inner| inner.session.conn().missed_heartbeats())
    }

    /// 接続を閉じ、通知を片付け、リーダーを降りる
    ///
    /// `beforeunload` で呼ぶこと。2 回目以降は何もしない。
    pub fn dispose(&self) -> Result<(), JsError> {
        self.with_inner(Inner::dispose)
    }
}

impl NotifyClient {
    fn with_inner<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> Result<R, JsError> {
        let mut inner = self
            .inner
            .try_borrow_mut()
            .map_err(|_| JsError::new("NotifyClient called re-entrantly from its own callback"))?;
        Ok(f(&mut inner))
    }
}

impl Inner {
    fn handle(&mut self, event: HostEvent) {
        if self.disposed {
            return;
        }
        let now = now_ms();
        match event {
            HostEvent::Timer(id) => {
                self.session.timers_mut().forget_fired(id);
                if self.redial == Some(id) {
                    self.redial = None;
                    self.session.conn_mut().transport_mut().redial();
                } else if !self.session.on_timer(id, now) {
                    tracing::trace!(%id, "timer fired after its owner let go");
                }
            }
            HostEvent::SocketOpen { generation } => {
                if self.is_current(generation) {
                    self.session.conn_mut().transport_mut().mark_open();
                    self.session.on_open();
                }
            }
            HostEvent::SocketMessage { generation, text } => {
                if self.is_current(generation) {
                    if let Inbound::Dropped(e) = self.session.on_frame(&text, now) {
                        tracing::debug!(error = %e, "frame dropped");
                    }
                }
            }
            HostEvent::SocketClosed { generation } => {
                if self.is_current(generation) {
                    if self.session.conn().transport().dial_failed() {
                        tracing::error!(generation, "websocket could not be created, will redial");
                    }
                    self.session.on_transport_closed();
                    self.schedule_redial();
                }
            }
            HostEvent::PermissionResult { ticket, permission } => {
                let deliveries = self.session.on_permission_result(ticket, permission);
                tracing::debug!(?ticket, ?permission, ?deliveries, "permission answered");
            }
            HostEvent::NotificationClick(handle) => {
                self.session.on_click(handle);
            }
            HostEvent::NotificationClosed(handle) => {
                self.session.dispatcher_mut().notifier_mut().forget(handle);
                self.session.on_closed(handle);
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.session.conn().transport().is_current(generation)
    }

    fn schedule_redial(&mut self) {
        if self.redial.is_some() {
            return;
        }
        let delay = self.session.conn_mut().transport_mut().next_redial_delay();
        let id = self.session.timers_mut().start_timeout(delay);
        tracing::debug!(delay_ms = delay, %id, "socket closed, redial scheduled");
        self.redial = Some(id);
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        if let Some(id) = self.redial.take() {
            self.session.timers_mut().cancel(id);
        }
        self.session.shutdown();
        self.disposed = true;
    }
}

fn event_sink(weak: Weak<RefCell<Inner>>) -> EventSink {
    Rc::new(move |event| dispatch(&weak, event))
}

/// イベントを Inner に届ける
///
/// 既に借用中（同期的な再入）の場合はマイクロタスクで再送する。
fn dispatch(weak: &Weak<RefCell<Inner>>, event: HostEvent) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let busy = match inner.try_borrow_mut() {
        Ok(mut inner) => {
            inner.handle(event);
            return;
        }
        Err(_) => event,
    };
    let weak = weak.clone();
    wasm_bindgen_futures::spawn_local(async move { dispatch(&weak, busy) });
}

fn page_endpoint(window: &web_sys::Window) -> Result<String, JsError> {
    let location = window.location();
    let protocol = location
        .protocol()
        .map_err(|_| JsError::new("cannot read location.protocol"))?;
    let host = location
        .host()
        .map_err(|_| JsError::new("cannot read location.host"))?;
    Ok(endpoint_for(&protocol, &host))
}

fn now_ms() -> u64 {
    js_sys::Date::now() as u64
}

fn delivery_name(delivery: Delivery) -> &'static str {
    match delivery {
        Delivery::NotLeader => "notLeader",
        Delivery::Unsupported => "unsupported",
        Delivery::Denied => "denied",
        Delivery::AwaitingPermission(_) => "awaitingPermission",
        Delivery::Shown(_) => "shown",
        Delivery::Failed => "failed",
        Delivery::Ignored => "ignored",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_names() {
        assert_eq!(delivery_name(Delivery::NotLeader), "notLeader");
        assert_eq!(
            delivery_name(Delivery::AwaitingPermission(tabcast_dispatch::PermissionTicket(1))),
            "awaitingPermission"
        );
        assert_eq!(delivery_name(Delivery::Shown(tabcast_dispatch::HandleId(3))), "shown");
    }
}
