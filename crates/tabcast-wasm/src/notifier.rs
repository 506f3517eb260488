//! ブラウザの Notification API と JS コールバックのアダプター

use std::collections::HashMap;

use js_sys::{Array, Function, Object, Reflect, JSON};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Notification, NotificationOptions, NotificationPermission};

use tabcast_conn::MessageConsumer;
use tabcast_dispatch::{
    DesktopNotifier, DispatchError, HandleId, Navigator, Permission, PermissionTicket,
};
use tabcast_proto::{AppMessage, NavRequest, NotificationPayload, UsageEvent, UsageTracker};

use crate::event::{EventSink, HostEvent};

/// `window.Notification` によるデスクトップ通知
pub struct BrowserNotifier {
    window: web_sys::Window,
    sink: EventSink,
    /// エラー表示用の JS 関数（省略時はコンソール）
    on_error: Option<Function>,
    active: HashMap<HandleId, Notification>,
}

impl BrowserNotifier {
    pub fn new(window: web_sys::Window, sink: EventSink, on_error: Option<Function>) -> Self {
        BrowserNotifier {
            window,
            sink,
            on_error,
            active: HashMap::new(),
        }
    }

    /// ユーザーが閉じた通知を表から外す（イベントハンドラーは付けたまま捨てる）
    pub fn forget(&mut self, handle: HandleId) {
        self.active.remove(&handle);
    }

    fn detach(notification: &Notification) {
        notification.set_onclick(None);
        notification.set_onclose(None);
    }
}

impl DesktopNotifier for BrowserNotifier {
    fn is_supported(&self) -> bool {
        Reflect::has(&self.window, &JsValue::from_str("Notification")).unwrap_or(false)
    }

    fn permission(&self) -> Permission {
        match Notification::permission() {
            NotificationPermission::Granted => Permission::Granted,
            NotificationPermission::Denied => Permission::Denied,
            _ => Permission::Default,
        }
    }

    fn request_permission(&mut self, ticket: PermissionTicket) {
        let promise = match Notification::request_permission() {
            Ok(promise) => promise,
            Err(e) => {
                tracing::warn!(error = ?e, "Notification.requestPermission threw");
                (self.sink)(HostEvent::PermissionResult {
                    ticket,
                    permission: Permission::Default,
                });
                return;
            }
        };
        let sink = self.sink.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let permission = match JsFuture::from(promise).await {
                Ok(value) => Permission::from_browser(&value.as_string().unwrap_or_default()),
                Err(e) => {
                    tracing::warn!(error = ?e, "permission request rejected");
                    Permission::Default
                }
            };
            sink(HostEvent::PermissionResult { ticket, permission });
        });
    }

    fn show(&mut self, handle: HandleId, payload: &NotificationPayload) -> Result<(), DispatchError> {
        let options = NotificationOptions::new();
        options.set_body(&payload.body);
        if let Some(icon) = &payload.icon {
            options.set_icon(icon);
        }
        let notification = Notification::new_with_options(&payload.title, &options)
            .map_err(|e| DispatchError::ShowFailed(format!("{e:?}")))?;

        let sink = self.sink.clone();
        let on_click = Closure::<dyn FnMut(web_sys::Event)>::new(move |_: web_sys::Event| {
            sink(HostEvent::NotificationClick(handle))
        })
        .into_js_value();
        let sink = self.sink.clone();
        let on_close = Closure::<dyn FnMut(web_sys::Event)>::new(move |_: web_sys::Event| {
            sink(HostEvent::NotificationClosed(handle))
        })
        .into_js_value();
        notification.set_onclick(Some(on_click.unchecked_ref()));
        notification.set_onclose(Some(on_close.unchecked_ref()));

        self.active.insert(handle, notification);
        Ok(())
    }

    fn close(&mut self, handle: HandleId) {
        if let Some(notification) = self.active.remove(&handle) {
            Self::detach(&notification);
            notification.close();
        }
    }

    fn focus_window(&mut self) {
        if let Err(e) = self.window.focus() {
            tracing::debug!(error = ?e, "window.focus failed");
        }
    }

    fn report_error(&mut self, message: &str) {
        match &self.on_error {
            Some(on_error) => {
                if let Err(e) = on_error.call1(&JsValue::NULL, &JsValue::from_str(message)) {
                    tracing::warn!(error = ?e, "error callback threw");
                }
            }
            None => web_sys::console::error_1(&JsValue::from_str(message)),
        }
    }
}

/// アプリケーションのルーターを呼ぶ遷移能力
///
/// `navigate(view, params, { reload })` の形で呼び出す。
pub struct JsNavigator {
    navigate: Function,
}

impl JsNavigator {
    pub fn new(navigate: Function) -> Self {
        JsNavigator { navigate }
    }
}

impl Navigator for JsNavigator {
    fn go(&mut self, request: &NavRequest) {
        let params = serde_json::to_string(&request.params)
            .map_err(|e| JsValue::from_str(&e.to_string()))
            .and_then(|text| JSON::parse(&text));
        let params = match params {
            Ok(params) => params,
            Err(e) => {
                tracing::warn!(error = ?e, view = %request.view, "cannot convert navigation params");
                return;
            }
        };
        let options = Object::new();
        if let Err(e) = Reflect::set(
            &options,
            &JsValue::from_str("reload"),
            &JsValue::from_bool(request.reload),
        ) {
            tracing::warn!(error = ?e, "cannot build navigation options");
            return;
        }
        if let Err(e) = self.navigate.call3(
            &JsValue::NULL,
            &JsValue::from_str(&request.view),
            &params,
            &options,
        ) {
            tracing::warn!(error = ?e, view = %request.view, "navigate callback threw");
        }
    }
}

/// `window.ga` があればイベントを送る
pub struct GaUsage {
    window: web_sys::Window,
}

impl GaUsage {
    pub fn new(window: web_sys::Window) -> Self {
        GaUsage { window }
    }
}

impl UsageTracker for GaUsage {
    fn record(&mut self, event: UsageEvent) {
        let Ok(ga) = Reflect::get(&self.window, &JsValue::from_str("ga")) else {
            return;
        };
        let Ok(ga) = ga.dyn_into::<Function>() else {
            return;
        };
        let args = Array::of5(
            &"send".into(),
            &"event".into(),
            &event.category.into(),
            &event.action.into(),
            &event.label.into(),
        );
        if let Err(e) = ga.apply(&JsValue::NULL, &args) {
            tracing::debug!(error = ?e, "ga threw");
        }
    }
}

/// 受信メッセージを JS の購読関数へ渡す
pub struct JsListener {
    callback: Function,
}

impl JsListener {
    pub fn new(callback: Function) -> Self {
        JsListener { callback }
    }
}

impl MessageConsumer for JsListener {
    fn consume(&mut self, message: &AppMessage) {
        let value = match JSON::parse(&message.to_json()) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = ?e, "cannot hand message to listener");
                return;
            }
        };
        if let Err(e) = self.callback.call1(&JsValue::NULL, &value) {
            tracing::warn!(error = ?e, "message listener threw");
        }
    }
}
