//! `window.setInterval` / `setTimeout` によるスケジューラー

use std::collections::HashMap;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use tabcast_timer::{Scheduler, TimerId};

use crate::event::{EventSink, HostEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Interval,
    Timeout,
}

/// ブラウザのタイマー
///
/// 発火すると `HostEvent::Timer(id)` をシンクに送る。コールバックの
/// クロージャーは JS 側の GC に任せる（`into_js_value`）ので、発火中の
/// コールバックを Rust 側から解放してしまうことはない。
pub struct WindowScheduler {
    window: web_sys::Window,
    sink: EventSink,
    next_id: u64,
    /// TimerId → ブラウザのタイマーハンドル
    handles: HashMap<TimerId, (i32, Kind)>,
}

impl WindowScheduler {
    pub fn new(window: web_sys::Window, sink: EventSink) -> Self {
        WindowScheduler {
            window,
            sink,
            next_id: 0,
            handles: HashMap::new(),
        }
    }

    /// 1 回限りのタイマーが発火したら呼ぶ（ハンドル表から外す）
    pub fn forget_fired(&mut self, id: TimerId) {
        if let Some((_, Kind::Timeout)) = self.handles.get(&id) {
            self.handles.remove(&id);
        }
    }

    fn start(&mut self, ms: u32, kind: Kind) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);

        let sink = self.sink.clone();
        let callback = Closure::<dyn FnMut()>::new(move || sink(HostEvent::Timer(id)))
            .into_js_value();
        let function: &js_sys::Function = callback.unchecked_ref();
        let timeout = i32::try_from(ms).unwrap_or(i32::MAX);

        let handle = match kind {
            Kind::Interval => self
                .window
                .set_interval_with_callback_and_timeout_and_arguments_0(function, timeout),
            Kind::Timeout => self
                .window
                .set_timeout_with_callback_and_timeout_and_arguments_0(function, timeout),
        };
        match handle {
            Ok(handle) => {
                self.handles.insert(id, (handle, kind));
            }
            Err(e) => tracing::error!(%id, error = ?e, "failed to register browser timer"),
        }
        id
    }
}

impl Scheduler for WindowScheduler {
    fn start_interval(&mut self, period_ms: u32) -> TimerId {
        self.start(period_ms, Kind::Interval)
    }

    fn start_timeout(&mut self, delay_ms: u32) -> TimerId {
        self.start(delay_ms, Kind::Timeout)
    }

    fn cancel(&mut self, id: TimerId) {
        match self.handles.remove(&id) {
            Some((handle, Kind::Interval)) => self.window.clear_interval_with_handle(handle),
            Some((handle, Kind::Timeout)) => self.window.clear_timeout_with_handle(handle),
            None => {}
        }
    }
}
