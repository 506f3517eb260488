//! `WebSocket` トランスポート
//!
//! 要求していない close の後は、段階的に間隔を広げて再ダイヤルする。
//! 再ダイヤルのタイミングは `client` がスケジューラーで管理し、
//! このモジュールは遅延の計算とソケットの生成だけを担当する。

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, MessageEvent, WebSocket};

use tabcast_conn::{Transport, TransportError};

use crate::event::{EventSink, HostEvent};

/// 再ダイヤルの遅延（ミリ秒）。最後の値で頭打ち。
pub const REDIAL_DELAYS_MS: [u32; 4] = [1000, 2000, 5000, 10_000];

/// 再ダイヤル遅延の段階
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Backoff {
    attempt: usize,
}

impl Backoff {
    /// 次の遅延を返し、段階を 1 つ進める
    pub fn next_delay(&mut self) -> u32 {
        let index = self.attempt.min(REDIAL_DELAYS_MS.len() - 1);
        self.attempt = self.attempt.saturating_add(1);
        REDIAL_DELAYS_MS[index]
    }

    /// 接続に成功したら最初の段階に戻す
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> usize {
        self.attempt
    }
}

/// ダイヤルの世代管理
///
/// ソケットの生成自体に失敗した回も 1 世代として数え、
/// その世代の close として扱えるようにする。
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DialState {
    /// ソケットを作るたびに増える
    generation: u64,
    /// 現在の世代でソケットを作れなかった
    failed: bool,
}

impl DialState {
    /// 新しい世代を始める
    pub fn begin(&mut self) -> u64 {
        self.generation += 1;
        self.failed = false;
        self.generation
    }

    /// 現在の世代のソケット生成に失敗した
    pub fn fail(&mut self) {
        self.failed = true;
    }

    pub fn failed(&self) -> bool {
        self.failed
    }

    /// `generation` のイベントを処理すべきか
    ///
    /// # 引数
    /// - `has_socket`: 現在ソケットを保持しているか
    pub fn is_current(&self, generation: u64, has_socket: bool) -> bool {
        self.generation == generation && (has_socket || self.failed)
    }
}

/// ブラウザの WebSocket
pub struct SocketTransport {
    sink: EventSink,
    url: String,
    socket: Option<WebSocket>,
    dial: DialState,
    backoff: Backoff,
}

impl SocketTransport {
    pub fn new(sink: EventSink) -> Self {
        SocketTransport {
            sink,
            url: String::new(),
            socket: None,
            dial: DialState::default(),
            backoff: Backoff::default(),
        }
    }

    /// イベントが現在のソケットから来たものか
    pub fn is_current(&self, generation: u64) -> bool {
        self.dial.is_current(generation, self.socket.is_some())
    }

    /// 直近のダイヤルでソケットを作れなかったか
    pub fn dial_failed(&self) -> bool {
        self.dial.failed()
    }

    /// 前回の URL で張り直す（バックオフ待ちの後に呼ぶ）
    pub fn redial(&mut self) {
        self.detach();
        self.connect();
    }

    /// 次の再ダイヤルまでの遅延
    pub fn next_redial_delay(&mut self) -> u32 {
        self.backoff.next_delay()
    }

    /// open できたのでバックオフを戻す
    pub fn mark_open(&mut self) {
        self.backoff.reset();
    }

    fn connect(&mut self) {
        let generation = self.dial.begin();

        let socket = match WebSocket::new(&self.url) {
            Ok(socket) => socket,
            Err(e) => {
                tracing::error!(url = %self.url, error = ?e, "cannot create websocket");
                self.dial.fail();
                // close と同じ経路で再ダイヤルさせる（処理中の sink 呼び出しは後回しになる）
                (self.sink)(HostEvent::SocketClosed { generation });
                return;
            }
        };

        let sink = self.sink.clone();
        let on_open = Closure::<dyn FnMut(web_sys::Event)>::new(move |_: web_sys::Event| {
            sink(HostEvent::SocketOpen { generation })
        })
        .into_js_value();

        let sink = self.sink.clone();
        let on_message = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            match event.data().as_string() {
                Some(text) => sink(HostEvent::SocketMessage { generation, text }),
                None => tracing::warn!("ignoring non-text websocket frame"),
            }
        })
        .into_js_value();

        let sink = self.sink.clone();
        let on_close = Closure::<dyn FnMut(CloseEvent)>::new(move |event: CloseEvent| {
            tracing::debug!(code = event.code(), reason = %event.reason(), "websocket closed");
            sink(HostEvent::SocketClosed { generation })
        })
        .into_js_value();

        socket.set_onopen(Some(on_open.unchecked_ref()));
        socket.set_onmessage(Some(on_message.unchecked_ref()));
        socket.set_onclose(Some(on_close.unchecked_ref()));
        self.socket = Some(socket);
        tracing::debug!(url = %self.url, generation, "websocket dialing");
    }

    /// 現在のソケットのハンドラーを外して閉じる
    fn detach(&mut self) {
        let Some(socket) = self.socket.take() else {
            return;
        };
        socket.set_onopen(None);
        socket.set_onmessage(None);
        socket.set_onclose(None);
        if let Err(e) = socket.close() {
            tracing::debug!(error = ?e, "websocket close failed");
        }
    }
}

impl Transport for SocketTransport {
    fn dial(&mut self, url: &str) {
        self.url = url.to_owned();
        self.backoff.reset();
        self.detach();
        self.connect();
    }

    fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotOpen)?;
        if socket.ready_state() != WebSocket::OPEN {
            return Err(TransportError::NotOpen);
        }
        socket
            .send_with_str(text)
            .map_err(|e| TransportError::SendFailed(format!("{e:?}")))
    }

    fn refresh(&mut self) {
        self.detach();
        self.connect();
    }

    fn close(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_steps_and_caps() {
        let mut backoff = Backoff::default();
        let delays: Vec<u32> = (0..6).map(|_| backoff.next_delay()).collect();
        assert_eq!(delays, vec![1000, 2000, 5000, 10_000, 10_000, 10_000]);
    }

    #[test]
    fn test_failed_dial_counts_as_current_until_next_dial() {
        let mut dial = DialState::default();
        let first = dial.begin();
        assert!(!dial.is_current(first, false), "ソケットのない世代は無視すること");

        dial.fail();
        assert!(dial.failed());
        assert!(dial.is_current(first, false), "作れなかった世代の close は受け付けること");

        let second = dial.begin();
        assert!(!dial.failed());
        assert!(!dial.is_current(first, false), "古い世代は捨てること");
        assert!(dial.is_current(second, true));
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = Backoff::default();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), 1000);
    }
}
