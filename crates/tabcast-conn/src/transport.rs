//! トランスポートとコンシューマーの境界

use tabcast_proto::AppMessage;

use crate::error::TransportError;

/// 双方向テキストチャネル
///
/// イベント（open / message / close）はホストが `ConnectionManager` の
/// `on_open` / `on_frame` / `on_transport_closed` に配送する。
pub trait Transport {
    /// 接続を開始する。失敗時の再試行はトランスポート自身が行う。
    fn dial(&mut self, url: &str);

    /// テキストフレームを送る
    fn send_text(&mut self, text: &str) -> Result<(), TransportError>;

    /// 現在の接続を捨てて、同じエンドポイントに張り直す
    fn refresh(&mut self);

    /// 接続を閉じる（再試行しない）
    fn close(&mut self);
}

/// アプリケーションメッセージの受け手
pub trait MessageConsumer {
    fn consume(&mut self, message: &AppMessage);
}

impl<F: FnMut(&AppMessage)> MessageConsumer for F {
    fn consume(&mut self, message: &AppMessage) {
        self(message)
    }
}
