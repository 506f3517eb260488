//! 受信フレームの分類
//!
//! 文字列比較をあちこちに散らさず、デコード境界で一度だけ
//! `Frame::Heartbeat` / `Frame::Message` に振り分ける。

use serde_json::{Map, Value};

use crate::error::ProtoError;
use crate::payload::NotificationPayload;

/// 受信した 1 フレーム
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// センチネルと完全一致したフレーム（サーバーのエコー）
    Heartbeat,
    /// JSON オブジェクトとして解釈できたアプリケーションメッセージ
    Message(AppMessage),
}

impl Frame {
    /// テキストフレームを分類する
    ///
    /// # 引数
    /// - `text`: 受信したフレーム本体
    /// - `sentinel`: ハートビートとして扱う値
    ///
    /// # エラー
    /// - JSON として不正、またはオブジェクト以外
    pub fn decode(text: &str, sentinel: &str) -> Result<Self, ProtoError> {
        if text == sentinel {
            return Ok(Frame::Heartbeat);
        }
        AppMessage::from_json(text).map(Frame::Message)
    }

    /// ハートビートか
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, Frame::Heartbeat)
    }
}

/// アプリケーションメッセージ
///
/// このレイヤーが解釈するのは `notification` フィールドだけ。
/// 残りのフィールドは他のコンシューマー向けにそのまま保持する。
#[derive(Debug, Clone, PartialEq)]
pub struct AppMessage {
    /// デスクトップ通知のペイロード（存在すれば Dispatcher に渡す）
    pub notification: Option<NotificationPayload>,
    /// `notification` 以外のフィールド
    pub fields: Map<String, Value>,
}

impl AppMessage {
    /// JSON テキストからデコードする
    pub fn from_json(text: &str) -> Result<Self, ProtoError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ProtoError::Malformed(e.to_string()))?;
        let Value::Object(mut fields) = value else {
            return Err(ProtoError::NotAnObject);
        };

        // 形の不正な notification は通知だけ諦め、元の値は他のコンシューマー向けに残す
        let notification = match fields.remove("notification") {
            None | Some(Value::Null) => None,
            Some(raw) => match NotificationPayload::from_value(&raw) {
                Ok(payload) => Some(payload),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring invalid notification field");
                    fields.insert("notification".into(), raw);
                    None
                }
            },
        };

        Ok(AppMessage { notification, fields })
    }

    /// 通知ペイロードを持っているか
    pub fn has_notification(&self) -> bool {
        self.notification.is_some()
    }

    /// JSON テキストに戻す（JS 側のリスナーに渡す用）
    pub fn to_json(&self) -> String {
        let mut map = self.fields.clone();
        if let Some(notification) = &self.notification {
            if let Ok(value) = serde_json::to_value(notification) {
                map.insert("notification".into(), value);
            }
        }
        Value::Object(map).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_SENTINEL;

    #[test]
    fn test_sentinel_is_heartbeat() {
        let frame = Frame::decode(DEFAULT_SENTINEL, DEFAULT_SENTINEL).unwrap();
        assert!(frame.is_heartbeat());
    }

    #[test]
    fn test_sentinel_must_match_exactly() {
        // 前後に空白があるものはハートビートではなく、JSON でもないので不正
        let err = Frame::decode(" ❤️", DEFAULT_SENTINEL).unwrap_err();
        assert!(matches!(err, ProtoError::Malformed(_)));
    }

    #[test]
    fn test_message_without_notification() {
        let frame = Frame::decode(r#"{"event":"call","caller":"+31"}"#, DEFAULT_SENTINEL).unwrap();
        let Frame::Message(msg) = frame else {
            panic!("メッセージとして分類されるべき");
        };
        assert!(!msg.has_notification());
        assert_eq!(msg.fields["event"], "call");
        assert_eq!(msg.fields["caller"], "+31");
    }

    #[test]
    fn test_message_with_notification() {
        let text = r#"{
            "notification": {
                "title": "Incoming call",
                "body": "Jane Doe",
                "icon": "/static/phone.png",
                "link": {"view": "base.contacts.detail", "id": 42}
            },
            "extra": true
        }"#;
        let Frame::Message(msg) = Frame::decode(text, DEFAULT_SENTINEL).unwrap() else {
            panic!("メッセージとして分類されるべき");
        };
        let payload = msg.notification.as_ref().unwrap();
        assert_eq!(payload.title, "Incoming call");
        assert_eq!(payload.body, "Jane Doe");
        assert_eq!(payload.icon.as_deref(), Some("/static/phone.png"));
        assert!(payload.link.is_some());
        // notification は fields からは取り除かれる
        assert!(!msg.fields.contains_key("notification"));
        assert_eq!(msg.fields["extra"], true);
    }

    #[test]
    fn test_null_notification_is_absent() {
        let msg = AppMessage::from_json(r#"{"notification": null}"#).unwrap();
        assert!(!msg.has_notification());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            Frame::decode("{not json", DEFAULT_SENTINEL),
            Err(ProtoError::Malformed(_))
        ));
    }

    #[test]
    fn test_non_object_rejected() {
        assert_eq!(
            Frame::decode("[1,2,3]", DEFAULT_SENTINEL),
            Err(ProtoError::NotAnObject)
        );
        assert_eq!(Frame::decode("7", DEFAULT_SENTINEL), Err(ProtoError::NotAnObject));
    }

    #[test]
    fn test_invalid_notification_keeps_message() {
        // title が欠けている
        let msg = AppMessage::from_json(r#"{"caller":"+31","notification":{"body":"x"}}"#).unwrap();
        assert!(!msg.has_notification(), "不正な通知は配信しないこと");
        assert_eq!(msg.fields["caller"], "+31");
        assert_eq!(msg.fields["notification"]["body"], "x", "元の値は残すこと");

        // 小数の id
        let msg = AppMessage::from_json(
            r#"{"notification":{"title":"T","link":{"view":"v","id":1.5}}}"#,
        )
        .unwrap();
        assert!(!msg.has_notification());
    }

    #[test]
    fn test_to_json_keeps_all_fields() {
        let msg = AppMessage::from_json(r#"{"a":1,"notification":{"title":"T"}}"#).unwrap();
        let back: Value = serde_json::from_str(&msg.to_json()).unwrap();
        assert_eq!(back["a"], 1);
        assert_eq!(back["notification"]["title"], "T");
    }
}
