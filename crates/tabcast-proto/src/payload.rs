//! デスクトップ通知ペイロードと遷移先

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtoError;

/// サーバーから届く通知の内容
///
/// 受信後は不変。Dispatcher が 1 回だけ消費する。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// 通知タイトル
    pub title: String,
    /// 本文（省略時は空）
    #[serde(default)]
    pub body: String,
    /// アイコンの URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// クリック時の遷移先
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
}

impl NotificationPayload {
    /// タイトルと本文だけの通知を作る
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        NotificationPayload {
            title: title.into(),
            body: body.into(),
            icon: None,
            link: None,
        }
    }

    /// `notification` フィールドの JSON 値から読み込む
    ///
    /// # エラー
    /// - `title` の欠落、`link.id` が整数・文字列以外など形が不正
    pub fn from_value(value: &Value) -> Result<Self, ProtoError> {
        NotificationPayload::deserialize(value)
            .map_err(|e| ProtoError::InvalidNotification(e.to_string()))
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_link(mut self, link: Link) -> Self {
        self.link = Some(link);
        self
    }
}

/// 遷移先のオブジェクト ID（数値 ID と文字列 ID の両方がある）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkId {
    Number(i64),
    Text(String),
}

impl From<LinkId> for Value {
    fn from(id: LinkId) -> Self {
        match id {
            LinkId::Number(n) => Value::from(n),
            LinkId::Text(s) => Value::from(s),
        }
    }
}

/// クリック時の遷移先
///
/// `{view, id}` と `{view, params}` の 2 形式がある。
/// 両方ある場合は `id` を優先する。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// 遷移先のビュー名（例: `"base.contacts.detail"`）
    pub view: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<LinkId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
}

impl Link {
    pub fn to_id(view: impl Into<String>, id: LinkId) -> Self {
        Link {
            view: view.into(),
            id: Some(id),
            params: None,
        }
    }

    pub fn with_params(view: impl Into<String>, params: Map<String, Value>) -> Self {
        Link {
            view: view.into(),
            id: None,
            params: Some(params),
        }
    }

    /// ナビゲーション要求に変換する
    ///
    /// 遷移は常に `reload: true`（解決済みデータを再取得させる）。
    ///
    /// # 戻り値
    /// `id` も `params` もなければ `None`（遷移しない）
    pub fn to_nav_request(&self) -> Option<NavRequest> {
        let params = match (&self.id, &self.params) {
            (Some(id), _) => {
                let mut map = Map::new();
                map.insert("id".into(), id.clone().into());
                map
            }
            (None, Some(params)) => params.clone(),
            (None, None) => return None,
        };
        Some(NavRequest {
            view: self.view.clone(),
            params,
            reload: true,
        })
    }
}

/// ナビゲーション能力に渡す要求
#[derive(Debug, Clone, PartialEq)]
pub struct NavRequest {
    pub view: String,
    pub params: Map<String, Value>,
    /// 遷移先のデータを強制的に再解決するか
    pub reload: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_link_to_request() {
        let link: Link =
            serde_json::from_value(json!({"view": "base.contacts.detail", "id": 42})).unwrap();
        let req = link.to_nav_request().unwrap();
        assert_eq!(req.view, "base.contacts.detail");
        assert_eq!(Value::Object(req.params), json!({"id": 42}));
        assert!(req.reload);
    }

    #[test]
    fn test_string_id() {
        let link: Link = serde_json::from_value(json!({"view": "cases", "id": "abc"})).unwrap();
        assert_eq!(link.id, Some(LinkId::Text("abc".into())));
        assert_eq!(Value::Object(link.to_nav_request().unwrap().params), json!({"id": "abc"}));
    }

    #[test]
    fn test_params_link_to_request() {
        let link: Link = serde_json::from_value(
            json!({"view": "base.accounts.list", "params": {"filter": "open", "page": 2}}),
        )
        .unwrap();
        let req = link.to_nav_request().unwrap();
        assert_eq!(Value::Object(req.params), json!({"filter": "open", "page": 2}));
    }

    #[test]
    fn test_id_wins_over_params() {
        let link: Link = serde_json::from_value(
            json!({"view": "v", "id": 1, "params": {"ignored": true}}),
        )
        .unwrap();
        assert_eq!(Value::Object(link.to_nav_request().unwrap().params), json!({"id": 1}));
    }

    #[test]
    fn test_bare_view_does_not_navigate() {
        let link: Link = serde_json::from_value(json!({"view": "dashboard"})).unwrap();
        assert_eq!(link.to_nav_request(), None);
    }

    #[test]
    fn test_empty_params_still_navigate() {
        let link = Link::with_params("base.accounts.list", Map::new());
        let req = link.to_nav_request().unwrap();
        assert!(req.params.is_empty());
    }

    #[test]
    fn test_payload_defaults() {
        let payload: NotificationPayload = serde_json::from_value(json!({"title": "X"})).unwrap();
        assert_eq!(payload, NotificationPayload::new("X", ""));
    }

    #[test]
    fn test_payload_ignores_unknown_fields() {
        let payload: NotificationPayload =
            serde_json::from_value(json!({"title": "X", "body": "Y", "priority": 9})).unwrap();
        assert_eq!(payload.body, "Y");
    }
}
