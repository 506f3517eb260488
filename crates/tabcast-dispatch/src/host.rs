//! 通知・遷移のホスト能力
//!
//! ブラウザ実装は `tabcast-wasm`、テストではフェイクを使う。

use tabcast_proto::{NavRequest, NotificationPayload};

use crate::error::DispatchError;

/// 通知許可の三状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// まだユーザーに尋ねていない
    Default,
}

impl Permission {
    /// ブラウザの `Notification.permission` 文字列から変換する
    ///
    /// 未知の値は `Default` とみなす。
    pub fn from_browser(value: &str) -> Self {
        match value {
            "granted" => Permission::Granted,
            "denied" => Permission::Denied,
            _ => Permission::Default,
        }
    }
}

/// 表示中の通知の識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub u64);

/// 非同期の許可要求 1 件の識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PermissionTicket(pub u64);

/// デスクトップ通知の能力
pub trait DesktopNotifier {
    /// 通知 API が使えるか
    fn is_supported(&self) -> bool;

    /// 現在の許可状態
    fn permission(&self) -> Permission;

    /// 許可を要求する
    ///
    /// 結果は後で `Dispatcher::on_permission_result(ticket, ..)` に渡すこと。
    fn request_permission(&mut self, ticket: PermissionTicket);

    /// 通知を表示する。クリックされたら `Dispatcher::on_click(handle)` を呼ぶこと。
    fn show(&mut self, handle: HandleId, payload: &NotificationPayload)
        -> Result<(), DispatchError>;

    /// 通知を閉じる
    fn close(&mut self, handle: HandleId);

    /// アプリケーションのウィンドウを前面に出す
    fn focus_window(&mut self);

    /// ユーザーに見えるエラーを出す（トーストなど）
    fn report_error(&mut self, message: &str);
}

/// 画面遷移の能力
pub trait Navigator {
    fn go(&mut self, request: &NavRequest);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_from_browser() {
        assert_eq!(Permission::from_browser("granted"), Permission::Granted);
        assert_eq!(Permission::from_browser("denied"), Permission::Denied);
        assert_eq!(Permission::from_browser("default"), Permission::Default);
        assert_eq!(Permission::from_browser(""), Permission::Default);
    }
}
