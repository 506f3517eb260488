//! JS コールバックから Rust 側へ届くイベント

use std::rc::Rc;

use tabcast_dispatch::{HandleId, Permission, PermissionTicket};
use tabcast_timer::TimerId;

/// ホストイベント
///
/// ソケットのイベントには発行元ソケットの世代番号が付く。
/// 張り直し後に古いソケットから遅れて届いたイベントは捨てる。
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Timer(TimerId),
    SocketOpen { generation: u64 },
    SocketMessage { generation: u64, text: String },
    SocketClosed { generation: u64 },
    PermissionResult { ticket: PermissionTicket, permission: Permission },
    NotificationClick(HandleId),
    NotificationClosed(HandleId),
}

/// イベントの送り先
pub type EventSink = Rc<dyn Fn(HostEvent)>;
