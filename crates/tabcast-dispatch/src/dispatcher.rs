//! 通知ディスパッチャー本体

use std::collections::BTreeMap;

use tabcast_lease::{LeaderElection, LeaseStore};
use tabcast_proto::{Link, NoopUsage, NotificationPayload, UsageEvent, UsageTracker};
use tabcast_timer::{Scheduler, TimerId};

use crate::host::{DesktopNotifier, HandleId, Navigator, Permission, PermissionTicket};
use crate::{DISPLAY_MS, UNSUPPORTED_MESSAGE};

/// ディスパッチャーの設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// 通知を自動で閉じるまでの時間（ミリ秒）
    pub display_ms: u32,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        DispatchPolicy {
            display_ms: DISPLAY_MS,
        }
    }
}

/// `deliver` 1 回分の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// このタブはリーダーではない（何もしていない）
    NotLeader,
    /// 通知 API がない（エラーを表示した）
    Unsupported,
    /// 許可が拒否されている（黙って捨てた）
    Denied,
    /// 許可要求中。結果が来たら表示する
    AwaitingPermission(PermissionTicket),
    /// 表示した
    Shown(HandleId),
    /// 表示に失敗した
    Failed,
    /// 未知の許可チケット
    Ignored,
}

/// 回答待ちの許可要求
///
/// 同時に出す許可要求は 1 件だけ。回答前に届いたペイロードはここに積む。
#[derive(Debug)]
struct PendingPermission {
    ticket: PermissionTicket,
    payloads: Vec<NotificationPayload>,
}

/// 表示中の通知
#[derive(Debug)]
struct ShownNotification {
    link: Option<Link>,
    /// 自動で閉じるタイマー
    dismiss: TimerId,
}

/// 通知ディスパッチャー
///
/// リーダー選出・通知ホスト・遷移能力をまとめて所有する。
/// タイマー発火・許可結果・クリックはホストから各 `on_*` メソッドに配送される。
pub struct Dispatcher<L: LeaseStore, N: DesktopNotifier, V: Navigator> {
    election: LeaderElection<L>,
    notifier: N,
    navigator: V,
    usage: Box<dyn UsageTracker>,
    policy: DispatchPolicy,
    /// 許可待ちのペイロード
    awaiting: Option<PendingPermission>,
    /// 表示中の通知
    shown: BTreeMap<HandleId, ShownNotification>,
    next_ticket: u64,
    next_handle: u64,
}

impl<L: LeaseStore, N: DesktopNotifier, V: Navigator> Dispatcher<L, N, V> {
    pub fn new(
        election: LeaderElection<L>,
        notifier: N,
        navigator: V,
        policy: DispatchPolicy,
    ) -> Self {
        Dispatcher {
            election,
            notifier,
            navigator,
            usage: Box::new(NoopUsage),
            policy,
            awaiting: None,
            shown: BTreeMap::new(),
            next_ticket: 0,
            next_handle: 0,
        }
    }

    /// トラッキング先を差し替える
    pub fn with_usage(mut self, usage: Box<dyn UsageTracker>) -> Self {
        self.usage = usage;
        self
    }

    /// 通知ペイロードを配信する
    ///
    /// # 引数
    /// - `payload`: サーバーから届いた通知
    /// - `now_ms`: 現在時刻（リーダー判定用）
    /// - `timers`: 更新タイマー・自動クローズタイマーの登録先
    pub fn deliver(
        &mut self,
        payload: NotificationPayload,
        now_ms: u64,
        timers: &mut dyn Scheduler,
    ) -> Delivery {
        if !self.election.ensure_leadership(now_ms, timers) {
            tracing::trace!(title = %payload.title, "not the notifying tab, skipping");
            return Delivery::NotLeader;
        }

        if !self.notifier.is_supported() {
            self.notifier.report_error(UNSUPPORTED_MESSAGE);
            return Delivery::Unsupported;
        }

        match self.notifier.permission() {
            Permission::Granted => self.show(payload, timers),
            Permission::Denied => {
                tracing::debug!(title = %payload.title, "notification permission denied, dropping");
                Delivery::Denied
            }
            Permission::Default => {
                if let Some(pending) = &mut self.awaiting {
                    pending.payloads.push(payload);
                    return Delivery::AwaitingPermission(pending.ticket);
                }
                self.next_ticket += 1;
                let ticket = PermissionTicket(self.next_ticket);
                self.awaiting = Some(PendingPermission {
                    ticket,
                    payloads: vec![payload],
                });
                self.notifier.request_permission(ticket);
                tracing::debug!(?ticket, "requested notification permission");
                Delivery::AwaitingPermission(ticket)
            }
        }
    }

    /// 許可要求の結果を処理する
    ///
    /// 許可されたら待っていたペイロードを到着順に表示する。それ以外は捨てる。
    ///
    /// # 戻り値
    /// 待っていたペイロードごとの結果。未知のチケットなら `[Ignored]`。
    pub fn on_permission_result(
        &mut self,
        ticket: PermissionTicket,
        permission: Permission,
        timers: &mut dyn Scheduler,
    ) -> Vec<Delivery> {
        let pending = match self.awaiting.take() {
            Some(pending) if pending.ticket == ticket => pending,
            other => {
                self.awaiting = other;
                return vec![Delivery::Ignored];
            }
        };
        pending
            .payloads
            .into_iter()
            .map(|payload| match permission {
                Permission::Granted => self.show(payload, timers),
                Permission::Denied => Delivery::Denied,
                // ダイアログを閉じただけ。次の配信でまた尋ねる
                Permission::Default => Delivery::Failed,
            })
            .collect()
    }

    /// タイマー発火を処理する
    ///
    /// # 戻り値
    /// このディスパッチャー（またはリーダー選出）のタイマーだった場合 `true`
    pub fn on_timer(&mut self, id: TimerId, now_ms: u64) -> bool {
        if self.election.on_timer(id, now_ms) {
            return true;
        }

        let Some(handle) = self
            .shown
            .iter()
            .find_map(|(handle, shown)| (shown.dismiss == id).then_some(*handle))
        else {
            return false;
        };
        self.shown.remove(&handle);
        self.notifier.close(handle);
        tracing::trace!(?handle, "notification auto-dismissed");
        true
    }

    /// 通知がクリックされた
    ///
    /// # 戻り値
    /// 表示中の通知だった場合 `true`
    ///
    /// リンクがあるときだけウィンドウを前面に出し、`id` か `params` があれば遷移する。
    pub fn on_click(&mut self, handle: HandleId) -> bool {
        let Some(shown) = self.shown.get(&handle) else {
            return false;
        };
        if let Some(link) = &shown.link {
            self.notifier.focus_window();
            if let Some(request) = link.to_nav_request() {
                tracing::debug!(view = %request.view, "navigating from notification");
                self.navigator.go(&request);
            }
        }
        self.usage.record(UsageEvent::NOTIFICATION_OPENED);
        true
    }

    /// 通知が自動クローズより前に閉じられた（ユーザー操作・OS）
    pub fn on_closed(&mut self, handle: HandleId, timers: &mut dyn Scheduler) {
        if let Some(shown) = self.shown.remove(&handle) {
            timers.cancel(shown.dismiss);
        }
    }

    /// タブの終了処理：表示中の通知を閉じ、リーダーを降りる
    pub fn shutdown(&mut self, timers: &mut dyn Scheduler) {
        for (handle, shown) in core::mem::take(&mut self.shown) {
            timers.cancel(shown.dismiss);
            self.notifier.close(handle);
        }
        self.awaiting = None;
        self.election.resign(timers);
    }

    pub fn is_leader(&self) -> bool {
        self.election.is_leader()
    }

    /// 表示中の通知数
    pub fn shown_count(&self) -> usize {
        self.shown.len()
    }

    /// 許可待ちのペイロード数
    pub fn awaiting_count(&self) -> usize {
        self.awaiting.as_ref().map_or(0, |pending| pending.payloads.len())
    }

    pub fn election(&self) -> &LeaderElection<L> {
        &self.election
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }

    pub fn navigator(&self) -> &V {
        &self.navigator
    }

    fn show(&mut self, payload: NotificationPayload, timers: &mut dyn Scheduler) -> Delivery {
        self.next_handle += 1;
        let handle = HandleId(self.next_handle);

        if let Err(e) = self.notifier.show(handle, &payload) {
            tracing::warn!(error = %e, title = %payload.title, "failed to show notification");
            return Delivery::Failed;
        }

        let dismiss = timers.start_timeout(self.policy.display_ms);
        self.shown.insert(
            handle,
            ShownNotification {
                link: payload.link,
                dismiss,
            },
        );
        tracing::debug!(?handle, title = %payload.title, "notification shown");
        Delivery::Shown(handle)
    }
}
