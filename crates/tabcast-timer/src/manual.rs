//! 手動で時刻を進める決定的スケジューラー
//!
//! テストで「ハートビート 5 回分進める」「3 秒後に別タブがチェックする」
//! といったシナリオを、実時間を使わずに再現するために使う。

use std::collections::BTreeMap;

use crate::{Scheduler, TimerId};

/// 登録済みタイマー
#[derive(Debug, Clone, Copy)]
struct Entry {
    /// 次に発火する時刻（ミリ秒）
    due_ms: u64,
    /// 繰り返し周期（`None` = 1 回限り）
    period_ms: Option<u64>,
}

/// 決定的スケジューラー
///
/// 時刻は外から与える。発火は [`ManualScheduler::pop_due`] で 1 件ずつ取り出し、
/// 呼び出し側が所有コンポーネントに配送する。同時刻のタイマーは ID 順。
#[derive(Debug, Default)]
pub struct ManualScheduler {
    /// 現在時刻（ミリ秒）
    now_ms: u64,
    /// 次に払い出す ID
    next_id: u64,
    /// 動作中のタイマー
    active: BTreeMap<TimerId, Entry>,
    /// これまでに開始したタイマーの数（統計用）
    started: u64,
    /// キャンセルされたタイマー（順序どおり）
    cancelled: Vec<TimerId>,
}

impl ManualScheduler {
    /// 時刻 `now_ms` から始まるスケジューラーを生成する
    pub fn new(now_ms: u64) -> Self {
        ManualScheduler {
            now_ms,
            ..Default::default()
        }
    }

    /// 現在時刻
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// 時刻を進める（巻き戻しは無視）
    ///
    /// 期限切れタイマーがあっても発火はしない。先に `pop_due` で取り出すこと。
    pub fn set_now(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    /// `until_ms` までに期限が来るタイマーを 1 件取り出す
    ///
    /// 見つかった場合は現在時刻をその発火時刻まで進め、繰り返しタイマーは
    /// 次の周期に再登録する。
    ///
    /// # 戻り値
    /// `(発火時刻, タイマー ID)`。期限の来たタイマーがなければ `None`。
    pub fn pop_due(&mut self, until_ms: u64) -> Option<(u64, TimerId)> {
        let (&id, &entry) = self
            .active
            .iter()
            .filter(|(_, e)| e.due_ms <= until_ms)
            .min_by_key(|(id, e)| (e.due_ms, **id))?;

        self.now_ms = self.now_ms.max(entry.due_ms);
        match entry.period_ms {
            Some(period) => {
                if let Some(e) = self.active.get_mut(&id) {
                    e.due_ms += period;
                }
            }
            None => {
                self.active.remove(&id);
            }
        }
        Some((entry.due_ms, id))
    }

    /// タイマーが動作中か
    pub fn is_active(&self, id: TimerId) -> bool {
        self.active.contains_key(&id)
    }

    /// 動作中のタイマー数
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// これまでに開始したタイマーの総数
    pub fn started_count(&self) -> u64 {
        self.started
    }

    /// キャンセルされたタイマーの一覧
    pub fn cancelled(&self) -> &[TimerId] {
        &self.cancelled
    }

    fn register(&mut self, delay_ms: u32, period_ms: Option<u64>) -> TimerId {
        self.next_id += 1;
        self.started += 1;
        let id = TimerId(self.next_id);
        self.active.insert(
            id,
            Entry {
                due_ms: self.now_ms + u64::from(delay_ms),
                period_ms,
            },
        );
        tracing::trace!(%id, delay_ms, ?period_ms, "timer registered");
        id
    }
}

impl Scheduler for ManualScheduler {
    fn start_interval(&mut self, period_ms: u32) -> TimerId {
        // 周期 0 は無限ループになるので 1ms に丸める
        let period_ms = period_ms.max(1);
        self.register(period_ms, Some(u64::from(period_ms)))
    }

    fn start_timeout(&mut self, delay_ms: u32) -> TimerId {
        self.register(delay_ms, None)
    }

    fn cancel(&mut self, id: TimerId) {
        if self.active.remove(&id).is_some() {
            self.cancelled.push(id);
            tracing::trace!(%id, "timer cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_fires_repeatedly() {
        let mut sched = ManualScheduler::new(0);
        let id = sched.start_interval(100);

        let fired: Vec<_> = std::iter::from_fn(|| sched.pop_due(350)).collect();
        assert_eq!(fired, vec![(100, id), (200, id), (300, id)]);
        assert_eq!(sched.now_ms(), 300);
        assert!(sched.is_active(id));
    }

    #[test]
    fn test_timeout_fires_once() {
        let mut sched = ManualScheduler::new(1000);
        let id = sched.start_timeout(4000);

        assert_eq!(sched.pop_due(4999), None);
        assert_eq!(sched.pop_due(5000), Some((5000, id)));
        assert_eq!(sched.pop_due(10_000), None);
        assert!(!sched.is_active(id));
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let mut sched = ManualScheduler::new(0);
        let id = sched.start_interval(10);
        sched.cancel(id);

        assert_eq!(sched.pop_due(1000), None);
        assert_eq!(sched.cancelled(), &[id]);

        // 二重キャンセルは記録されない
        sched.cancel(id);
        assert_eq!(sched.cancelled().len(), 1);
    }

    #[test]
    fn test_ordering_by_due_then_id() {
        let mut sched = ManualScheduler::new(0);
        let a = sched.start_interval(50);
        let b = sched.start_timeout(50);
        let c = sched.start_timeout(20);

        assert_eq!(sched.pop_due(50), Some((20, c)));
        assert_eq!(sched.pop_due(50), Some((50, a)));
        assert_eq!(sched.pop_due(50), Some((50, b)));
        assert_eq!(sched.pop_due(50), None);
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut sched = ManualScheduler::new(0);
        let a = sched.start_timeout(1);
        sched.cancel(a);
        let b = sched.start_timeout(1);
        assert_ne!(a, b);
        assert_eq!(sched.started_count(), 2);
    }

    #[test]
    fn test_set_now_is_monotonic() {
        let mut sched = ManualScheduler::new(500);
        sched.set_now(100);
        assert_eq!(sched.now_ms(), 500);
        sched.set_now(900);
        assert_eq!(sched.now_ms(), 900);
    }
}
