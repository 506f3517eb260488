//! リーダー選出

use tabcast_timer::{Scheduler, TimerId};

use crate::error::LeaseError;
use crate::store::{LeaseRecord, LeaseStore};
use crate::{DEFAULT_KEY, DEFAULT_NAMESPACE, RENEW_INTERVAL_MS, STALE_AFTER_MS};

/// リースの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeasePolicy {
    /// リーダーがレコードを書き直す間隔（ミリ秒）
    pub renew_interval_ms: u32,
    /// レコードが放棄されたとみなす経過時間（ミリ秒）。更新間隔の数倍にすること。
    pub stale_after_ms: u64,
    /// ストアの名前空間
    pub namespace: String,
    /// レコードのキー
    pub key: String,
}

impl Default for LeasePolicy {
    fn default() -> Self {
        LeasePolicy {
            renew_interval_ms: RENEW_INTERVAL_MS,
            stale_after_ms: STALE_AFTER_MS,
            namespace: DEFAULT_NAMESPACE.to_owned(),
            key: DEFAULT_KEY.to_owned(),
        }
    }
}

impl LeasePolicy {
    /// ストア上の完全なキー（`namespace.key`）
    pub fn storage_key(&self) -> String {
        format!("{}.{}", self.namespace, self.key)
    }
}

/// このタブがリーダーかどうかを管理する
///
/// リーダーである間だけ更新タイマーを保持する。`is_leader()` はタイマーの
/// 有無そのもので、途中で再計算はしない。
pub struct LeaderElection<L: LeaseStore> {
    store: L,
    policy: LeasePolicy,
    /// 更新タイマー（リーダーである間だけ `Some`）
    renewal: Option<TimerId>,
}

impl<L: LeaseStore> LeaderElection<L> {
    pub fn new(store: L, policy: LeasePolicy) -> Self {
        LeaderElection {
            store,
            policy,
            renewal: None,
        }
    }

    /// リーダーになれるなら引き受ける
    ///
    /// # 引数
    /// - `now_ms`: 現在時刻（エポックミリ秒）
    /// - `timers`: 更新タイマーの登録先
    ///
    /// # 戻り値
    /// このタブがリーダーなら `true`。ストア障害時は `false`（通知を出さない側に倒す）。
    /// 解釈できない値が入っている場合はレコードなしとみなして上書きする。
    pub fn ensure_leadership(&mut self, now_ms: u64, timers: &mut dyn Scheduler) -> bool {
        if self.renewal.is_some() {
            return true;
        }

        let current = match self.store.read() {
            Ok(record) => record,
            // 壊れた値はレコードなしと同じ扱い
            Err(LeaseError::Corrupt(raw)) => {
                tracing::warn!(%raw, "corrupt lease record, overwriting with a fresh claim");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "lease read failed, not claiming leadership");
                return false;
            }
        };

        let claimable = match current {
            None => true,
            Some(record) => record.is_stale(now_ms, self.policy.stale_after_ms),
        };
        if !claimable {
            return false;
        }

        if let Err(e) = self.store.write(&LeaseRecord::new(now_ms)) {
            tracing::warn!(error = %e, "lease write failed, not claiming leadership");
            return false;
        }

        let id = timers.start_interval(self.policy.renew_interval_ms);
        self.renewal = Some(id);
        tracing::debug!(
            now_ms,
            previous = ?current.map(|r| r.renewed_at_ms),
            renewal = %id,
            "claimed notification leadership"
        );
        true
    }

    /// このタブがリーダーか
    pub fn is_leader(&self) -> bool {
        self.renewal.is_some()
    }

    /// タイマー発火を処理する
    ///
    /// # 戻り値
    /// 自分の更新タイマーだった場合 `true`
    pub fn on_timer(&mut self, id: TimerId, now_ms: u64) -> bool {
        if self.renewal != Some(id) {
            return false;
        }
        // 書き込みに失敗し続ければレコードが古くなり、他のタブが引き継ぐ
        if let Err(e) = self.store.write(&LeaseRecord::new(now_ms)) {
            tracing::warn!(error = %e, "lease renewal failed");
        }
        true
    }

    /// リーダーを降りる
    ///
    /// 更新を止めてレコードを消すので、他のタブは古くなるのを待たずに引き継げる。
    pub fn resign(&mut self, timers: &mut dyn Scheduler) {
        let Some(id) = self.renewal.take() else {
            return;
        };
        timers.cancel(id);
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "failed to clear lease on resign");
        }
        tracing::debug!("resigned notification leadership");
    }

    pub fn policy(&self) -> &LeasePolicy {
        &self.policy
    }

    pub fn store(&self) -> &L {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryLeaseStore;
    use tabcast_timer::ManualScheduler;

    fn election(store: &MemoryLeaseStore) -> LeaderElection<MemoryLeaseStore> {
        LeaderElection::new(store.clone(), LeasePolicy::default())
    }

    /// 期限までのタイマーを全部 election に配送する
    fn run_until(
        sched: &mut ManualScheduler,
        until_ms: u64,
        tabs: &mut [&mut LeaderElection<MemoryLeaseStore>],
    ) {
        while let Some((at, id)) = sched.pop_due(until_ms) {
            for tab in tabs.iter_mut() {
                tab.on_timer(id, at);
            }
        }
        sched.set_now(until_ms);
    }

    #[test]
    fn test_claims_when_no_record() {
        let store = MemoryLeaseStore::new();
        let mut sched = ManualScheduler::new(0);
        let mut tab = election(&store);

        assert!(!tab.is_leader());
        assert!(tab.ensure_leadership(0, &mut sched));
        assert!(tab.is_leader());
        assert_eq!(store.peek(), Some(LeaseRecord::new(0)));
        assert_eq!(sched.active_count(), 1);
    }

    #[test]
    fn test_fresh_record_blocks_claim() {
        let store = MemoryLeaseStore::new();
        store.write(&LeaseRecord::new(10_000)).unwrap();
        let mut sched = ManualScheduler::new(0);
        let mut tab = election(&store);

        assert!(!tab.ensure_leadership(12_999, &mut sched));
        assert!(!tab.is_leader());
        assert_eq!(sched.active_count(), 0, "リーダーでなければタイマーを持たない");
    }

    #[test]
    fn test_stale_record_is_claimed_at_threshold() {
        let store = MemoryLeaseStore::new();
        store.write(&LeaseRecord::new(10_000)).unwrap();
        let mut sched = ManualScheduler::new(0);
        let mut tab = election(&store);

        assert!(tab.ensure_leadership(10_000 + STALE_AFTER_MS, &mut sched));
        assert_eq!(store.peek(), Some(LeaseRecord::new(13_000)));
    }

    #[test]
    fn test_renewal_keeps_other_tab_out() {
        let store = MemoryLeaseStore::new();
        let mut sched = ManualScheduler::new(0);
        let mut leader = election(&store);
        let mut other = election(&store);

        assert!(leader.ensure_leadership(0, &mut sched));

        // 閾値直前まで進めると、その間に 1 秒ごとの更新が入っている
        run_until(&mut sched, STALE_AFTER_MS - 1, &mut [&mut leader]);
        assert_eq!(store.peek(), Some(LeaseRecord::new(2000)));
        assert!(!other.ensure_leadership(STALE_AFTER_MS - 1, &mut sched));

        // 閾値ちょうどでも、更新が入っているので奪えない
        run_until(&mut sched, STALE_AFTER_MS, &mut [&mut leader]);
        assert!(!other.ensure_leadership(STALE_AFTER_MS, &mut sched));
    }

    #[test]
    fn test_leader_stays_leader_without_second_timer() {
        let store = MemoryLeaseStore::new();
        let mut sched = ManualScheduler::new(0);
        let mut tab = election(&store);

        assert!(tab.ensure_leadership(0, &mut sched));
        run_until(&mut sched, 5000, &mut [&mut tab]);
        assert!(tab.ensure_leadership(5000, &mut sched));
        assert!(tab.ensure_leadership(5001, &mut sched));

        assert_eq!(sched.started_count(), 1, "更新タイマーは 1 本だけ");
    }

    #[test]
    fn test_closed_leader_is_replaced() {
        let store = MemoryLeaseStore::new();
        let mut sched = ManualScheduler::new(0);
        let mut tab_a = election(&store);
        let mut tab_b = election(&store);

        assert!(tab_a.ensure_leadership(0, &mut sched));
        assert!(!tab_b.ensure_leadership(0, &mut sched));

        // タブ A が閉じる（更新タイマーが止まる）
        drop(tab_a);
        let mut sched_b = ManualScheduler::new(0);

        // 閾値前はまだ A のレコードが新しい
        assert!(!tab_b.ensure_leadership(STALE_AFTER_MS - 1, &mut sched_b));
        // 閾値に達したら B が引き継ぐ
        assert!(tab_b.ensure_leadership(STALE_AFTER_MS, &mut sched_b));
        assert!(tab_b.is_leader());
    }

    #[test]
    fn test_race_both_claim_then_converge() {
        let store = MemoryLeaseStore::new();
        let mut sched_a = ManualScheduler::new(0);
        let mut sched_b = ManualScheduler::new(0);
        let mut tab_a = election(&store);
        let mut tab_b = election(&store);

        // A が引き受けた直後に、古いレコード（3 秒以上前）を見た B も引き受けるケースを
        // 再現するため、ストアを一度古い値に戻す
        assert!(tab_a.ensure_leadership(10_000, &mut sched_a));
        store.write(&LeaseRecord::new(0)).unwrap();
        assert!(tab_b.ensure_leadership(10_000, &mut sched_b));
        assert!(tab_a.is_leader() && tab_b.is_leader(), "競合中は 2 タブともリーダー");

        // B が閉じ、A だけが更新を続ける
        drop(tab_b);
        run_until(&mut sched_a, 20_000, &mut [&mut tab_a]);

        let mut tab_c = election(&store);
        let mut sched_c = ManualScheduler::new(20_000);
        assert!(!tab_c.ensure_leadership(20_000, &mut sched_c), "A が更新中なので奪えない");
    }

    #[test]
    fn test_resign_allows_immediate_takeover() {
        let store = MemoryLeaseStore::new();
        let mut sched = ManualScheduler::new(0);
        let mut tab_a = election(&store);
        let mut tab_b = election(&store);

        assert!(tab_a.ensure_leadership(0, &mut sched));
        tab_a.resign(&mut sched);
        assert!(!tab_a.is_leader());
        assert_eq!(sched.active_count(), 0);
        assert_eq!(store.peek(), None);

        assert!(tab_b.ensure_leadership(1, &mut sched));
    }

    #[test]
    fn test_foreign_timer_ignored() {
        let store = MemoryLeaseStore::new();
        let mut sched = ManualScheduler::new(0);
        let mut tab = election(&store);
        let foreign = sched.start_timeout(10);

        assert!(tab.ensure_leadership(0, &mut sched));
        assert!(!tab.on_timer(foreign, 10));
        assert_eq!(store.peek(), Some(LeaseRecord::new(0)));
    }

    #[test]
    fn test_store_failure_means_not_leader() {
        let store = MemoryLeaseStore::new();
        store.set_available(false);
        let mut sched = ManualScheduler::new(0);
        let mut tab = election(&store);

        assert!(!tab.ensure_leadership(0, &mut sched));
        assert_eq!(sched.active_count(), 0);
    }

    /// 生の文字列を保持する、localStorage と同じ形のストア
    #[derive(Debug, Default)]
    struct RawStore {
        raw: std::cell::RefCell<Option<String>>,
    }

    impl LeaseStore for RawStore {
        fn read(&self) -> Result<Option<LeaseRecord>, LeaseError> {
            self.raw.borrow().as_deref().map(LeaseRecord::decode).transpose()
        }

        fn write(&self, record: &LeaseRecord) -> Result<(), LeaseError> {
            *self.raw.borrow_mut() = Some(record.encode());
            Ok(())
        }

        fn clear(&self) -> Result<(), LeaseError> {
            *self.raw.borrow_mut() = None;
            Ok(())
        }
    }

    #[test]
    fn test_corrupt_record_is_overwritten() {
        for raw in ["1.7e12", "false", "{\"ts\": 1}", ""] {
            let store = RawStore {
                raw: std::cell::RefCell::new(Some(raw.to_owned())),
            };
            let mut sched = ManualScheduler::new(0);
            let mut tab = LeaderElection::new(store, LeasePolicy::default());

            assert!(tab.ensure_leadership(10_000, &mut sched), "{raw:?} でも引き継げること");
            assert_eq!(tab.store().raw.borrow().as_deref(), Some("10000"));
            assert_eq!(tab.store().read(), Ok(Some(LeaseRecord::new(10_000))));
        }
    }

    #[test]
    fn test_storage_key() {
        assert_eq!(LeasePolicy::default().storage_key(), "notificationTab.timestamp");
    }
}
