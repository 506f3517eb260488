//! # tabcast-timer
//!
//! タイマーの所有権を表す最小限の抽象。
//!
//! 各コンポーネントは自分が開始した [`TimerId`] を保持し、破棄時に必ず
//! [`Scheduler::cancel`] する。発火したタイマー ID が自分の保持しているものと
//! 一致しない場合は無視する（キャンセル済みタイマーの遅延発火対策）。
//!
//! ## 実装
//!
//! - ブラウザ: `tabcast-wasm` の `WindowScheduler`（`setInterval` / `setTimeout`）
//! - テスト: `ManualScheduler`（時刻を手で進める。`test-util` feature で公開）

#[cfg(any(test, feature = "test-util"))]
pub mod manual;

#[cfg(any(test, feature = "test-util"))]
pub use manual::ManualScheduler;

/// スケジューラーが払い出すタイマー識別子
///
/// 同じスケジューラー内で再利用されない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

impl TimerId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for TimerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// タイマーを開始・キャンセルする能力
///
/// 発火の通知方法は実装側が決める（コールバックや `pop_due` など）。
/// 発火したら、所有コンポーネントの `on_timer(id, ..)` を呼ぶこと。
pub trait Scheduler {
    /// `period_ms` ごとに繰り返し発火するタイマーを開始する
    fn start_interval(&mut self, period_ms: u32) -> TimerId;

    /// `delay_ms` 後に 1 回だけ発火するタイマーを開始する
    fn start_timeout(&mut self, delay_ms: u32) -> TimerId;

    /// タイマーを止める。未知の ID・停止済みの ID は無視する。
    fn cancel(&mut self, id: TimerId);
}
