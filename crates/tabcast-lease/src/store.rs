//! 共有ストアの境界

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::error::LeaseError;

/// リーダーが最後に生存を表明した時刻
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseRecord {
    /// エポックミリ秒
    pub renewed_at_ms: u64,
}

impl LeaseRecord {
    pub fn new(renewed_at_ms: u64) -> Self {
        LeaseRecord { renewed_at_ms }
    }

    /// `now_ms` 時点で `stale_after_ms` 以上古いか
    ///
    /// 時計が巻き戻ってレコードが未来にある場合は新しいとみなす。
    pub fn is_stale(&self, now_ms: u64, stale_after_ms: u64) -> bool {
        now_ms.saturating_sub(self.renewed_at_ms) >= stale_after_ms
    }

    /// 文字列ストア用のエンコード（JSON の整数表現）
    pub fn encode(&self) -> String {
        self.renewed_at_ms.to_string()
    }

    /// 文字列ストアから読み戻す
    ///
    /// # エラー
    /// - 非負整数として解釈できない
    pub fn decode(raw: &str) -> Result<Self, LeaseError> {
        raw.trim()
            .parse::<u64>()
            .map(LeaseRecord::new)
            .map_err(|_| LeaseError::Corrupt(raw.to_owned()))
    }
}

/// タブ間で共有されるリースレコードの置き場所
///
/// 実装はオリジン単位で共有されていること。ロックは提供しない。
pub trait LeaseStore {
    /// 現在のレコードを読む（なければ `None`）
    fn read(&self) -> Result<Option<LeaseRecord>, LeaseError>;

    /// レコードを上書きする
    fn write(&self, record: &LeaseRecord) -> Result<(), LeaseError>;

    /// レコードを消す
    fn clear(&self) -> Result<(), LeaseError>;
}

/// メモリ上の共有ストア
///
/// `clone()` したハンドル同士は同じレコードを見る。複数タブを 1 プロセス内で
/// 再現するテスト用。`set_available(false)` でストア障害を再現できる。
#[derive(Debug, Clone, Default)]
pub struct MemoryLeaseStore {
    inner: Rc<Shared>,
}

#[derive(Debug)]
struct Shared {
    record: RefCell<Option<LeaseRecord>>,
    available: Cell<bool>,
    writes: Cell<u64>,
}

impl Default for Shared {
    fn default() -> Self {
        Shared {
            record: RefCell::new(None),
            available: Cell::new(true),
            writes: Cell::new(0),
        }
    }
}

impl MemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 現在のレコードを直接覗く（エラーにならない）
    pub fn peek(&self) -> Option<LeaseRecord> {
        *self.inner.record.borrow()
    }

    /// 書き込み回数（全ハンドル合計）
    pub fn write_count(&self) -> u64 {
        self.inner.writes.get()
    }

    pub fn set_available(&self, available: bool) {
        self.inner.available.set(available);
    }

    fn check(&self) -> Result<(), LeaseError> {
        if self.inner.available.get() {
            Ok(())
        } else {
            Err(LeaseError::Unavailable("memory store disabled".into()))
        }
    }
}

impl LeaseStore for MemoryLeaseStore {
    fn read(&self) -> Result<Option<LeaseRecord>, LeaseError> {
        self.check()?;
        Ok(self.peek())
    }

    fn write(&self, record: &LeaseRecord) -> Result<(), LeaseError> {
        self.check()?;
        *self.inner.record.borrow_mut() = Some(*record);
        self.inner.writes.set(self.inner.writes.get() + 1);
        Ok(())
    }

    fn clear(&self) -> Result<(), LeaseError> {
        self.check()?;
        *self.inner.record.borrow_mut() = None;
        Ok(())
    }
}
