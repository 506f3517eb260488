//! `localStorage` 上のリースストア

use tabcast_lease::{LeaseError, LeasePolicy, LeaseRecord, LeaseStore};

/// `window.localStorage` の 1 キーを使うリースストア
///
/// 同一オリジンのタブはすべて同じキーを読み書きする。
pub struct LocalLeaseStore {
    window: web_sys::Window,
    key: String,
}

impl LocalLeaseStore {
    pub fn new(window: web_sys::Window, policy: &LeasePolicy) -> Self {
        LocalLeaseStore {
            window,
            key: policy.storage_key(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn storage(&self) -> Result<web_sys::Storage, LeaseError> {
        match self.window.local_storage() {
            Ok(Some(storage)) => Ok(storage),
            Ok(None) => Err(LeaseError::Unavailable("localStorage is not available".into())),
            Err(e) => Err(LeaseError::Unavailable(format!("{e:?}"))),
        }
    }
}

impl LeaseStore for LocalLeaseStore {
    fn read(&self) -> Result<Option<LeaseRecord>, LeaseError> {
        let raw = self
            .storage()?
            .get_item(&self.key)
            .map_err(|e| LeaseError::Unavailable(format!("{e:?}")))?;
        raw.as_deref().map(LeaseRecord::decode).transpose()
    }

    fn write(&self, record: &LeaseRecord) -> Result<(), LeaseError> {
        self.storage()?
            .set_item(&self.key, &record.encode())
            .map_err(|e| LeaseError::Unavailable(format!("{e:?}")))
    }

    fn clear(&self) -> Result<(), LeaseError> {
        self.storage()?
            .remove_item(&self.key)
            .map_err(|e| LeaseError::Unavailable(format!("{e:?}")))
    }
}
