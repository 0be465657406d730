use std::{collections::HashMap, sync::Mutex};

use hikari_common::UserId;
use hikari_utils::readable_size::ReadableSize;
use tracing::warn;

use crate::err::{QuotaExceededSnafu, Result};

/// Per-user byte accounting for the local cache.
///
/// One limit applies uniformly to every user; `used <= limit` holds for
/// every user after each committed operation. Reservations are
/// linearizable: two concurrent reservations that would jointly exceed
/// the limit cannot both succeed.
#[derive(Debug)]
pub struct QuotaLedger {
    limit: u64,
    used: Mutex<HashMap<UserId, u64>>,
}

impl QuotaLedger {
    pub fn new(limit: ReadableSize) -> Self {
        Self {
            limit: limit.as_bytes(),
            used: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> u64 { self.limit }

    pub fn used(&self, owner: UserId) -> u64 {
        let used = self.used.lock().expect("quota ledger lock poisoned");
        used.get(&owner).copied().unwrap_or(0)
    }

    pub fn available(&self, owner: UserId) -> u64 { self.limit - self.used(owner) }

    /// Atomically check `used + bytes <= limit` and commit the
    /// reservation.
    pub fn reserve(&self, owner: UserId, bytes: u64) -> Result<()> {
        let mut used = self.used.lock().expect("quota ledger lock poisoned");
        let entry = used.entry(owner).or_insert(0);
        snafu::ensure!(
            *entry + bytes <= self.limit,
            QuotaExceededSnafu {
                owner,
                requested: bytes,
                used: *entry,
                limit: self.limit,
            }
        );
        *entry += bytes;
        Ok(())
    }

    /// Return reserved bytes, floored at zero. Over-release indicates a
    /// bookkeeping bug elsewhere and is logged, not fatal.
    pub fn release(&self, owner: UserId, bytes: u64) {
        let mut used = self.used.lock().expect("quota ledger lock poisoned");
        let entry = used.entry(owner).or_insert(0);
        if *entry < bytes {
            warn!(
                "quota release of {} bytes for user {} exceeds the {} recorded",
                bytes, owner, *entry
            );
            *entry = 0;
        } else {
            *entry -= bytes;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn reserve_until_exceeded() {
        let ledger = QuotaLedger::new(ReadableSize(1000));
        ledger.reserve(1, 600).unwrap();
        ledger.reserve(1, 400).unwrap();
        let err = ledger.reserve(1, 1).unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(ledger.used(1), 1000);

        // other users are accounted independently
        ledger.reserve(2, 1000).unwrap();
    }

    #[test]
    fn release_floors_at_zero() {
        let ledger = QuotaLedger::new(ReadableSize(1000));
        ledger.reserve(1, 100).unwrap();
        ledger.release(1, 300);
        assert_eq!(ledger.used(1), 0);
        ledger.reserve(1, 1000).unwrap();
    }

    #[test]
    fn concurrent_reservations_are_linearizable() {
        let ledger = Arc::new(QuotaLedger::new(ReadableSize(1000)));
        let handles = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || ledger.reserve(1, 300).is_ok())
            })
            .collect::<Vec<_>>();
        let granted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&ok| ok)
            .count() as u64;
        // at most three 300-byte reservations fit under 1000
        assert_eq!(granted, 3);
        assert_eq!(ledger.used(1), granted * 300);
    }
}
