//! Replay defense for payment ids.

use alloy_primitives::B256;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use q402::timestamp::UnixTimestamp;

/// The set of payment ids that have already been accepted.
///
/// Keyed by payment id alone: an id is unique per offer, and once claimed
/// it must never verify again, even if presented with different terms. The
/// deadline stored with each id is only used for pruning.
#[derive(Debug, Default)]
pub struct ConsumedPaymentIds(DashMap<B256, UnixTimestamp>);

impl ConsumedPaymentIds {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claims a payment id.
    ///
    /// Returns `true` for the first caller and `false` for everyone else,
    /// under any interleaving. The claim is per-key atomic via the map's
    /// entry API; there is no window between the existence check and the
    /// insert.
    pub fn try_consume(&self, payment_id: B256, deadline: UnixTimestamp) -> bool {
        match self.0.entry(payment_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(deadline);
                true
            }
        }
    }

    /// Drops entries whose deadline has passed, returning how many were
    /// removed.
    pub fn prune_expired(&self, now: UnixTimestamp) -> usize {
        let before = self.0.len();
        self.0.retain(|_, deadline| *deadline >= now);
        before - self.0.len()
    }

    /// Returns the number of consumed ids currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no ids are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_claim_wins() {
        let set = ConsumedPaymentIds::new();
        let id = B256::repeat_byte(0x01);
        let deadline = UnixTimestamp::from_secs(2_000);
        assert!(set.try_consume(id, deadline));
        assert!(!set.try_consume(id, deadline));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn exactly_one_concurrent_claim_succeeds() {
        let set = ConsumedPaymentIds::new();
        let id = B256::repeat_byte(0x02);
        let deadline = UnixTimestamp::from_secs(2_000);

        let successes = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| scope.spawn(|| set.try_consume(id, deadline)))
                .collect();
            handles
                .into_iter()
                .map(|h| matches!(h.join(), Ok(true)))
                .filter(|claimed| *claimed)
                .count()
        });
        assert_eq!(successes, 1);
    }

    #[test]
    fn pruning_keeps_live_entries() {
        let set = ConsumedPaymentIds::new();
        set.try_consume(B256::repeat_byte(0x03), UnixTimestamp::from_secs(100));
        set.try_consume(B256::repeat_byte(0x04), UnixTimestamp::from_secs(300));
        let removed = set.prune_expired(UnixTimestamp::from_secs(200));
        assert_eq!(removed, 1);
        assert_eq!(set.len(), 1);
        // A pruned id is expired, so re-consuming it is harmless.
        assert!(set.try_consume(B256::repeat_byte(0x03), UnixTimestamp::from_secs(100)));
    }
}
