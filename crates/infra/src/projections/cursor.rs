use std::collections::HashMap;
use std::sync::RwLock;

use shutterdesk_core::{AggregateId, TenantId};

use super::ProjectionError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

/// Per-stream cursor for at-least-once delivery.
///
/// Tracks the last applied sequence number per (tenant, aggregate) stream.
/// Replays at or below the cursor are skipped; gaps after the first event
/// are rejected as non-monotonic. The first event of a stream may arrive at
/// any positive sequence (some stores start above 1 after snapshotting).
#[derive(Debug, Default)]
pub struct CursorTracker {
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl CursorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a sequence number should be applied.
    ///
    /// Returns `Ok(false)` for duplicates/replays (skip silently), `Ok(true)`
    /// when the event should be applied. Call [`CursorTracker::advance`]
    /// after a successful apply.
    pub fn check(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        seq: u64,
    ) -> Result<bool, ProjectionError> {
        let cursors = match self.cursors.read() {
            Ok(c) => c,
            Err(_) => return Ok(false),
        };
        let key = CursorKey {
            tenant_id,
            aggregate_id,
        };
        let last = *cursors.get(&key).unwrap_or(&0);

        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            // Duplicate or replay; safe to ignore.
            return Ok(false);
        }
        if last != 0 && seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }

        Ok(true)
    }

    /// Advance the stream cursor after a successful apply.
    pub fn advance(&self, tenant_id: TenantId, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(
                CursorKey {
                    tenant_id,
                    aggregate_id,
                },
                seq,
            );
        }
    }

    /// Forget all cursors (rebuild support).
    pub fn reset(&self) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_skipped_not_errored() {
        let tracker = CursorTracker::new();
        let tenant_id = TenantId::new();
        let aggregate_id = AggregateId::new();

        assert!(tracker.check(tenant_id, aggregate_id, 1).unwrap());
        tracker.advance(tenant_id, aggregate_id, 1);
        assert!(!tracker.check(tenant_id, aggregate_id, 1).unwrap());
        assert!(tracker.check(tenant_id, aggregate_id, 2).unwrap());
    }

    #[test]
    fn gaps_are_rejected() {
        let tracker = CursorTracker::new();
        let tenant_id = TenantId::new();
        let aggregate_id = AggregateId::new();

        tracker.advance(tenant_id, aggregate_id, 1);
        assert!(matches!(
            tracker.check(tenant_id, aggregate_id, 3),
            Err(ProjectionError::NonMonotonicSequence { last: 1, found: 3 })
        ));
    }

    #[test]
    fn reset_forgets_streams() {
        let tracker = CursorTracker::new();
        let tenant_id = TenantId::new();
        let aggregate_id = AggregateId::new();

        tracker.advance(tenant_id, aggregate_id, 5);
        tracker.reset();
        assert!(tracker.check(tenant_id, aggregate_id, 1).unwrap());
    }
}
