//! Distributes a bounded per-user daily budget across creators.
//!
//! Pure function, recomputed fresh on every scheduling pass; results are
//! never cached. The floor-then-minimum policy means the sum of grants may
//! exceed the budget when many creators need their minimum top-up; that is
//! the intended fairness/spend tradeoff.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-creator request as seen by the allocator.
#[derive(Debug, Clone, Copy)]
pub struct AllocationInput {
    pub creator_id: Uuid,
    pub active: bool,
    pub requested: u32,
}

/// Per-creator outcome of one allocation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub creator_id: Uuid,
    pub requested: u32,
    pub granted: u32,
    pub scaled: bool,
}

/// Allocate `budget` items across the active creators.
///
/// - sum(requested) <= budget: everyone gets exactly what they asked for.
/// - otherwise: proportional floor shares, then a minimum of 1 per creator.
///   The minimum is a floor applied after the proportional computation; it
///   does not re-normalize other creators' shares.
/// - Inactive creators receive no allocation record at all.
pub fn allocate(creators: &[AllocationInput], budget: u32) -> Vec<Allocation> {
    let active: Vec<&AllocationInput> = creators.iter().filter(|c| c.active).collect();
    if active.is_empty() {
        return Vec::new();
    }

    let total_requested: u64 = active.iter().map(|c| u64::from(c.requested)).sum();
    let scaled = total_requested > u64::from(budget);

    active
        .iter()
        .map(|c| {
            let granted = if scaled {
                let share = u64::from(c.requested) * u64::from(budget) / total_requested;
                (share as u32).max(1)
            } else {
                c.requested
            };
            Allocation {
                creator_id: c.creator_id,
                requested: c.requested,
                granted,
                scaled,
            }
        })
        .collect()
}
