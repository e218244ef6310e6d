//! # Singleton Flags
//!
//! Decisions behind "exactly one flagged row per owner": the default
//! address of a user, the primary image of a product. The database layer
//! asks these functions what to do and then applies the answer inside a
//! single write scope.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  owner's candidates              event                 result           │
//! │                                                                         │
//! │  {}                 create A (default=false)    {A*}   first one wins   │
//! │  {A*}               create B (default=true)     {A, B*}                 │
//! │  {A, B*}            delete B                    {A*}   promote highest  │
//! │  {A*}               update A (default=false)    {A*}   sole, kept       │
//! │  {A*, C}            update A (default=false)    {A, C*}                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

/// How hard the engine tries to re-flag a survivor after the flagged
/// candidate is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionMode {
    /// Promotion is part of the delete; if it fails, the delete fails.
    Strict,
    /// Promotion failure is logged and the delete still commits, leaving the
    /// owner without a flagged candidate until one is set explicitly.
    BestEffort,
}

/// Whether a freshly inserted candidate should carry the flag.
///
/// `candidate_count` is the owner's count *after* the insert, read inside
/// the same transaction, so two concurrent first inserts cannot both see
/// themselves as the only one.
#[inline]
pub fn flag_on_create(requested: bool, candidate_count: i64) -> bool {
    requested || candidate_count == 1
}

/// What an update does to the flag of an existing candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagChange {
    /// Flag stays as it is.
    Unchanged,
    /// Candidate takes the flag; every sibling loses it.
    Claim,
    /// Caller asked to drop the flag from the only candidate; it stays.
    ForceKeep,
    /// Candidate drops the flag and the most recent sibling takes it.
    Release,
}

impl FlagChange {
    /// The candidate's flag once the change is applied.
    pub const fn resulting_flag(self, currently_flagged: bool) -> bool {
        match self {
            FlagChange::Unchanged => currently_flagged,
            FlagChange::Claim | FlagChange::ForceKeep => true,
            FlagChange::Release => false,
        }
    }
}

/// Decides the flag change for an update.
///
/// ## Example
/// ```rust
/// use bazaar_core::singleton::{flag_on_update, FlagChange};
///
/// // Sole default address: cannot be un-defaulted
/// assert_eq!(flag_on_update(false, true, 1), FlagChange::ForceKeep);
/// // Two addresses: the other one takes over
/// assert_eq!(flag_on_update(false, true, 2), FlagChange::Release);
/// ```
pub fn flag_on_update(requested: bool, currently_flagged: bool, candidate_count: i64) -> FlagChange {
    match (requested, currently_flagged) {
        (true, false) => FlagChange::Claim,
        (false, true) if candidate_count <= 1 => FlagChange::ForceKeep,
        (false, true) => FlagChange::Release,
        _ => FlagChange::Unchanged,
    }
}

/// Whether deleting a candidate obliges the engine to promote a survivor.
#[inline]
pub fn needs_promotion(was_flagged: bool, remaining: i64) -> bool {
    was_flagged && remaining > 0
}

/// Picks the survivor to promote: the most recently created one.
pub fn promotion_target<I>(candidate_ids: I) -> Option<i64>
where
    I: IntoIterator<Item = i64>,
{
    candidate_ids.into_iter().max()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_first_candidate_is_flagged() {
        assert!(flag_on_create(false, 1));
        assert!(!flag_on_create(false, 2));
        assert!(flag_on_create(true, 5));
    }

    #[test]
    fn test_update_decisions() {
        assert_eq!(flag_on_update(true, false, 3), FlagChange::Claim);
        assert_eq!(flag_on_update(true, true, 3), FlagChange::Unchanged);
        assert_eq!(flag_on_update(false, false, 3), FlagChange::Unchanged);
        assert_eq!(flag_on_update(false, true, 1), FlagChange::ForceKeep);
        assert_eq!(flag_on_update(false, true, 3), FlagChange::Release);
    }

    #[test]
    fn test_resulting_flag() {
        assert!(FlagChange::ForceKeep.resulting_flag(true));
        assert!(!FlagChange::Release.resulting_flag(true));
        assert!(FlagChange::Unchanged.resulting_flag(true));
        assert!(!FlagChange::Unchanged.resulting_flag(false));
    }

    #[test]
    fn test_promotion_picks_highest_id() {
        assert_eq!(promotion_target([3, 9, 4]), Some(9));
        assert_eq!(promotion_target(Vec::new()), None);
        assert!(needs_promotion(true, 1));
        assert!(!needs_promotion(true, 0));
        assert!(!needs_promotion(false, 4));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Create(bool),
        Delete(usize),
        SetDefault(usize),
        Update(usize, bool),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            any::<bool>().prop_map(Op::Create),
            any::<usize>().prop_map(Op::Delete),
            any::<usize>().prop_map(Op::SetDefault),
            (any::<usize>(), any::<bool>()).prop_map(|(i, b)| Op::Update(i, b)),
        ]
    }

    /// Applies the decisions to an in-memory model of one owner's rows.
    fn apply(rows: &mut Vec<(i64, bool)>, next_id: &mut i64, op: Op) {
        match op {
            Op::Create(requested) => {
                *next_id += 1;
                rows.push((*next_id, false));
                if flag_on_create(requested, rows.len() as i64) {
                    let id = *next_id;
                    rows.iter_mut().for_each(|r| r.1 = r.0 == id);
                }
            }
            Op::Delete(i) if !rows.is_empty() => {
                let (_, was_flagged) = rows.remove(i % rows.len());
                if needs_promotion(was_flagged, rows.len() as i64) {
                    let target = promotion_target(rows.iter().map(|r| r.0));
                    rows.iter_mut().for_each(|r| r.1 = Some(r.0) == target);
                }
            }
            Op::SetDefault(i) if !rows.is_empty() => {
                let id = rows[i % rows.len()].0;
                rows.iter_mut().for_each(|r| r.1 = r.0 == id);
            }
            Op::Update(i, requested) if !rows.is_empty() => {
                let idx = i % rows.len();
                let (id, flagged) = rows[idx];
                match flag_on_update(requested, flagged, rows.len() as i64) {
                    FlagChange::Claim => rows.iter_mut().for_each(|r| r.1 = r.0 == id),
                    FlagChange::Release => {
                        let target = promotion_target(rows.iter().map(|r| r.0).filter(|r| *r != id));
                        rows.iter_mut().for_each(|r| r.1 = Some(r.0) == target);
                    }
                    FlagChange::Unchanged | FlagChange::ForceKeep => {}
                }
            }
            _ => {}
        }
    }

    proptest! {
        #[test]
        fn prop_exactly_one_flag_when_non_empty(ops in prop::collection::vec(op(), 0..60)) {
            let mut rows = Vec::new();
            let mut next_id = 0;
            for op in ops {
                apply(&mut rows, &mut next_id, op);
                let flagged = rows.iter().filter(|r| r.1).count();
                if rows.is_empty() {
                    prop_assert_eq!(flagged, 0);
                } else {
                    prop_assert_eq!(flagged, 1);
                }
            }
        }
    }
}
