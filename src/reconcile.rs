use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::error::Result;

/// Effect counts of one reconciliation step.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReconcileOutcome {
    pub inserted: usize,
    pub removed: usize,
}

impl ReconcileOutcome {
    pub fn changed(&self) -> bool {
        self.inserted > 0 || self.removed > 0
    }
}

impl std::ops::Add for ReconcileOutcome {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            inserted: self.inserted + other.inserted,
            removed: self.removed + other.removed,
        }
    }
}

/// Synchronize a stored entity set with a file-derived one. Keys present
/// only in the store are removed (by surrogate id), keys present only in
/// the file are inserted in sorted order, and keys in both are left
/// untouched so surrogate ids never churn for unchanged entries.
pub fn reconcile<K, I, R>(
    existing: &HashMap<K, i64>,
    desired: &HashSet<K>,
    mut insert: I,
    mut remove: R,
) -> Result<ReconcileOutcome>
where
    K: Eq + Hash + Ord,
    I: FnMut(&K) -> Result<()>,
    R: FnMut(i64) -> Result<()>,
{
    let mut stale: Vec<(&K, i64)> = existing
        .iter()
        .filter(|(k, _)| !desired.contains(k))
        .map(|(k, id)| (k, *id))
        .collect();
    stale.sort();

    let mut fresh: Vec<&K> = desired.iter().filter(|k| !existing.contains_key(*k)).collect();
    fresh.sort();

    let mut outcome = ReconcileOutcome::default();
    for (_, id) in stale {
        remove(id)?;
        outcome.removed += 1;
    }
    for k in fresh {
        insert(k)?;
        outcome.inserted += 1;
    }
    Ok(outcome)
}
