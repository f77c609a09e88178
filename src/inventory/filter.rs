use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error};

use super::{ASSEMBLY_INTERFACES, INVENTORY_ROOT};
use crate::bus::{Directory, SubtreeMap};
use crate::error::AssemblyResult;

/// Candidates that also appear in `implemented`, each at most once.
pub fn intersect(candidates: &[String], implemented: &SubtreeMap) -> Vec<String> {
    let declared: BTreeSet<&str> = candidates.iter().map(String::as_str).collect();
    implemented
        .keys()
        .filter(|path| declared.contains(path.as_str()))
        .cloned()
        .collect()
}

/// Drops declared members that no backend service actually implements.
pub struct ImplementationFilter {
    directory: Arc<dyn Directory>,
}

impl ImplementationFilter {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }

    /// One bulk subtree query, intersected with `candidates`.
    pub async fn implemented(&self, candidates: &[String]) -> AssemblyResult<Vec<String>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let subtree = match self.directory.get_subtree(INVENTORY_ROOT, &ASSEMBLY_INTERFACES, 0).await {
            Ok(subtree) => subtree,
            Err(e) if e.is_not_found() => SubtreeMap::new(),
            Err(e) => {
                error!("GetSubtree on {} failed: {}", INVENTORY_ROOT, e);
                return Err(e.into());
            }
        };

        let members = intersect(candidates, &subtree);
        if members.len() < candidates.len() {
            debug!(
                "{} of {} declared assembly members are implemented",
                members.len(),
                candidates.len()
            );
        }
        Ok(members)
    }
}
