//! Shared ownership of modules across configurations.
//!
//! One builder can produce several configurations over the same module
//! instances. Each configuration leases every distinct module it holds, and
//! only the release of the last lease lets the module be deconstructed.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::modules::Module;

fn leases() -> &'static Mutex<HashMap<usize, usize>> {
    static LEASES: OnceLock<Mutex<HashMap<usize, usize>>> = OnceLock::new();
    LEASES.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Identity of a module allocation. Stable while any lease holds the `Arc`.
pub(crate) fn module_id(module: &Arc<dyn Module>) -> usize {
    Arc::as_ptr(module) as *const () as usize
}

/// Index of the first occurrence of every distinct module, in add order.
pub(crate) fn distinct_indices(modules: &[Arc<dyn Module>]) -> Vec<usize> {
    let mut seen = HashSet::new();
    modules
        .iter()
        .enumerate()
        .filter(|(_, module)| seen.insert(module_id(module)))
        .map(|(index, _)| index)
        .collect()
}

pub(crate) fn acquire(module: &Arc<dyn Module>) {
    let mut leases = leases().lock().unwrap_or_else(PoisonError::into_inner);
    *leases.entry(module_id(module)).or_insert(0) += 1;
}

/// Drop one lease. Returns true when no configuration holds the module any
/// more.
pub(crate) fn release(module: &Arc<dyn Module>) -> bool {
    let mut leases = leases().lock().unwrap_or_else(PoisonError::into_inner);
    let id = module_id(module);
    match leases.get_mut(&id) {
        Some(count) if *count > 1 => {
            *count -= 1;
            false
        }
        Some(_) => {
            leases.remove(&id);
            true
        }
        None => true,
    }
}
