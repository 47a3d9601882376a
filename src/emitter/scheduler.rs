//! Dependency-first ordering of `wgsl` fragments.
//!
//! Fragments are indices into the declaration list; `deps[i]` lists the indices
//! fragment `i` imports. Indices outside the list stand for undeclared imports and
//! count as satisfied.

use tracing::warn;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Schedule {
    /// Every fragment exactly once, dependencies first where possible.
    pub order: Vec<usize>,
    /// How many trailing entries of `order` were drained from a cycle.
    pub drained: usize,
}

/// Order fragments so that each comes after everything it imports.
///
/// Runs bounded passes over the unprocessed set in declaration order; a fragment
/// becomes eligible once all of its declared imports are processed, and is
/// processed immediately, so later fragments in the same pass can already rely on
/// it. When a pass makes no progress the remainder is cyclic and is appended in
/// declaration order.
pub fn schedule(deps: &[Vec<usize>]) -> Schedule {
    let n = deps.len();
    let mut processed = vec![false; n];
    let mut order = Vec::with_capacity(n);

    let max_passes = n.saturating_mul(n).saturating_add(1);
    for _ in 0..max_passes {
        if order.len() == n {
            break;
        }
        let mut progressed = false;
        for i in 0..n {
            if processed[i] {
                continue;
            }
            let ready = deps[i].iter().all(|&d| d >= n || processed[d]);
            if ready {
                processed[i] = true;
                order.push(i);
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    let resolved = order.len();
    if resolved < n {
        order.extend((0..n).filter(|&i| !processed[i]));
        warn!(
            remaining = n - resolved,
            "dependency cycle among wgsl fragments; emitting the rest in declaration order"
        );
    }

    Schedule {
        order,
        drained: n - resolved,
    }
}
