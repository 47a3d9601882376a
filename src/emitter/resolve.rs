//! Flattening a module and its transitive imports into one self-contained blob.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use super::imports::MAX_IMPORTS;
use super::registry::ModuleRegistry;
use crate::bytecode::{DataSection, ModuleId};

/// Deepest import chain the builder is sized for.
pub const MAX_IMPORT_DEPTH: usize = 64;

const MAX_STACK_OPS: usize = MAX_IMPORTS * MAX_IMPORT_DEPTH;

/// Fully resolved code per fragment, scoped to one emission pass.
#[derive(Clone, Debug, Default)]
pub struct ResolvedCodeCache {
    by_name: HashMap<String, Vec<u8>>,
}

impl ResolvedCodeCache {
    pub fn insert(&mut self, name: &str, code: Vec<u8>) {
        self.by_name.insert(name.to_string(), code);
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.by_name.get(name).map(Vec::as_slice)
    }

    /// Resolved code as text. Every stored blob came from a `String`, so this
    /// only replaces bytes if the cache was fed something else.
    pub fn get_str(&self, name: &str) -> Option<std::borrow::Cow<'_, str>> {
        self.get(name).map(String::from_utf8_lossy)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

enum Visit {
    Enter(ModuleId),
    Exit(ModuleId),
}

/// Transitive closure of `roots`, dependencies before dependents, each module once.
///
/// Ids missing from the registry are skipped. The walk stops after a fixed number
/// of stack operations, so even a corrupted table cannot keep it spinning.
pub fn transitive_closure(registry: &ModuleRegistry, roots: &[ModuleId]) -> Vec<ModuleId> {
    let mut order = Vec::new();
    let mut included: HashSet<ModuleId> = HashSet::new();
    let mut on_path: HashSet<ModuleId> = HashSet::new();

    let mut stack: Vec<Visit> = roots.iter().rev().map(|&id| Visit::Enter(id)).collect();
    let mut ops = 0usize;

    while let Some(visit) = stack.pop() {
        ops += 1;
        if ops > MAX_STACK_OPS {
            warn!(
                limit = MAX_STACK_OPS,
                included = order.len(),
                "import resolution hit its stack bound; resolved code is truncated"
            );
            break;
        }
        match visit {
            Visit::Enter(id) => {
                if included.contains(&id) || on_path.contains(&id) {
                    continue;
                }
                let Some(entry) = registry.entry(id) else {
                    continue;
                };
                on_path.insert(id);
                stack.push(Visit::Exit(id));
                for &dep in entry.deps.iter().rev() {
                    stack.push(Visit::Enter(dep));
                }
            }
            Visit::Exit(id) => {
                on_path.remove(&id);
                if included.insert(id) {
                    order.push(id);
                }
            }
        }
    }
    order
}

/// Concatenate the code of everything `deps` reaches, then `own`.
///
/// Each included module contributes its code plus one `\n`; empty modules
/// contribute nothing. `own` comes last and is not newline-terminated.
pub fn resolve_code(
    registry: &ModuleRegistry,
    data: &DataSection,
    deps: &[ModuleId],
    own: &[u8],
) -> Vec<u8> {
    if deps.is_empty() {
        return own.to_vec();
    }

    let mut out = Vec::new();
    for id in transitive_closure(registry, deps) {
        let Some(code) = registry.entry(id).and_then(|e| data.blob(e.blob)) else {
            continue;
        };
        if code.is_empty() {
            continue;
        }
        out.extend_from_slice(code);
        out.push(b'\n');
    }
    out.extend_from_slice(own);
    out
}
