//! Import-list extraction for `wgsl` declarations.

use smallvec::SmallVec;

use crate::dsl::DeclNode;

/// Most imports a single declaration may contribute; extras are dropped.
pub const MAX_IMPORTS: usize = 32;

/// Caller-owned scratch buffer for [`imports_of`].
pub type ImportList<'a> = SmallVec<[&'a str; MAX_IMPORTS]>;

/// Collect the fragment names listed in `node`'s `imports` property into `out`.
///
/// `out` is cleared first. Elements may be bare identifiers or `"$wgsl.<name>"`
/// strings; any other shape is skipped. Duplicates are kept.
pub fn imports_of<'a>(node: &'a DeclNode, out: &mut ImportList<'a>) {
    out.clear();
    let Some(items) = node.property("imports").and_then(|v| v.as_list()) else {
        return;
    };
    for item in items {
        if out.len() == MAX_IMPORTS {
            break;
        }
        if let Some(name) = item.wgsl_reference() {
            out.push(name);
        }
    }
}
