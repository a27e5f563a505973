//! Collapse rewritten include expressions to a single member chain
use crate::error::MappingError;
use crate::expr::{build, Expr, RcExpr};
use crate::types::TypeRegistry;
use itertools::Itertools;

/// Member chains within `rewritten` that start at `root`
fn candidate_paths(rewritten: &RcExpr, root: &RcExpr) -> Vec<Vec<String>> {
    let mut candidates: Vec<Vec<String>> = vec![];
    rewritten.visit(&mut |e| {
        if let Expr::Member(_, _) = &*e.inner {
            let (base, path) = e.member_chain();
            if (base.same(root) || base == *root) && !candidates.contains(&path) {
                candidates.push(path);
            }
        }
    });
    candidates
}

/// Reduce a rewritten member access to the longest member chain from
/// `root` it contains. Each shorter chain must be a prefix of the next
/// longer one, otherwise the include cannot be expressed as a single
/// path.
pub fn collapse(
    types: &TypeRegistry,
    rewritten: &RcExpr,
    root: &RcExpr,
) -> Result<RcExpr, MappingError> {
    let mut candidates = candidate_paths(rewritten, root);
    if candidates.is_empty() {
        return Ok(rewritten.clone());
    }
    candidates.sort_by_key(|c| c.len());

    let describe = |path: &[String]| format!("{}.{}", types.display(root.ty()), path.iter().join("."));
    let mut longest = &candidates[0];
    for next in &candidates[1..] {
        if !next.starts_with(longest) {
            return Err(MappingError::IncludeTooComplex(
                describe(longest.as_slice()),
                describe(next.as_slice()),
            ));
        }
        longest = next;
    }
    build::path_segments(types, root.clone(), longest)
}
