//! Depth-bounded ancestor walk.
//!
//! Walks parent links upward for at most [`MAX_DEPTH`] steps. The loop is
//! iterative and hard-capped; it never recurses and never follows the chain
//! past the bound, whatever the tree depth.

use crate::MAX_DEPTH;

/// Source of parent links.
pub trait ParentLookup {
    /// Node identifier.
    type Id: Clone;
    /// Lookup failure.
    type Error;

    /// Parent of `id`, or `None` at the root.
    fn parent(&mut self, id: &Self::Id) -> Result<Option<Self::Id>, Self::Error>;
}

/// One ancestor of a node and its distance from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestorLink<Id> {
    /// The ancestor
    pub ancestor: Id,
    /// 1 for the immediate parent, up to [`MAX_DEPTH`]
    pub depth: u8,
}

/// Ancestors of a node whose immediate parent is `parent`.
///
/// The result starts with `parent` at depth 1 and is ordered by increasing
/// depth. It holds `min(MAX_DEPTH, ancestor count)` links.
pub fn ancestor_chain<L>(lookup: &mut L, parent: &L::Id) -> Result<Vec<AncestorLink<L::Id>>, L::Error>
where
    L: ParentLookup,
{
    let mut chain = Vec::with_capacity(MAX_DEPTH as usize);
    let mut current = Some(parent.clone());

    for depth in 1..=MAX_DEPTH {
        let Some(ancestor) = current.take() else {
            break;
        };
        current = lookup.parent(&ancestor)?;
        chain.push(AncestorLink { ancestor, depth });
    }

    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Matrix;

    #[test]
    fn root_child_has_one_ancestor() {
        let mut matrix = Matrix::filled(2);
        let chain = ancestor_chain(&mut matrix, &0).unwrap();
        assert_eq!(chain, vec![AncestorLink { ancestor: 0, depth: 1 }]);
    }

    #[test]
    fn chain_is_ordered_by_depth() {
        // Node 13 sits at depth 3: 13 -> 4 -> 1 -> 0
        let mut matrix = Matrix::filled(14);
        let parent = matrix.parent_of(13).unwrap();
        let chain = ancestor_chain(&mut matrix, &parent).unwrap();
        let ids: Vec<_> = chain.iter().map(|l| l.ancestor).collect();
        let depths: Vec<_> = chain.iter().map(|l| l.depth).collect();
        assert_eq!(ids, vec![4, 1, 0]);
        assert_eq!(depths, vec![1, 2, 3]);
    }

    #[test]
    fn chain_is_capped_at_max_depth() {
        // Linear chain of 10 nodes, one child each
        let mut matrix = Matrix::new();
        matrix.insert();
        let mut tip = 0;
        for _ in 0..9 {
            tip = matrix.attach(tip, crate::Position::FIRST).unwrap();
        }
        let parent = matrix.parent_of(tip).unwrap();
        let chain = ancestor_chain(&mut matrix, &parent).unwrap();
        assert_eq!(chain.len(), MAX_DEPTH as usize);
        assert_eq!(chain.last().unwrap().depth, MAX_DEPTH);
    }

    #[test]
    fn edge_count_matches_min_depth_bound() {
        let mut matrix = Matrix::filled(400);
        for id in 1..400 {
            let parent = matrix.parent_of(id).unwrap();
            let depth = matrix.depth_of(id);
            let chain = ancestor_chain(&mut matrix, &parent).unwrap();
            assert_eq!(chain.len(), depth.min(MAX_DEPTH as u32) as usize);
            assert!(chain.iter().all(|l| l.ancestor != id));
        }
    }
}
