//! Breadth-first slot assignment.
//!
//! The open slot for a new member is the first node, in strict FIFO order
//! starting from the root, that has fewer than 3 children. Children are
//! enqueued in position order, so the result is always the shallowest,
//! left-most gap:
//!
//! ```text
//!          R                      R
//!      A   B   C      →       A   B   C
//!                             D
//! ```
//!
//! The search is generic over [`ChildLookup`] so the same code runs against
//! the in-memory [`Matrix`] and against a storage transaction.

use crate::ancestry::ParentLookup;
use crate::position::Position;
use std::collections::{HashSet, VecDeque};
use std::convert::Infallible;
use std::hash::Hash;

/// Source of child links for the BFS.
pub trait ChildLookup {
    /// Node identifier.
    type Id: Clone + Eq + Hash;
    /// Lookup failure.
    type Error;

    /// Children of `parent` as `(position, child)` pairs, in any order.
    fn children(&mut self, parent: &Self::Id) -> Result<Vec<(Position, Self::Id)>, Self::Error>;
}

/// An open slot found by the BFS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSlot<Id> {
    /// Node that will receive the new child
    pub parent: Id,
    /// Position under `parent`
    pub position: Position,
    /// Depth of the new child (root is depth 0)
    pub depth: u32,
}

/// Find the shallowest, left-most open slot below `root`.
///
/// Returns `Ok(None)` only if the lookup describes a graph with no free
/// slot at all, which a finite tree cannot do; callers treat it as
/// corruption.
pub fn find_open_slot<L>(lookup: &mut L, root: &L::Id) -> Result<Option<OpenSlot<L::Id>>, L::Error>
where
    L: ChildLookup,
{
    let mut queue = VecDeque::new();
    let mut seen = HashSet::new();
    queue.push_back((root.clone(), 1u32));
    seen.insert(root.clone());

    while let Some((node, depth)) = queue.pop_front() {
        let mut children = lookup.children(&node)?;
        if let Some(position) = Position::lowest_unused(children.iter().map(|(p, _)| *p)) {
            return Ok(Some(OpenSlot {
                parent: node,
                position,
                depth,
            }));
        }

        children.sort_by_key(|(p, _)| *p);
        for (_, child) in children {
            // A cycle would otherwise spin forever
            if seen.insert(child.clone()) {
                queue.push_back((child, depth + 1));
            }
        }
    }

    Ok(None)
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<usize>,
    position: Option<Position>,
    children: [Option<usize>; 3],
}

/// In-memory placement tree with dense `usize` ids.
///
/// Used for simulation, benchmarks and property tests. Node 0 is the root.
#[derive(Debug, Clone, Default)]
pub struct Matrix {
    nodes: Vec<Node>,
}

impl Matrix {
    /// Create an empty matrix.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Build a matrix by placing `count` members in BFS order.
    pub fn filled(count: usize) -> Self {
        let mut matrix = Self::new();
        for _ in 0..count {
            matrix.insert();
        }
        matrix
    }

    /// Number of placed nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Root id, if any node exists.
    pub fn root(&self) -> Option<usize> {
        if self.nodes.is_empty() {
            None
        } else {
            Some(0)
        }
    }

    /// Place a new member at the next open slot.
    ///
    /// The first member becomes the root with no parent and no position.
    pub fn insert(&mut self) -> (usize, Option<OpenSlot<usize>>) {
        let Some(root) = self.root() else {
            self.nodes.push(Node {
                parent: None,
                position: None,
                children: [None; 3],
            });
            return (0, None);
        };

        let slot = match find_open_slot(self, &root) {
            Ok(Some(slot)) => slot,
            Ok(None) => unreachable!("finite tree always has an open slot"),
            Err(never) => match never {},
        };
        let id = self.attach_unchecked(slot.parent, slot.position);
        (id, Some(slot))
    }

    /// Attach a new node at an explicit slot.
    ///
    /// Returns `None` if the parent does not exist or the slot is taken.
    pub fn attach(&mut self, parent: usize, position: Position) -> Option<usize> {
        let node = self.nodes.get(parent)?;
        if node.children[Self::index(position)].is_some() {
            return None;
        }
        Some(self.attach_unchecked(parent, position))
    }

    fn attach_unchecked(&mut self, parent: usize, position: Position) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node {
            parent: Some(parent),
            position: Some(position),
            children: [None; 3],
        });
        self.nodes[parent].children[Self::index(position)] = Some(id);
        id
    }

    /// Parent of a node (`None` for the root or unknown ids).
    pub fn parent_of(&self, id: usize) -> Option<usize> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    /// Position of a node under its parent.
    pub fn position_of(&self, id: usize) -> Option<Position> {
        self.nodes.get(id).and_then(|n| n.position)
    }

    /// Children of a node in position order.
    pub fn children_of(&self, id: usize) -> Vec<(Position, usize)> {
        self.nodes
            .get(id)
            .map(|n| {
                Position::ALL
                    .iter()
                    .zip(n.children.iter())
                    .filter_map(|(p, c)| c.map(|c| (*p, c)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Distance from the root.
    pub fn depth_of(&self, id: usize) -> u32 {
        let mut depth = 0;
        let mut current = id;
        while let Some(parent) = self.parent_of(current) {
            depth += 1;
            current = parent;
        }
        depth
    }

    fn index(position: Position) -> usize {
        (position.value() - 1) as usize
    }
}

impl ChildLookup for Matrix {
    type Id = usize;
    type Error = Infallible;

    fn children(&mut self, parent: &usize) -> Result<Vec<(Position, usize)>, Infallible> {
        Ok(self.children_of(*parent))
    }
}

impl ParentLookup for Matrix {
    type Id = usize;
    type Error = Infallible;

    fn parent(&mut self, id: &usize) -> Result<Option<usize>, Infallible> {
        Ok(self.parent_of(*id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pos(v: u8) -> Position {
        Position::new(v).unwrap()
    }

    #[test]
    fn first_member_becomes_root() {
        let mut matrix = Matrix::new();
        let (id, slot) = matrix.insert();
        assert_eq!(id, 0);
        assert!(slot.is_none());
        assert_eq!(matrix.parent_of(0), None);
        assert_eq!(matrix.position_of(0), None);
    }

    #[test]
    fn full_first_level_spills_under_leftmost_child() {
        // R with A, B, C at 1, 2, 3: the next member goes under A at 1
        let mut matrix = Matrix::filled(4);
        assert_eq!(matrix.children_of(0).len(), 3);

        let (d, slot) = matrix.insert();
        let slot = slot.unwrap();
        assert_eq!(slot.parent, 1);
        assert_eq!(slot.position, Position::FIRST);
        assert_eq!(slot.depth, 2);
        assert_eq!(matrix.parent_of(d), Some(1));
    }

    #[test]
    fn level_fills_left_to_right_before_going_deeper() {
        let matrix = Matrix::filled(13);
        // Depth-2 nodes are 4..=12, three under each of A, B, C
        for (parent, first_child) in [(1, 4), (2, 7), (3, 10)] {
            let kids: Vec<_> = matrix.children_of(parent).into_iter().map(|(_, c)| c).collect();
            assert_eq!(kids, vec![first_child, first_child + 1, first_child + 2]);
        }
        assert!(matrix.children_of(4).is_empty());
    }

    #[test]
    fn gap_is_filled_before_later_siblings() {
        let mut matrix = Matrix::new();
        matrix.insert();
        matrix.attach(0, pos(2)).unwrap();
        matrix.attach(0, pos(3)).unwrap();

        let (_, slot) = matrix.insert();
        let slot = slot.unwrap();
        assert_eq!(slot.parent, 0);
        assert_eq!(slot.position, pos(1));
    }

    #[test]
    fn attach_rejects_taken_slot() {
        let mut matrix = Matrix::filled(2);
        assert!(matrix.attach(0, pos(1)).is_none());
        assert!(matrix.attach(99, pos(1)).is_none());
    }

    #[test]
    fn cyclic_lookup_terminates() {
        struct Loop;
        impl ChildLookup for Loop {
            type Id = u8;
            type Error = ();
            fn children(&mut self, parent: &u8) -> Result<Vec<(Position, u8)>, ()> {
                let next = (*parent + 1) % 2;
                Ok(Position::ALL.iter().map(|p| (*p, next)).collect())
            }
        }
        assert_eq!(find_open_slot(&mut Loop, &0), Ok(None));
    }

    proptest! {
        #[test]
        fn bfs_keeps_ternary_invariants(count in 1usize..400) {
            let matrix = Matrix::filled(count);
            for id in 0..matrix.len() {
                let kids = matrix.children_of(id);
                prop_assert!(kids.len() <= 3);
                let mut positions: Vec<_> = kids.iter().map(|(p, _)| p.value()).collect();
                positions.dedup();
                prop_assert_eq!(positions.len(), kids.len());
            }
        }

        #[test]
        fn bfs_tree_is_complete(count in 1usize..400) {
            // Node n's parent in a BFS-filled ternary tree is (n - 1) / 3
            let matrix = Matrix::filled(count);
            for id in 1..matrix.len() {
                prop_assert_eq!(matrix.parent_of(id), Some((id - 1) / 3));
                let expected = Position::new(((id - 1) % 3) as u8 + 1).unwrap();
                prop_assert_eq!(matrix.position_of(id), Some(expected));
            }
        }
    }
}
