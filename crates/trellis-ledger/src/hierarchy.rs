//! Depth-bounded closure index.
//!
//! Each placed participant gets one edge per ancestor, up to depth 5, written
//! in the placement transaction. Commission lookups then read at most five
//! rows instead of walking the tree.

use crate::error::{Error, Result};
use crate::models::HierarchyEdge;
use crate::placement::TxnTree;
use crate::promotion::LevelPromotionEngine;
use crate::storage::Txn;
use trellis_matrix::{ancestor_chain, LevelTable};

/// Maintains ancestor edges and the team counters they imply.
pub struct HierarchyIndex<'c> {
    promotion: LevelPromotionEngine<'c>,
}

impl<'c> HierarchyIndex<'c> {
    /// Create an index that promotes against `levels`.
    pub fn new(levels: &'c LevelTable) -> Self {
        Self {
            promotion: LevelPromotionEngine::new(levels),
        }
    }

    /// Write the ancestor edges of a node just attached under `parent_id`.
    ///
    /// Every ancestor reached gains one team member (the immediate parent
    /// also one direct child) and has its level re-evaluated. Any failure
    /// leaves the enclosing transaction to be dropped, taking the node with
    /// it.
    pub fn extend_ancestry(
        &self,
        txn: &Txn<'_>,
        new_id: &str,
        parent_id: &str,
    ) -> Result<Vec<HierarchyEdge>> {
        let chain = ancestor_chain(&mut TxnTree(txn), &parent_id.to_string())?;
        let mut edges = Vec::with_capacity(chain.len());

        for link in chain {
            if link.ancestor == new_id {
                return Err(Error::Storage(format!("{} would be its own ancestor", new_id)));
            }

            let edge = HierarchyEdge {
                ancestor_id: link.ancestor,
                descendant_id: new_id.to_string(),
                depth: link.depth,
            };
            txn.put_edge(&edge)?;

            let mut ancestor = txn.require_participant(&edge.ancestor_id)?;
            ancestor.team_size += 1;
            if edge.depth == 1 {
                ancestor.direct_children += 1;
            }
            self.promotion.apply(&mut ancestor);
            txn.put_participant(&ancestor)?;

            edges.push(edge);
        }

        tracing::debug!("Indexed {} ancestors for {}", edges.len(), new_id);
        Ok(edges)
    }

    /// Ancestors of a participant, ordered by increasing depth.
    pub fn ancestors(txn: &Txn<'_>, descendant_id: &str) -> Result<Vec<HierarchyEdge>> {
        let mut edges = txn.ancestors(descendant_id)?;
        edges.sort_by_key(|e| e.depth);
        Ok(edges)
    }
}
