//! Tree placement.
//!
//! Activation attaches a participant at the shallowest, left-most open slot
//! and extends the closure index in the same transaction. The slot row
//! `slot:{parent}:{position}` is read for update before it is written, so
//! two transactions racing for one slot cannot both commit: the loser gets
//! [`Error::ConcurrentConflict`] and the caller re-runs the whole placement,
//! BFS included.

use crate::error::{Error, Result};
use crate::hierarchy::HierarchyIndex;
use crate::models::{MatrixNode, Participant};
use crate::storage::Txn;
use trellis_matrix::{find_open_slot, ChildLookup, LevelTable, OpenSlot, ParentLookup, Position};

/// Matrix lookups backed by a transaction.
pub(crate) struct TxnTree<'t, 'a>(pub &'t Txn<'a>);

impl ChildLookup for TxnTree<'_, '_> {
    type Id = String;
    type Error = Error;

    fn children(&mut self, parent: &String) -> Result<Vec<(Position, String)>> {
        self.0.children(parent)
    }
}

impl ParentLookup for TxnTree<'_, '_> {
    type Id = String;
    type Error = Error;

    fn parent(&mut self, id: &String) -> Result<Option<String>> {
        let node = self
            .0
            .node(id)?
            .ok_or_else(|| Error::Storage(format!("ancestor {} has no tree node", id)))?;
        Ok(node.parent_id)
    }
}

/// Finds open slots and attaches participants.
pub struct TreePlacementEngine<'c> {
    index: HierarchyIndex<'c>,
}

impl<'c> TreePlacementEngine<'c> {
    /// Create an engine whose index promotes against `levels`.
    pub fn new(levels: &'c LevelTable) -> Self {
        Self {
            index: HierarchyIndex::new(levels),
        }
    }

    /// Place `owner` as the root of an empty tree.
    pub fn bootstrap_root(&self, txn: &Txn<'_>, owner: &Participant) -> Result<MatrixNode> {
        if let Some(existing) = txn.root_id()? {
            return Err(Error::InvalidInput(format!("tree already has root {}", existing)));
        }
        if txn.node(&owner.id)?.is_some() {
            return Err(Error::InvalidInput(format!("{} is already placed", owner.id)));
        }

        let node = MatrixNode::root(owner.id.clone());
        txn.put_node(&node)?;
        txn.set_root_id(&owner.id)?;
        tracing::info!("Bootstrapped tree root {}", owner.id);
        Ok(node)
    }

    /// Root id, or `RootMissing` if the tree was never bootstrapped.
    pub fn root(&self, txn: &Txn<'_>) -> Result<String> {
        let root = txn.root_id()?.ok_or(Error::RootMissing)?;
        if txn.node(&root)?.is_none() {
            tracing::error!("Root {} is recorded but has no tree node", root);
            return Err(Error::RootMissing);
        }
        Ok(root)
    }

    /// Shallowest, left-most slot below `root_id`.
    pub fn find_open_slot(&self, txn: &Txn<'_>, root_id: &str) -> Result<OpenSlot<String>> {
        find_open_slot(&mut TxnTree(txn), &root_id.to_string())?
            .ok_or_else(|| Error::Storage(format!("no open slot below {}", root_id)))
    }

    /// Attach `new_id` at an explicit slot and index its ancestors.
    pub fn place_participant(
        &self,
        txn: &Txn<'_>,
        new_id: &str,
        slot: &OpenSlot<String>,
    ) -> Result<MatrixNode> {
        if txn.node(new_id)?.is_some() {
            return Err(Error::InvalidInput(format!("{} is already placed", new_id)));
        }
        if let Some(occupant) = txn.slot_occupant(&slot.parent, slot.position)? {
            return Err(Error::ConcurrentConflict(format!(
                "slot {}/{} already taken by {}",
                slot.parent, slot.position, occupant
            )));
        }
        if txn.children(&slot.parent)?.len() >= trellis_matrix::MAX_CHILDREN {
            return Err(Error::ConcurrentConflict(format!("{} has no free slot", slot.parent)));
        }

        let node = MatrixNode::child(
            new_id.to_string(),
            slot.parent.clone(),
            slot.position,
            slot.depth,
        );
        txn.put_node(&node)?;
        self.index.extend_ancestry(txn, new_id, &slot.parent)?;

        tracing::info!(
            "Placed {} under {} at position {} (depth {})",
            new_id,
            slot.parent,
            slot.position,
            slot.depth
        );
        Ok(node)
    }

    /// Find the next open slot and place `new_id` there.
    pub fn place(&self, txn: &Txn<'_>, new_id: &str) -> Result<MatrixNode> {
        let root = self.root(txn)?;
        let slot = self.find_open_slot(txn, &root)?;
        self.place_participant(txn, new_id, &slot)
    }
}
