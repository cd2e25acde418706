//! Tree placement records.

use serde::{Deserialize, Serialize};
use trellis_matrix::Position;

/// A participant's fixed place in the tree. Written once, never updated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatrixNode {
    /// Placed participant
    pub participant_id: String,

    /// Parent node, `None` for the root
    pub parent_id: Option<String>,

    /// Position under the parent, `None` for the root
    pub position: Option<Position>,

    /// Distance from the root
    pub depth: u32,

    /// Placement time (unix millis)
    pub placed_at: u64,
}

impl MatrixNode {
    /// Root node record.
    pub fn root(participant_id: String) -> Self {
        Self {
            participant_id,
            parent_id: None,
            position: None,
            depth: 0,
            placed_at: super::unix_millis(),
        }
    }

    /// Child node record.
    pub fn child(participant_id: String, parent_id: String, position: Position, depth: u32) -> Self {
        Self {
            participant_id,
            parent_id: Some(parent_id),
            position: Some(position),
            depth,
            placed_at: super::unix_millis(),
        }
    }

    /// Check if this is the root.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Closure-index edge: `ancestor` is `depth` steps above `descendant`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HierarchyEdge {
    /// Ancestor participant
    pub ancestor_id: String,

    /// Descendant participant
    pub descendant_id: String,

    /// 1..=5
    pub depth: u8,
}
