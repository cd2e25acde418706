//! Trellis Placement Matrix
//!
//! Ternary placement tree with breadth-first slot assignment and a
//! depth-bounded ancestor index.
//!
//! # Shape
//!
//! Every node has at most 3 children, each at a distinct position in
//! `{1, 2, 3}`. New members fill the shallowest, left-most open slot, so the
//! tree stays balanced and each level fills completely before the next opens:
//!
//! ```text
//! depth 0:                 R
//! depth 1:        A        B        C
//! depth 2:     D  E  F  G  H  I  J  K  L
//! ```
//!
//! # Bounded Ancestry
//!
//! Commissions reach at most [`MAX_DEPTH`] ancestors. The ancestor walk is an
//! iterative loop capped at that depth, so lookups are O(5) regardless of how
//! deep the tree grows, and the closure index stores at most 5 edges per node.
//!
//! This crate is pure: no storage, no clocks. The ledger crate supplies
//! lookups through [`ChildLookup`] and [`ParentLookup`].

mod ancestry;
mod code;
mod commission;
mod error;
mod level;
mod placement;
mod position;

pub use ancestry::{ancestor_chain, AncestorLink, ParentLookup};
pub use code::{CodeSource, RandomCodes, ReferralCode, CODE_ALPHABET, CODE_LEN};
pub use commission::{apply_bps, CommissionTable, BPS_DENOMINATOR};
pub use error::{Error, Result};
pub use level::{Level, LevelTable};
pub use placement::{find_open_slot, ChildLookup, Matrix, OpenSlot};
pub use position::Position;

/// Maximum children per node (ternary branching).
pub const MAX_CHILDREN: usize = 3;

/// Maximum ancestor depth tracked by the hierarchy index.
pub const MAX_DEPTH: u8 = 5;

/// Largest team a node can have inside the indexed depth: 3 + 9 + 27 + 81 + 243.
pub const MAX_INDEXED_TEAM: u64 = max_team(MAX_DEPTH);

/// Number of descendants within `depth` levels of a full ternary tree.
pub const fn max_team(depth: u8) -> u64 {
    let mut total = 0u64;
    let mut width = 1u64;
    let mut d = 0;
    while d < depth {
        width *= MAX_CHILDREN as u64;
        total += width;
        d += 1;
    }
    total
}

const _: () = assert!(Position::ALL.len() == MAX_CHILDREN);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexed_team_bound() {
        assert_eq!(max_team(0), 0);
        assert_eq!(max_team(1), 3);
        assert_eq!(max_team(2), 12);
        assert_eq!(MAX_INDEXED_TEAM, 363);
    }
}
