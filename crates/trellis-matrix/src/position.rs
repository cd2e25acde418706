//! Child positions under a parent node.

use crate::error::{Error, Result};

/// A child position under a parent: 1, 2 or 3.
///
/// Positions are ordered left to right; BFS enqueues children in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct Position(u8);

impl Position {
    /// Left-most position.
    pub const FIRST: Self = Self(1);

    /// All positions in left-to-right order.
    pub const ALL: [Self; 3] = [Self(1), Self(2), Self(3)];

    /// Create a position, rejecting anything outside `1..=3`.
    pub const fn new(value: u8) -> Result<Self> {
        if value >= 1 && value <= 3 {
            Ok(Self(value))
        } else {
            Err(Error::InvalidPosition(value))
        }
    }

    /// Raw position value.
    #[inline]
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Lowest position not present in `occupied`, if any.
    pub fn lowest_unused<I>(occupied: I) -> Option<Self>
    where
        I: IntoIterator<Item = Position>,
    {
        let mut taken = [false; 3];
        for p in occupied {
            taken[(p.0 - 1) as usize] = true;
        }
        Self::ALL.into_iter().find(|p| !taken[(p.0 - 1) as usize])
    }
}

impl TryFrom<u8> for Position {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Position> for u8 {
    fn from(value: Position) -> Self {
        value.0
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range() {
        assert!(Position::new(0).is_err());
        assert!(Position::new(4).is_err());
        assert_eq!(Position::new(2).unwrap().value(), 2);
    }

    #[test]
    fn lowest_unused_fills_gaps_first() {
        let p = |v| Position::new(v).unwrap();
        assert_eq!(Position::lowest_unused([]), Some(p(1)));
        assert_eq!(Position::lowest_unused([p(1)]), Some(p(2)));
        assert_eq!(Position::lowest_unused([p(1), p(3)]), Some(p(2)));
        assert_eq!(Position::lowest_unused([p(2), p(3)]), Some(p(1)));
        assert_eq!(Position::lowest_unused([p(1), p(2), p(3)]), None);
    }
}
