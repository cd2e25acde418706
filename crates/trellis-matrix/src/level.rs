//! Rank thresholds keyed on team size.
//!
//! Level `n` requires a team of at least `thresholds[n - 1]` members. Level 0
//! means unranked. The default table follows ternary growth:
//!
//! | Level | Team size |
//! |-------|-----------|
//! | 1     | 1         |
//! | 2     | 9         |
//! | 3     | 27        |
//! | 4     | 81        |
//! | 5     | 243       |

use crate::error::{Error, Result};

/// A participant rank. 0 is unranked.
pub type Level = u8;

/// Ascending team-size thresholds for each level.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LevelTable {
    thresholds: Vec<u64>,
}

impl Default for LevelTable {
    fn default() -> Self {
        Self {
            thresholds: vec![1, 9, 27, 81, 243],
        }
    }
}

impl LevelTable {
    /// Create a table from thresholds for levels 1, 2, ...
    pub fn new(thresholds: Vec<u64>) -> Result<Self> {
        if thresholds.is_empty() {
            return Err(Error::InvalidLevelTable("no thresholds".into()));
        }
        if thresholds.len() > Level::MAX as usize {
            return Err(Error::InvalidLevelTable("too many levels".into()));
        }
        if thresholds[0] == 0 {
            return Err(Error::InvalidLevelTable("level 1 threshold must be positive".into()));
        }
        if thresholds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InvalidLevelTable(format!(
                "thresholds must be strictly ascending: {:?}",
                thresholds
            )));
        }
        Ok(Self { thresholds })
    }

    /// Parse a comma-separated threshold list, e.g. `"1,9,27,81,243"`.
    pub fn parse(s: &str) -> Result<Self> {
        let thresholds = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<u64>()
                    .map_err(|e| Error::InvalidLevelTable(format!("{:?}: {}", p.trim(), e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(thresholds)
    }

    /// Highest level whose threshold `team_size` meets.
    pub fn level_for(&self, team_size: u64) -> Level {
        self.thresholds.iter().take_while(|t| team_size >= **t).count() as Level
    }

    /// New level if `team_size` earns more than `current`, else `None`.
    ///
    /// Never returns a level at or below `current`.
    pub fn promote(&self, current: Level, team_size: u64) -> Option<Level> {
        let earned = self.level_for(team_size);
        (earned > current).then_some(earned)
    }

    /// Minimum team size for `level`.
    pub fn threshold(&self, level: Level) -> Option<u64> {
        if level == 0 {
            return Some(0);
        }
        self.thresholds.get(level as usize - 1).copied()
    }

    /// Highest attainable level.
    pub fn max_level(&self) -> Level {
        self.thresholds.len() as Level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_levels() {
        let table = LevelTable::default();
        assert_eq!(table.level_for(0), 0);
        assert_eq!(table.level_for(1), 1);
        assert_eq!(table.level_for(8), 1);
        assert_eq!(table.level_for(9), 2);
        assert_eq!(table.level_for(27), 3);
        assert_eq!(table.level_for(363), 5);
        assert_eq!(table.max_level(), 5);
    }

    #[test]
    fn promotion_is_monotonic() {
        let table = LevelTable::default();
        let mut level = 0;
        let mut observed = Vec::new();
        for team in [1, 9, 27] {
            if let Some(next) = table.promote(level, team) {
                level = next;
            }
            observed.push(level);
        }
        assert_eq!(observed, vec![1, 2, 3]);

        // A smaller team never lowers the level
        assert_eq!(table.promote(level, 2), None);
    }

    #[test]
    fn rejects_bad_tables() {
        assert!(LevelTable::new(vec![]).is_err());
        assert!(LevelTable::new(vec![0, 3]).is_err());
        assert!(LevelTable::new(vec![3, 3]).is_err());
        assert!(LevelTable::parse("1,x").is_err());
        assert_eq!(LevelTable::parse("1, 9,27,81,243").unwrap(), LevelTable::default());
    }

    #[test]
    fn thresholds_lookup() {
        let table = LevelTable::default();
        assert_eq!(table.threshold(0), Some(0));
        assert_eq!(table.threshold(3), Some(27));
        assert_eq!(table.threshold(6), None);
    }
}
