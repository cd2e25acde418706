//! Level promotion from team-size counters.
//!
//! Levels only move up. A smaller team size, e.g. after a data correction,
//! leaves the current level in place.

use crate::models::Participant;
use trellis_matrix::{Level, LevelTable};

/// Recomputes ranks against a static threshold table.
pub struct LevelPromotionEngine<'c> {
    table: &'c LevelTable,
}

impl<'c> LevelPromotionEngine<'c> {
    /// Create an engine over a threshold table.
    pub fn new(table: &'c LevelTable) -> Self {
        Self { table }
    }

    /// Raise the participant's level if the team size earns it.
    ///
    /// Returns `(old, new)` on promotion. The caller persists the record.
    pub fn apply(&self, participant: &mut Participant) -> Option<(Level, Level)> {
        let new = self.table.promote(participant.level, participant.team_size)?;
        let old = participant.level;
        participant.level = new;
        tracing::info!(
            "Promoted {} from level {} to {} (team size {})",
            participant.id,
            old,
            new,
            participant.team_size
        );
        Some((old, new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_growth_walks_levels_in_order() {
        let table = LevelTable::default();
        let engine = LevelPromotionEngine::new(&table);
        let mut p = Participant::new("alice".into(), None);

        let mut observed = Vec::new();
        for team in [1, 9, 27] {
            p.team_size = team;
            engine.apply(&mut p);
            observed.push(p.level);
        }
        assert_eq!(observed, vec![1, 2, 3]);
    }

    #[test]
    fn shrinking_team_never_demotes() {
        let table = LevelTable::default();
        let engine = LevelPromotionEngine::new(&table);
        let mut p = Participant::new("alice".into(), None);

        p.team_size = 27;
        assert_eq!(engine.apply(&mut p), Some((0, 3)));
        p.team_size = 4;
        assert_eq!(engine.apply(&mut p), None);
        assert_eq!(p.level, 3);
    }
}
