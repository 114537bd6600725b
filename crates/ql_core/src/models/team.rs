use serde::{Deserialize, Serialize};

use super::{new_id, TeamId};

/// A Quidditch team with the three ratings the simulator consumes.
///
/// Ratings are 0-100. `attack_strength` drives goal attempts, the opposing
/// `defense_strength` suppresses them, and `seeker_skill` drives the snitch race.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub attack_strength: u8,
    pub defense_strength: u8,
    pub seeker_skill: u8,
    pub record: TeamRecord,
}

impl Team {
    pub fn new(name: impl Into<String>, attack: u8, defense: u8, seeker: u8) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            attack_strength: attack.min(100),
            defense_strength: defense.min(100),
            seeker_skill: seeker.min(100),
            record: TeamRecord::default(),
        }
    }
}

/// Cumulative record, mutated only by settlement (per-match increments) and
/// season archival (titles). Never recomputed from scratch at settlement time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub matches_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub points_for: u64,
    pub points_against: u64,
    pub titles: u32,
}

impl TeamRecord {
    /// League points for standings (win 3, draw 1).
    pub fn table_points(&self) -> u32 {
        self.wins * 3 + self.draws
    }

    pub fn point_difference(&self) -> i64 {
        self.points_for as i64 - self.points_against as i64
    }
}

/// The single-match contribution applied to a team's record at settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDelta {
    pub won: bool,
    pub lost: bool,
    pub drawn: bool,
    pub points_for: u64,
    pub points_against: u64,
}

impl RecordDelta {
    pub fn from_scores(own: u32, opponent: u32) -> Self {
        Self {
            won: own > opponent,
            lost: own < opponent,
            drawn: own == opponent,
            points_for: own as u64,
            points_against: opponent as u64,
        }
    }
}

impl TeamRecord {
    pub fn apply(&mut self, delta: &RecordDelta) {
        self.matches_played += 1;
        if delta.won {
            self.wins += 1;
        } else if delta.lost {
            self.losses += 1;
        } else {
            self.draws += 1;
        }
        self.points_for += delta.points_for;
        self.points_against += delta.points_against;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratings_clamped_to_100() {
        let team = Team::new("Chudley Cannons", 120, 90, 200);
        assert_eq!(team.attack_strength, 100);
        assert_eq!(team.defense_strength, 90);
        assert_eq!(team.seeker_skill, 100);
    }

    #[test]
    fn test_record_apply_win_and_draw() {
        let mut record = TeamRecord::default();
        record.apply(&RecordDelta::from_scores(190, 40));
        record.apply(&RecordDelta::from_scores(70, 70));

        assert_eq!(record.matches_played, 2);
        assert_eq!(record.wins, 1);
        assert_eq!(record.draws, 1);
        assert_eq!(record.losses, 0);
        assert_eq!(record.points_for, 260);
        assert_eq!(record.points_against, 110);
        assert_eq!(record.table_points(), 4);
        assert_eq!(record.point_difference(), 150);
    }
}
