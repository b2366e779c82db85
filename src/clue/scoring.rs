use serde::{Deserialize, Serialize};

/// Points for a correct multiple-choice answer.
pub const MULTIPLE_CHOICE_AWARD: u32 = 1;

/// Points for a free-text question, shrinking with every hint used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringRule {
    pub base: u32,
    pub cost_per_hint: u32,
    /// Never award less than this for a correct answer.
    pub floor: u32,
    /// Once this many hints are used the answer is handed to the player and
    /// only the floor is awarded.
    #[serde(default)]
    pub reveal_after: Option<u32>,
}

impl ScoringRule {
    pub const fn new(base: u32, cost_per_hint: u32, floor: u32) -> Self {
        Self {
            base,
            cost_per_hint,
            floor,
            reveal_after: None,
        }
    }

    pub const fn revealing_after(self, hints: u32) -> Self {
        Self {
            reveal_after: Some(hints),
            ..self
        }
    }

    pub fn is_revealed(&self, hints_used: u32) -> bool {
        self.reveal_after.is_some_and(|cap| hints_used >= cap)
    }

    pub fn award(&self, hints_used: u32) -> u32 {
        if self.is_revealed(hints_used) {
            return self.floor;
        }
        self.base
            .saturating_sub(self.cost_per_hint.saturating_mul(hints_used))
            .max(self.floor)
    }
}

/// Flat bonus for finishing a clue without a single hint.
pub fn completion_bonus(bonus: u32, total_hints: u32) -> u32 {
    if total_hints == 0 {
        bonus
    } else {
        0
    }
}

/// Sum of the per-part awards plus the completion bonus.
pub fn clue_total(part_awards: &[u32], bonus: u32, total_hints: u32) -> u32 {
    part_awards.iter().sum::<u32>() + completion_bonus(bonus, total_hints)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_award_floors_once_revealed() {
        let rule = ScoringRule::new(10, 1, 1).revealing_after(3);
        let awards: Vec<u32> = (0..=4).map(|h| rule.award(h)).collect();
        assert_eq!(awards, vec![10, 9, 8, 1, 1]);
    }

    #[test]
    fn test_award_never_below_floor() {
        let rule = ScoringRule::new(10, 2, 2);
        assert_eq!(rule.award(0), 10);
        assert_eq!(rule.award(3), 4);
        assert_eq!(rule.award(4), 2);
        assert_eq!(rule.award(50), 2);
        assert_eq!(rule.award(u32::MAX), 2);
    }

    #[test]
    fn test_award_non_increasing_in_hints() {
        for rule in [
            ScoringRule::new(10, 1, 1),
            ScoringRule::new(10, 1, 2),
            ScoringRule::new(5, 1, 1),
            ScoringRule::new(10, 1, 1).revealing_after(3),
        ] {
            let awards: Vec<u32> = (0..12).map(|h| rule.award(h)).collect();
            assert!(awards.windows(2).all(|w| w[0] >= w[1]), "{rule:?}");
            assert!(awards.iter().all(|&a| a >= rule.floor));
        }
    }

    #[test]
    fn test_bonus_only_without_hints() {
        assert_eq!(clue_total(&[5, 10], 5, 0), 20);
        assert_eq!(clue_total(&[5, 8], 5, 1), 13);
        assert_eq!(completion_bonus(5, 2), 0);
    }
}
