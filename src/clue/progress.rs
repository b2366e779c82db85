//! Progress bar lookup.
//!
//! A hand-maintained ordinal table, not a graph distance: branches reuse the
//! same slots, so the value is only cosmetic.

use super::definition::StepId;

/// `ordinal / total * 100`. Steps missing from the table count as the first.
pub fn percentage(table: &[StepId], step: &StepId) -> f64 {
    if table.is_empty() {
        return 0.0;
    }
    let ordinal = table.iter().position(|id| id == step).unwrap_or(0) + 1;
    ordinal as f64 / table.len() as f64 * 100.0
}

pub fn rounded(percentage: f64) -> u8 {
    percentage.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(ids: &[&str]) -> Vec<StepId> {
        ids.iter().map(|&id| id.into()).collect()
    }

    #[test]
    fn test_percentage_lookup() {
        let t = table(&["a", "b", "c", "d"]);
        assert_eq!(percentage(&t, &"a".into()), 25.0);
        assert_eq!(percentage(&t, &"d".into()), 100.0);
        assert_eq!(percentage(&t, &"missing".into()), 25.0);
        assert_eq!(percentage(&[], &"a".into()), 0.0);
    }

    #[test]
    fn test_rounded() {
        assert_eq!(rounded(1.0 / 14.0 * 100.0), 7);
        assert_eq!(rounded(13.0 / 14.0 * 100.0), 93);
        assert_eq!(rounded(100.0), 100);
    }
}
