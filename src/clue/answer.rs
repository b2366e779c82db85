use std::sync::LazyLock;

use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;

use super::definition::ChoiceOption;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Case-fold and trim, collapsing inner whitespace runs to one space.
pub fn normalize(raw: &str) -> String {
    WHITESPACE.replace_all(raw.trim(), " ").to_lowercase()
}

pub fn is_blank(raw: &str) -> bool {
    raw.trim().is_empty()
}

/// Lenient match: the answer only has to contain one of the keywords.
pub fn accepts(keywords: &[String], raw: &str) -> bool {
    let answer = normalize(raw);
    keywords
        .iter()
        .map(|k| normalize(k))
        .any(|k| !k.is_empty() && answer.contains(&k))
}

/// Options in a fresh uniformly random order.
pub fn shuffled<R: Rng + ?Sized>(options: &[ChoiceOption], rng: &mut R) -> Vec<ChoiceOption> {
    let mut options = options.to_vec();
    options.shuffle(rng);
    options
}

/// Correctness of `option_id`, or `None` if no such option exists.
pub fn is_correct(options: &[ChoiceOption], option_id: &str) -> Option<bool> {
    options
        .iter()
        .find(|o| o.id == option_id)
        .map(|o| o.correct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn keywords(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  WISDOM  "), "wisdom");
        assert_eq!(normalize("\tIt  teaches\nWisdom "), "it teaches wisdom");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_accepts_case_and_whitespace_insensitive() {
        let words = keywords(&["wisdom"]);
        assert!(accepts(&words, "  WISDOM  "));
        assert!(accepts(&words, "wisdom"));
    }

    #[test]
    fn test_accepts_superstrings() {
        let words = keywords(&["balance", "harmony", "patience"]);
        assert!(accepts(&words, "it teaches us balance"));
        assert!(accepts(&words, "Harmony!"));
        assert!(accepts(&words, "impatience"));
        assert!(!accepts(&words, "love"));
        assert!(!accepts(&words, ""));
    }

    #[test]
    fn test_blank_keyword_never_matches() {
        assert!(!accepts(&keywords(&["", "  "]), "anything"));
    }

    #[test]
    fn test_shuffle_keeps_correct_flag_with_id() {
        let options = vec![
            ChoiceOption::new("a", "War hooy", false),
            ChoiceOption::new("b", "Maxaad Rabtaa?", false),
            ChoiceOption::new("c", "Kor Wayeel", true),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let mut positions = [0usize; 3];
        for _ in 0..300 {
            let order = shuffled(&options, &mut rng);
            assert_eq!(order.len(), 3);
            assert_eq!(is_correct(&order, "c"), Some(true));
            assert_eq!(is_correct(&order, "a"), Some(false));
            let pos = order.iter().position(|o| o.correct).unwrap();
            positions[pos] += 1;
        }
        // Correct answer lands in every slot, roughly a third of the time.
        assert!(positions.iter().all(|&n| n > 60), "{positions:?}");
        assert_eq!(is_correct(&options, "z"), None);
    }
}
