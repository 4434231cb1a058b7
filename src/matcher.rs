//! Lexical term matcher: exact, substring, and edit-distance fuzzy matching.
//!
//! Pure functions, no side effects. The gatekeeper uses this to catch
//! misspelled trigger terms ("exms" → "exam") without pulling in an NLP
//! stack; inputs are short (< 100 chars) so the quadratic DP is fine.

/// Default edit-distance budget for fuzzy matching.
pub const DEFAULT_MAX_DISTANCE: usize = 2;

/// Minimum length (in chars) before fuzzy matching applies. Shorter words
/// never fuzzy-match, which avoids false positives on "ok"/"no"-class tokens.
const FUZZY_MIN_LEN: usize = 4;

/// Minimum length (in chars) before substring containment applies. One- and
/// two-char tokens ("a", "no", "in") sit inside half the dictionary and
/// carry no signal; only exact equality may match them.
const CONTAIN_MIN_LEN: usize = 3;

/// Decide whether `word` matches `term`.
///
/// Order of checks:
/// 1. exact equality
/// 2. if both are at least 3 chars, substring containment in either direction
/// 3. if both are at least 4 chars, Levenshtein distance within
///    `min(max_distance, floor(0.3 × term length))`
pub fn matches_term(word: &str, term: &str, max_distance: usize) -> bool {
    if word == term {
        return true;
    }

    let word_len = word.chars().count();
    let term_len = term.chars().count();

    if word_len >= CONTAIN_MIN_LEN
        && term_len >= CONTAIN_MIN_LEN
        && (word.contains(term) || term.contains(word))
    {
        return true;
    }

    if word_len < FUZZY_MIN_LEN || term_len < FUZZY_MIN_LEN {
        return false;
    }

    let budget = max_distance.min((0.3 * term_len as f64).floor() as usize);
    levenshtein(word, term) <= budget
}

/// Classic dynamic-programming Levenshtein distance.
///
/// Insert, delete, and substitute each cost 1. Single-row formulation,
/// O(len(a) × len(b)) time and O(len(b)) space.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, &ca) in a.iter().enumerate() {
        let mut prev_diag = row[0];
        row[0] = i + 1;

        for (j, &cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            let next = (prev_diag + cost).min(row[j] + 1).min(row[j + 1] + 1);
            prev_diag = row[j + 1];
            row[j + 1] = next;
        }
    }

    row[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(matches_term("exam", "exam", DEFAULT_MAX_DISTANCE));
    }

    #[test]
    fn test_substring_both_directions() {
        assert!(matches_term("examination", "exam", DEFAULT_MAX_DISTANCE));
        assert!(matches_term("exam", "examination", DEFAULT_MAX_DISTANCE));
    }

    #[test]
    fn test_fuzzy_catches_misspelling() {
        // distance("exms", "exam") = 2, budget = min(2, floor(0.3*4)) = 1 — too far
        assert!(!matches_term("exms", "exam", DEFAULT_MAX_DISTANCE));
        // distance("exan", "exam") = 1, within budget
        assert!(matches_term("exan", "exam", DEFAULT_MAX_DISTANCE));
        // distance("postpond", "postponed") = 1, budget = min(2, 2) = 2
        assert!(matches_term("postpond", "postponed", DEFAULT_MAX_DISTANCE));
        assert!(matches_term("cancelld", "cancelled", DEFAULT_MAX_DISTANCE));
    }

    #[test]
    fn test_short_words_never_fuzzy_match() {
        // "ok" vs "of" is distance 1 but both are under the length floor
        assert!(!matches_term("ok", "of", DEFAULT_MAX_DISTANCE));
    }

    #[test]
    fn test_containment_requires_three_chars() {
        assert!(!matches_term("a", "exam", DEFAULT_MAX_DISTANCE));
        assert!(!matches_term("no", "notice", DEFAULT_MAX_DISTANCE));
        assert!(!matches_term("in", "warning", DEFAULT_MAX_DISTANCE));
        assert!(!matches_term("is", "admission", DEFAULT_MAX_DISTANCE));
        // exact equality is exempt from the floor
        assert!(matches_term("no", "no", DEFAULT_MAX_DISTANCE));
        // three chars is enough
        assert!(matches_term("fee", "fees", DEFAULT_MAX_DISTANCE));
    }

    #[test]
    fn test_budget_scales_with_term_length() {
        // term length 5 → budget min(2, 1) = 1
        assert!(matches_term("resul", "result", DEFAULT_MAX_DISTANCE));
        // "rsult" is distance 1 from "result" (one deletion)
        assert!(matches_term("rsult", "result", DEFAULT_MAX_DISTANCE));
        // well over budget 1 for a 5-char term
        assert!(!matches_term("rselt", "rules", DEFAULT_MAX_DISTANCE));
    }

    #[test]
    fn test_unrelated_words_do_not_match() {
        assert!(!matches_term("holiday", "syllabus", DEFAULT_MAX_DISTANCE));
        assert!(!matches_term("lunch", "circular", DEFAULT_MAX_DISTANCE));
    }

    #[test]
    fn test_levenshtein_basics() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("flaw", "lawn"), 2);
        assert_eq!(levenshtein("exam", "exam"), 0);
    }

    #[test]
    fn test_levenshtein_unicode() {
        assert_eq!(levenshtein("café", "cafe"), 1);
    }

    #[test]
    fn test_zero_budget_disables_fuzzy() {
        assert!(!matches_term("exan", "exam", 0));
        assert!(matches_term("exam", "exam", 0));
    }
}
