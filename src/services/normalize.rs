//! Text canonicalization and similarity for fuzzy catalog matching.
//!
//! AI output and user input rarely match Spotify metadata byte-for-byte:
//! titles carry "(feat. ...)" tags, diacritics, and stray punctuation.
//! Everything here is a pure function over strings.

use regex::Regex;
use std::sync::OnceLock;

fn freeform_split_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s+by\s+|\s+-\s+|\s+\u{2013}\s+|\s+\u{2014}\s+|\s*\|\s*").unwrap())
}

fn artist_split_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i),|&|\bfeat\.?|\bft\.?|\bwith\b").unwrap())
}

fn annotation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]").unwrap())
}

fn featuring_tail_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:feat|ft|featuring)\.?\s+.*$").unwrap())
}

/// Fold common Latin diacritics to their ASCII base letter.
fn fold_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        _ => c,
    }
}

/// Lowercase, fold diacritics, strip punctuation, collapse whitespace.
pub fn normalize(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut last_space = true;
    for c in value.chars().flat_map(|c| c.to_lowercase()) {
        let c = fold_diacritic(c);
        if c.is_alphanumeric() {
            out.push(c);
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Drop parenthetical/bracketed annotations and trailing "feat."/"ft."
/// clauses from a title: `"Lonely (feat. Khalid)"` -> `"Lonely"`.
pub fn strip_annotations(title: &str) -> String {
    let stripped = annotation_re().replace_all(title, " ");
    let stripped = featuring_tail_re().replace(&stripped, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse freeform seed input like `"Lahore by Guru Randhawa"` or
/// `"Song - Artist"` into a title and an optional artist list.
pub fn parse_freeform(text: &str) -> (String, Option<Vec<String>>) {
    let mut parts = freeform_split_re().splitn(text, 2);
    let title = parts.next().unwrap_or(text).trim().to_string();
    let artists = parts.next().map(|tail| {
        artist_split_re()
            .split(tail)
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect::<Vec<_>>()
    });
    match artists {
        Some(list) if !list.is_empty() => (title, Some(list)),
        _ => (title, None),
    }
}

/// Jaccard similarity over normalized token sets, in [0, 1].
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    let set_a: std::collections::HashSet<&str> = a.split_whitespace().collect();
    let set_b: std::collections::HashSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

/// Combined string similarity: whichever of token-set overlap and
/// normalized edit distance sees the strings as closer.
pub fn similarity(a: &str, b: &str) -> f64 {
    let token = token_set_ratio(a, b);
    let edit = strsim::normalized_levenshtein(&normalize(a), &normalize(b));
    token.max(edit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_case_punctuation_and_diacritics() {
        assert_eq!(normalize("Blinding Lights!"), "blinding lights");
        assert_eq!(normalize("Beyoncé"), "beyonce");
        assert_eq!(normalize("  Don't   Stop, Me. Now "), "don t stop me now");
    }

    #[test]
    fn strip_annotations_removes_feature_tags() {
        assert_eq!(strip_annotations("Lonely (feat. Khalid)"), "Lonely");
        assert_eq!(strip_annotations("One More Time [Radio Edit]"), "One More Time");
        assert_eq!(strip_annotations("Good Days ft. SZA"), "Good Days");
        assert_eq!(strip_annotations("Plain Title"), "Plain Title");
    }

    #[test]
    fn parse_freeform_splits_title_and_artists() {
        let (title, artists) = parse_freeform("Lahore by Guru Randhawa");
        assert_eq!(title, "Lahore");
        assert_eq!(artists.unwrap(), vec!["Guru Randhawa"]);

        let (title, artists) = parse_freeform("Blinding Lights - The Weeknd");
        assert_eq!(title, "Blinding Lights");
        assert_eq!(artists.unwrap(), vec!["The Weeknd"]);

        let (title, artists) = parse_freeform("Levitating by Dua Lipa, DaBaby");
        assert_eq!(title, "Levitating");
        assert_eq!(artists.unwrap(), vec!["Dua Lipa", "DaBaby"]);

        let (title, artists) = parse_freeform("Bohemian Rhapsody");
        assert_eq!(title, "Bohemian Rhapsody");
        assert!(artists.is_none());
    }

    #[test]
    fn token_set_ratio_ignores_order_and_case() {
        assert_eq!(token_set_ratio("The Weeknd", "weeknd the"), 1.0);
        assert!(token_set_ratio("Blinding Lights", "Northern Lights") > 0.0);
        assert_eq!(token_set_ratio("abc", ""), 0.0);
    }

    #[test]
    fn similarity_catches_near_spellings() {
        // Token sets disagree entirely, edit distance still sees the typo
        assert!(similarity("Blinding Lihgts", "Blinding Lights") > 0.8);
        assert!(similarity("completely different", "nothing alike") < 0.5);
    }
}
