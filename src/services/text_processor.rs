// Text Processing Service
// Readability, lexical and sentence-length features feeding the heuristic signal

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Sentences with this many words or fewer are not counted.
const MIN_SENTENCE_WORDS: usize = 2;
/// Average sentence length (in words) treated as maximally suspicious.
const LONG_SENTENCE_WORDS: f64 = 25.0;

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z0-9\u{00C0}-\u{024F}']+").unwrap())
}

fn sentence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^.!?。！？]+[.!?。！？]*").unwrap())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextFeatures {
    /// Flesch reading ease; usually 0..100 but unbounded on odd input.
    pub readability: f64,
    pub sentence_count: usize,
    pub word_count: usize,
    pub avg_sentence_length: f64,
    pub lexical_diversity: f64,
}

/// Truncate to at most `max_chars` characters (never splits a code point).
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Words with punctuation stripped.
pub fn lexicon_count(text: &str) -> usize {
    word_re().find_iter(text).count()
}

/// Split into sentences on terminal punctuation, keeping the terminator.
pub fn split_sentences(text: &str) -> Vec<String> {
    sentence_re()
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Number of sentences longer than two words, at least 1.
pub fn sentence_count(text: &str) -> usize {
    let counted = split_sentences(text)
        .iter()
        .filter(|s| lexicon_count(s) > MIN_SENTENCE_WORDS)
        .count();
    counted.max(1)
}

/// Vowel-group syllable estimate for an English word.
pub fn count_syllables(word: &str) -> usize {
    let lower: Vec<char> = word
        .chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(|c| c.to_lowercase())
        .collect();
    if lower.is_empty() {
        return 0;
    }

    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
    let mut count = 0;
    let mut prev_vowel = false;
    for &c in &lower {
        let v = is_vowel(c);
        if v && !prev_vowel {
            count += 1;
        }
        prev_vowel = v;
    }

    // Silent trailing "e" ("make"), but not "-le" ("table").
    let n = lower.len();
    if n > 2 && lower[n - 1] == 'e' && lower[n - 2] != 'l' && !is_vowel(lower[n - 2]) && count > 1 {
        count -= 1;
    }

    count.max(1)
}

pub fn flesch_reading_ease(text: &str) -> f64 {
    let words: Vec<&str> = word_re().find_iter(text).map(|m| m.as_str()).collect();
    if words.is_empty() {
        return 0.0;
    }
    let syllables: usize = words.iter().map(|w| count_syllables(w)).sum();
    let words_per_sentence = words.len() as f64 / sentence_count(text) as f64;
    let syllables_per_word = syllables as f64 / words.len() as f64;
    206.835 - 1.015 * words_per_sentence - 84.6 * syllables_per_word
}

pub fn analyze_text_features(text: &str) -> TextFeatures {
    let word_count = lexicon_count(text);
    if word_count == 0 {
        return TextFeatures::default();
    }

    let sentence_count = sentence_count(text);
    let avg_sentence_length = word_count as f64 / sentence_count.max(1) as f64;
    // Raw whitespace tokens: case and attached punctuation make tokens distinct.
    let unique: HashSet<&str> = text.split_whitespace().collect();
    let lexical_diversity = unique.len() as f64 / word_count.max(1) as f64;

    TextFeatures {
        readability: flesch_reading_ease(text),
        sentence_count,
        word_count,
        avg_sentence_length,
        lexical_diversity,
    }
}

/// Unweighted mean of three weak proxies for synthetic text, clipped to [0, 1].
pub fn heuristic_score(features: &TextFeatures) -> f64 {
    let read_score = 1.0 - features.readability / 100.0;
    let diversity_penalty = 1.0 - features.lexical_diversity;
    let length_factor = (features.avg_sentence_length / LONG_SENTENCE_WORDS).min(1.0);
    ((read_score + diversity_penalty + length_factor) / 3.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_respects_code_points() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_sentence_count_ignores_fragments() {
        let text = "This is a full sentence. Ok. Here is another real one!";
        assert_eq!(split_sentences(text).len(), 3);
        assert_eq!(sentence_count(text), 2);
        assert_eq!(sentence_count("Hi."), 1);
    }

    #[test]
    fn test_count_syllables() {
        assert_eq!(count_syllables("cat"), 1);
        assert_eq!(count_syllables("make"), 1);
        assert_eq!(count_syllables("table"), 2);
        assert_eq!(count_syllables("reading"), 2);
        assert_eq!(count_syllables("the"), 1);
        assert_eq!(count_syllables("123"), 0);
    }

    #[test]
    fn test_simple_text_is_more_readable() {
        let simple = "The cat sat on the mat. The dog ran to the park.";
        let dense = "Institutional interoperability necessitates comprehensive organizational \
                     considerations regarding infrastructural modernization initiatives.";
        assert!(flesch_reading_ease(simple) > flesch_reading_ease(dense));
    }

    #[test]
    fn test_features_and_heuristic_bounds() {
        let text = "The cat sat on the mat. The cat sat on the mat. The cat sat on the mat.";
        let f = analyze_text_features(text);
        assert_eq!(f.word_count, 18);
        assert_eq!(f.sentence_count, 3);
        assert!((f.avg_sentence_length - 6.0).abs() < 1e-9);
        // Repetition drives diversity down.
        assert!(f.lexical_diversity < 0.5);

        let h = heuristic_score(&f);
        assert!((0.0..=1.0).contains(&h));
    }

    #[test]
    fn test_heuristic_formula() {
        let f = TextFeatures {
            readability: 40.0,
            sentence_count: 2,
            word_count: 50,
            avg_sentence_length: 25.0,
            lexical_diversity: 0.7,
        };
        // (0.6 + 0.3 + 1.0) / 3
        assert!((heuristic_score(&f) - 0.6333333333).abs() < 1e-6);
    }

    #[test]
    fn test_heuristic_clips_out_of_range_readability() {
        let f = TextFeatures {
            readability: -150.0,
            sentence_count: 1,
            word_count: 60,
            avg_sentence_length: 60.0,
            lexical_diversity: 0.0,
        };
        assert_eq!(heuristic_score(&f), 1.0);
    }

    #[test]
    fn test_empty_text_features() {
        assert_eq!(analyze_text_features("   "), TextFeatures::default());
    }
}
