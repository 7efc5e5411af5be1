//! Classic readability formulas over a prepared text

use super::PreparedText;
use serde::{Deserialize, Serialize};

/// Reading ease assumed when the text has no words to measure
const DEFAULT_READING_EASE: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Readability {
    pub flesch_reading_ease: f64,
    pub flesch_kincaid_grade: f64,
    pub gunning_fog: f64,
    pub automated_readability_index: f64,
    pub coleman_liau_index: f64,
}

impl Readability {
    /// Flesch reading ease mapped into [0, 1]
    pub fn ease_factor(&self) -> f64 {
        self.flesch_reading_ease.clamp(0.0, 100.0) / 100.0
    }
}

pub fn measure(text: &PreparedText) -> Readability {
    let words = text.words();
    if words.is_empty() {
        return Readability {
            flesch_reading_ease: DEFAULT_READING_EASE,
            flesch_kincaid_grade: 0.0,
            gunning_fog: 0.0,
            automated_readability_index: 0.0,
            coleman_liau_index: 0.0,
        };
    }

    let word_count = words.len() as f64;
    let sentence_count = text.sentences().len().max(1) as f64;
    let syllables: Vec<usize> = words.iter().map(|w| count_syllables(w)).collect();
    let syllable_count = syllables.iter().sum::<usize>() as f64;
    let complex_words = syllables.iter().filter(|&&s| s >= 3).count() as f64;
    let letters = words
        .iter()
        .flat_map(|w| w.chars())
        .filter(|c| c.is_alphanumeric())
        .count() as f64;

    let words_per_sentence = word_count / sentence_count;
    let syllables_per_word = syllable_count / word_count;
    let letters_per_word = letters / word_count;

    let round = crate::round2;
    Readability {
        flesch_reading_ease: round(206.835 - 1.015 * words_per_sentence - 84.6 * syllables_per_word),
        flesch_kincaid_grade: round(0.39 * words_per_sentence + 11.8 * syllables_per_word - 15.59),
        gunning_fog: round(0.4 * (words_per_sentence + 100.0 * complex_words / word_count)),
        automated_readability_index: round(4.71 * letters_per_word + 0.5 * words_per_sentence - 21.43),
        coleman_liau_index: round(
            0.0588 * (letters_per_word * 100.0) - 0.296 * (sentence_count / word_count * 100.0) - 15.8,
        ),
    }
}

/// Heuristic English syllable count: vowel groups, minus a silent trailing `e`, at least one.
pub fn count_syllables(word: &str) -> usize {
    let word: String = word
        .chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(|c| c.to_lowercase())
        .collect();
    if word.is_empty() {
        return 0;
    }
    if word.len() <= 3 {
        return 1;
    }

    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
    let mut count = 0;
    let mut previous_vowel = false;
    for c in word.chars() {
        let vowel = is_vowel(c);
        if vowel && !previous_vowel {
            count += 1;
        }
        previous_vowel = vowel;
    }

    if word.ends_with('e') && !word.ends_with("le") && count > 1 {
        count -= 1;
    }
    count.max(1)
}
