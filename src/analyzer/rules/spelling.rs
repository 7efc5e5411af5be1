//! Commonly misspelled words

use super::{match_case, GrammarRule};
use crate::text::PreparedText;
use crate::{Finding, FindingKind, Severity};
use regex::Regex;
use std::collections::HashMap;

const MISSPELLINGS: &[(&str, &str)] = &[
    ("accomodate", "accommodate"),
    ("acheive", "achieve"),
    ("acknowlege", "acknowledge"),
    ("adress", "address"),
    ("alot", "a lot"),
    ("arguement", "argument"),
    ("basicly", "basically"),
    ("becuase", "because"),
    ("begining", "beginning"),
    ("beleive", "believe"),
    ("calender", "calendar"),
    ("commitee", "committee"),
    ("completly", "completely"),
    ("concious", "conscious"),
    ("definately", "definitely"),
    ("dissapoint", "disappoint"),
    ("embarass", "embarrass"),
    ("enviroment", "environment"),
    ("existance", "existence"),
    ("finaly", "finally"),
    ("foriegn", "foreign"),
    ("freind", "friend"),
    ("goverment", "government"),
    ("grammer", "grammar"),
    ("happend", "happened"),
    ("independant", "independent"),
    ("knowlege", "knowledge"),
    ("neccessary", "necessary"),
    ("noticable", "noticeable"),
    ("occassion", "occasion"),
    ("occured", "occurred"),
    ("occurence", "occurrence"),
    ("persue", "pursue"),
    ("posession", "possession"),
    ("publically", "publicly"),
    ("realy", "really"),
    ("reccomend", "recommend"),
    ("recieve", "receive"),
    ("refered", "referred"),
    ("relevent", "relevant"),
    ("seperate", "separate"),
    ("succesful", "successful"),
    ("suprise", "surprise"),
    ("teh", "the"),
    ("thier", "their"),
    ("tommorow", "tomorrow"),
    ("truely", "truly"),
    ("untill", "until"),
    ("wich", "which"),
    ("wierd", "weird"),
    ("writting", "writing"),
];

/// Flags words found in a dictionary of frequent misspellings
pub struct SpellingRule {
    word: Regex,
    dictionary: HashMap<&'static str, &'static str>,
}

impl SpellingRule {
    pub fn new() -> Self {
        Self {
            word: Regex::new(r"\b[A-Za-z]+\b").unwrap(),
            dictionary: MISSPELLINGS.iter().copied().collect(),
        }
    }
}

impl Default for SpellingRule {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarRule for SpellingRule {
    fn id(&self) -> &'static str {
        "spelling"
    }

    fn check(&self, text: &PreparedText) -> Vec<Finding> {
        self.word
            .find_iter(text.as_str())
            .filter_map(|m| {
                let lowered = m.as_str().to_lowercase();
                let correct = self.dictionary.get(lowered.as_str())?;
                Some(
                    Finding::local(
                        FindingKind::Spelling,
                        Severity::High,
                        text.span_of(m.start(), m.end()),
                        format!("Possible spelling mistake: '{}'", m.as_str()),
                    )
                    .with_suggestion(match_case(m.as_str(), correct)),
                )
            })
            .collect()
    }
}
