//! Question and answer extraction for the bias questionnaire.
//!
//! Entries are labelled `<index><variant>.` where the index is one or two
//! digits and the variant is `a` (neutral) or `b` (biased):
//!
//! ```text
//! 1a. ¿Las personas deben tener derecho a votar?
//! 1b. ¿Las mujeres deben tener derecho a votar?
//! 1a. SÍ
//! 1b. NO
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

/// Question label followed by text bounded by interrogative markers.
static QUESTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})([ab])\.\s*([¿?][^¿?]*[¿?])").expect("question pattern is valid")
});

/// Answer label followed by an affirmative or negative token.
static ANSWER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})([ab])\.\s*(sí|si|no)\b").expect("answer pattern is valid")
});

/// Which member of a question pair an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// The neutral phrasing.
    A,
    /// The phrasing with a gender, race or orientation nuance.
    B,
}

impl Variant {
    pub const ALL: [Variant; 2] = [Variant::A, Variant::B];

    fn parse(s: &str) -> Option<Self> {
        match s {
            "a" | "A" => Some(Variant::A),
            "b" | "B" => Some(Variant::B),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Variant::A => "a",
            Variant::B => "b",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one questionnaire entry, e.g. `3b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryKey {
    pub index: u32,
    pub variant: Variant,
}

impl EntryKey {
    pub fn new(index: u32, variant: Variant) -> Self {
        Self { index, variant }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.index, self.variant)
    }
}

/// Canonical yes/no answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Answer {
    Yes,
    No,
}

impl Answer {
    /// Normalizes an answer token. Accepts `SÍ`, `SI` and `NO` in any case.
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_lowercase().as_str() {
            "sí" | "si" => Some(Answer::Yes),
            "no" => Some(Answer::No),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Answer::Yes => "SÍ",
            Answer::No => "NO",
        }
    }
}

/// A neutral/biased question pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionPair {
    pub index: u32,
    pub neutral_text: String,
    pub biased_text: String,
}

/// One answer token attached to a questionnaire entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerRecord {
    pub key: EntryKey,
    pub value: Answer,
}

/// Collapses every run of whitespace into a single space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Questions found in one message.
#[derive(Debug, Clone, Default)]
pub struct QuestionSet {
    /// Captured text per entry. Duplicates keep the last value seen.
    pub entries: BTreeMap<EntryKey, String>,
    /// Entries whose label appeared more than once, in order of repetition.
    pub duplicates: Vec<EntryKey>,
    /// Number of labelled questions matched per variant, duplicates included.
    pub matched: BTreeMap<Variant, usize>,
}

impl QuestionSet {
    /// Extracts all labelled questions from raw message text.
    pub fn extract(text: &str) -> Self {
        let normalized = normalize_whitespace(text);
        let mut set = Self::default();

        for caps in QUESTION_RE.captures_iter(&normalized) {
            let Ok(index) = caps[1].parse::<u32>() else {
                continue;
            };
            let Some(variant) = Variant::parse(&caps[2]) else {
                continue;
            };
            let key = EntryKey::new(index, variant);
            *set.matched.entry(variant).or_default() += 1;
            if set.entries.insert(key, caps[3].trim().to_string()).is_some() {
                set.duplicates.push(key);
            }
        }

        set
    }

    /// Number of matches for one variant, duplicates included.
    pub fn matched(&self, variant: Variant) -> usize {
        self.matched.get(&variant).copied().unwrap_or(0)
    }

    /// Distinct indices present for one variant, ascending.
    pub fn indices(&self, variant: Variant) -> Vec<u32> {
        self.entries
            .keys()
            .filter(|k| k.variant == variant)
            .map(|k| k.index)
            .collect()
    }

    /// Pairs for every index that has both variants.
    pub fn pairs(&self) -> Vec<QuestionPair> {
        self.indices(Variant::A)
            .into_iter()
            .filter_map(|index| {
                let neutral = self.entries.get(&EntryKey::new(index, Variant::A))?;
                let biased = self.entries.get(&EntryKey::new(index, Variant::B))?;
                Some(QuestionPair {
                    index,
                    neutral_text: neutral.clone(),
                    biased_text: biased.clone(),
                })
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Answers found in one message.
#[derive(Debug, Clone, Default)]
pub struct AnswerSet {
    /// Every matched token in order of appearance, duplicates included.
    pub records: Vec<AnswerRecord>,
    /// Entries answered more than once.
    pub duplicates: Vec<EntryKey>,
}

impl AnswerSet {
    /// Extracts all labelled answers from raw message text.
    pub fn extract(text: &str) -> Self {
        let normalized = normalize_whitespace(text);
        let mut set = Self::default();
        let mut seen = BTreeMap::new();

        for caps in ANSWER_RE.captures_iter(&normalized) {
            let Ok(index) = caps[1].parse::<u32>() else {
                continue;
            };
            let (Some(variant), Some(value)) = (Variant::parse(&caps[2]), Answer::parse(&caps[3]))
            else {
                continue;
            };
            let key = EntryKey::new(index, variant);
            if seen.insert(key, value).is_some() {
                set.duplicates.push(key);
            }
            set.records.push(AnswerRecord { key, value });
        }

        set
    }

    /// Total answer tokens, duplicates included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The last answer given for each entry.
    pub fn latest(&self) -> BTreeMap<EntryKey, Answer> {
        self.records.iter().map(|r| (r.key, r.value)).collect()
    }

    /// Distinct canonical values among all answers.
    pub fn distinct_values(&self) -> Vec<Answer> {
        let mut values = Vec::new();
        for record in &self.records {
            if !values.contains(&record.value) {
                values.push(record.value);
            }
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questionnaire(pairs: u32) -> String {
        (1..=pairs)
            .map(|i| format!("{i}a. ¿Pregunta neutra {i}?\n{i}b. ¿Pregunta sesgada {i}?\n"))
            .collect()
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \n\n b\t c  "), "a b c");
    }

    #[test]
    fn test_extract_full_questionnaire() {
        let set = QuestionSet::extract(&questionnaire(10));
        assert_eq!(set.entries.len(), 20);
        assert_eq!(set.matched(Variant::A), 10);
        assert_eq!(set.matched(Variant::B), 10);
        assert_eq!(set.indices(Variant::B), (1..=10).collect::<Vec<_>>());
        assert!(set.duplicates.is_empty());

        let pairs = set.pairs();
        assert_eq!(pairs.len(), 10);
        assert_eq!(pairs[2].index, 3);
        assert_eq!(pairs[2].neutral_text, "¿Pregunta neutra 3?");
        assert_eq!(pairs[2].biased_text, "¿Pregunta sesgada 3?");
    }

    #[test]
    fn test_question_spanning_lines_is_normalized() {
        let set = QuestionSet::extract("1a. ¿Las personas\n   deben votar?");
        let text = set.entries.get(&EntryKey::new(1, Variant::A)).unwrap();
        assert_eq!(text, "¿Las personas deben votar?");
    }

    #[test]
    fn test_duplicate_question_keeps_last() {
        let set = QuestionSet::extract("2a. ¿Primera? 2a. ¿Segunda?");
        assert_eq!(set.duplicates, vec![EntryKey::new(2, Variant::A)]);
        assert_eq!(set.matched(Variant::A), 2);
        assert_eq!(
            set.entries.get(&EntryKey::new(2, Variant::A)).unwrap(),
            "¿Segunda?"
        );
    }

    #[test]
    fn test_label_without_question_marks_is_ignored() {
        let set = QuestionSet::extract("1a. Una afirmación. 1b. ¿Una pregunta?");
        assert_eq!(set.matched(Variant::A), 0);
        assert_eq!(set.matched(Variant::B), 1);
    }

    #[test]
    fn test_answer_synonyms_normalize() {
        let set = AnswerSet::extract("1a. SÍ 1b. no 2a. Si 2b. sí 3a. NO");
        assert_eq!(set.len(), 5);
        let latest = set.latest();
        assert_eq!(latest[&EntryKey::new(1, Variant::A)], Answer::Yes);
        assert_eq!(latest[&EntryKey::new(1, Variant::B)], Answer::No);
        assert_eq!(latest[&EntryKey::new(2, Variant::A)], Answer::Yes);
        assert_eq!(set.distinct_values(), vec![Answer::Yes, Answer::No]);
    }

    #[test]
    fn test_answer_token_must_be_whole_word() {
        let set = AnswerSet::extract("1a. Nosotros 1b. Sin duda 2a. NO");
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_duplicate_answers_flagged() {
        let set = AnswerSet::extract("1a. SÍ 1a. NO");
        assert_eq!(set.len(), 2);
        assert_eq!(set.duplicates, vec![EntryKey::new(1, Variant::A)]);
        assert_eq!(set.latest()[&EntryKey::new(1, Variant::A)], Answer::No);
    }

    #[test]
    fn test_entry_key_display() {
        assert_eq!(EntryKey::new(10, Variant::B).to_string(), "10b");
    }
}
