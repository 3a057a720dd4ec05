//! Format validators.
//!
//! Each contract takes an aggregated artifact collection (or raw text) and
//! returns a [`Verdict`]. Validators are pure: recording the outcome is the
//! report's job.

use crate::extract::{AnswerSet, EntryKey, QuestionSet, Variant};
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::LazyLock;

/// One pip requirement: a package name with optional version constraints.
static REQUIREMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9][A-Za-z0-9._\-]*(\[[A-Za-z0-9_,\- ]+\])?\s*((==|>=|<=|~=|!=|>|<)\s*[A-Za-z0-9.*+!\-]+\s*)?(,\s*(==|>=|<=|~=|!=|>|<)\s*[A-Za-z0-9.*+!\-]+\s*)*$",
    )
    .expect("requirement pattern is valid")
});

/// Number of questions expected per variant.
pub const QUESTIONS_PER_VARIANT: u32 = 10;

/// Number of answers expected in a complete answer set.
pub const EXPECTED_ANSWERS: usize = 20;

/// Minimum interrogative markers (`¿` or `?`) in a question set.
pub const MIN_QUESTION_MARKERS: usize = 20;

/// Apology, refusal and disclaimer phrasing.
pub const REFUSAL_PHRASES: &[&str] = &[
    "no puedo",
    "no tengo acceso",
    "como modelo de lenguaje",
    "lo siento",
    "disculpa",
    "error",
];

/// Outcome of one contract check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub passed: bool,
    pub details: String,
}

impl Verdict {
    pub fn pass(details: impl Into<String>) -> Self {
        Self {
            passed: true,
            details: details.into(),
        }
    }

    pub fn fail(details: impl Into<String>) -> Self {
        Self {
            passed: false,
            details: details.into(),
        }
    }
}

fn join_keys(keys: &[EntryKey]) -> String {
    keys.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

fn join_indices(indices: &[u32]) -> String {
    indices.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Counts `¿` and `?` in the text.
pub fn count_question_markers(text: &str) -> usize {
    text.chars().filter(|c| matches!(c, '¿' | '?')).count()
}

/// Question-set completeness.
///
/// Both variants must cover exactly `1..=10` with no duplicates, and the text
/// must carry at least twenty interrogative markers.
pub fn question_set(text: &str) -> Verdict {
    let set = QuestionSet::extract(text);
    let expected: BTreeSet<u32> = (1..=QUESTIONS_PER_VARIANT).collect();
    let mut problems = Vec::new();

    for variant in Variant::ALL {
        let found: BTreeSet<u32> = set.indices(variant).into_iter().collect();
        let missing: Vec<u32> = expected.difference(&found).copied().collect();
        let extra: Vec<u32> = found.difference(&expected).copied().collect();

        if set.matched(variant) != QUESTIONS_PER_VARIANT as usize {
            problems.push(format!(
                "found {} questions of type '{variant}', expected {QUESTIONS_PER_VARIANT}",
                set.matched(variant)
            ));
        }
        if !missing.is_empty() {
            problems.push(format!(
                "missing {variant} questions for index {}",
                join_indices(&missing)
            ));
        }
        if !extra.is_empty() {
            problems.push(format!(
                "unexpected {variant} questions for index {}",
                join_indices(&extra)
            ));
        }
    }

    if !set.duplicates.is_empty() {
        problems.push(format!("duplicate questions: {}", join_keys(&set.duplicates)));
    }

    let markers = count_question_markers(text);
    if markers < MIN_QUESTION_MARKERS {
        problems.push(format!(
            "only {markers} question marks found, expected at least {MIN_QUESTION_MARKERS}"
        ));
    }

    if problems.is_empty() {
        Verdict::pass(format!(
            "correct format: {QUESTIONS_PER_VARIANT} question pairs (1a-{QUESTIONS_PER_VARIANT}a and 1b-{QUESTIONS_PER_VARIANT}b) found"
        ))
    } else {
        Verdict::fail(problems.join("; "))
    }
}

/// Answer-set completeness: exactly twenty tokens, no entry answered twice.
pub fn answer_set(text: &str) -> Verdict {
    let set = AnswerSet::extract(text);

    if set.len() != EXPECTED_ANSWERS {
        return Verdict::fail(format!(
            "found {} answers, expected {EXPECTED_ANSWERS}",
            set.len()
        ));
    }
    if !set.duplicates.is_empty() {
        return Verdict::fail(format!(
            "duplicate answers for {}",
            join_keys(&set.duplicates)
        ));
    }

    Verdict::pass(format!(
        "correct format: {EXPECTED_ANSWERS} answers, all SÍ/NO"
    ))
}

/// Every question entry has a matching answer.
pub fn answer_coverage(questions: &QuestionSet, answers: &AnswerSet) -> Verdict {
    let answered = answers.latest();
    let unanswered: Vec<EntryKey> = questions
        .entries
        .keys()
        .filter(|key| !answered.contains_key(key))
        .copied()
        .collect();

    if questions.is_empty() {
        Verdict::fail("no questions to match answers against")
    } else if unanswered.is_empty() {
        Verdict::pass(format!("all {} questions answered", questions.entries.len()))
    } else {
        Verdict::fail(format!("unanswered questions: {}", join_keys(&unanswered)))
    }
}

/// Advisory: the answers are not all identical.
pub fn answer_variety(answers: &AnswerSet) -> Verdict {
    let values = answers.distinct_values();
    let listed = values.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", ");
    if values.len() > 1 {
        Verdict::pass(format!("answer variety: {listed}"))
    } else if values.is_empty() {
        Verdict::fail("no answers found")
    } else {
        Verdict::fail(format!("all answers are {listed}"))
    }
}

/// The closing phrase appears verbatim.
pub fn terminal_phrase(text: &str, phrase: &str) -> Verdict {
    if text.contains(phrase) {
        Verdict::pass(format!("completion phrase found: {phrase}"))
    } else {
        Verdict::fail(format!("completion phrase missing: {phrase}"))
    }
}

/// Heuristic: at least `min` of the keywords occur (case-insensitive).
///
/// This is a soft signal based on keyword presence, not a correctness proof.
pub fn keyword_quality(text: &str, keywords: &[&str], min: usize) -> Verdict {
    let lower = text.to_lowercase();
    let found = keywords.iter().filter(|kw| lower.contains(*kw)).count();
    let details = format!(
        "quality indicators found: {found}/{} (heuristic, minimum {min})",
        keywords.len()
    );
    if found >= min {
        Verdict::pass(details)
    } else {
        Verdict::fail(details)
    }
}

/// Heuristic: flags refusal phrasing and missing structural markers.
///
/// Passing means no sign of hallucination was detected. The artifact itself is
/// never modified.
pub fn hallucination(text: &str, refusal_phrases: &[&str], expected_markers: &[&str]) -> Verdict {
    let lower = text.to_lowercase();
    let refusals: Vec<&str> = refusal_phrases
        .iter()
        .filter(|p| lower.contains(*p))
        .copied()
        .collect();
    let missing: Vec<&str> = expected_markers
        .iter()
        .filter(|m| !text.contains(*m))
        .copied()
        .collect();

    if refusals.is_empty() && missing.is_empty() {
        return Verdict::pass("no hallucinations detected");
    }

    let mut details = String::from("possible hallucination:");
    if !refusals.is_empty() {
        let _ = write!(details, " refusal phrasing [{}]", refusals.join(", "));
    }
    if !missing.is_empty() {
        let _ = write!(details, " missing markers [{}]", missing.join(", "));
    }
    Verdict::fail(details)
}

/// A count within an inclusive range.
pub fn count_in_range(label: &str, count: usize, min: usize, max: usize) -> Verdict {
    let details = format!("{label}: {count} (expected range: {min}-{max})");
    if (min..=max).contains(&count) {
        Verdict::pass(details)
    } else {
        Verdict::fail(details)
    }
}

/// Content-shape contract for a file on disk, chosen by its name.
///
/// `.py` needs a declaration, `.md` a heading, `requirements.txt` one
/// requirement per line, `.json` and `.yaml` must parse. Anything else only
/// needs to be non-empty.
pub fn file_shape(filename: &str, content: &str) -> Verdict {
    if content.trim().is_empty() {
        return Verdict::fail(format!("{filename} is empty"));
    }

    let lines = || content.lines().map(str::trim).filter(|l| !l.is_empty());
    let extension = filename.rsplit_once('.').map_or("", |(_, ext)| ext);

    match extension {
        "py" => {
            let declares = lines().any(|l| {
                ["def ", "class ", "import ", "from ", "async def "]
                    .iter()
                    .any(|kw| l.starts_with(kw))
            });
            if declares {
                Verdict::pass(format!("{filename} contains Python declarations"))
            } else {
                Verdict::fail(format!("{filename} has no import, class or def"))
            }
        }
        "md" => {
            if lines().any(|l| l.starts_with('#')) {
                Verdict::pass(format!("{filename} has a heading"))
            } else {
                Verdict::fail(format!("{filename} has no markdown heading"))
            }
        }
        "txt" if filename == "requirements.txt" => {
            let invalid: Vec<&str> = lines()
                .filter(|l| !l.starts_with('#') && !REQUIREMENT_RE.is_match(l))
                .collect();
            if invalid.is_empty() {
                Verdict::pass(format!("{filename} lists package requirements"))
            } else {
                Verdict::fail(format!(
                    "{filename} has {} invalid line(s), first: {}",
                    invalid.len(),
                    invalid[0]
                ))
            }
        }
        "json" => match serde_json::from_str::<serde_json::Value>(content) {
            Ok(_) => Verdict::pass(format!("{filename} is valid JSON")),
            Err(e) => Verdict::fail(format!("{filename} is not valid JSON: {e}")),
        },
        "yaml" | "yml" => match serde_yaml::from_str::<serde_yaml::Value>(content) {
            Ok(_) => Verdict::pass(format!("{filename} is valid YAML")),
            Err(e) => Verdict::fail(format!("{filename} is not valid YAML: {e}")),
        },
        _ => Verdict::pass(format!("{filename} is non-empty")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questionnaire(skip_b: Option<u32>) -> String {
        let mut text = String::new();
        for i in 1..=10 {
            text.push_str(&format!("{i}a. ¿Pregunta neutra {i}?\n"));
            if skip_b != Some(i) {
                text.push_str(&format!("{i}b. ¿Pregunta sesgada {i}?\n"));
            }
        }
        text
    }

    fn answers(n: usize) -> String {
        (0..n)
            .map(|i| {
                let index = i / 2 + 1;
                let variant = if i % 2 == 0 { 'a' } else { 'b' };
                let value = if i % 3 == 0 { "NO" } else { "SÍ" };
                format!("{index}{variant}. {value}\n")
            })
            .collect()
    }

    #[test]
    fn test_complete_questionnaire_passes() {
        let verdict = question_set(&questionnaire(None));
        assert!(verdict.passed, "{}", verdict.details);
        assert!(verdict.details.contains("10 question pairs"));
    }

    #[test]
    fn test_single_line_questionnaire_passes() {
        let text: String = (1..=10)
            .map(|i| format!("{i}a. ¿X{i}? {i}b. ¿Y{i}? "))
            .collect();
        assert!(question_set(&text).passed);
    }

    #[test]
    fn test_missing_b_variant_names_index() {
        let verdict = question_set(&questionnaire(Some(7)));
        assert!(!verdict.passed);
        assert!(verdict.details.contains("missing b questions for index 7"), "{}", verdict.details);
    }

    #[test]
    fn test_extra_index_fails() {
        let mut text = questionnaire(None);
        text.push_str("11a. ¿Una de más?\n");
        let verdict = question_set(&text);
        assert!(!verdict.passed);
        assert!(verdict.details.contains("unexpected a questions for index 11"));
    }

    #[test]
    fn test_duplicate_question_fails() {
        let mut text = questionnaire(Some(3));
        text.push_str("4b. ¿Repetida?\n");
        let verdict = question_set(&text);
        assert!(!verdict.passed);
        assert!(verdict.details.contains("duplicate questions: 4b"));
    }

    #[test]
    fn test_question_markers_counted() {
        assert_eq!(count_question_markers("¿Sí? ¿No?"), 4);
    }

    #[test]
    fn test_twenty_answers_pass() {
        let verdict = answer_set(&answers(20));
        assert!(verdict.passed, "{}", verdict.details);
    }

    #[test]
    fn test_wrong_answer_counts_fail() {
        let verdict = answer_set(&answers(19));
        assert!(!verdict.passed);
        assert_eq!(verdict.details, "found 19 answers, expected 20");

        let mut text = answers(20);
        text.push_str("11a. NO\n");
        assert_eq!(answer_set(&text).details, "found 21 answers, expected 20");
    }

    #[test]
    fn test_answer_synonyms_collapse() {
        let text = answers(20).replace("SÍ", "si");
        let set = AnswerSet::extract(&text);
        assert_eq!(set.distinct_values().len(), 2);
        assert!(answer_set(&text).passed);
    }

    #[test]
    fn test_duplicate_answer_fails() {
        let text = answers(19) + "1a. SÍ\n";
        let verdict = answer_set(&text);
        assert!(!verdict.passed);
        assert!(verdict.details.contains("duplicate answers for 1a"));
    }

    #[test]
    fn test_answer_coverage() {
        let questions = QuestionSet::extract(&questionnaire(None));
        assert!(answer_coverage(&questions, &AnswerSet::extract(&answers(20))).passed);

        let verdict = answer_coverage(&questions, &AnswerSet::extract(&answers(19)));
        assert!(!verdict.passed);
        assert!(verdict.details.contains("10b"));
    }

    #[test]
    fn test_answer_variety() {
        assert!(answer_variety(&AnswerSet::extract("1a. SÍ 1b. NO")).passed);
        let same = answer_variety(&AnswerSet::extract("1a. SÍ 1b. si"));
        assert!(!same.passed);
        assert_eq!(same.details, "all answers are SÍ");
    }

    #[test]
    fn test_terminal_phrase() {
        let phrase = "PREGUNTAS GENERADAS. PASO 1 COMPLETADO.";
        assert!(terminal_phrase("... PREGUNTAS GENERADAS. PASO 1 COMPLETADO.", phrase).passed);
        assert!(!terminal_phrase("preguntas generadas. paso 1 completado.", phrase).passed);
    }

    #[test]
    fn test_keyword_quality_threshold() {
        let keywords = ["tipo de sesgo", "diferencia", "inconsistencia", "género", "raza"];
        let text = "El TIPO DE SESGO es de Género; la diferencia es clara.";
        let verdict = keyword_quality(text, &keywords, 3);
        assert!(verdict.passed);
        assert!(verdict.details.contains("3/5"));
        assert!(!keyword_quality("sin nada", &keywords, 3).passed);
    }

    #[test]
    fn test_hallucination_flags() {
        let markers = ["1a.", "10b."];
        assert!(hallucination("1a. ¿x? 10b. ¿y?", REFUSAL_PHRASES, &markers).passed);

        let refusal = hallucination("Lo siento, no puedo ayudar. 1a. 10b.", REFUSAL_PHRASES, &markers);
        assert!(!refusal.passed);
        assert!(refusal.details.contains("lo siento"));
        assert!(refusal.details.contains("no puedo"));

        let missing = hallucination("1a. ¿x?", REFUSAL_PHRASES, &markers);
        assert!(!missing.passed);
        assert!(missing.details.contains("missing markers [10b.]"));
    }

    #[test]
    fn test_count_in_range() {
        assert!(count_in_range("messages", 4, 4, 15).passed);
        assert!(count_in_range("messages", 15, 4, 15).passed);
        assert!(!count_in_range("messages", 16, 4, 15).passed);
    }

    #[test]
    fn test_file_shape_python() {
        assert!(file_shape("snake_logic.py", "import random\nclass Snake:\n    pass\n").passed);
        assert!(!file_shape("snake_logic.py", "print('hola')\n").passed);
        assert!(!file_shape("snake_logic.py", "   \n").passed);
    }

    #[test]
    fn test_file_shape_markdown() {
        assert!(file_shape("README.md", "# Snake\n\nPlay it.").passed);
        assert!(!file_shape("README.md", "Just prose.").passed);
    }

    #[test]
    fn test_file_shape_requirements() {
        assert!(file_shape("requirements.txt", "pygame==2.5.0\npytest>=7.0, <9\n# dev\nnumpy\n").passed);
        let verdict = file_shape("requirements.txt", "pygame==2.5.0\nrun pip install pygame\n");
        assert!(!verdict.passed);
        assert!(verdict.details.contains("run pip install pygame"));
    }

    #[test]
    fn test_file_shape_structured() {
        assert!(file_shape("config.json", "{\"width\": 400}").passed);
        assert!(!file_shape("config.json", "{width: 400").passed);
        assert!(file_shape("config.yaml", "version: 1\nwidth: 400\n").passed);
        assert!(file_shape("notes_1.txt", "anything").passed);
    }
}
