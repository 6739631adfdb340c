//! Deterministic keyword grading.
//!
//! An offline alternative to the grading engine. The answer key, the marks
//! key, the keyword key and the student's text are all read one line per
//! question:
//!
//! - a question's marks default to 1 when its marks line is missing or not
//!   a number;
//! - its keywords are the comma-separated entries of its keyword line, or the
//!   words of its answer line when there is none;
//! - a keyword counts as matched when its best fuzzy alignment against the
//!   student's line scores at least [`KEYWORD_THRESHOLD`] out of 100.
//!
//! A question earns `matched / keywords × marks`. The overall similarity of
//! the student's line to the answer line is reported alongside but does not
//! affect the score.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Minimum fuzzy score (0–100) for a keyword to count as present.
pub const KEYWORD_THRESHOLD: f64 = 60.0;

/// Fuzzy score of one keyword against the student's line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordMatch {
    pub keyword: String,
    pub score: f64,
}

/// Marks awarded for one answer-key line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    /// 1-indexed.
    pub question_index: usize,
    pub correct_answer: String,
    pub student_answer: String,
    pub keywords: Vec<String>,
    pub keyword_matches: Vec<KeywordMatch>,
    pub matched_keyword_count: usize,
    /// At least 1, so an empty keyword line scores zero instead of dividing by zero.
    pub total_keywords: usize,
    #[serde(rename = "marksAwarded")]
    pub marks_awarded: f64,
    #[serde(rename = "totalMarks")]
    pub total_marks: f64,
    /// Token-sorted similarity of the student's line to the answer line (0–100).
    pub overall_similarity: f64,
}

/// Per-question results and the totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordReport {
    #[serde(rename = "questionResults")]
    pub question_results: Vec<QuestionResult>,
    #[serde(rename = "totalScore")]
    pub total_score: f64,
    #[serde(rename = "maxScore")]
    pub max_score: f64,
}

impl KeywordReport {
    /// Plain-text breakdown for the evaluation slot.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for q in &self.question_results {
            let _ = writeln!(
                out,
                "Q{}: {}/{} marks ({}/{} keywords, similarity {}%)",
                q.question_index,
                q.marks_awarded,
                q.total_marks,
                q.matched_keyword_count,
                q.total_keywords,
                q.overall_similarity
            );
        }
        let _ = write!(out, "Total Score: {}/{}", self.total_score, self.max_score);
        out
    }
}

/// Grade `student_text` question by question.
///
/// `marks_key` and `keywords_key` may be empty; every question then carries
/// one mark and is scored on the words of its answer line.
pub fn grade_by_keywords(
    answer_key: &str,
    student_text: &str,
    marks_key: &str,
    keywords_key: &str,
) -> KeywordReport {
    let answers = non_empty_lines(answer_key);
    let students = non_empty_lines(student_text);
    let marks_lines = non_empty_lines(marks_key);
    let keyword_lines = non_empty_lines(keywords_key);

    let mut question_results = Vec::with_capacity(answers.len());
    let mut obtained = 0.0;
    let mut max_score = 0.0;

    for (i, &correct) in answers.iter().enumerate() {
        let marks = marks_lines
            .get(i)
            .and_then(|m| m.parse::<f64>().ok())
            .filter(|m| m.is_finite())
            .unwrap_or(1.0);
        let keywords: Vec<String> = match keyword_lines.get(i) {
            Some(line) => line
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect(),
            None => correct.split_whitespace().map(str::to_string).collect(),
        };
        let student = students.get(i).copied().unwrap_or_default();

        let keyword_matches: Vec<KeywordMatch> = keywords
            .iter()
            .map(|k| KeywordMatch {
                keyword: k.clone(),
                score: partial_ratio(k, student),
            })
            .collect();
        let matched = keyword_matches
            .iter()
            .filter(|m| m.score >= KEYWORD_THRESHOLD)
            .count();
        let total_keywords = keywords.len().max(1);
        let awarded = matched as f64 / total_keywords as f64 * marks;

        question_results.push(QuestionResult {
            question_index: i + 1,
            correct_answer: correct.to_string(),
            student_answer: student.to_string(),
            keywords,
            keyword_matches,
            matched_keyword_count: matched,
            total_keywords,
            marks_awarded: round_to(awarded, 2),
            total_marks: marks,
            overall_similarity: round_to(token_sort_ratio(correct, student), 1),
        });
        obtained += awarded;
        max_score += marks;
    }

    KeywordReport {
        question_results,
        total_score: round_to(obtained, 2),
        max_score,
    }
}

// ── Fuzzy scores ─────────────────────────────────────────────────────────

/// Normalised edit similarity on a 0–100 scale.
fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(a, b) * 100.0
}

/// Best [`ratio`] of the shorter string against every equally long window
/// of the longer one.
fn partial_ratio(a: &str, b: &str) -> f64 {
    let (short, long): (Vec<char>, Vec<char>) = if a.chars().count() <= b.chars().count() {
        (a.chars().collect(), b.chars().collect())
    } else {
        (b.chars().collect(), a.chars().collect())
    };
    if short.is_empty() {
        return 0.0;
    }
    let needle: String = short.iter().collect();
    long.windows(short.len())
        .map(|w| ratio(&needle, &w.iter().collect::<String>()))
        .fold(0.0, f64::max)
}

/// [`ratio`] after sorting each side's whitespace-separated tokens.
fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn non_empty_lines(s: &str) -> Vec<&str> {
    s.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
}

fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}
