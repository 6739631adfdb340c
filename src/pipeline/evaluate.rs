//! Evaluation: grade the recognised text against an answer key and rubric.
//!
//! Inputs are validated before anything is sent; a request that passes
//! validation produces exactly one grading call. The reply is free text and
//! is stored as-is.

use crate::config::AnswerLanguage;
use crate::engines::GradingEngine;
use crate::error::{EngineError, ValidationError};
use crate::model::{EvaluationOutcome, EvaluationResult};
use crate::progress::SessionProgressCallback;
use crate::pipeline::keywords::grade_by_keywords;
use crate::prompts::grading_prompt;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// Model label reported for keyword grading.
pub const KEYWORD_GRADER: &str = "keyword";

/// Prefix of the diagnostic placed in the evaluation slot when grading fails.
pub const EVALUATION_FAILURE_PREFIX: &str = "Evaluation failed: ";

/// The three texts a grading is computed from.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationRequest<'a> {
    pub answer_key: &'a str,
    /// Recognised (possibly operator-edited) text. May be empty.
    pub student_text: &'a str,
    pub rubric: &'a str,
}

impl EvaluationRequest<'_> {
    /// Rubric first, then answer key; whitespace-only counts as missing.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.rubric.trim().is_empty() {
            return Err(ValidationError::MissingRubric);
        }
        if self.answer_key.trim().is_empty() {
            return Err(ValidationError::MissingAnswerKey);
        }
        Ok(())
    }
}

/// Validate `request`, then grade it with the engine from `acquire_grader`.
///
/// The engine is only acquired once validation has passed. Failing to acquire
/// it is reported the same way as a failed call.
pub async fn evaluate<F, Fut>(
    request: EvaluationRequest<'_>,
    language: AnswerLanguage,
    model: &str,
    acquire_grader: F,
    progress: &dyn SessionProgressCallback,
) -> Result<EvaluationOutcome, ValidationError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Arc<dyn GradingEngine>, EngineError>>,
{
    request.validate()?;

    let prompt = grading_prompt(
        language,
        request.answer_key,
        request.student_text,
        request.rubric,
    );
    progress.on_evaluation_start(model);

    let graded = match acquire_grader().await {
        Ok(engine) => engine.grade(&prompt, model).await,
        Err(e) => Err(e),
    };

    let outcome = match graded {
        Ok(reply) => {
            let text = reply.into_text();
            info!("Evaluation with {} returned {} chars", model, text.chars().count());
            EvaluationOutcome::Graded(EvaluationResult {
                text,
                model: model.to_string(),
                report: None,
            })
        }
        Err(e) => {
            warn!("Evaluation failed: {}", e);
            EvaluationOutcome::Failed {
                diagnostic: format!("{EVALUATION_FAILURE_PREFIX}{e}"),
                cause: e,
            }
        }
    };

    progress.on_evaluation_complete(outcome.is_success(), outcome.text().chars().count());
    Ok(outcome)
}

/// Grade `student_text` by keyword matching instead of an engine.
///
/// Only the answer key is required; `marks_key` and `keywords_key` fall back
/// to one mark per question and the answer's own words.
pub fn evaluate_by_keywords(
    answer_key: &str,
    student_text: &str,
    marks_key: &str,
    keywords_key: &str,
    progress: &dyn SessionProgressCallback,
) -> Result<EvaluationOutcome, ValidationError> {
    if answer_key.trim().is_empty() {
        return Err(ValidationError::MissingAnswerKey);
    }
    progress.on_evaluation_start(KEYWORD_GRADER);

    let report = grade_by_keywords(answer_key, student_text, marks_key, keywords_key);
    info!(
        "Keyword grading: {} question(s), {}/{}",
        report.question_results.len(),
        report.total_score,
        report.max_score
    );
    let outcome = EvaluationOutcome::Graded(EvaluationResult {
        text: report.summary(),
        model: KEYWORD_GRADER.to_string(),
        report: Some(report),
    });

    progress.on_evaluation_complete(true, outcome.text().chars().count());
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EngineReply;
    use crate::progress::NoopProgressCallback;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingGrader {
        prompts: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl GradingEngine for CapturingGrader {
        async fn grade(&self, prompt: &str, model: &str) -> Result<EngineReply, EngineError> {
            self.prompts
                .lock()
                .unwrap()
                .push((prompt.to_string(), model.to_string()));
            Ok(EngineReply::Structured(json!({ "message": { "content": "Total Score: 7/10" } })))
        }
    }

    async fn no_grader() -> Result<Arc<dyn GradingEngine>, EngineError> {
        panic!("grader must not be acquired")
    }

    fn request<'a>(answer_key: &'a str, rubric: &'a str) -> EvaluationRequest<'a> {
        EvaluationRequest {
            answer_key,
            student_text: "photosynthesis makes sugar",
            rubric,
        }
    }

    #[test]
    fn rubric_is_checked_before_answer_key() {
        assert_eq!(request("", "").validate(), Err(ValidationError::MissingRubric));
        assert_eq!(
            request(" \n", "grammar=3").validate(),
            Err(ValidationError::MissingAnswerKey)
        );
        assert_eq!(request("key", "grammar=3").validate(), Ok(()));
    }

    #[tokio::test]
    async fn invalid_request_never_acquires_engine() {
        let result = evaluate(
            request("key", "   "),
            AnswerLanguage::English,
            "gpt-5-nano",
            no_grader,
            &NoopProgressCallback,
        )
        .await;
        assert_eq!(result.unwrap_err(), ValidationError::MissingRubric);
    }

    #[tokio::test]
    async fn structured_reply_is_coerced_to_text() {
        let grader = Arc::new(CapturingGrader::default());
        let engine: Arc<dyn GradingEngine> = grader.clone();

        let outcome = evaluate(
            request("plants make food", "accuracy=5"),
            AnswerLanguage::Tamil,
            "gpt-5-nano",
            || async { Ok(engine) },
            &NoopProgressCallback,
        )
        .await
        .unwrap();

        assert_eq!(outcome.text(), "Total Score: 7/10");
        let prompts = grader.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].1, "gpt-5-nano");
        assert!(prompts[0].0.contains("\"\"\"plants make food\"\"\""));
        assert!(prompts[0].0.contains("Rubrics: accuracy=5"));
    }

    #[test]
    fn keyword_grading_needs_only_answer_key() {
        assert_eq!(
            evaluate_by_keywords(" ", "sun", "", "", &NoopProgressCallback).unwrap_err(),
            ValidationError::MissingAnswerKey
        );

        let outcome =
            evaluate_by_keywords("sun gives light", "sun gives light", "", "", &NoopProgressCallback)
                .unwrap();
        match outcome {
            EvaluationOutcome::Graded(ref result) => {
                assert_eq!(result.model, KEYWORD_GRADER);
                let report = result.report.as_ref().expect("keyword report");
                assert_eq!(report.total_score, 1.0);
            }
            EvaluationOutcome::Failed { .. } => panic!("keyword grading cannot fail"),
        }
        assert!(outcome.text().ends_with("Total Score: 1/1"));
    }

    #[tokio::test]
    async fn unavailable_engine_becomes_diagnostic() {
        let outcome = evaluate(
            request("key", "grammar=3"),
            AnswerLanguage::English,
            "gpt-5-nano",
            || async {
                Err(EngineError::NotConfigured {
                    engine: "grading engine".into(),
                    hint: "no provider".into(),
                })
            },
            &NoopProgressCallback,
        )
        .await
        .unwrap();

        assert!(!outcome.is_success());
        assert!(outcome.text().starts_with(EVALUATION_FAILURE_PREFIX));
    }
}
