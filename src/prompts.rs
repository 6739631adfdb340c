//! Prompts for the two generative engines.
//!
//! Every instruction string sent to a model is built here so the wording can
//! be inspected in unit tests without contacting any service.

use crate::config::AnswerLanguage;

/// System prompt for single-page transcription by the vision engine.
pub const TRANSCRIPTION_PROMPT: &str = r#"You transcribe scanned, possibly handwritten, exam answer scripts.

Rules:
- Output ONLY the text written on the page, in reading order
- Keep the original language and spelling; do not correct the student
- Do NOT describe the image, add commentary, or wrap the output in code fences
- Output the transcription once"#;

/// The part of the grading instruction that fixes the reply format.
///
/// Identical for every language so downstream readers can rely on the
/// `criterion: awarded/max - justification` and `Total Score:` lines.
pub const OUTPUT_FORMAT_CONTRACT: &str = "Provide evaluation results in plain text format (NOT JSON):

Evaluation Results:
[For each rubric criterion, provide: criterion name, marks awarded (e.g., 2/3), and brief justification]

Example:
Grammar: 2/3 - The student used mostly correct grammar with minor errors.
Spelling: 1/2 - Several spelling mistakes throughout.
Creativity: 4/5 - Good original thinking with relevant examples.

Total Score: [sum]/[max]";

/// Build the grading instruction.
///
/// The answer key, the student's text and the rubric are embedded verbatim;
/// the rubric string (e.g. `grammar=3,correct spelling=2,creativity=5`) is
/// never parsed locally.
pub fn grading_prompt(
    language: AnswerLanguage,
    answer_key: &str,
    student_text: &str,
    rubric: &str,
) -> String {
    match language {
        AnswerLanguage::English => format!(
            "You are an examiner. Compare the teacher's answer and the student's answer and grade using the rubrics provided.\n\n\
Teacher's answer:\n\"\"\"{answer_key}\"\"\"\n\n\
Student's answer:\n\"\"\"{student_text}\"\"\"\n\n\
Rubrics: {rubric}\n\n\
{OUTPUT_FORMAT_CONTRACT}\n\n\
Provide your response only in plain text format with justifications."
        ),
        AnswerLanguage::Tamil => format!(
            "You are an examiner. Don't be too strict. Compare the teacher's answer and the student's answer and grade using the rubrics provided.\n\n\
Teacher's answer (in Tamil):\n\"\"\"{answer_key}\"\"\"\n\n\
Student's answer (in Tamil):\n\"\"\"{student_text}\"\"\"\n\n\
Rubrics: {rubric}\n\n\
{OUTPUT_FORMAT_CONTRACT}\n\n\
Provide your response only in plain text format with justifications and keep the justification mostly in tamil."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grading_prompt_embeds_inputs_verbatim() {
        let p = grading_prompt(
            AnswerLanguage::English,
            "Photosynthesis makes sugar.",
            "plants make  sugar",
            "grammar=3,correct spelling=2",
        );
        assert!(p.contains("\"\"\"Photosynthesis makes sugar.\"\"\""));
        assert!(p.contains("\"\"\"plants make  sugar\"\"\""));
        assert!(p.contains("Rubrics: grammar=3,correct spelling=2\n"));
    }

    #[test]
    fn grading_prompt_carries_output_contract() {
        for lang in [AnswerLanguage::English, AnswerLanguage::Tamil] {
            let p = grading_prompt(lang, "k", "s", "r=1");
            assert!(p.contains("NOT JSON"));
            assert!(p.contains("Grammar: 2/3 - "));
            assert!(p.contains("Total Score: [sum]/[max]"));
        }
    }

    #[test]
    fn tamil_prompt_is_lenient_and_asks_for_tamil_justification() {
        let p = grading_prompt(AnswerLanguage::Tamil, "விடை", "மாணவர்", "இலக்கணம் = 3");
        assert!(p.contains("Don't be too strict"));
        assert!(p.contains("(in Tamil)"));
        assert!(p.ends_with("mostly in tamil."));
        assert!(p.contains("\"\"\"விடை\"\"\""));
    }

    #[test]
    fn transcription_prompt_forbids_fences() {
        assert!(TRANSCRIPTION_PROMPT.contains("code fences"));
    }
}
