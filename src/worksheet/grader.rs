use std::collections::HashMap;

use crate::worksheet::Worksheet;

/// Two numeric answers closer than this are the same answer.
const NUMERIC_TOLERANCE: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnswerDetail {
    #[serde(rename = "pregunta")]
    pub question_text: String,
    /// Exactly what the student sent, `None` if nothing was sent.
    #[serde(rename = "respuesta_alumno")]
    pub submitted: Option<String>,
    #[serde(rename = "respuesta_correcta")]
    pub correct: String,
    #[serde(rename = "es_correcta")]
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradingResult {
    pub score_percent: f64,
    pub correct_count: usize,
    pub total_questions: usize,
    /// One entry per question, in worksheet order.
    pub details: Vec<(String, AnswerDetail)>,
}

impl GradingResult {
    /// Score rounded to two decimals, as it is stored.
    pub fn rounded_score(&self) -> f64 {
        (self.score_percent * 100.0).round() / 100.0
    }

    /// The per-question detail as a JSON object keyed by instance id.
    pub fn details_json(&self) -> serde_json::Value {
        let map = self
            .details
            .iter()
            .map(|(id, detail)| {
                let value = serde_json::to_value(detail).unwrap_or(serde_json::Value::Null);
                (id.clone(), value)
            })
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

fn normalize(answer: &str) -> String {
    answer.to_lowercase().trim().to_string()
}

/// Compares a submitted answer with the expected one.
///
/// Both sides are lowercased and trimmed. When both parse as numbers they
/// match within `NUMERIC_TOLERANCE`; otherwise the strings must be equal.
/// An empty expected answer matches nothing.
pub fn answers_match(correct: &str, submitted: &str) -> bool {
    let correct = normalize(correct);
    let submitted = normalize(submitted);
    if correct.is_empty() {
        return false;
    }

    match (correct.parse::<f64>(), submitted.parse::<f64>()) {
        (Ok(expected), Ok(given)) => (expected - given).abs() < NUMERIC_TOLERANCE,
        _ => correct == submitted,
    }
}

/// Scores `answers` (keyed by instance id) against `worksheet`.
///
/// A missing answer counts as an empty one. An empty worksheet scores 0.
pub fn grade(answers: &HashMap<String, String>, worksheet: &Worksheet) -> GradingResult {
    let details = worksheet
        .questions
        .iter()
        .map(|question| {
            let submitted = answers.get(&question.instance_id).cloned();
            let is_correct = answers_match(
                &question.correct_answer,
                submitted.as_deref().unwrap_or(""),
            );
            let detail = AnswerDetail {
                question_text: question.text.clone(),
                submitted,
                correct: question.correct_answer.clone(),
                is_correct,
            };
            (question.instance_id.clone(), detail)
        })
        .collect::<Vec<_>>();

    let total_questions = details.len();
    let correct_count = details.iter().filter(|(_, d)| d.is_correct).count();
    let score_percent = if total_questions > 0 {
        correct_count as f64 / total_questions as f64 * 100.0
    } else {
        0.0
    };

    GradingResult {
        score_percent,
        correct_count,
        total_questions,
        details,
    }
}
