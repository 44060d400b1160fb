pub mod builder;
pub mod generator;
pub mod grader;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Worksheet {
    pub id: String,
    pub questions: Vec<Question>,
    /// How many questions were asked for; more than `questions.len()` when
    /// the template list ran out.
    pub requested_questions: usize,
}

impl Worksheet {
    pub fn new(id: String, questions: Vec<Question>, requested_questions: usize) -> Self {
        Self {
            id,
            questions,
            requested_questions,
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.questions.len() < self.requested_questions
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    pub template_id: String,
    pub text: String,
    /// Canonical numeric string, empty for placeholder questions.
    pub correct_answer: String,
    /// Identifies this question inside its worksheet; answers are keyed by it.
    pub instance_id: String,
}

impl Question {
    pub fn new(template_id: String, text: String, correct_answer: String, instance_id: String) -> Self {
        Self {
            template_id,
            text,
            correct_answer,
            instance_id,
        }
    }
}
