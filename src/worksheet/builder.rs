use rand::Rng;

use crate::error::KeyError;
use crate::worksheet::generator::{default_template_ids, generate_question, MAX_KEY};
use crate::worksheet::Worksheet;

pub const DEFAULT_WORKSHEET_COUNT: usize = 5;
pub const DEFAULT_QUESTIONS_PER_WORKSHEET: usize = 5;

/// Accepts keys in `1..=MAX_KEY`.
pub fn validate_key(key: i64) -> Result<i64, KeyError> {
    if key <= 0 {
        return Err(KeyError::NotPositive);
    }
    if key > MAX_KEY {
        return Err(KeyError::TooLarge { max: MAX_KEY });
    }
    Ok(key)
}

/// Turns a student key into worksheets using an ordered list of template ids.
#[derive(Debug, Clone)]
pub struct WorksheetBuilder {
    templates: Vec<String>,
    question_count: usize,
}

impl Default for WorksheetBuilder {
    fn default() -> Self {
        Self::new(default_template_ids(), DEFAULT_QUESTIONS_PER_WORKSHEET)
    }
}

impl WorksheetBuilder {
    pub fn new(templates: Vec<String>, question_count: usize) -> Self {
        Self {
            templates,
            question_count,
        }
    }

    /// Builds worksheet number `index` (zero based) for `key`.
    ///
    /// Questions follow the template list in order, one per template. Asking
    /// for more questions than there are templates truncates the worksheet
    /// and logs a warning; `Worksheet::is_truncated` reports it too.
    pub fn build<R: Rng>(&self, index: usize, key: i64, rng: &mut R) -> Worksheet {
        let questions = self
            .templates
            .iter()
            .take(self.question_count)
            .enumerate()
            .map(|(position, template_id)| {
                let instance_id = format!("hoja_{}_q_{}_{}", index, position + 1, template_id);
                generate_question(template_id, key, instance_id, &mut *rng)
            })
            .collect::<Vec<_>>();

        if questions.len() < self.question_count {
            log::warn!(
                "Worksheet {} for key {} has {} of {} requested questions: only {} templates defined",
                index,
                key,
                questions.len(),
                self.question_count,
                self.templates.len()
            );
        }

        Worksheet::new(
            format!("hoja_{}_clave_{}", index + 1, key),
            questions,
            self.question_count,
        )
    }

    /// Builds `worksheet_count` independent worksheets for `key`.
    ///
    /// This is where a key is validated before anything is generated.
    pub fn build_set<R: Rng>(
        &self,
        key: i64,
        worksheet_count: usize,
        rng: &mut R,
    ) -> Result<Vec<Worksheet>, KeyError> {
        let key = validate_key(key)?;
        Ok((0..worksheet_count)
            .map(|index| self.build(index, key, &mut *rng))
            .collect())
    }
}
