use rand::Rng;

use crate::worksheet::Question;

/// The arithmetic patterns a question can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    Sum,
    Difference,
    Product,
    Quotient,
    Mixed,
}

impl Template {
    pub const ALL: [Template; 5] = [
        Template::Sum,
        Template::Difference,
        Template::Product,
        Template::Quotient,
        Template::Mixed,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Template::Sum => "suma_clave",
            Template::Difference => "resta_clave",
            Template::Product => "multiplicacion_clave",
            Template::Quotient => "division_clave",
            Template::Mixed => "operacion_mixta_clave",
        }
    }

    pub fn from_id(id: &str) -> Option<Template> {
        Template::ALL.into_iter().find(|t| t.id() == id)
    }
}

/// Largest accepted key; `(key + 3) * key` still fits in `i64`.
pub const MAX_KEY: i64 = 1_000_000_000;

/// Default template ids, in the order every worksheet presents them.
pub fn default_template_ids() -> Vec<String> {
    Template::ALL.iter().map(|t| t.id().to_string()).collect()
}

/// Builds one question for `template_id` from the student's key.
///
/// A non-positive key falls back to 1 and a key above `MAX_KEY` is clamped
/// to it. An id that matches no template yields
/// a placeholder question whose correct answer is empty, so it can never be
/// answered correctly.
pub fn generate_question<R: Rng>(
    template_id: &str,
    key: i64,
    instance_id: String,
    rng: &mut R,
) -> Question {
    let key = key.clamp(1, MAX_KEY);

    let (text, correct_answer) = match Template::from_id(template_id) {
        Some(Template::Sum) => {
            let addend = rng.gen_range(1..=10);
            (
                format!("¿Cuánto es {} + {}?", key, addend),
                (key + addend).to_string(),
            )
        }
        Some(Template::Difference) => {
            // key / 2 is 0 for key == 1, so the range would be empty
            let mut subtrahend = match key / 2 {
                0 => 1,
                upper => rng.gen_range(1..=upper),
            };
            if key - subtrahend <= 0 {
                subtrahend = 1;
            }
            (
                format!("¿Cuánto es {} - {}?", key, subtrahend),
                (key - subtrahend).to_string(),
            )
        }
        Some(Template::Product) => {
            let multiplier = rng.gen_range(2..=5);
            (
                format!("¿Cuánto es {} * {}?", key, multiplier),
                (key * multiplier).to_string(),
            )
        }
        Some(Template::Quotient) => {
            let multiplier: i64 = rng.gen_range(2..=5);
            let dividend = key * multiplier;
            (
                format!("¿Cuánto es {} / {}?", dividend, key),
                multiplier.to_string(),
            )
        }
        Some(Template::Mixed) => {
            let a = key + rng.gen_range(1..=3);
            let mut b = key - rng.gen_range(0..=(key - 1).min(3));
            if b <= 0 {
                b = 1;
            }
            (
                format!("¿Cuánto es ({} * {}) - {}?", a, b, key),
                (a * b - key).to_string(),
            )
        }
        None => (
            format!("Pregunta no definida para template {}.", template_id),
            String::new(),
        ),
    };

    Question::new(template_id.to_string(), text, correct_answer, instance_id)
}
