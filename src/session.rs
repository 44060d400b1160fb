use std::collections::HashMap;

use crate::error::{KeyError, UnknownWorksheet};
use crate::gradebook::{Gradebook, Receipt};
use crate::worksheet::builder::{validate_key, WorksheetBuilder};
use crate::worksheet::{Question, Worksheet};

/// A student, identified by the personalization key they typed.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Student {
    /// Exactly what was typed; this is what gets stored as the student id.
    pub raw_key: String,
    pub key: i64,
}

pub fn parse_key(raw: &str) -> Result<Student, KeyError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(KeyError::Empty);
    }
    let key = validate_key(trimmed.parse().map_err(|_| KeyError::NotInteger)?)?;
    Ok(Student {
        raw_key: raw.to_string(),
        key,
    })
}

/// Where a chat is in the worksheet flow. Stored per chat between messages.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    ReceiveKey {
        /// The set the chat had before asking for a key, kept if the same
        /// key comes back.
        previous: Option<(Student, Vec<Worksheet>)>,
    },
    ChooseWorksheet {
        student: Student,
        worksheets: Vec<Worksheet>,
        last_score: Option<f64>,
    },
    AnswerWorksheet {
        student: Student,
        worksheets: Vec<Worksheet>,
        worksheet_index: usize,
        answers: HashMap<String, String>,
        /// Index of the next question to ask.
        question_number: usize,
    },
}

pub fn worksheet_label(index: usize) -> String {
    format!("Hoja {}", index + 1)
}

/// Reads a worksheet choice such as "Hoja 2" or "2" into a zero-based index.
pub fn parse_worksheet_choice(text: &str, available: usize) -> Option<usize> {
    let text = text.trim();
    let number = text
        .strip_prefix("Hoja")
        .or_else(|| text.strip_prefix("hoja"))
        .unwrap_or(text)
        .trim();
    match number.parse::<usize>() {
        Ok(n) if n >= 1 && n <= available => Some(n - 1),
        _ => None,
    }
}

/// Result of a chat answering one question.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// Ask this question next.
    Next { number: usize, question: Question },
    /// Every question has an answer; hand the worksheet in.
    Complete,
}

/// Everything a chat needs to go from a key to a stored grade.
pub struct Classroom {
    builder: WorksheetBuilder,
    worksheet_count: usize,
    gradebook: Gradebook,
}

impl Classroom {
    pub fn new(builder: WorksheetBuilder, worksheet_count: usize, gradebook: Gradebook) -> Self {
        Self {
            builder,
            worksheet_count,
            gradebook,
        }
    }

    pub fn gradebook(&self) -> &Gradebook {
        &self.gradebook
    }

    pub fn worksheets_for(&self, student: &Student) -> Result<Vec<Worksheet>, KeyError> {
        self.builder
            .build_set(student.key, self.worksheet_count, &mut rand::thread_rng())
    }

    /// Validates a typed key and lists the worksheet set for it.
    ///
    /// The `previous` set is kept when it belongs to the same key; any other
    /// key gets a fresh set.
    pub fn enter_key(
        &self,
        raw: &str,
        previous: Option<(Student, Vec<Worksheet>)>,
    ) -> Result<State, KeyError> {
        let student = parse_key(raw)?;
        let worksheets = match previous {
            Some((old, worksheets)) if old.key == student.key && !worksheets.is_empty() => {
                log::debug!("Keeping {} worksheets for key {}", worksheets.len(), student.key);
                worksheets
            }
            _ => {
                let worksheets = self.worksheets_for(&student)?;
                log::debug!(
                    "Generated {} worksheets for key {}",
                    worksheets.len(),
                    student.key
                );
                worksheets
            }
        };
        Ok(State::ChooseWorksheet {
            student,
            worksheets,
            last_score: None,
        })
    }

    /// Grades the chosen worksheet and decides where the chat goes next.
    ///
    /// After a confirmed write the chat gets a fresh worksheet set for the
    /// same key. If the write failed it keeps the set it had. An index outside
    /// the set grades and stores nothing and sends the chat back to the list.
    pub async fn hand_in(
        &self,
        student: Student,
        worksheets: Vec<Worksheet>,
        worksheet_index: usize,
        answers: &HashMap<String, String>,
    ) -> Result<(Receipt, State), (UnknownWorksheet, State)> {
        let Some(worksheet) = worksheets.get(worksheet_index) else {
            let state = State::ChooseWorksheet {
                student,
                worksheets,
                last_score: None,
            };
            return Err((UnknownWorksheet { index: worksheet_index }, state));
        };
        let receipt = self.gradebook.submit(&student.raw_key, worksheet, answers).await;
        let last_score = Some(receipt.result.score_percent);

        let worksheets = match &receipt.stored {
            Ok(()) => self.worksheets_for(&student).unwrap_or(worksheets),
            Err(_) => worksheets,
        };

        let state = State::ChooseWorksheet {
            student,
            worksheets,
            last_score,
        };
        Ok((receipt, state))
    }
}

/// Picks a worksheet from the listed set.
pub fn choose_worksheet(
    student: Student,
    worksheets: Vec<Worksheet>,
    choice: &str,
) -> Result<State, (Student, Vec<Worksheet>)> {
    match parse_worksheet_choice(choice, worksheets.len()) {
        Some(worksheet_index) => Ok(State::AnswerWorksheet {
            student,
            worksheets,
            worksheet_index,
            answers: HashMap::new(),
            question_number: 0,
        }),
        None => Err((student, worksheets)),
    }
}

/// Records `text` as the answer to question `question_number - 1` (if any)
/// and says what comes next.
pub fn record_answer(
    worksheet: &Worksheet,
    answers: &mut HashMap<String, String>,
    question_number: usize,
    text: Option<&str>,
) -> Progress {
    if question_number > 0 {
        if let (Some(question), Some(text)) = (worksheet.questions.get(question_number - 1), text) {
            answers.insert(question.instance_id.clone(), text.to_string());
        }
    }
    match worksheet.questions.get(question_number) {
        Some(question) => Progress::Next {
            number: question_number + 1,
            question: question.clone(),
        },
        None => Progress::Complete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::cache::RecentSubmissions;
    use crate::storage::memory::MemoryStore;
    use crate::worksheet::generator::MAX_KEY;
    use std::sync::Arc;

    fn classroom(store: Arc<MemoryStore>) -> Classroom {
        Classroom::new(
            WorksheetBuilder::default(),
            5,
            Gradebook::new(store, RecentSubmissions::default(), 20),
        )
    }

    /// Walks the chat through one worksheet, answering each question with
    /// `answer_for`, and returns the state reached plus the final answers.
    async fn work_through<F>(
        classroom: &Classroom,
        key: &str,
        choice: &str,
        answer_for: F,
    ) -> (Receipt, State)
    where
        F: Fn(&Question) -> String,
    {
        let (student, worksheets) = match classroom.enter_key(key, None).unwrap() {
            State::ChooseWorksheet {
                student,
                worksheets,
                ..
            } => (student, worksheets),
            other => panic!("unexpected state {:?}", other),
        };
        assert_eq!(worksheets.len(), 5);

        let (student, worksheets, worksheet_index) =
            match choose_worksheet(student, worksheets, choice).unwrap() {
                State::AnswerWorksheet {
                    student,
                    worksheets,
                    worksheet_index,
                    ..
                } => (student, worksheets, worksheet_index),
                other => panic!("unexpected state {:?}", other),
            };

        let worksheet = worksheets[worksheet_index].clone();
        let mut answers = HashMap::new();
        let mut question_number = 0;
        let mut reply: Option<String> = None;
        loop {
            match record_answer(&worksheet, &mut answers, question_number, reply.as_deref()) {
                Progress::Next { number, question } => {
                    reply = Some(answer_for(&question));
                    question_number = number;
                }
                Progress::Complete => break,
            }
        }
        assert_eq!(answers.len(), worksheet.questions.len());

        classroom
            .hand_in(student, worksheets, worksheet_index, &answers)
            .await
            .unwrap()
    }

    #[test]
    fn keys_are_validated() {
        assert_eq!(parse_key("  "), Err(KeyError::Empty));
        assert_eq!(parse_key("doce"), Err(KeyError::NotInteger));
        assert_eq!(parse_key("1.5"), Err(KeyError::NotInteger));
        assert_eq!(parse_key("0"), Err(KeyError::NotPositive));
        assert_eq!(parse_key("-7"), Err(KeyError::NotPositive));
        assert_eq!(
            parse_key("1000000001"),
            Err(KeyError::TooLarge { max: MAX_KEY })
        );

        let student = parse_key(" 12 ").unwrap();
        assert_eq!(student.key, 12);
        assert_eq!(student.raw_key, " 12 ");
    }

    #[test]
    fn worksheet_choices() {
        assert_eq!(parse_worksheet_choice("Hoja 1", 5), Some(0));
        assert_eq!(parse_worksheet_choice("hoja 5", 5), Some(4));
        assert_eq!(parse_worksheet_choice(" 3 ", 5), Some(2));
        assert_eq!(parse_worksheet_choice("Hoja 6", 5), None);
        assert_eq!(parse_worksheet_choice("0", 5), None);
        assert_eq!(parse_worksheet_choice("la primera", 5), None);
        assert_eq!(worksheet_label(0), "Hoja 1");
    }

    #[test]
    fn invalid_choice_keeps_the_listing() {
        let classroom = classroom(Arc::new(MemoryStore::new()));
        let student = parse_key("4").unwrap();
        let worksheets = classroom.worksheets_for(&student).unwrap();

        let (student_back, worksheets_back) =
            choose_worksheet(student.clone(), worksheets.clone(), "Hoja 9").unwrap_err();
        assert_eq!(student_back, student);
        assert_eq!(worksheets_back, worksheets);
    }

    #[test]
    fn answers_without_text_are_not_recorded() {
        let classroom = classroom(Arc::new(MemoryStore::new()));
        let worksheet = classroom
            .worksheets_for(&parse_key("6").unwrap())
            .unwrap()
            .remove(0);
        let mut answers = HashMap::new();

        record_answer(&worksheet, &mut answers, 0, None);
        let progress = record_answer(&worksheet, &mut answers, 1, None);
        assert!(answers.is_empty());
        assert_eq!(
            progress,
            Progress::Next {
                number: 2,
                question: worksheet.questions[1].clone()
            }
        );
    }

    #[tokio::test]
    async fn all_correct_answers_score_full_marks() {
        let store = Arc::new(MemoryStore::new());
        let classroom = classroom(store.clone());

        let (receipt, state) =
            work_through(&classroom, "8", "Hoja 1", |q| q.correct_answer.clone()).await;

        assert_eq!(receipt.result.score_percent, 100.0);
        assert!(receipt.stored.is_ok());
        assert_eq!(store.len(), 1);

        match state {
            State::ChooseWorksheet {
                student,
                worksheets,
                last_score,
            } => {
                assert_eq!(student.key, 8);
                assert_eq!(worksheets.len(), 5);
                assert_eq!(last_score, Some(100.0));
            }
            other => panic!("unexpected state {:?}", other),
        }

        let recent = classroom.gradebook().recent().await.unwrap();
        assert_eq!(recent[0].submission.worksheet_id, "hoja_1_clave_8");
        assert_eq!(recent[0].submission.score_percent, 100.0);
    }

    #[tokio::test]
    async fn empty_answers_score_zero() {
        let store = Arc::new(MemoryStore::new());
        let classroom = classroom(store.clone());

        let (receipt, _) = work_through(&classroom, "8", "2", |_| String::new()).await;

        assert_eq!(receipt.result.score_percent, 0.0);
        assert!(receipt.result.details.iter().all(|(_, d)| !d.is_correct));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn invalid_key_generates_nothing() {
        let classroom = classroom(Arc::new(MemoryStore::new()));
        assert_eq!(classroom.enter_key("abc", None), Err(KeyError::NotInteger));
        assert_eq!(classroom.enter_key("-1", None), Err(KeyError::NotPositive));
    }

    fn listing(state: State) -> (Student, Vec<Worksheet>) {
        match state {
            State::ChooseWorksheet {
                student,
                worksheets,
                ..
            } => (student, worksheets),
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn same_key_keeps_the_listed_set() {
        let classroom = classroom(Arc::new(MemoryStore::new()));
        let first = listing(classroom.enter_key("8", None).unwrap());

        let (student, worksheets) = listing(classroom.enter_key(" 8", Some(first.clone())).unwrap());
        assert_eq!(student.key, 8);
        assert_eq!(worksheets, first.1);

        let (student, worksheets) = listing(classroom.enter_key("9", Some(first.clone())).unwrap());
        assert_eq!(student.key, 9);
        assert_eq!(worksheets.len(), 5);
        assert_eq!(worksheets[0].id, "hoja_1_clave_9");
    }

    #[tokio::test]
    async fn unknown_worksheet_is_not_stored() {
        let store = Arc::new(MemoryStore::new());
        let classroom = classroom(store.clone());
        let (student, worksheets) = listing(classroom.enter_key("8", None).unwrap());

        let (error, state) = classroom
            .hand_in(student.clone(), worksheets.clone(), 9, &HashMap::new())
            .await
            .unwrap_err();

        assert_eq!(error, UnknownWorksheet { index: 9 });
        assert_eq!(store.len(), 0);
        assert_eq!(listing(state), (student, worksheets));
    }
}
