use serde::Serialize;

use crate::parser::Question;

/// Exported shape of one question. Section, answer and option text stay in
/// the in-memory model (and the SQLite store) only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub question: String,
    /// Path of the first question image, or empty.
    pub images: String,
    pub option_images: Vec<String>,
}

impl From<&Question> for Record {
    fn from(q: &Question) -> Self {
        Record {
            question: format!("{}. {}", q.question_number, q.question_text),
            images: q
                .question_images
                .first()
                .map(|img| img.to_string())
                .unwrap_or_default(),
            option_images: q.option_images.iter().map(|img| img.to_string()).collect(),
        }
    }
}

pub fn format_all(questions: &[Question]) -> Vec<Record> {
    questions.iter().map(Record::from).collect()
}
