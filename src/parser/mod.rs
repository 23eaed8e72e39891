pub mod images;
pub mod lines;
pub mod questions;

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use images::ImagePolicy;

/// Handle to an image written by the sink; resolves to its file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef(PathBuf);

impl ImageRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ImageRef(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().display())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionOption {
    pub key: char,
    pub text: String,
    pub image: Option<ImageRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// 0-based index of the page the question started on.
    pub page: usize,
    pub section: String,
    pub question_number: u32,
    pub question_text: String,
    /// Keys in the order they were first seen.
    pub options: Vec<QuestionOption>,
    pub answer: Option<char>,
    pub question_images: Vec<ImageRef>,
    pub option_images: Vec<ImageRef>,
}

impl Question {
    pub fn new(page: usize, section: &str, question_number: u32, text: &str) -> Self {
        Question {
            page,
            section: section.to_string(),
            question_number,
            question_text: text.to_string(),
            options: Vec::new(),
            answer: None,
            question_images: Vec::new(),
            option_images: Vec::new(),
        }
    }

    pub fn append_text(&mut self, line: &str) {
        self.question_text.push(' ');
        self.question_text.push_str(line);
    }

    /// Insert or overwrite an option; an existing key keeps its position.
    pub fn set_option(&mut self, key: char, text: &str) {
        match self.options.iter_mut().find(|o| o.key == key) {
            Some(existing) => {
                existing.text = text.to_string();
                existing.image = None;
            }
            None => self.options.push(QuestionOption {
                key,
                text: text.to_string(),
                image: None,
            }),
        }
    }

    pub fn option(&self, key: char) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.key == key)
    }
}

/// Parse state carried across pages, in page order, for one document run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentState {
    /// Most recent section header, or empty before the first one.
    pub section: String,
    /// Images stored so far in this run; names the next image file.
    pub image_counter: usize,
}

/// Parse one page's text into closed questions and attach the page's images.
///
/// `state.section` is read and updated; images left over after the policy
/// runs are dropped.
pub fn parse_page(
    state: &mut DocumentState,
    page: usize,
    text: &str,
    images: VecDeque<ImageRef>,
    policy: &dyn ImagePolicy,
) -> Vec<Question> {
    let mut questions = questions::parse_lines(&lines::split_lines(text), &mut state.section, page);
    let unassigned = policy.assign(&mut questions, images);
    if !unassigned.is_empty() {
        debug!(
            page,
            dropped = unassigned.len(),
            "images left without a question or option slot"
        );
    }
    questions
}
