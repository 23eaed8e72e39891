use std::sync::LazyLock;

use regex::Regex;

static QUESTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)\.(.*)$").unwrap());
static OPTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-D]\]").unwrap());
static ANSWER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([A-D])\]").unwrap());

const SECTION_PREFIX: &str = "SECTION-";
const ANSWER_PREFIX: &str = "Ans";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    SectionHeader { id: &'a str, line: &'a str },
    QuestionStart { number: u32, text: &'a str },
    OptionLine { key: char, text: &'a str },
    /// Letter from the first `[A-D]` on the line, if any.
    AnswerLine(Option<char>),
    Plain(&'a str),
}

impl Line<'_> {
    pub fn tag(&self) -> &'static str {
        match self {
            Line::SectionHeader { .. } => "section",
            Line::QuestionStart { .. } => "question",
            Line::OptionLine { .. } => "option",
            Line::AnswerLine(_) => "answer",
            Line::Plain(_) => "plain",
        }
    }
}

/// Trimmed, non-empty lines of a page's text, in reading order.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}

/// Classify one trimmed line. Checked in order: header, question, option, answer.
pub fn classify(line: &str) -> Line<'_> {
    if let Some(rest) = line.strip_prefix(SECTION_PREFIX) {
        let id = rest.split_whitespace().next().unwrap_or("");
        return Line::SectionHeader { id, line };
    }

    if let Some(caps) = QUESTION_RE.captures(line) {
        // A digit run too long for u32 falls through to plain text.
        if let Ok(number) = caps[1].parse::<u32>() {
            let text = caps.get(2).map_or("", |m| m.as_str()).trim();
            return Line::QuestionStart { number, text };
        }
    }

    if OPTION_RE.is_match(line) {
        // The regex guarantees an ASCII letter and `]` in the first two bytes.
        let key = char::from(line.as_bytes()[0]);
        return Line::OptionLine {
            key,
            text: line[2..].trim(),
        };
    }

    if line.starts_with(ANSWER_PREFIX) {
        let letter = ANSWER_RE
            .captures(line)
            .and_then(|caps| caps[1].chars().next());
        return Line::AnswerLine(letter);
    }

    Line::Plain(line)
}
