use tracing::trace;

use super::lines::{classify, Line};
use super::Question;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    /// No open question; waiting for a header or a question start.
    Scanning,
    /// Accumulating continuation lines into the question text.
    InBody(Question),
    /// Accumulating `A]`..`D]` lines.
    InOptions(Question),
}

/// Result of feeding one classified line to the machine.
#[derive(Debug)]
pub struct Step {
    pub state: State,
    /// A question finished by this line (answer seen, or a boundary reached).
    pub closed: Option<Question>,
    /// False when the same line has to be fed again in the new state.
    pub advance: bool,
}

impl Step {
    fn next(state: State) -> Self {
        Step { state, closed: None, advance: true }
    }

    fn reread(state: State) -> Self {
        Step { state, closed: None, advance: false }
    }

    fn close(question: Question, advance: bool) -> Self {
        Step {
            state: State::Scanning,
            closed: Some(question),
            advance,
        }
    }
}

/// Transition function. `section` is the document's current section and is
/// only changed by a header read while scanning.
pub fn step(state: State, line: &Line<'_>, section: &mut String, page: usize) -> Step {
    match (state, line) {
        (State::Scanning, Line::SectionHeader { id, .. }) => {
            *section = id.to_string();
            Step::next(State::Scanning)
        }
        (State::Scanning, Line::QuestionStart { number, text }) => {
            Step::next(State::InBody(Question::new(page, section, *number, text)))
        }
        // Stray lines before the first question.
        (State::Scanning, _) => Step::next(State::Scanning),

        (State::InBody(q), Line::OptionLine { .. }) => Step::reread(State::InOptions(q)),
        (State::InBody(mut q), Line::AnswerLine(letter))
        | (State::InOptions(mut q), Line::AnswerLine(letter)) => {
            q.answer = *letter;
            Step::close(q, true)
        }
        (State::InBody(q), Line::QuestionStart { .. }) => Step::close(q, false),
        (State::InBody(mut q), Line::SectionHeader { line: text, .. } | Line::Plain(text)) => {
            q.append_text(text);
            Step::next(State::InBody(q))
        }

        (State::InOptions(mut q), Line::OptionLine { key, text }) => {
            q.set_option(*key, text);
            Step::next(State::InOptions(q))
        }
        // Anything else ends the option list without an answer.
        (State::InOptions(q), _) => Step::close(q, false),
    }
}

/// Run the machine over one page's lines. A question still open at the end
/// of the page is closed as-is.
pub fn parse_lines(lines: &[&str], section: &mut String, page: usize) -> Vec<Question> {
    let mut closed = Vec::new();
    let mut state = State::Scanning;
    let mut i = 0;

    while i < lines.len() {
        let line = classify(lines[i]);
        if let (State::Scanning, Line::Plain(text)) = (&state, &line) {
            if text.starts_with(|c: char| c.is_ascii_digit()) {
                trace!(page, line = %text, "numbered line without a period, skipped");
            }
        }

        let next = step(state, &line, section, page);
        if let Some(q) = next.closed {
            closed.push(q);
        }
        if next.advance {
            i += 1;
        }
        state = next.state;
    }

    match state {
        State::InBody(q) | State::InOptions(q) => closed.push(q),
        State::Scanning => {}
    }
    closed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lines::split_lines;

    fn parse(text: &str) -> Vec<Question> {
        let mut section = String::new();
        parse_lines(&split_lines(text), &mut section, 0)
    }

    #[test]
    fn scanning_header_updates_section() {
        let mut section = String::new();
        let s = step(State::Scanning, &classify("SECTION-GEO"), &mut section, 0);
        assert_eq!(section, "GEO");
        assert_eq!(s.state, State::Scanning);
        assert!(s.advance);
    }

    #[test]
    fn body_to_options_rereads_line() {
        let mut section = String::new();
        let q = Question::new(0, "", 1, "q");
        let s = step(State::InBody(q), &classify("A] one"), &mut section, 0);
        assert!(matches!(s.state, State::InOptions(_)));
        assert!(!s.advance);
        assert!(s.closed.is_none());
    }

    #[test]
    fn options_then_question_start_closes_without_consuming() {
        let mut section = String::new();
        let mut q = Question::new(0, "", 1, "q");
        q.set_option('A', "x");
        let s = step(State::InOptions(q), &classify("2. next"), &mut section, 0);
        assert_eq!(s.state, State::Scanning);
        assert!(!s.advance);
        let closed = s.closed.unwrap();
        assert_eq!(closed.answer, None);
        assert_eq!(closed.options.len(), 1);
    }

    #[test]
    fn multi_line_body_is_space_joined() {
        let qs = parse("1. The quick brown fox\njumps over\nthe lazy dog.\nA] yes\nB] no\nAns [A]");
        assert_eq!(qs.len(), 1);
        assert_eq!(qs[0].question_text, "The quick brown fox jumps over the lazy dog.");
        assert_eq!(qs[0].answer, Some('A'));
    }

    #[test]
    fn answer_after_options() {
        let qs = parse("1. Pick\nA] a\nB] b\nC] c\nD] d\nAns [C]");
        assert_eq!(qs[0].answer, Some('C'));
        let keys: Vec<char> = qs[0].options.iter().map(|o| o.key).collect();
        assert_eq!(keys, vec!['A', 'B', 'C', 'D']);
    }

    #[test]
    fn unmatched_answer_line_is_still_consumed() {
        let qs = parse("1. Pick\nA] a\nAns: none\nstray text\n2. Next\nAns [B]");
        assert_eq!(qs.len(), 2);
        assert_eq!(qs[0].answer, None);
        // The stray line after the answer is skipped, not absorbed anywhere.
        assert_eq!(qs[1].question_text, "Next");
        assert_eq!(qs[1].answer, Some('B'));
    }

    #[test]
    fn question_without_options_takes_answer() {
        let qs = parse("4. True or false: water is wet\nAns [A]");
        assert!(qs[0].options.is_empty());
        assert_eq!(qs[0].answer, Some('A'));
    }

    #[test]
    fn back_to_back_questions_without_answers() {
        let qs = parse("1. First\n2. Second\nA] x\n3. Third");
        assert_eq!(qs.len(), 3);
        assert_eq!(
            qs.iter().map(|q| q.question_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(qs[1].options.len(), 1);
        assert!(qs.iter().all(|q| q.answer.is_none()));
    }

    #[test]
    fn end_of_page_closes_open_question() {
        let qs = parse("9. Cut off at the page break\nA] one\nB] two");
        assert_eq!(qs.len(), 1);
        assert_eq!(qs[0].options.len(), 2);
        assert_eq!(qs[0].answer, None);
    }

    #[test]
    fn stray_lines_before_first_question_are_skipped() {
        let qs = parse("Physics Question Bank\nA] orphan\nAns [D]\n1. Real\nAns [A]");
        assert_eq!(qs.len(), 1);
        assert_eq!(qs[0].question_text, "Real");
    }

    #[test]
    fn header_inside_body_is_body_text() {
        let mut section = String::from("OLD");
        let qs = parse_lines(&split_lines("1. Intro\nSECTION-NEW\nAns [A]"), &mut section, 0);
        assert_eq!(qs[0].question_text, "Intro SECTION-NEW");
        assert_eq!(section, "OLD");
    }

    #[test]
    fn header_after_options_closes_and_applies() {
        let mut section = String::new();
        let qs = parse_lines(
            &split_lines("1. Q\nA] a\nSECTION-NEXT\n2. R\nAns [B]"),
            &mut section,
            0,
        );
        assert_eq!(qs.len(), 2);
        assert_eq!(qs[0].section, "");
        assert_eq!(qs[0].answer, None);
        assert_eq!(qs[1].section, "NEXT");
        assert_eq!(section, "NEXT");
    }

    #[test]
    fn section_is_fixed_at_question_start() {
        let mut section = String::from("FIRST");
        let qs = parse_lines(&split_lines("1. Q\nA] a\nAns [A]\nSECTION-SECOND"), &mut section, 0);
        assert_eq!(qs[0].section, "FIRST");
        assert_eq!(section, "SECOND");
    }

    #[test]
    fn duplicate_numbers_are_not_validated() {
        let qs = parse("3. a\nAns [A]\n3. b\nAns [B]\n1. c\nAns [C]");
        assert_eq!(
            qs.iter().map(|q| q.question_number).collect::<Vec<_>>(),
            vec![3, 3, 1]
        );
    }

    #[test]
    fn answer_letter_need_not_be_an_option_key() {
        let qs = parse("1. Q\nA] a\nB] b\nAns [D]");
        assert_eq!(qs[0].answer, Some('D'));
        assert!(qs[0].option('D').is_none());
    }

    #[test]
    fn physics_fixture() {
        let text = std::fs::read_to_string("tests/fixtures/physics_page.txt").unwrap();
        let mut section = String::new();
        let qs = parse_lines(&split_lines(&text), &mut section, 3);
        assert_eq!(qs.len(), 3);
        assert!(qs.iter().all(|q| q.section == "PHYSICS" && q.page == 3));
        assert_eq!(
            qs[0].question_text,
            "A ball is dropped from rest. Ignoring air resistance, what is its acceleration?"
        );
        assert_eq!(qs[0].answer, Some('B'));
        assert!(qs[1].options.is_empty());
        assert_eq!(qs[1].answer, Some('A'));
        assert_eq!(qs[2].answer, None);
        assert_eq!(qs[2].options.len(), 4);
    }
}
