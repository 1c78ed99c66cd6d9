//! QuestionFormAnswers parsing.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::FormError;

/// Namespace of submitted answer documents.
pub const ANSWERS_NAMESPACE: &str =
    "http://mechanicalturk.amazonaws.com/AWSMechanicalTurkDataSchemas/2005-10-01/QuestionFormAnswers.xsd";

/// A worker's selection for one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    /// Storage key of the question, as written into `QuestionIdentifier`.
    pub question_key: i64,

    /// Selected identifier (`a`, `b`, ...).
    pub selection: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    QuestionIdentifier,
    SelectionIdentifier,
}

#[derive(Debug, Default)]
struct PartialAnswer {
    question: Option<String>,
    selection: Option<String>,
}

impl PartialAnswer {
    fn finish(self) -> Result<Answer, FormError> {
        let question = self
            .question
            .ok_or(FormError::IncompleteAnswer("QuestionIdentifier"))?;
        let selection = self
            .selection
            .ok_or(FormError::IncompleteAnswer("SelectionIdentifier"))?;
        let question_key = question
            .trim()
            .parse()
            .map_err(|_| FormError::InvalidQuestionIdentifier(question.clone()))?;

        Ok(Answer {
            question_key,
            selection: selection.trim().to_string(),
        })
    }
}

/// Parse every `Answer` element of a QuestionFormAnswers document.
///
/// Element names are matched without their namespace prefix.
pub fn parse_answers(xml: &str) -> Result<Vec<Answer>, FormError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut answers = Vec::new();
    let mut current: Option<PartialAnswer> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event().map_err(FormError::malformed)? {
            Event::Start(start) => match start.local_name().as_ref() {
                b"Answer" => current = Some(PartialAnswer::default()),
                b"QuestionIdentifier" => field = Some(Field::QuestionIdentifier),
                b"SelectionIdentifier" => field = Some(Field::SelectionIdentifier),
                _ => field = None,
            },
            Event::Text(text) => {
                if let (Some(answer), Some(field)) = (current.as_mut(), field) {
                    let value = text.unescape().map_err(FormError::malformed)?.into_owned();
                    match field {
                        Field::QuestionIdentifier => answer.question = Some(value),
                        Field::SelectionIdentifier => answer.selection = Some(value),
                    }
                }
            }
            Event::End(end) => {
                field = None;
                if end.local_name().as_ref() == b"Answer" {
                    if let Some(answer) = current.take() {
                        answers.push(answer.finish()?);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(answers)
}
