//! QuestionForm builder.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::FormError;

/// Default namespace of QuestionForm documents.
pub const QUESTION_FORM_NAMESPACE: &str =
    "http://mechanicalturk.amazonaws.com/AWSMechanicalTurkDataSchemas/2017-11-06/QuestionForm.xsd";

/// Largest accepted `Question` parameter, in characters.
pub const MAX_QUESTION_LEN: usize = 131_072;

/// Selection identifiers run from `a` to `z`.
pub const MAX_CHOICES: usize = 26;

/// Prompt shown above every multiple-choice question.
const CHOICE_PROMPT: &str = "Choose one:";

/// Selection identifier for the choice at `index` (`0 -> 'a'`).
///
/// Returns `None` past the last letter.
pub fn selection_identifier(index: usize) -> Option<char> {
    if index < MAX_CHOICES {
        Some((b'a' + index as u8) as char)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Element {
    Overview { title: String, text: String },
    MultipleChoice { identifier: String, choices: Vec<String> },
}

/// A QuestionForm document under construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionForm {
    elements: Vec<Element>,
}

impl QuestionForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an overview block with a title and body text.
    pub fn add_overview(&mut self, title: impl Into<String>, text: impl Into<String>) -> &mut Self {
        self.elements.push(Element::Overview {
            title: title.into(),
            text: text.into(),
        });
        self
    }

    /// Append a required single-selection question rendered as radio buttons.
    pub fn add_multiple_choice_question<I, S>(
        &mut self,
        identifier: impl Into<String>,
        choices: I,
    ) -> Result<&mut Self, FormError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let identifier = identifier.into();
        if identifier.trim().is_empty() {
            return Err(FormError::EmptyIdentifier);
        }

        let choices: Vec<String> = choices.into_iter().map(Into::into).collect();
        if choices.len() < 2 || choices.len() > MAX_CHOICES {
            return Err(FormError::ChoiceCount {
                identifier,
                count: choices.len(),
                max: MAX_CHOICES,
            });
        }

        self.elements.push(Element::MultipleChoice { identifier, choices });
        Ok(self)
    }

    /// Number of questions in the form.
    pub fn question_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|e| matches!(e, Element::MultipleChoice { .. }))
            .count()
    }

    /// Serialize the form to its XML representation.
    pub fn to_xml(&self) -> Result<String, FormError> {
        let mut writer = Writer::new(Vec::new());

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(FormError::write)?;
        writer
            .write_event(Event::Start(
                BytesStart::new("QuestionForm").with_attributes([("xmlns", QUESTION_FORM_NAMESPACE)]),
            ))
            .map_err(FormError::write)?;

        for element in &self.elements {
            match element {
                Element::Overview { title, text } => {
                    open(&mut writer, "Overview")?;
                    text_element(&mut writer, "Title", title)?;
                    text_element(&mut writer, "Text", text)?;
                    close(&mut writer, "Overview")?;
                }
                Element::MultipleChoice { identifier, choices } => {
                    write_multiple_choice(&mut writer, identifier, choices)?;
                }
            }
        }

        close(&mut writer, "QuestionForm")?;

        let xml = String::from_utf8(writer.into_inner()).map_err(FormError::write)?;
        if xml.len() > MAX_QUESTION_LEN {
            return Err(FormError::TooLarge {
                len: xml.len(),
                max: MAX_QUESTION_LEN,
            });
        }
        Ok(xml)
    }
}

fn write_multiple_choice(
    writer: &mut Writer<Vec<u8>>,
    identifier: &str,
    choices: &[String],
) -> Result<(), FormError> {
    open(writer, "Question")?;
    text_element(writer, "QuestionIdentifier", identifier)?;
    text_element(writer, "IsRequired", "true")?;

    open(writer, "QuestionContent")?;
    text_element(writer, "Text", CHOICE_PROMPT)?;
    close(writer, "QuestionContent")?;

    open(writer, "AnswerSpecification")?;
    open(writer, "SelectionAnswer")?;
    text_element(writer, "StyleSuggestion", "radiobutton")?;
    open(writer, "Selections")?;
    for (index, choice) in choices.iter().enumerate() {
        // Choice count is validated on insert.
        let Some(letter) = selection_identifier(index) else {
            break;
        };
        open(writer, "Selection")?;
        text_element(writer, "SelectionIdentifier", &letter.to_string())?;
        text_element(writer, "Text", choice)?;
        close(writer, "Selection")?;
    }
    close(writer, "Selections")?;
    close(writer, "SelectionAnswer")?;
    close(writer, "AnswerSpecification")?;

    close(writer, "Question")
}

fn open(writer: &mut Writer<Vec<u8>>, name: &str) -> Result<(), FormError> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(FormError::write)
}

fn close(writer: &mut Writer<Vec<u8>>, name: &str) -> Result<(), FormError> {
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(FormError::write)
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<(), FormError> {
    open(writer, name)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(FormError::write)?;
    close(writer, name)
}
