//! # mtools-question-form
//!
//! Programmatic construction of marketplace `QuestionForm` documents and
//! parsing of the `QuestionFormAnswers` payloads workers submit.
//!
//! Multiple-choice selections are identified by lowercase letters in
//! choice order: the first choice is `a`, the second `b`, and so on.

mod answers;
mod error;
mod form;

pub use answers::{parse_answers, Answer, ANSWERS_NAMESPACE};
pub use error::FormError;
pub use form::{
    selection_identifier, QuestionForm, MAX_CHOICES, MAX_QUESTION_LEN, QUESTION_FORM_NAMESPACE,
};
