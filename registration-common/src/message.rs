use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use serde_derive::Deserialize;

/// Title the form plugin sends for the Dutch sign-up form.
pub const DUTCH_FORM_TITLE: &str = "Inschrijven teams";
/// Title the form plugin sends for the English sign-up form.
pub const ENGLISH_FORM_TITLE: &str = "Sign up teams";

/// A form submission as delivered by the site's form plugin webhook.
///
/// Both fields are required and every value in `data` must be a JSON string:
/// anything else is rejected at decode time instead of being defaulted.
#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone)]
pub struct Message {
    pub title: String,
    pub data: HashMap<String, String>,
}

impl Message {
    /// The language of the form this message was submitted through, if it is
    /// one of the sign-up forms we handle.
    pub fn language(&self) -> Option<Language> {
        Language::from_title(&self.title)
    }
}

/// Language of the sign-up form. Only drives vocabulary translation of team
/// entries; the code is stored alongside the submission.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Language {
    Dutch,
    English,
}

impl Language {
    pub fn from_title(title: &str) -> Option<Self> {
        match title {
            DUTCH_FORM_TITLE => Some(Language::Dutch),
            ENGLISH_FORM_TITLE => Some(Language::English),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::Dutch => "NL",
            Language::English => "EN",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
