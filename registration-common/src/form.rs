use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::message::Language;

/// Stored instead of a team type or level when an English term has no Dutch equivalent.
pub const UNKNOWN_TERM: &str = "Onbekend, check registration-handler";

/// Number of team slots on the sign-up form.
pub const TEAM_SLOTS: usize = 5;

/// Contact fields, in the order they are validated.
const CLUB: &str = "contact-club";
const NAME: &str = "contact-name";
const SURNAME: &str = "contact-surname";
const EMAIL: &str = "contact-email";
const PHONE: &str = "contact-phone";
const SUBMIT_TIME: &str = "submit-time";

/// Enumeration of errors that make a form submission invalid.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing required value: {0}")]
    MissingField(String),
    #[error("{0} is not a valid submit time")]
    InvalidSubmitTime(String),
    #[error("subscription contains no teams")]
    NoTeams,
}

/// One form-fill event tying a club and its contact person to one or more teams.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Submission {
    pub club: String,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub phone: String,
    pub submitted_at: DateTime<Utc>,
    pub teams: Vec<Team>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Team {
    pub name: String,
    pub kind: String,
    pub level: String,
}

/// First index used for `team{i}-*` keys.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum TeamIndexBase {
    #[default]
    Zero,
    One,
}

impl TeamIndexBase {
    fn first(&self) -> usize {
        match self {
            TeamIndexBase::Zero => 0,
            TeamIndexBase::One => 1,
        }
    }
}

impl FromStr for TeamIndexBase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0" => Ok(TeamIndexBase::Zero),
            "1" => Ok(TeamIndexBase::One),
            invalid => Err(format!("{invalid} is not a valid team index base")),
        }
    }
}

/// Where the submission timestamp comes from.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum SubmitTimeSource {
    /// The `submit-time` field of the payload.
    #[default]
    Payload,
    /// The time the submission is parsed.
    Now,
}

impl FromStr for SubmitTimeSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_ref() {
            "payload" => Ok(SubmitTimeSource::Payload),
            "now" => Ok(SubmitTimeSource::Now),
            invalid => Err(format!("{invalid} is not a valid submit time source")),
        }
    }
}

/// The payload variant the form plugin is configured to send.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct FormLayout {
    pub team_index_base: TeamIndexBase,
    pub submit_time: SubmitTimeSource,
}

/// Parse the flat payload of a sign-up form into a `Submission`.
///
/// Contact fields are validated in a fixed order and the first missing one is
/// reported. Teams without a name are skipped; English team types and levels
/// are translated to the Dutch vocabulary.
pub fn parse_submission(
    data: &HashMap<String, String>,
    language: Language,
    layout: &FormLayout,
) -> Result<Submission, ParseError> {
    let club = required(data, CLUB)?;
    let name = required(data, NAME)?;
    let surname = required(data, SURNAME)?;
    let email = required(data, EMAIL)?;
    let phone = required(data, PHONE)?;

    let submitted_at = match layout.submit_time {
        SubmitTimeSource::Now => Utc::now(),
        SubmitTimeSource::Payload => parse_submit_time(required(data, SUBMIT_TIME)?)?,
    };

    let first = layout.team_index_base.first();
    let teams: Vec<Team> = (first..first + TEAM_SLOTS)
        .filter_map(|index| parse_team(data, language, index))
        .collect();

    if teams.is_empty() {
        return Err(ParseError::NoTeams);
    }

    Ok(Submission {
        club: club.to_owned(),
        name: name.to_owned(),
        surname: surname.to_owned(),
        email: email.to_owned(),
        phone: phone.to_owned(),
        submitted_at,
        teams,
    })
}

fn required<'a>(data: &'a HashMap<String, String>, key: &str) -> Result<&'a str, ParseError> {
    match data.get(key) {
        Some(value) if !value.is_empty() => Ok(value.as_str()),
        _ => Err(ParseError::MissingField(key.to_owned())),
    }
}

fn optional<'a>(data: &'a HashMap<String, String>, key: &str) -> &'a str {
    data.get(key).map(String::as_str).unwrap_or_default()
}

/// The form plugin sends fractional epoch seconds ("1712345678.123"); only the
/// integral part is kept.
fn parse_submit_time(raw: &str) -> Result<DateTime<Utc>, ParseError> {
    let invalid = || ParseError::InvalidSubmitTime(raw.to_owned());

    let seconds = raw
        .split('.')
        .next()
        .ok_or_else(invalid)?
        .parse::<i64>()
        .map_err(|_| invalid())?;

    DateTime::from_timestamp(seconds, 0).ok_or_else(invalid)
}

fn parse_team(data: &HashMap<String, String>, language: Language, index: usize) -> Option<Team> {
    let name = optional(data, &format!("team{index}-name"));
    if name.is_empty() {
        return None;
    }

    let kind = optional(data, &format!("team{index}-type"));
    let level = optional(data, &format!("team{index}-level"));

    let (kind, level) = match language {
        Language::Dutch => (kind, level),
        Language::English => (translate_team_type(kind), translate_team_level(level)),
    };

    Some(Team {
        name: name.to_owned(),
        kind: kind.to_owned(),
        level: level.to_owned(),
    })
}

pub fn translate_team_type(english: &str) -> &'static str {
    match english {
        "Men" => "Heren",
        "Women" => "Dames",
        _ => UNKNOWN_TERM,
    }
}

pub fn translate_team_level(english: &str) -> &'static str {
    match english {
        "National" => "Bond 2",
        "Regional High" => "Regio 1",
        "Regional Low" => "Regio 3-4",
        _ => UNKNOWN_TERM,
    }
}
