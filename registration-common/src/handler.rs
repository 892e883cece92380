use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::form::{parse_submission, FormLayout, ParseError};
use crate::message::Message;
use crate::store::StoreError;
use crate::writer::{StoredSubmission, SubmissionWriter};

/// Enumeration of errors that fail the handling of a form submission.
#[derive(Error, Debug)]
pub enum HandleError {
    #[error("invalid submission: {0}")]
    Parse(#[from] ParseError),
    #[error("failed to store submission: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, PartialEq, Eq)]
pub enum HandleOutcome {
    /// The message came from a form we do not handle.
    Ignored,
    Stored(StoredSubmission),
}

/// Turns sign-up form messages into stored submissions.
pub struct FormHandler {
    layout: FormLayout,
    // Held for the whole write, so drawing a subscription id and storing it
    // happen as one step even when requests are served concurrently.
    writer: Mutex<SubmissionWriter>,
}

impl FormHandler {
    pub fn new(writer: SubmissionWriter, layout: FormLayout) -> Self {
        Self {
            layout,
            writer: Mutex::new(writer),
        }
    }

    pub async fn handle(&self, message: &Message) -> Result<HandleOutcome, HandleError> {
        let Some(language) = message.language() else {
            info!(title = %message.title, "ignoring message");
            metrics::counter!("registration_submissions_total", "outcome" => "ignored")
                .increment(1);
            return Ok(HandleOutcome::Ignored);
        };

        let submission = parse_submission(&message.data, language, &self.layout).map_err(|e| {
            error!(title = %message.title, "invalid submission: {}", e);
            metrics::counter!("registration_submissions_total", "outcome" => "invalid")
                .increment(1);
            e
        })?;

        let stored = self
            .writer
            .lock()
            .await
            .write(&submission, language)
            .await
            .map_err(|e| {
                error!(club = %submission.club, "failed to store submission: {}", e);
                metrics::counter!("registration_submissions_total", "outcome" => "failed")
                    .increment(1);
                e
            })?;

        info!(
            club = %submission.club,
            teams = submission.teams.len(),
            language = %language,
            subscription_id = %stored.subscription_id,
            "stored submission"
        );
        metrics::counter!("registration_submissions_total", "outcome" => "stored").increment(1);

        Ok(HandleOutcome::Stored(stored))
    }
}
