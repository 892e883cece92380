use async_trait::async_trait;
use thiserror::Error;

use crate::form::Submission;
use crate::message::Language;
use crate::subscription_id::SubscriptionId;

pub mod memory;
pub mod postgres;

/// Enumeration of errors for operations with a `SubmissionStore`.
/// Errors can originate from sqlx and are wrapped by us to provide additional context.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("connection failed with: {error}")]
    ConnectionError { error: sqlx::Error },
    #[error("{command} query failed with: {error}")]
    QueryError { command: String, error: sqlx::Error },
    #[error("migration failed with: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    /// Raised only by `MemoryStore` when told to fail its team inserts.
    #[error("{0}")]
    Injected(String),
}

impl StoreError {
    pub(crate) fn query(command: &str) -> impl FnOnce(sqlx::Error) -> Self + '_ {
        move |error| StoreError::QueryError {
            command: command.to_owned(),
            error,
        }
    }
}

/// Everything written for one submission: the parent row values and its teams.
#[derive(Debug, Clone, Copy)]
pub struct SubscriptionRecord<'a> {
    pub subscription_id: SubscriptionId,
    pub year: i32,
    pub language: Language,
    pub submission: &'a Submission,
}

/// Durable storage of submissions.
#[async_trait]
pub trait SubmissionStore {
    /// Every subscription id stored so far.
    async fn subscription_ids(&self) -> Result<Vec<String>, StoreError>;

    /// Insert the submission row and one row per team in a single transaction
    /// and return the generated key of the submission row.
    ///
    /// Team rows reference the key read back from the submission insert. On
    /// any error the whole transaction is rolled back.
    async fn insert_submission(&self, record: &SubscriptionRecord<'_>) -> Result<i64, StoreError>;
}
