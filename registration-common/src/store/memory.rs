use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{StoreError, SubmissionStore, SubscriptionRecord};

/// Steps of a transaction, in the order the store saw them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionEvent {
    Begin,
    InsertSubmission { id: i64, subscription_id: String },
    InsertTeam { submission_id: i64, name: String },
    Commit,
    Rollback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRow {
    pub id: i64,
    pub subscription_id: String,
    pub year: i32,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub phone: String,
    pub club: String,
    pub language: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamRow {
    pub submission_id: i64,
    pub name: String,
    pub kind: String,
    pub level: String,
}

#[derive(Default)]
struct Tables {
    stored_ids: Vec<String>,
    submissions: Vec<SubmissionRow>,
    teams: Vec<TeamRow>,
    sequence: i64,
    journal: Vec<TransactionEvent>,
    fail_team_inserts: bool,
}

/// A `SubmissionStore` keeping committed rows in memory.
///
/// Rows of a transaction are staged and only become visible on commit. Every
/// step is recorded in a journal, and team inserts can be made to fail, which
/// makes the rollback path observable without a database.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds the given subscription ids.
    pub fn with_subscription_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::default();
        store.lock().stored_ids = ids.into_iter().map(Into::into).collect();
        store
    }

    /// Make every following team insert fail until switched off again.
    pub fn fail_team_inserts(&self, fail: bool) {
        self.lock().fail_team_inserts = fail;
    }

    pub fn submissions(&self) -> Vec<SubmissionRow> {
        self.lock().submissions.clone()
    }

    pub fn teams(&self) -> Vec<TeamRow> {
        self.lock().teams.clone()
    }

    pub fn journal(&self) -> Vec<TransactionEvent> {
        self.lock().journal.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().expect("poisoned MemoryStore mutex")
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn subscription_ids(&self) -> Result<Vec<String>, StoreError> {
        let tables = self.lock();
        Ok(tables
            .stored_ids
            .iter()
            .cloned()
            .chain(tables.submissions.iter().map(|s| s.subscription_id.clone()))
            .collect())
    }

    async fn insert_submission(&self, record: &SubscriptionRecord<'_>) -> Result<i64, StoreError> {
        let mut tables = self.lock();
        let submission = record.submission;

        tables.journal.push(TransactionEvent::Begin);

        // Like a database sequence, a rolled back insert still consumes its id.
        tables.sequence += 1;
        let id = tables.sequence;
        let row = SubmissionRow {
            id,
            subscription_id: record.subscription_id.to_string(),
            year: record.year,
            name: submission.name.clone(),
            surname: submission.surname.clone(),
            email: submission.email.clone(),
            phone: submission.phone.clone(),
            club: submission.club.clone(),
            language: record.language.code().to_owned(),
            submitted_at: submission.submitted_at,
        };
        tables.journal.push(TransactionEvent::InsertSubmission {
            id,
            subscription_id: row.subscription_id.clone(),
        });

        let mut staged_teams = Vec::with_capacity(submission.teams.len());
        for team in &submission.teams {
            if tables.fail_team_inserts {
                tables.journal.push(TransactionEvent::Rollback);
                return Err(StoreError::Injected(format!(
                    "team insert failed for {}",
                    team.name
                )));
            }
            tables.journal.push(TransactionEvent::InsertTeam {
                submission_id: id,
                name: team.name.clone(),
            });
            staged_teams.push(TeamRow {
                submission_id: id,
                name: team.name.clone(),
                kind: team.kind.clone(),
                level: team.level.clone(),
            });
        }

        tables.submissions.push(row);
        tables.teams.extend(staged_teams);
        tables.journal.push(TransactionEvent::Commit);

        Ok(id)
    }
}
