use std::sync::Arc;
use std::time::Instant;

use chrono::{Datelike, Utc};
use tracing::info;

use crate::form::Submission;
use crate::message::Language;
use crate::store::{StoreError, SubmissionStore, SubscriptionRecord};
use crate::subscription_id::{SubscriptionId, SubscriptionIds};

/// A submission that was committed to the store.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct StoredSubmission {
    pub id: i64,
    pub subscription_id: SubscriptionId,
}

/// Assigns subscription ids and persists submissions.
///
/// Owns the set of issued subscription ids, so there must be only one writer
/// per store.
pub struct SubmissionWriter {
    store: Arc<dyn SubmissionStore + Send + Sync>,
    subscription_ids: SubscriptionIds,
}

impl SubmissionWriter {
    /// Load every stored subscription id before accepting submissions.
    pub async fn new(store: Arc<dyn SubmissionStore + Send + Sync>) -> Result<Self, StoreError> {
        let existing = store.subscription_ids().await?;
        let subscription_ids = SubscriptionIds::new(&existing);
        info!(
            loaded = subscription_ids.len(),
            "loaded existing subscription ids"
        );

        Ok(Self::with_subscription_ids(store, subscription_ids))
    }

    pub fn with_subscription_ids(
        store: Arc<dyn SubmissionStore + Send + Sync>,
        subscription_ids: SubscriptionIds,
    ) -> Self {
        Self {
            store,
            subscription_ids,
        }
    }

    /// Persist a submission under a fresh subscription id.
    ///
    /// The id stays reserved even if the store fails, so it is never handed
    /// out twice.
    pub async fn write(
        &mut self,
        submission: &Submission,
        language: Language,
    ) -> Result<StoredSubmission, StoreError> {
        let subscription_id = self.subscription_ids.next_id();

        // Season year, taken from the time of writing.
        let year = Utc::now().year();

        let start_time = Instant::now();
        let id = self
            .store
            .insert_submission(&SubscriptionRecord {
                subscription_id,
                year,
                language,
                submission,
            })
            .await?;
        metrics::histogram!("registration_store_duration_seconds")
            .record(start_time.elapsed().as_secs_f64());

        Ok(StoredSubmission {
            id,
            subscription_id,
        })
    }

    pub fn issued(&self) -> &SubscriptionIds {
        &self.subscription_ids
    }
}
