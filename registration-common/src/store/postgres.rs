use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use tracing::{debug, error};

use super::{StoreError, SubmissionStore, SubscriptionRecord};

/// A `SubmissionStore` backed by the `inschrijving` and `team` tables in PostgreSQL.
#[derive(Clone)]
pub struct PgSubmissionStore {
    pool: PgPool,
}

impl PgSubmissionStore {
    pub async fn new(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|error| StoreError::ConnectionError { error })?;

        Ok(Self { pool })
    }

    pub fn new_from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the tables if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl SubmissionStore for PgSubmissionStore {
    async fn subscription_ids(&self) -> Result<Vec<String>, StoreError> {
        sqlx::query_scalar("SELECT inschrijfnummer FROM inschrijving")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::query("SELECT inschrijving"))
    }

    async fn insert_submission(&self, record: &SubscriptionRecord<'_>) -> Result<i64, StoreError> {
        let submission = record.submission;

        // Dropping the transaction without a commit rolls it back.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| StoreError::ConnectionError { error })?;

        let id: i64 = sqlx::query_scalar(
            r#"
INSERT INTO inschrijving
    (inschrijfnummer, jaar, voornaam, achternaam, email, telefoon, vereniging, taal, inschrijfdatum)
VALUES
    ($1, $2, $3, $4, $5, $6, $7, $8, $9)
RETURNING id
            "#,
        )
        .bind(record.subscription_id.to_string())
        .bind(record.year)
        .bind(&submission.name)
        .bind(&submission.surname)
        .bind(&submission.email)
        .bind(&submission.phone)
        .bind(&submission.club)
        .bind(record.language.code())
        .bind(submission.submitted_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(StoreError::query("INSERT inschrijving"))?;

        if submission.teams.is_empty() {
            tx.commit().await.map_err(StoreError::query("COMMIT"))?;
            return Ok(id);
        }

        let mut teams = QueryBuilder::<Postgres>::new(
            "INSERT INTO team (inschrijvingsid, teamnaam, type, niveau) ",
        );
        teams.push_values(&submission.teams, |mut row, team| {
            row.push_bind(id)
                .push_bind(team.name.clone())
                .push_bind(team.kind.clone())
                .push_bind(team.level.clone());
        });

        let inserted = teams.build().execute(&mut *tx).await;
        if let Err(error) = inserted {
            error!(
                subscription_id = %record.subscription_id,
                "team insert failed, rolling back: {}", error
            );
            if let Err(rollback_error) = tx.rollback().await {
                // The transaction is rolled back when the connection drops.
                error!(
                    subscription_id = %record.subscription_id,
                    "rollback failed: {}", rollback_error
                );
            }
            return Err(StoreError::QueryError {
                command: "INSERT team".to_owned(),
                error,
            });
        }

        tx.commit().await.map_err(StoreError::query("COMMIT"))?;

        debug!(id, subscription_id = %record.subscription_id, "stored submission");

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{DateTime, Utc};

    use crate::form::{Submission, Team};
    use crate::message::Language;
    use crate::subscription_id::SubscriptionId;

    fn submission(teams: Vec<Team>) -> Submission {
        Submission {
            club: "SBC2000".to_owned(),
            name: "Anna".to_owned(),
            surname: "de Vries".to_owned(),
            email: "anna@example.com".to_owned(),
            phone: "0612345678".to_owned(),
            submitted_at: DateTime::from_timestamp(1712345678, 0).unwrap(),
            teams,
        }
    }

    fn team(name: &str) -> Team {
        Team {
            name: name.to_owned(),
            kind: "Heren".to_owned(),
            level: "Bond 2".to_owned(),
        }
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn inserts_submission_and_teams(db: PgPool) {
        let store = PgSubmissionStore::new_from_pool(db.clone());
        let submission = submission(vec![team("U16"), team("U18")]);
        let subscription_id: SubscriptionId = "004711".parse().unwrap();

        let id = store
            .insert_submission(&SubscriptionRecord {
                subscription_id,
                year: 2024,
                language: Language::English,
                submission: &submission,
            })
            .await
            .expect("failed to insert submission");

        let (number, year, name, surname, email, phone, club, language, submitted_at): (
            String,
            i32,
            String,
            String,
            String,
            String,
            String,
            String,
            DateTime<Utc>,
        ) = sqlx::query_as(
            "SELECT inschrijfnummer, jaar, voornaam, achternaam, email, telefoon, vereniging, taal, inschrijfdatum FROM inschrijving WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&db)
        .await
        .unwrap();

        assert_eq!(number, "004711");
        assert_eq!(year, 2024);
        assert_eq!(name, "Anna");
        assert_eq!(surname, "de Vries");
        assert_eq!(email, "anna@example.com");
        assert_eq!(phone, "0612345678");
        assert_eq!(club, "SBC2000");
        assert_eq!(language, "EN");
        assert_eq!(submitted_at, submission.submitted_at);

        let teams: Vec<(i64, String, String, String)> = sqlx::query_as(
            "SELECT inschrijvingsid, teamnaam, type, niveau FROM team ORDER BY id",
        )
        .fetch_all(&db)
        .await
        .unwrap();

        assert_eq!(
            teams,
            vec![
                (id, "U16".to_owned(), "Heren".to_owned(), "Bond 2".to_owned()),
                (id, "U18".to_owned(), "Heren".to_owned(), "Bond 2".to_owned()),
            ]
        );

        let ids = store.subscription_ids().await.unwrap();
        assert_eq!(ids, vec!["004711".to_owned()]);
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn teams_reference_their_own_submission(db: PgPool) {
        let store = PgSubmissionStore::new_from_pool(db.clone());
        let first = submission(vec![team("First")]);
        let second = submission(vec![team("Second")]);

        let first_id = store
            .insert_submission(&SubscriptionRecord {
                subscription_id: "000001".parse().unwrap(),
                year: 2024,
                language: Language::Dutch,
                submission: &first,
            })
            .await
            .unwrap();
        let second_id = store
            .insert_submission(&SubscriptionRecord {
                subscription_id: "000002".parse().unwrap(),
                year: 2024,
                language: Language::Dutch,
                submission: &second,
            })
            .await
            .unwrap();

        assert_ne!(first_id, second_id);

        let owner: i64 =
            sqlx::query_scalar("SELECT inschrijvingsid FROM team WHERE teamnaam = 'Second'")
                .fetch_one(&db)
                .await
                .unwrap();
        assert_eq!(owner, second_id);
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn failed_team_insert_rolls_back_submission(db: PgPool) {
        let store = PgSubmissionStore::new_from_pool(db.clone());
        // The team table rejects empty names, so the second insert fails after
        // the submission row was written in the same transaction.
        let submission = submission(vec![team("U16"), team("")]);

        let result = store
            .insert_submission(&SubscriptionRecord {
                subscription_id: "123456".parse().unwrap(),
                year: 2024,
                language: Language::Dutch,
                submission: &submission,
            })
            .await;

        assert!(matches!(
            result,
            Err(StoreError::QueryError { ref command, .. }) if command == "INSERT team"
        ));

        let submissions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inschrijving")
            .fetch_one(&db)
            .await
            .unwrap();
        let teams: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM team")
            .fetch_one(&db)
            .await
            .unwrap();

        assert_eq!(submissions, 0);
        assert_eq!(teams, 0);
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn lost_connection_reports_team_insert_error(db: PgPool) {
        // Kill the connection from inside the team insert, so the rollback
        // that follows fails as well.
        sqlx::query(
            r#"
CREATE FUNCTION terminate_own_backend() RETURNS trigger AS $$
BEGIN
    PERFORM pg_terminate_backend(pg_backend_pid());
    RETURN NEW;
END;
$$ LANGUAGE plpgsql
            "#,
        )
        .execute(&db)
        .await
        .unwrap();
        sqlx::query(
            "CREATE TRIGGER terminate_on_team_insert BEFORE INSERT ON team \
             FOR EACH ROW EXECUTE FUNCTION terminate_own_backend()",
        )
        .execute(&db)
        .await
        .unwrap();

        let store = PgSubmissionStore::new_from_pool(db.clone());
        let submission = submission(vec![team("U16")]);

        let result = store
            .insert_submission(&SubscriptionRecord {
                subscription_id: "654321".parse().unwrap(),
                year: 2024,
                language: Language::Dutch,
                submission: &submission,
            })
            .await;

        assert!(matches!(
            result,
            Err(StoreError::QueryError { ref command, .. }) if command == "INSERT team"
        ));

        let submissions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inschrijving")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(submissions, 0);
    }
}
