use chrono::{DateTime, SecondsFormat, Utc};
use movely_core::domain::draft::{DraftId, DraftSource, ServiceRequestDraft};
use movely_core::drafts::{DraftError, DraftRepository};
use serde_json::Value;
use sqlx::{sqlite::SqliteRow, Row};

use super::RepositoryError;
use crate::DbPool;

pub struct SqlDraftRepository {
    pool: DbPool,
}

impl SqlDraftRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl DraftRepository for SqlDraftRepository {
    async fn find(&self, id: &DraftId) -> Result<Option<ServiceRequestDraft>, DraftError> {
        let row = sqlx::query(
            "SELECT
                id,
                created_at,
                updated_at,
                revision,
                current_step,
                payload_json
             FROM service_request_draft
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(draft_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<ServiceRequestDraft>, DraftError> {
        let rows = sqlx::query(
            "SELECT
                id,
                created_at,
                updated_at,
                revision,
                current_step,
                payload_json
             FROM service_request_draft
             ORDER BY updated_at DESC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        let mut drafts = Vec::with_capacity(rows.len());
        for row in rows {
            match draft_from_row(row) {
                Ok(draft) => drafts.push(draft),
                Err(DraftError::Corrupt { id, reason }) => tracing::warn!(
                    event_name = "draft.corrupt",
                    draft_id = %id,
                    reason = %reason,
                    "skipping corrupt draft row; load or discard it by id"
                ),
                Err(error) => return Err(error),
            }
        }
        Ok(drafts)
    }

    async fn upsert(&self, draft: ServiceRequestDraft) -> Result<(), DraftError> {
        let revision = i64::try_from(draft.revision).map_err(|_| {
            RepositoryError::Decode(format!("revision {} exceeds storage range", draft.revision))
        })?;
        let current_step = i64::try_from(draft.current_step).map_err(|_| {
            RepositoryError::Decode(format!("step {} exceeds storage range", draft.current_step))
        })?;
        let payload_json = Value::Object(draft.payload).to_string();

        sqlx::query(
            "INSERT INTO service_request_draft (
                id,
                created_at,
                updated_at,
                revision,
                current_step,
                payload_json
             ) VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                updated_at = excluded.updated_at,
                revision = excluded.revision,
                current_step = excluded.current_step,
                payload_json = excluded.payload_json",
        )
        .bind(&draft.id.0)
        .bind(encode_timestamp(&draft.created_at))
        .bind(encode_timestamp(&draft.updated_at))
        .bind(revision)
        .bind(current_step)
        .bind(payload_json)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        tracing::debug!(
            event_name = "db.draft_upserted",
            draft_id = %draft.id,
            revision = draft.revision,
            "draft row written"
        );
        Ok(())
    }

    async fn delete(&self, id: &DraftId) -> Result<bool, DraftError> {
        let result = sqlx::query("DELETE FROM service_request_draft WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(result.rows_affected() > 0)
    }
}

/// Fixed-width so lexical order in SQL matches chronological order.
fn encode_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_timestamp(id: &DraftId, column: &str, raw: &str) -> Result<DateTime<Utc>, DraftError> {
    DateTime::parse_from_rfc3339(raw).map(|value| value.with_timezone(&Utc)).map_err(|error| {
        DraftError::Corrupt { id: id.clone(), reason: format!("`{column}` is not a timestamp: {error}") }
    })
}

fn draft_from_row(row: SqliteRow) -> Result<ServiceRequestDraft, DraftError> {
    let id = DraftId(row.try_get::<String, _>("id").map_err(RepositoryError::from)?);
    let created_at: String = row.try_get("created_at").map_err(RepositoryError::from)?;
    let updated_at: String = row.try_get("updated_at").map_err(RepositoryError::from)?;
    let revision: i64 = row.try_get("revision").map_err(RepositoryError::from)?;
    let current_step: i64 = row.try_get("current_step").map_err(RepositoryError::from)?;
    let payload_json: String = row.try_get("payload_json").map_err(RepositoryError::from)?;

    let payload = match serde_json::from_str::<Value>(&payload_json) {
        Ok(Value::Object(payload)) => payload,
        Ok(_) => {
            return Err(DraftError::Corrupt { id, reason: "payload is not a JSON object".to_owned() })
        }
        Err(error) => {
            return Err(DraftError::Corrupt { id, reason: format!("payload is not valid JSON: {error}") })
        }
    };

    Ok(ServiceRequestDraft {
        created_at: decode_timestamp(&id, "created_at", &created_at)?,
        updated_at: decode_timestamp(&id, "updated_at", &updated_at)?,
        source: DraftSource::Local,
        revision: u64::try_from(revision).unwrap_or_default(),
        current_step: usize::try_from(current_step).unwrap_or_default(),
        payload,
        id,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use movely_core::domain::draft::{DraftId, DraftSource, FormPayload, ServiceRequestDraft};
    use movely_core::drafts::{DraftError, DraftRepository};
    use serde_json::json;

    use super::SqlDraftRepository;
    use crate::{connect_with_settings, migrations::run_pending};

    async fn repository() -> SqlDraftRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrations");
        SqlDraftRepository::new(pool)
    }

    fn payload(value: serde_json::Value) -> FormPayload {
        value.as_object().cloned().expect("object payload")
    }

    fn draft(id: &str, minute: u32) -> ServiceRequestDraft {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 9, minute, 0).single().expect("timestamp");
        let mut draft = ServiceRequestDraft::new(
            DraftId(id.to_owned()),
            payload(json!({
                "request_type": "instant",
                "pickup_location": "1 High Street",
                "items": [{ "name": "sofa", "quantity": 1 }]
            })),
            at,
        );
        draft.revision = 1;
        draft.current_step = 1;
        draft
    }

    #[tokio::test]
    async fn saved_draft_round_trips_with_step_and_payload() {
        let repo = repository().await;
        let mut original = draft("DRAFT-1", 0);
        original.updated_at += Duration::nanoseconds(123_456_789);

        repo.upsert(original.clone()).await.expect("upsert");
        let loaded = repo.find(&original.id).await.expect("find").expect("stored draft");

        assert_eq!(loaded, original.with_source(DraftSource::Local));
    }

    #[tokio::test]
    async fn upsert_replaces_existing_row_but_keeps_created_at() {
        let repo = repository().await;
        let first = draft("DRAFT-1", 0);
        repo.upsert(first.clone()).await.expect("first upsert");

        let mut second = draft("DRAFT-1", 5);
        second.created_at = second.updated_at;
        second.revision = 2;
        second.current_step = 2;
        second.payload.insert("destination".to_owned(), json!("9 Quay Road"));
        repo.upsert(second.clone()).await.expect("second upsert");

        let loaded = repo.find(&first.id).await.expect("find").expect("stored draft");
        assert_eq!(loaded.created_at, first.created_at);
        assert_eq!(loaded.updated_at, second.updated_at);
        assert_eq!(loaded.revision, 2);
        assert_eq!(loaded.current_step, 2);
        assert_eq!(loaded.payload.get("destination"), Some(&json!("9 Quay Road")));
        assert_eq!(repo.list().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn list_orders_most_recent_first() {
        let repo = repository().await;
        repo.upsert(draft("DRAFT-OLD", 0)).await.expect("upsert old");
        repo.upsert(draft("DRAFT-NEW", 30)).await.expect("upsert new");
        repo.upsert(draft("DRAFT-MID", 10)).await.expect("upsert mid");

        let ids: Vec<String> =
            repo.list().await.expect("list").into_iter().map(|draft| draft.id.0).collect();
        assert_eq!(ids, vec!["DRAFT-NEW", "DRAFT-MID", "DRAFT-OLD"]);
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_was_removed() {
        let repo = repository().await;
        let stored = draft("DRAFT-1", 0);
        repo.upsert(stored.clone()).await.expect("upsert");

        assert!(repo.delete(&stored.id).await.expect("delete"));
        assert!(!repo.delete(&stored.id).await.expect("delete again"));
        assert_eq!(repo.find(&stored.id).await.expect("find"), None);
    }

    #[tokio::test]
    async fn non_object_payload_is_reported_as_corrupt() {
        let repo = repository().await;
        sqlx::query(
            "INSERT INTO service_request_draft
                (id, created_at, updated_at, revision, current_step, payload_json)
             VALUES ('DRAFT-BAD', '2026-03-14T09:00:00.000000000Z', '2026-03-14T09:00:00.000000000Z', 1, 0, '[1, 2]')",
        )
        .execute(repo.pool())
        .await
        .expect("insert raw row");

        let error = repo.find(&DraftId("DRAFT-BAD".to_owned())).await.expect_err("corrupt row");
        assert!(matches!(error, DraftError::Corrupt { ref reason, .. } if reason.contains("JSON object")));
    }

    #[tokio::test]
    async fn list_skips_corrupt_rows_and_keeps_the_rest() {
        let repo = repository().await;
        repo.upsert(draft("DRAFT-GOOD", 5)).await.expect("upsert good");
        sqlx::query(
            "INSERT INTO service_request_draft
                (id, created_at, updated_at, revision, current_step, payload_json)
             VALUES ('DRAFT-BAD', '2026-03-14T09:00:00.000000000Z', '2026-03-14T09:00:00.000000000Z', 1, 0, '{not json')",
        )
        .execute(repo.pool())
        .await
        .expect("insert raw row");

        let ids: Vec<String> =
            repo.list().await.expect("list").into_iter().map(|draft| draft.id.0).collect();
        assert_eq!(ids, vec!["DRAFT-GOOD"]);

        let bad = DraftId("DRAFT-BAD".to_owned());
        assert!(matches!(repo.find(&bad).await, Err(DraftError::Corrupt { .. })));
        assert!(repo.delete(&bad).await.expect("corrupt rows can still be discarded"));
    }

    #[tokio::test]
    async fn missing_table_surfaces_as_storage_error() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        let repo = SqlDraftRepository::new(pool);

        let error = repo.list().await.expect_err("table is missing");
        assert!(matches!(error, DraftError::Storage(_)));
    }
}
