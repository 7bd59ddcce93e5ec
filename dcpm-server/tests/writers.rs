//! Database-backed tests for the entity writers and the audit trail.
//!
//! Run with: POSTGRES_HOST=localhost cargo test -p dcpm-server -- --ignored

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tower::ServiceExt;
use uuid::Uuid;

use dcpm_server::db::{
    AuditRepo, ClassificationRepo, Database, DbError, EntityType, IngestionRecord, IngestionRepo,
    NewClassification, NewIngestion, NewStorage, PayloadNormalizer, StorageRepo, TxStep,
};
use dcpm_server::http::{build_router, AppState};
use dcpm_server::models::{ClassificationLevel, JsonObject, Limit, SourceTag};
use dcpm_server::DatabaseConfig;

const SCHEMA: &str = include_str!("../sql/schema.sql");

/// Makes the audit insert fail for marked writes, so the writers' own
/// rollback path runs. Unmarked writes are unaffected.
const REJECT_MARKED_AUDIT: &str = r#"
CREATE OR REPLACE FUNCTION reject_marked_audit() RETURNS trigger AS $$
BEGIN
    IF NEW.metadata->>'source' = 'audit-reject'
        OR NEW.metadata->>'level' = 'audit-reject'
        OR (NEW.action = 'STORAGE_CREATED' AND EXISTS (
            SELECT 1 FROM ingestion_records
            WHERE id::text = NEW.metadata->>'ingestion_id'
              AND source = 'audit-reject-parent'))
    THEN
        RAISE EXCEPTION 'audit rejected for %', NEW.entity_id;
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

DROP TRIGGER IF EXISTS reject_marked_audit ON audit_logs;
CREATE TRIGGER reject_marked_audit BEFORE INSERT ON audit_logs
    FOR EACH ROW EXECUTE FUNCTION reject_marked_audit();
"#;

static SCHEMA_APPLIED: OnceCell<()> = OnceCell::const_new();

async fn test_db() -> Database {
    let db = Database::new(DatabaseConfig::from_env());
    SCHEMA_APPLIED
        .get_or_init(|| async {
            let mut session = db.acquire_session().await.unwrap();
            sqlx::raw_sql(SCHEMA).execute(&mut *session).await.unwrap();
            sqlx::raw_sql(REJECT_MARKED_AUDIT)
                .execute(&mut *session)
                .await
                .unwrap();
        })
        .await;
    db
}

/// Source tag unique to one test so concurrent tests don't see each other.
fn unique_source(prefix: &str) -> String {
    format!("{prefix}-{}", &Uuid::new_v4().simple().to_string()[..8])
}

fn object(value: Value) -> JsonObject {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

async fn count(db: &Database, sql: &str, id: Uuid) -> i64 {
    let mut session = db.acquire_session().await.unwrap();
    let (n,): (i64,) = sqlx::query_as(sql)
        .bind(id)
        .fetch_one(&mut *session)
        .await
        .unwrap();
    n
}

async fn audit_count(db: &Database, entity_id: Uuid) -> i64 {
    let mut session = db.acquire_session().await.unwrap();
    let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM audit_logs WHERE entity_id = $1")
        .bind(entity_id.to_string())
        .fetch_one(&mut *session)
        .await
        .unwrap();
    n
}

async fn ingest(db: &Database, source: &str) -> Uuid {
    IngestionRepo::new(db)
        .create(NewIngestion {
            source: SourceTag::new(source).unwrap(),
            payload: object(json!({"sensor": "s-1", "value": 42})),
            classification: object(json!({"hint": "telemetry"})),
        })
        .await
        .unwrap()
        .id
}

/// Storage audit entries that reference `ingestion_id`.
async fn storage_audit_count(db: &Database, ingestion_id: Uuid) -> i64 {
    count(
        db,
        "SELECT COUNT(*) FROM audit_logs \
         WHERE action = 'STORAGE_CREATED' AND (metadata->>'ingestion_id')::uuid = $1",
        ingestion_id,
    )
    .await
}

fn is_audit_rollback(err: &DbError) -> bool {
    matches!(
        err,
        DbError::TransactionFailure {
            step: TxStep::Audit,
            ..
        }
    )
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
#[ignore = "requires database"]
async fn ingestion_writes_record_and_one_audit_entry() {
    let db = test_db().await;
    let source = unique_source("sensor");

    let id = ingest(&db, &source).await;

    let record = IngestionRepo::new(&db).get_by_id(id).await.unwrap().unwrap();
    assert_eq!(record.source, source);
    assert_eq!(record.payload["value"], json!(42));

    let history = AuditRepo::new(&db)
        .list_for_entity(EntityType::Ingestion, &id.to_string())
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    let entry = &history[0];
    assert_eq!(entry.action, "INGESTION_CREATED");
    assert_eq!(entry.entity_type, "ingestion");
    assert_eq!(entry.entity_id, id.to_string());
    assert_eq!(entry.actor, Some(json!("system")));
    let metadata = entry.metadata.as_ref().unwrap();
    assert_eq!(metadata["source"], json!(source));
    assert_eq!(metadata["ingestion_id"], json!(id.to_string()));

    db.shutdown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn classification_requires_existing_ingestion() {
    let db = test_db().await;
    let missing = Uuid::new_v4();

    let err = ClassificationRepo::new(&db)
        .create(NewClassification {
            ingestion_id: missing,
            level: ClassificationLevel::new("confidential").unwrap(),
            tags: JsonObject::new(),
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DbError::ReferenceNotFound { resource: "ingestion", .. }
    ));
    assert_eq!(
        count(
            &db,
            "SELECT COUNT(*) FROM classification_records WHERE ingestion_id = $1",
            missing
        )
        .await,
        0
    );

    db.shutdown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn classification_and_storage_chain() {
    let db = test_db().await;
    let ingestion_id = ingest(&db, &unique_source("chain")).await;

    let classification = ClassificationRepo::new(&db)
        .create(NewClassification {
            ingestion_id,
            level: ClassificationLevel::new("restricted").unwrap(),
            tags: object(json!({"pii": true})),
        })
        .await
        .unwrap();
    assert_eq!(classification.level, "restricted");
    assert_eq!(audit_count(&db, classification.id).await, 1);

    let listed = ClassificationRepo::new(&db)
        .list_for_ingestion(ingestion_id)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, classification.id);

    let stored = StorageRepo::new(&db)
        .create(NewStorage {
            ingestion_id,
            classification_id: Some(classification.id),
        })
        .await
        .unwrap();
    assert_eq!(stored.classification_id, Some(classification.id));
    assert_eq!(stored.normalized_payload["sensor"], json!("s-1"));

    let history = AuditRepo::new(&db)
        .list_for_entity(EntityType::Storage, &stored.id.to_string())
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, "STORAGE_CREATED");

    db.shutdown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn storage_with_unknown_references_writes_nothing() {
    let db = test_db().await;
    let missing = Uuid::new_v4();

    let err = StorageRepo::new(&db)
        .create(NewStorage {
            ingestion_id: missing,
            classification_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::ReferenceNotFound { resource: "ingestion", .. }
    ));
    assert_eq!(
        count(
            &db,
            "SELECT COUNT(*) FROM storage_records WHERE ingestion_id = $1",
            missing
        )
        .await,
        0
    );
    assert_eq!(storage_audit_count(&db, missing).await, 0);

    let ingestion_id = ingest(&db, &unique_source("orphan")).await;
    let err = StorageRepo::new(&db)
        .create(NewStorage {
            ingestion_id,
            classification_id: Some(Uuid::new_v4()),
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::ReferenceNotFound { resource: "classification", .. }
    ));
    assert_eq!(
        count(
            &db,
            "SELECT COUNT(*) FROM storage_records WHERE ingestion_id = $1",
            ingestion_id
        )
        .await,
        0
    );
    assert_eq!(storage_audit_count(&db, ingestion_id).await, 0);

    db.shutdown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn failed_audit_rolls_back_each_writer() {
    let db = test_db().await;

    let err = IngestionRepo::new(&db)
        .create(NewIngestion {
            source: SourceTag::new("audit-reject").unwrap(),
            payload: object(json!({"x": 1})),
            classification: JsonObject::new(),
        })
        .await
        .unwrap_err();
    assert!(is_audit_rollback(&err), "unexpected error: {err:?}");
    let mut session = db.acquire_session().await.unwrap();
    let (rejected,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM ingestion_records WHERE source = 'audit-reject'")
            .fetch_one(&mut *session)
            .await
            .unwrap();
    drop(session);
    assert_eq!(rejected, 0);

    let ingestion_id = ingest(&db, &unique_source("rollback")).await;
    let err = ClassificationRepo::new(&db)
        .create(NewClassification {
            ingestion_id,
            level: ClassificationLevel::new("audit-reject").unwrap(),
            tags: JsonObject::new(),
        })
        .await
        .unwrap_err();
    assert!(is_audit_rollback(&err), "unexpected error: {err:?}");
    assert_eq!(
        count(
            &db,
            "SELECT COUNT(*) FROM classification_records WHERE ingestion_id = $1",
            ingestion_id
        )
        .await,
        0
    );

    let parent_id = ingest(&db, "audit-reject-parent").await;
    let err = StorageRepo::new(&db)
        .create(NewStorage {
            ingestion_id: parent_id,
            classification_id: None,
        })
        .await
        .unwrap_err();
    assert!(is_audit_rollback(&err), "unexpected error: {err:?}");
    assert_eq!(
        count(
            &db,
            "SELECT COUNT(*) FROM storage_records WHERE ingestion_id = $1",
            parent_id
        )
        .await,
        0
    );
    assert_eq!(storage_audit_count(&db, parent_id).await, 0);

    db.shutdown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn list_is_newest_first_and_bounded() {
    let db = test_db().await;
    let source = unique_source("order");

    let mut created = Vec::new();
    for _ in 0..3 {
        created.push(ingest(&db, &source).await);
    }

    let records = IngestionRepo::new(&db)
        .list(Limit::new(500).unwrap())
        .await
        .unwrap();
    let ours: Vec<Uuid> = records
        .iter()
        .filter(|r| r.source == source)
        .map(|r| r.id)
        .collect();
    created.reverse();
    assert_eq!(ours, created);

    let one = IngestionRepo::new(&db)
        .list(Limit::new(1).unwrap())
        .await
        .unwrap();
    assert_eq!(one.len(), 1);

    let audit = AuditRepo::new(&db).list(Limit::new(2).unwrap()).await.unwrap();
    assert!(audit.len() <= 2);
    if let [newer, older] = audit.as_slice() {
        assert!(newer.created_at >= older.created_at);
    }

    db.shutdown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn missing_ids_are_none() {
    let db = test_db().await;
    let missing = Uuid::new_v4();

    assert!(IngestionRepo::new(&db).get_by_id(missing).await.unwrap().is_none());
    assert!(ClassificationRepo::new(&db)
        .list_for_ingestion(missing)
        .await
        .unwrap()
        .is_empty());
    assert!(StorageRepo::new(&db).get_by_id(missing).await.unwrap().is_none());

    db.shutdown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn http_ingestion_round_trip() {
    let db = test_db().await;
    let app = build_router(AppState::new(db.clone()), false);
    let source = unique_source("http");

    let request = post_json(
        "/ingestion",
        json!({
            "source": source,
            "payload": {"reading": 7},
            "classification": {"hint": "none"}
        }),
    );
    let (status, created) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["ingestion_id"].as_str().unwrap().to_string();

    let (status, fetched) = send(app.clone(), get(&format!("/ingestion/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, history) = send(app.clone(), get(&format!("/audit/ingestion/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["action"], "INGESTION_CREATED");

    let (status, _) = send(app, get(&format!("/ingestion/{}", Uuid::new_v4()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    db.shutdown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn http_storage_with_unknown_ingestion_is_404() {
    let db = test_db().await;
    let app = build_router(AppState::new(db.clone()), false);
    let missing = Uuid::new_v4();

    let (status, body) = send(
        app.clone(),
        post_json("/storage/storage", json!({"ingestion_id": missing})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, listed) = send(app, get("/storage/storage?limit=500")).await;
    assert_eq!(status, StatusCode::OK);
    let missing = json!(missing.to_string());
    assert!(listed
        .as_array()
        .unwrap()
        .iter()
        .all(|record| record["ingestion_id"] != missing));

    db.shutdown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn http_storage_uses_configured_normalizer() {
    struct Redacting;

    impl PayloadNormalizer for Redacting {
        fn normalize(&self, ingestion: &IngestionRecord) -> JsonObject {
            ingestion
                .payload
                .keys()
                .map(|k| (k.clone(), json!("redacted")))
                .collect()
        }
    }

    let db = test_db().await;
    let state = AppState::new(db.clone()).with_normalizer(Arc::new(Redacting));
    let app = build_router(state, false);
    let ingestion_id = ingest(&db, &unique_source("redact")).await;

    let (status, body) = send(
        app,
        post_json("/storage/storage", json!({"ingestion_id": ingestion_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["normalized_payload"],
        json!({"sensor": "redacted", "value": "redacted"})
    );
    assert_eq!(body["classification_id"], Value::Null);

    db.shutdown().await;
}
