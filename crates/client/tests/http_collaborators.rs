use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use movely_client::{
    ApiClient, HttpPricingFactorSource, HttpSubmissionGateway, RemoteDraftRepository,
};
use movely_core::domain::draft::{DraftId, DraftSource, FormPayload, ServiceRequestDraft};
use movely_core::domain::pricing_factor::FactorCategory;
use movely_core::drafts::{DraftError, DraftRepository, DraftStore, InMemoryDraftRepository};
use movely_core::form::{SubmissionError, SubmissionGateway, SubmissionPayload};
use movely_core::pricing::{PricingContext, PricingFactorSource, RequestAttributes};
use movely_core::validation::assemble_request;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{json, Value};
use tokio::sync::Mutex;

const TOKEN: &str = "stub-token";

#[derive(Clone, Default)]
struct StubState {
    drafts: Arc<Mutex<HashMap<String, Value>>>,
    submissions: Arc<Mutex<Vec<Value>>>,
    submission_status: Arc<Mutex<Option<StatusCode>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == format!("Bearer {TOKEN}"))
}

async fn get_draft(
    State(state): State<StubState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    if id == "DRAFT-GARBLED" {
        return Ok(Json(json!({ "id": 17 })));
    }
    state.drafts.lock().await.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn list_drafts(State(state): State<StubState>) -> Json<Vec<Value>> {
    Json(state.drafts.lock().await.values().cloned().collect())
}

async fn put_draft(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(draft): Json<Value>,
) -> StatusCode {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    let Some(id) = draft.get("id").and_then(Value::as_str).map(str::to_owned) else {
        return StatusCode::UNPROCESSABLE_ENTITY;
    };
    state.drafts.lock().await.insert(id, draft);
    StatusCode::CREATED
}

async fn delete_draft(State(state): State<StubState>, Path(id): Path<String>) -> StatusCode {
    match state.drafts.lock().await.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

async fn post_request(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "missing token" })));
    }
    if let Some(status) = *state.submission_status.lock().await {
        return (status, Json(json!({ "error": "unavailable" })));
    }
    let mut submissions = state.submissions.lock().await;
    submissions.push(body);
    let id = format!("REQ-{}", submissions.len());
    (StatusCode::CREATED, Json(json!({ "id": id })))
}

async fn pricing_factors(Query(query): Query<HashMap<String, String>>) -> Json<Vec<Value>> {
    let factors = vec![
        json!({
            "id": "PF-VAN",
            "name": "Luton van",
            "category": "vehicle_type",
            "selector": "luton_van",
            "parameters": { "surcharge": "50" }
        }),
        json!({
            "id": "PF-PEAK",
            "name": "Peak hours",
            "category": "time",
            "parameters": { "peak_multiplier": "1.25" }
        }),
        json!({
            "id": "PF-RETIRED",
            "name": "Old weather rule",
            "category": "weather",
            "active": false,
            "parameters": { "multiplier": "2" }
        }),
        json!({
            "id": "PF-SEASON",
            "name": "Summer peak",
            "category": "seasonal",
            "parameters": { "multiplier": "1.1" }
        }),
        json!({
            "id": "PF-KM",
            "name": "Mileage",
            "category": "distance",
            "parameters": { "rate_per_km": "abc" }
        }),
    ];

    Json(
        factors
            .into_iter()
            .filter(|factor| match query.get("category") {
                Some(category) => factor["category"] == Value::String(category.clone()),
                None => true,
            })
            .collect(),
    )
}

async fn spawn_stub() -> (String, StubState) {
    let state = StubState::default();
    let router = Router::new()
        .route("/api/drafts", get(list_drafts).post(put_draft))
        .route("/api/drafts/{id}", get(get_draft).delete(delete_draft))
        .route("/api/requests", post(post_request))
        .route("/api/pricing-factors", get(pricing_factors))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let address = listener.local_addr().expect("stub address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub server");
    });

    (format!("http://{address}/api"), state)
}

fn client(base_url: &str) -> ApiClient {
    ApiClient::new(base_url, Duration::from_secs(5), Some(SecretString::from(TOKEN.to_owned())))
        .expect("api client")
}

fn payload(value: Value) -> FormPayload {
    value.as_object().cloned().expect("object payload")
}

fn draft(id: &str) -> ServiceRequestDraft {
    let at = Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).single().expect("timestamp");
    let mut draft = ServiceRequestDraft::new(
        DraftId(id.to_owned()),
        payload(json!({ "request_type": "instant", "pickup_location": "1 High Street" })),
        at,
    );
    draft.revision = 3;
    draft.current_step = 1;
    draft
}

fn submission() -> SubmissionPayload {
    let request = assemble_request(&payload(json!({
        "request_type": "instant",
        "service_type": "moving",
        "pickup_location": "1 High Street",
        "dropoff_location": "9 Quay Road",
        "items": [{ "name": "sofa", "quantity": 1, "weight_kg": 45 }],
        "preferred_date": "2026-11-07",
        "service_level": "standard",
        "contact_name": "Ada Byron",
        "contact_phone": "07700900123"
    })))
    .expect("assembled request");

    SubmissionPayload { draft_id: Some(DraftId("DRAFT-42".to_owned())), request, quote: None }
}

#[tokio::test]
async fn remote_drafts_round_trip_through_the_api() {
    let (base_url, _state) = spawn_stub().await;
    let remote = RemoteDraftRepository::new(client(&base_url));
    let original = draft("DRAFT-1");

    remote.upsert(original.clone()).await.expect("upsert");
    let found = remote.find(&original.id).await.expect("find").expect("stored remotely");

    assert_eq!(found.source, DraftSource::Remote);
    assert_eq!(found.payload, original.payload);
    assert_eq!(found.revision, 3);
    assert_eq!(remote.list().await.expect("list").len(), 1);

    assert!(remote.delete(&original.id).await.expect("delete"));
    assert!(!remote.delete(&original.id).await.expect("delete twice"));
    assert_eq!(remote.find(&original.id).await.expect("find after delete"), None);
}

#[tokio::test]
async fn undecodable_remote_draft_is_reported_as_corrupt() {
    let (base_url, _state) = spawn_stub().await;
    let remote = RemoteDraftRepository::new(client(&base_url));

    let error = remote.find(&DraftId("DRAFT-GARBLED".to_owned())).await.expect_err("garbled");

    assert!(matches!(error, DraftError::Corrupt { .. }));
}

#[tokio::test]
async fn unreachable_backend_is_unavailable_not_fatal() {
    let remote = RemoteDraftRepository::new(client("http://127.0.0.1:9/api"));
    let local = Arc::new(InMemoryDraftRepository::named("local"));
    let store = DraftStore::with_remote(local.clone(), Arc::new(remote));

    let report = store.save(draft("DRAFT-OFFLINE")).await.expect("local save still succeeds");

    assert!(!report.remote_synced);
    assert_eq!(store.pending_sync(), vec![DraftId("DRAFT-OFFLINE".to_owned())]);
    assert_eq!(local.len().await, 1);
}

#[tokio::test]
async fn missing_token_is_a_storage_error() {
    let (base_url, _state) = spawn_stub().await;
    let anonymous = ApiClient::new(&base_url, Duration::from_secs(5), None).expect("client");
    let remote = RemoteDraftRepository::new(anonymous);

    let error = remote.upsert(draft("DRAFT-ANON")).await.expect_err("unauthorized");

    assert!(matches!(error, DraftError::Storage(ref message) if message.contains("401")));
}

#[tokio::test]
async fn submission_returns_created_identifier_and_sends_bearer_token() {
    let (base_url, state) = spawn_stub().await;
    let gateway = HttpSubmissionGateway::new(client(&base_url));

    let receipt = gateway.submit(&submission()).await.expect("submitted");

    assert_eq!(receipt.id, "REQ-1");
    let submissions = state.submissions.lock().await;
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0]["draft_id"], json!("DRAFT-42"));
    assert!(submissions[0].get("quote").is_none());
}

#[tokio::test]
async fn server_outage_on_submission_is_retryable() {
    let (base_url, state) = spawn_stub().await;
    *state.submission_status.lock().await = Some(StatusCode::SERVICE_UNAVAILABLE);
    let gateway = HttpSubmissionGateway::new(client(&base_url));

    let error = gateway.submit(&submission()).await.expect_err("outage");

    assert!(matches!(error, SubmissionError::Rejected { status: 503, .. }));
    assert!(error.is_retryable());
}

#[tokio::test]
async fn pricing_factors_keep_active_definitions_and_drop_malformed_ones() {
    let (base_url, _state) = spawn_stub().await;
    let source = HttpPricingFactorSource::new(client(&base_url));

    let all = source.active_factors(None).await.expect("all factors");
    let ids: Vec<&str> = all.iter().map(|factor| factor.id.0.as_str()).collect();
    assert_eq!(ids, vec!["PF-VAN", "PF-PEAK"]);

    let vans = source.active_factors(Some(FactorCategory::VehicleType)).await.expect("vans");
    assert_eq!(vans.len(), 1);
    assert_eq!(vans[0].parameters.get("surcharge"), Some(&Decimal::from(50)));
}

#[tokio::test]
async fn fetched_factors_price_a_luton_van_move() {
    let (base_url, _state) = spawn_stub().await;
    let source = HttpPricingFactorSource::new(client(&base_url));
    let supplied = RequestAttributes {
        vehicle_type: Some("luton_van".to_owned()),
        ..RequestAttributes::default()
    };

    let context = PricingContext::from_source(&source, Decimal::from(499), "GBP")
        .await
        .expect("factors fetched")
        .with_supplied(supplied);
    let quote = context.quote(&submission().request);

    assert_eq!(quote.total, Decimal::from(549));
}
