//! Client and repository tests against a mocked Firestore REST endpoint.

use std::time::Duration;

use serde_json::{json, Value as Json};
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use promptova_models::{
    today_key, Generation, GenerationCost, GenerationType, PlanTier, QuotaError,
};

use crate::client::{FirestoreClient, FirestoreConfig};
use crate::error::{ChargeError, FirestoreError};
use crate::retry::RetryConfig;
use crate::token_cache::TokenCache;
use crate::user_credits::UserCreditsRepository;
use crate::user_repo::UserRepository;
use crate::GenerationRepository;

const UPDATE_TIME: &str = "2026-01-01T00:00:00.000000Z";

fn test_client(server: &MockServer, retry: RetryConfig) -> FirestoreClient {
    let config = FirestoreConfig {
        project_id: "test-project".to_string(),
        database_id: "(default)".to_string(),
        emulator_host: None,
        timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(2),
        retry,
    };
    let base_url = format!(
        "{}/v1/projects/test-project/databases/(default)/documents",
        server.uri()
    );
    FirestoreClient::with_token_cache(config, base_url, TokenCache::fixed("test-token"))
        .expect("client builds")
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        base_delay_ms: 1,
        max_delay_ms: 5,
    }
}

fn user_doc(credits: u32, plan: &str, daily: Json, last_usage_date: Option<&str>) -> Json {
    let last = match last_usage_date {
        Some(d) => json!({"stringValue": d}),
        None => json!({"nullValue": null}),
    };
    json!({
        "name": "projects/test-project/databases/(default)/documents/users/uid-1",
        "fields": {
            "uid": {"stringValue": "uid-1"},
            "email": {"stringValue": "ada@example.com"},
            "credits": {"integerValue": credits.to_string()},
            "plan": {"stringValue": plan},
            "total_generations": {"integerValue": "4"},
            "storage_used_mb": {"doubleValue": 10.0},
            "time_saved_hours": {"doubleValue": 2.0},
            "daily_counts": {"mapValue": {"fields": daily}},
            "last_usage_date": last
        },
        "updateTime": UPDATE_TIME
    })
}

async fn mount_user(server: &MockServer, body: Json) {
    Mock::given(method("GET"))
        .and(path_regex(r"/documents/users/uid-1$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn commit_bodies(server: &MockServer) -> Vec<Json> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path().ends_with(":commit"))
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_get_document_missing_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"/documents/users/nobody$"))
        .respond_with(ResponseTemplate::new(404).set_body_string("NOT_FOUND"))
        .mount(&server)
        .await;

    let repo = UserRepository::new(test_client(&server, RetryConfig::none()));
    assert!(repo.get("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_document_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"/documents/users/uid-1$"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_user(&server, user_doc(10, "free", json!({}), None)).await;

    let repo = UserRepository::new(test_client(&server, fast_retry()));
    let profile = repo.get("uid-1").await.unwrap().unwrap();
    assert_eq!(profile.credits, 10);
    assert_eq!(profile.total_generations, 4);
}

#[tokio::test]
async fn test_delete_document_tolerates_missing() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path_regex(r"/documents/users/uid-1/plan_grants/cs_1$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path_regex(r"/documents/users/gone$"))
        .respond_with(ResponseTemplate::new(404).set_body_string("NOT_FOUND"))
        .mount(&server)
        .await;

    let client = test_client(&server, RetryConfig::none());
    client.delete_document("users/uid-1/plan_grants", "cs_1").await.unwrap();
    client.delete_document("users", "gone").await.unwrap();
}

#[tokio::test]
async fn test_requests_carry_bearer_token() {
    let server = MockServer::start().await;
    mount_user(&server, user_doc(10, "free", json!({}), None)).await;

    let repo = UserRepository::new(test_client(&server, RetryConfig::none()));
    repo.get("uid-1").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let auth = requests[0].headers.get("authorization").unwrap();
    assert_eq!(auth.to_str().unwrap(), "Bearer test-token");
}

#[tokio::test]
async fn test_sync_creates_missing_profile_with_starter_credits() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"/documents/users/uid-new$"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"/documents/users$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"fields": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let repo = UserRepository::new(test_client(&server, RetryConfig::none()));
    let synced = repo
        .sync("uid-new", "new@example.com", Some("New User"), None)
        .await
        .unwrap();

    assert!(synced.created);
    assert_eq!(synced.profile.credits, 10);
    assert_eq!(synced.profile.plan, PlanTier::Free);

    let requests = server.received_requests().await.unwrap();
    let create = requests.iter().find(|r| r.method.as_str() == "POST").unwrap();
    assert_eq!(create.url.query(), Some("documentId=uid-new"));
    let body: Json = serde_json::from_slice(&create.body).unwrap();
    assert_eq!(body["fields"]["credits"]["integerValue"], "10");
    assert_eq!(body["fields"]["display_name"]["stringValue"], "New User");
}

#[tokio::test]
async fn test_sync_existing_profile_keeps_balance() {
    let server = MockServer::start().await;
    mount_user(&server, user_doc(3, "pro", json!({}), None)).await;

    let repo = UserRepository::new(test_client(&server, RetryConfig::none()));
    let synced = repo.sync("uid-1", "ada@example.com", None, None).await.unwrap();

    assert!(!synced.created);
    assert_eq!(synced.profile.credits, 3);
    assert_eq!(synced.profile.plan, PlanTier::Pro);
    // Nothing changed, so nothing was written.
    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.method.as_str() == "GET"));
}

#[tokio::test]
async fn test_save_generation_commits_charge_and_record_together() {
    let server = MockServer::start().await;
    let today = today_key();
    mount_user(
        &server,
        user_doc(10, "free", json!({"image": {"integerValue": "2"}}), Some(&today)),
    )
    .await;
    Mock::given(method("POST"))
        .and(path_regex(r"/documents:commit$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "writeResults": [{"updateTime": UPDATE_TIME}, {"updateTime": UPDATE_TIME}],
            "commitTime": UPDATE_TIME
        })))
        .expect(1)
        .mount(&server)
        .await;

    let repo = UserCreditsRepository::new(test_client(&server, RetryConfig::none()), "uid-1");
    let generation = Generation::new("uid-1", GenerationType::Image, "a red fox", 1)
        .with_result_url("https://cdn.example.com/fox.png");
    let cost = GenerationCost::for_type(GenerationType::Image);

    let outcome = repo.save_generation(&generation, &cost).await.unwrap();
    assert_eq!(outcome.credits_after, 9);
    assert_eq!(outcome.daily_count_after, 3);
    assert_eq!(outcome.total_generations_after, 5);
    assert!(!outcome.day_reset);

    let commits = commit_bodies(&server).await;
    let writes = commits[0]["writes"].as_array().unwrap();
    assert_eq!(writes.len(), 2);

    let user_write = &writes[0];
    assert_eq!(user_write["currentDocument"]["updateTime"], UPDATE_TIME);
    assert_eq!(user_write["update"]["fields"]["credits"]["integerValue"], "9");
    assert_eq!(
        user_write["update"]["fields"]["daily_counts"]["mapValue"]["fields"]["image"]["integerValue"],
        "3"
    );

    let record_write = &writes[1];
    assert_eq!(record_write["currentDocument"]["exists"], false);
    assert!(record_write["update"]["name"]
        .as_str()
        .unwrap()
        .ends_with(&format!("/documents/generations/{}", generation.id)));
}

#[tokio::test]
async fn test_save_generation_retries_after_precondition_failure() {
    let server = MockServer::start().await;
    mount_user(&server, user_doc(10, "free", json!({}), None)).await;
    Mock::given(method("POST"))
        .and(path_regex(r"/documents:commit$"))
        .respond_with(ResponseTemplate::new(400).set_body_string(
            r#"{"error":{"code":400,"status":"FAILED_PRECONDITION","message":"stale"}}"#,
        ))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"/documents:commit$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"writeResults": []})))
        .mount(&server)
        .await;

    let repo = UserCreditsRepository::new(test_client(&server, RetryConfig::none()), "uid-1");
    let generation = Generation::new("uid-1", GenerationType::Video, "drone shot", 5);
    let outcome = repo
        .save_generation(&generation, &GenerationCost::for_type(GenerationType::Video))
        .await
        .unwrap();

    assert_eq!(outcome.credits_after, 5);
    assert!(outcome.day_reset);
    assert_eq!(commit_bodies(&server).await.len(), 2);
}

#[tokio::test]
async fn test_save_generation_insufficient_credits_writes_nothing() {
    let server = MockServer::start().await;
    mount_user(&server, user_doc(4, "pro", json!({}), None)).await;
    Mock::given(method("POST"))
        .and(path_regex(r"/documents:commit$"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let repo = UserCreditsRepository::new(test_client(&server, RetryConfig::none()), "uid-1");
    let generation = Generation::new("uid-1", GenerationType::Video, "drone shot", 5);
    let err = repo
        .save_generation(&generation, &GenerationCost::for_type(GenerationType::Video))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ChargeError::Quota(QuotaError::InsufficientCredits {
            required: 5,
            available: 4
        })
    ));
}

#[tokio::test]
async fn test_precheck_rejects_daily_limit() {
    let server = MockServer::start().await;
    let today = today_key();
    mount_user(
        &server,
        user_doc(100, "free", json!({"video": {"integerValue": "2"}}), Some(&today)),
    )
    .await;

    let repo = UserCreditsRepository::new(test_client(&server, RetryConfig::none()), "uid-1");
    let err = repo
        .precheck(GenerationType::Video, &GenerationCost::for_type(GenerationType::Video))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ChargeError::Quota(QuotaError::DailyLimitReached { limit: 2, .. })
    ));
}

#[tokio::test]
async fn test_credit_operation_on_missing_user_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let repo = UserCreditsRepository::new(test_client(&server, RetryConfig::none()), "ghost");
    let err = repo.adjust_credits(5).await.unwrap_err();
    assert!(matches!(err, FirestoreError::NotFound(_)));
}

async fn mount_commit_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path_regex(r"/documents:commit$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "writeResults": [{"updateTime": UPDATE_TIME}, {"updateTime": UPDATE_TIME}],
            "commitTime": UPDATE_TIME
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_grant_plan_sets_allowance_and_records_grant() {
    let server = MockServer::start().await;
    mount_user(&server, user_doc(2, "free", json!({}), None)).await;
    mount_commit_ok(&server).await;

    let repo = UserCreditsRepository::new(test_client(&server, RetryConfig::none()), "uid-1");
    let change = repo.grant_plan(PlanTier::Pro, "cs_test_1").await.unwrap();
    assert!(change.applied);
    assert_eq!(change.credits_after, 500);
    assert_eq!(change.delta(), 498);

    let commits = commit_bodies(&server).await;
    assert_eq!(commits.len(), 1);
    let writes = commits[0]["writes"].as_array().unwrap();
    assert_eq!(writes.len(), 2);

    let user = &writes[0];
    assert_eq!(user["currentDocument"]["updateTime"], UPDATE_TIME);
    assert_eq!(user["update"]["fields"]["plan"]["stringValue"], "pro");
    assert_eq!(user["update"]["fields"]["credits"]["integerValue"], "500");
    assert_eq!(user["update"]["fields"]["last_plan_grant_id"]["stringValue"], "cs_test_1");
    assert!(user["updateMask"]["fieldPaths"]
        .as_array()
        .unwrap()
        .contains(&json!("last_plan_grant_id")));

    let grant = &writes[1];
    assert!(grant["update"]["name"]
        .as_str()
        .unwrap()
        .ends_with("/documents/users/uid-1/plan_grants/cs_test_1"));
    assert_eq!(grant["currentDocument"]["exists"], false);
    assert_eq!(grant["update"]["fields"]["credits_granted"]["integerValue"], "500");
}

#[tokio::test]
async fn test_grant_plan_replay_of_latest_grant_is_noop() {
    let server = MockServer::start().await;
    let mut doc = user_doc(120, "pro", json!({}), None);
    doc["fields"]["last_plan_grant_id"] = json!({"stringValue": "cs_test_1"});
    mount_user(&server, doc).await;
    Mock::given(method("POST"))
        .and(path_regex(r"/documents:commit$"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let repo = UserCreditsRepository::new(test_client(&server, RetryConfig::none()), "uid-1");
    let change = repo.grant_plan(PlanTier::Pro, "cs_test_1").await.unwrap();
    assert!(!change.applied);
    assert_eq!(change.credits_after, 120);
}

#[tokio::test]
async fn test_grant_plan_replay_of_older_session_keeps_balance() {
    let server = MockServer::start().await;
    let mut doc = user_doc(3, "pro", json!({}), None);
    doc["fields"]["last_plan_grant_id"] = json!({"stringValue": "cs_B"});
    mount_user(&server, doc).await;
    Mock::given(method("GET"))
        .and(path_regex(r"/documents/users/uid-1/plan_grants/cs_A$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/test-project/databases/(default)/documents/users/uid-1/plan_grants/cs_A",
            "fields": {"plan": {"stringValue": "pro"}},
            "updateTime": UPDATE_TIME
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"/documents:commit$"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let repo = UserCreditsRepository::new(test_client(&server, RetryConfig::none()), "uid-1");
    let change = repo.grant_plan(PlanTier::Pro, "cs_A").await.unwrap();
    assert!(!change.applied);
    assert_eq!(change.credits_before, 3);
    assert_eq!(change.credits_after, 3);
}

#[tokio::test]
async fn test_grant_plan_lost_create_race_is_noop() {
    let server = MockServer::start().await;
    mount_user(&server, user_doc(7, "free", json!({}), None)).await;
    Mock::given(method("POST"))
        .and(path_regex(r"/documents:commit$"))
        .respond_with(ResponseTemplate::new(409).set_body_string(
            r#"{"error":{"code":409,"status":"ALREADY_EXISTS","message":"Document already exists"}}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let repo = UserCreditsRepository::new(test_client(&server, RetryConfig::none()), "uid-1");
    let change = repo.grant_plan(PlanTier::Enterprise, "cs_C").await.unwrap();
    assert!(!change.applied);
    assert_eq!(change.credits_after, 7);
}

#[tokio::test]
async fn test_adjust_credits_floors_at_zero() {
    let server = MockServer::start().await;
    mount_user(&server, user_doc(3, "free", json!({}), None)).await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"fields": {}})))
        .mount(&server)
        .await;

    let repo = UserCreditsRepository::new(test_client(&server, RetryConfig::none()), "uid-1");
    let change = repo.adjust_credits(-10).await.unwrap();
    assert_eq!(change.credits_after, 0);
    assert_eq!(change.delta(), -3);
}

#[tokio::test]
async fn test_list_recent_generations_queries_owner_newest_first() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"/documents:runQuery$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"readTime": UPDATE_TIME},
            {"document": {
                "name": "projects/test-project/databases/(default)/documents/generations/g-1",
                "fields": {
                    "uid": {"stringValue": "uid-1"},
                    "type": {"stringValue": "content"},
                    "prompt": {"stringValue": "launch post"},
                    "text_content": {"stringValue": "We are live!"},
                    "credit_cost": {"integerValue": "2"},
                    "created_at": {"timestampValue": "2026-01-02T10:00:00Z"}
                }
            }}
        ])))
        .mount(&server)
        .await;

    let repo = GenerationRepository::new(test_client(&server, RetryConfig::none()));
    let items = repo
        .list_recent("uid-1", 500, Some(GenerationType::Content))
        .await
        .unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "g-1");
    assert_eq!(items[0].text_content.as_deref(), Some("We are live!"));

    let requests = server.received_requests().await.unwrap();
    let body: Json = serde_json::from_slice(&requests[0].body).unwrap();
    let query = &body["structuredQuery"];
    assert_eq!(query["limit"], 50);
    assert_eq!(query["orderBy"][0]["field"]["fieldPath"], "created_at");
    assert_eq!(
        query["where"]["compositeFilter"]["filters"][1]["fieldFilter"]["value"]["stringValue"],
        "content"
    );
}
