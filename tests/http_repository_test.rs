//! HTTP catalog adapter tests against a mock admin API

use futures::TryStreamExt;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use catalog_sweep::cleanup::{DeclineMode, Orchestrator, PassKind, ScriptedConfirm, SearchSpec};
use catalog_sweep::config::CatalogConfig;
use catalog_sweep::{
    CleanupPlan, HttpRepository, RelationKind, RepositoryError, ScopeFilter, UpdateRecord,
    UpdateRepository,
};

fn repository(server: &MockServer) -> HttpRepository {
    HttpRepository::new(&CatalogConfig {
        url: server.uri(),
        api_token: Some("token-abc".to_string()),
        page_size: 2,
        timeout_secs: 5,
    })
    .unwrap()
}

fn record(id: &str, title: &str, approved: bool) -> serde_json::Value {
    json!({
        "id": id,
        "title": title,
        "productTitles": [],
        "classification": "Updates",
        "isApproved": approved,
        "isDeclined": false
    })
}

#[tokio::test]
async fn test_listing_follows_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/updates"))
        .and(query_param("scope", "all"))
        .and(query_param("cursor", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "updates": [record("u3", "Windows 10", true)],
            "next_cursor": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/updates"))
        .and(query_param("scope", "all"))
        .and(query_param("limit", "2"))
        .and(header("authorization", "Bearer token-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "updates": [record("u1", "Windows XP", true), record("u2", "Windows 7", false)],
            "next_cursor": "page-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let repo = repository(&server);
    let records: Vec<UpdateRecord> = repo
        .list_updates(ScopeFilter::AllUpdates)
        .try_collect()
        .await
        .unwrap();

    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["u1", "u2", "u3"]);
    assert!(!records[1].is_approved);
}

#[tokio::test]
async fn test_listing_accepts_camel_case_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/updates"))
        .and(query_param("cursor", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "updates": [record("u2", "Windows 10", true)]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/updates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "updates": [record("u1", "Windows XP", true)],
            "nextCursor": "p2"
        })))
        .mount(&server)
        .await;

    let repo = repository(&server);
    let records: Vec<UpdateRecord> = repo
        .list_updates(ScopeFilter::AllUpdates)
        .try_collect()
        .await
        .unwrap();

    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["u1", "u2"]);
}

#[tokio::test]
async fn test_repeated_cursor_ends_listing_with_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/updates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "updates": [record("u1", "Windows XP", true)],
            "next_cursor": "stuck"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let repo = repository(&server);
    let result: Result<Vec<UpdateRecord>, _> = repo
        .list_updates(ScopeFilter::AllUpdates)
        .try_collect()
        .await;

    match result {
        Err(RepositoryError::Unavailable(message)) => assert!(message.contains("stuck")),
        other => panic!("expected unavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_listing_server_error_is_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/updates"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let repo = repository(&server);
    let result: Result<Vec<UpdateRecord>, _> = repo
        .list_updates(ScopeFilter::LatestRevisionApproved)
        .try_collect()
        .await;

    match result {
        Err(RepositoryError::Unavailable(message)) => assert!(message.contains("503")),
        other => panic!("expected unavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_decline_conflict_is_rejection() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/updates/u1/decline"))
        .respond_with(ResponseTemplate::new(409).set_body_string("already declined"))
        .mount(&server)
        .await;

    let repo = repository(&server);
    let err = repo
        .decline(&UpdateRecord::approved("u1", "Windows XP"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RepositoryError::DeclineRejected {
            id: catalog_sweep::UpdateId::new("u1"),
            reason: "already declined".to_string(),
        }
    );
}

#[tokio::test]
async fn test_decline_server_error_is_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/updates/u1/decline"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let repo = repository(&server);
    let err = repo
        .decline(&UpdateRecord::approved("u1", "Windows XP"))
        .await
        .unwrap_err();

    assert!(matches!(err, RepositoryError::Unavailable(_)));
}

#[tokio::test]
async fn test_related_updates_query() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/updates/old/related"))
        .and(query_param("relation", "supersedes-this"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "updates": [record("new", "Rollup 2", true)]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let repo = repository(&server);
    let related = repo
        .related_updates(
            &UpdateRecord::approved("old", "Rollup 1"),
            RelationKind::SupersedesThis,
        )
        .await
        .unwrap();

    assert_eq!(related.len(), 1);
    assert_eq!(related[0].id.as_str(), "new");
    assert!(related[0].is_approved);
}

#[tokio::test]
async fn test_forced_title_pass_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/updates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "updates": [record("u1", "Windows XP SP3", true), record("u2", "Windows 10", true)]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/updates/u1/decline"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let repo = repository(&server);
    let confirm = ScriptedConfirm::default();
    let plan = CleanupPlan {
        titles: vec![SearchSpec::title("Windows XP").unwrap()],
        ..CleanupPlan::default()
    };

    let summary = Orchestrator::new(&repo, &confirm)
        .run_pass(&plan, PassKind::Titles, DeclineMode::Forced)
        .await
        .unwrap();

    assert_eq!(summary.grand_total, 1);
    assert_eq!(confirm.prompt_count(), 0);
}
