mod common;

use std::collections::HashMap;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use attest::api::{build_router, AppState};
use attest::config::AttestConfig;
use common::{Fixture, ScriptedProvider, Verdict, TENANT};

const POLICY_TEXT: &str = "Our access control policy is reviewed every 12 months by the security committee.";

fn state(fx: &Fixture, provider: std::sync::Arc<ScriptedProvider>) -> AppState {
    let mut config = AttestConfig::default();
    config.storage.media_root = fx.media.path().to_string_lossy().into_owned();
    AppState::new(fx.engine(provider, 5), &config)
}

fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-tenant-id", TENANT.to_string());

    match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&b).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn response_json(response: Response<Body>) -> Value {
    let (parts, body) = response.into_parts();
    let bytes = body.collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        panic!("Empty response body. Status: {}, Headers: {:?}", parts.status, parts.headers);
    }
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|e| panic!("JSON parse error: {}. Body: {:?}", e, String::from_utf8_lossy(&bytes)))
}

#[tokio::test]
async fn test_health_endpoint() {
    let fx = Fixture::new();
    let app = build_router(state(&fx, ScriptedProvider::new(|_| Ok("{}".into()))));
    let response = app.oneshot(Request::get("/api/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "attest");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["llm"]["provider"], "scripted");
}

#[tokio::test]
async fn test_missing_tenant_header_is_rejected() {
    let fx = Fixture::new();
    let app = build_router(state(&fx, ScriptedProvider::new(|_| Ok("{}".into()))));
    let req = Request::post("/api/audit/1/complete").body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("X-Tenant-Id"));
}

#[tokio::test]
async fn test_upload_then_check() {
    let fx = Fixture::new();
    let (framework_id, ids) = fx.framework("ISO 27001", &[("Access control policy exists and is reviewed annually", "Medium", false)]);
    let audit_id = fx.audit(framework_id, "Access review");
    std::fs::write(fx.media.path().join("policy.txt"), POLICY_TEXT).unwrap();

    let provider = ScriptedProvider::verdicts(HashMap::from([(ids[0], Verdict::new("compliant", 0.9, "low"))]));
    let app = build_router(state(&fx, provider));

    let upload = json!({
        "logical_name": "policy.txt",
        "stored_path": "policy.txt",
        "mappings": [{"compliance_id": ids[0]}],
    });
    let response = app
        .clone()
        .oneshot(request("POST", &format!("/api/audits/{}/documents", audit_id), Some(upload)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["audit_started"], true);
    let document_id = body["document_ids"][0].as_i64().unwrap();

    let uri = format!("/api/audit/{}/documents/{}/check", audit_id, document_id);
    let response = app.oneshot(request("POST", &uri, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["compliance_status"], "compliant");
    assert_eq!(body["analyses"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_upload_with_foreign_compliance_is_bad_request() {
    let fx = Fixture::new();
    let (framework_id, _) = fx.framework("ISO 27001", &[("Access reviews", "Medium", false)]);
    let (_, other_ids) = fx.framework("SOC 2", &[("Key rotation", "Medium", false)]);
    let audit_id = fx.audit(framework_id, "Access review");
    let app = build_router(state(&fx, ScriptedProvider::new(|_| Ok("{}".into()))));

    let upload = json!({
        "logical_name": "policy.txt",
        "stored_path": "policy.txt",
        "mappings": [{"compliance_id": other_ids[0]}],
    });
    let response = app
        .oneshot(request("POST", &format!("/api/audits/{}/documents", audit_id), Some(upload)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_raw_upload_stores_file() {
    let fx = Fixture::new();
    let (framework_id, _) = fx.framework("ISO 27001", &[("Access reviews", "Medium", false)]);
    let audit_id = fx.audit(framework_id, "Access review");
    let app = build_router(state(&fx, ScriptedProvider::new(|_| Ok("{}".into()))));

    let req = Request::post(format!("/api/audits/{}/documents/raw?file_name=policy.txt", audit_id))
        .header("x-tenant-id", TENANT.to_string())
        .body(Body::from(POLICY_TEXT))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    let document_id = body["document_ids"][0].as_i64().unwrap();

    let stored = fx.db.get_document(TENANT, document_id).unwrap().unwrap();
    assert!(stored.stored_path.ends_with("_policy.txt"));
    assert_eq!(stored.size, POLICY_TEXT.len() as i64);
    assert!(fx.media.path().join(&stored.stored_path).exists());
}

#[tokio::test]
async fn test_check_unknown_document_is_not_found() {
    let fx = Fixture::new();
    let (framework_id, _) = fx.framework("ISO 27001", &[("Access reviews", "Medium", false)]);
    let audit_id = fx.audit(framework_id, "Access review");
    let app = build_router(state(&fx, ScriptedProvider::new(|_| Ok("{}".into()))));

    let uri = format!("/api/audit/{}/documents/999/check", audit_id);
    let response = app.oneshot(request("POST", &uri, Some(json!({"compliance_ids": [1]})))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_complete_and_delete_audit() {
    let fx = Fixture::new();
    let (framework_id, _) = fx.framework("ISO 27001", &[("Access reviews", "Medium", false)]);
    let audit_id = fx.audit(framework_id, "Access review");
    let app = build_router(state(&fx, ScriptedProvider::new(|_| Ok("{}".into()))));

    let response = app
        .clone()
        .oneshot(request("POST", &format!("/api/audit/{}/complete", audit_id), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["completed"], true);

    let response = app
        .clone()
        .oneshot(request("DELETE", &format!("/api/audit/{}", audit_id), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["deleted"], true);
    assert_eq!(body["jobs_cancelled"], false);

    let response = app
        .oneshot(request("DELETE", &format!("/api/audit/{}", audit_id), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sebi_endpoints() {
    let fx = Fixture::new();
    let (framework_id, _) = fx.framework("SEBI LODR", &[("Results filed within 45 days", "High", true)]);
    let audit_id = fx.audit(framework_id, "Q1 Financial Results");
    let app = build_router(state(&fx, ScriptedProvider::new(|_| Ok("{}".into()))));

    let uri = format!("/api/sebi-auditor/audit/{}/timeliness-sla", audit_id);
    let response = app.clone().oneshot(request("GET", &uri, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["enabled"], false);

    let response = app
        .clone()
        .oneshot(request("POST", &format!("/api/sebi-auditor/{}/enable", framework_id), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["framework_name"], "SEBI LODR");

    let uri = format!("/api/sebi-auditor/audit/{}/evidence-pack?use_case=adjudication", audit_id);
    let response = app.clone().oneshot(request("GET", &uri, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["enabled"], true);
    assert_eq!(body["use_case"], "adjudication");

    let uri = format!("/api/sebi-auditor/audit/{}/evidence-pack?use_case=audit", audit_id);
    let response = app.clone().oneshot(request("GET", &uri, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let uri = format!("/api/sebi-auditor/audit/{}/dashboard", audit_id);
    let response = app.oneshot(request("POST", &uri, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["total_audits"], 1);
}

#[tokio::test]
async fn test_cross_framework_endpoint() {
    let fx = Fixture::new();
    let (f0, _) = fx.framework("Internal policy", &[("Access reviews", "Medium", false)]);
    let (_, f1_ids) = fx.framework("ISO 27001", &[("Access control policy", "Medium", false)]);
    let audit_id = fx.audit(f0, "Access review");
    let document_id = fx.document(audit_id, "policy.txt", POLICY_TEXT, &[]).await;

    let provider = ScriptedProvider::verdicts(HashMap::from([(f1_ids[0], Verdict::new("compliant", 0.9, "low"))]));
    let app = build_router(state(&fx, provider));
    let body = json!({"document_id": document_id, "primary_framework_id": f0, "audit_id": audit_id});
    let response = app.oneshot(request("POST", "/api/cross-framework/check", Some(body))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["frameworks_checked"], 1);
    assert_eq!(body["mappings_created"], 1);
    assert_eq!(body["summaries"][0]["overall_status"], "compliant");
}
