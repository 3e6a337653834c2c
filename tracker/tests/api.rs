use reqwest::StatusCode;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracker::api::{self, AppState};
use tracker::auth::AdminAuth;
use tracker::config::AdminConfig;
use tracker::service::TrackingService;
use tracker::store::MemorySheet;

const HEADER: &[&str] = &[
    "trackingId",
    "status",
    "origin",
    "destination",
    "lastUpdated",
    "estimatedDelivery",
    "history",
];

struct TestApp {
    base_url: String,
    sheet: Arc<MemorySheet>,
    client: reqwest::Client,
}

impl TestApp {
    async fn spawn(rows: &[&[&str]]) -> Self {
        let sheet = Arc::new(MemorySheet::with_rows(
            HEADER.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        ));
        let service = TrackingService::new(sheet.clone(), "trackingId");
        let auth = AdminAuth::new(&AdminConfig {
            username: "admin".into(),
            password: "hunter2".into(),
            token_secret: "integration-secret".into(),
            token_ttl_secs: 300,
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, api::router(AppState::new(service, auth)))
                .await
                .unwrap();
        });

        TestApp {
            base_url: format!("http://{addr}"),
            sheet,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn admin_token(&self) -> String {
        let response = self
            .client
            .post(self.url("/api/admin/login"))
            .json(&json!({"username": "admin", "password": "hunter2"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::spawn(&[]).await;
    let response = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "ok\n");
}

#[tokio::test]
async fn test_public_lookup() {
    let app = TestApp::spawn(&[&[
        "TKS12345678",
        "In Transit",
        "Singapore",
        "Rotterdam",
        "2025-02-03",
        "2025-02-10",
        r#"[{"date":"2025-02-01","location":"Singapore Hub","message":"Shipment Received","completed":true}]"#,
    ]])
    .await;

    let response = app
        .client
        .get(app.url("/api/tracking/tks12345678"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["trackingId"], "TKS12345678");
    assert_eq!(body["destination"], "Rotterdam");
    assert_eq!(
        body["history"],
        json!([{"date": "2025-02-01", "location": "Singapore Hub", "message": "Shipment Received", "completed": true}])
    );
}

#[tokio::test]
async fn test_public_lookup_not_found() {
    let app = TestApp::spawn(&[&["TKS00000001"]]).await;

    let response = app
        .client
        .get(app.url("/api/tracking/TKS99999999"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: Value = response.json().await.unwrap();
    assert!(body["error_message"].as_str().unwrap().contains("TKS99999999"));
}

#[tokio::test]
async fn test_upsert_creates_then_updates() {
    let app = TestApp::spawn(&[]).await;

    let created = app
        .client
        .post(app.url("/api/tracking"))
        .json(&json!({
            "trackingId": "TKS12345678",
            "status": "Created",
            "history": [{"date": "2025-02-01", "location": "Singapore Hub", "message": "Label created"}]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let body: Value = created.json().await.unwrap();
    assert_eq!(body["created"], true);
    assert_eq!(body["record"]["origin"], "");

    let updated = app
        .client
        .put(app.url("/api/tracking/TKS12345678"))
        .json(&json!({"status": "Delivered", "history": "Signed by recipient"}))
        .send()
        .await
        .unwrap();
    assert_eq!(updated.status(), StatusCode::OK);
    let body: Value = updated.json().await.unwrap();
    assert_eq!(body["created"], false);
    assert_eq!(body["record"]["status"], "Delivered");
    assert_eq!(
        body["record"]["history"],
        json!([{"date": "", "location": "", "message": "Signed by recipient"}])
    );

    assert_eq!(app.sheet.snapshot().await.len(), 1);
}

#[tokio::test]
async fn test_upsert_without_identifier_is_bad_request() {
    let app = TestApp::spawn(&[]).await;

    let response = app
        .client
        .post(app.url("/api/tracking"))
        .json(&json!({"status": "Created"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.sheet.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_admin_requires_token() {
    let app = TestApp::spawn(&[&["TKS00000001"]]).await;

    let missing = app
        .client
        .get(app.url("/api/admin/tracking"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let forged = app
        .client
        .get(app.url("/api/admin/tracking"))
        .bearer_auth("e30.c2lnbmF0dXJl")
        .send()
        .await
        .unwrap();
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);

    let bad_login = app
        .client
        .post(app.url("/api/admin/login"))
        .json(&json!({"username": "admin", "password": "nope"}))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_login.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_list_get_delete() {
    let app = TestApp::spawn(&[
        &["TKS00000001", "Pending"],
        &["TKS00000002", "Delivered"],
    ])
    .await;
    let token = app.admin_token().await;

    let list: Value = app
        .client
        .get(app.url("/api/admin/tracking"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.as_array().unwrap().len(), 2);
    assert_eq!(list[1]["status"], "Delivered");

    let one = app
        .client
        .get(app.url("/api/admin/tracking/TKS00000002"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(one.status(), StatusCode::OK);

    let deleted = app
        .client
        .delete(app.url("/api/admin/tracking/tks00000001"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::OK);
    let body: Value = deleted.json().await.unwrap();
    assert_eq!(body["deleted"]["trackingId"], "TKS00000001");

    let rows = app.sheet.snapshot().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], "TKS00000002");

    let again = app
        .client
        .delete(app.url("/api/admin/tracking/TKS00000001"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}
