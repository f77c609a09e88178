use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use chassis_assembly::bus::{InMemoryBus, InventorySnapshot};
use chassis_assembly::inventory::{ASSOCIATION_DEFINITIONS_INTERFACE, CHASSIS_INTERFACE};
use chassis_assembly::server::{router, AppState, Credentials};
use chassis_assembly::session::{PersistenceType, SessionStore};
use chassis_assembly::{AssemblyService, Backend};

const SVC: &str = "xyz.openbmc_project.Inventory.Manager";
const CHASSIS: &str = "/xyz/openbmc_project/inventory/system/chassis";
const ASSEMBLY_URI: &str = "/redfish/v1/Chassis/chassis/Assembly";

struct TestServer {
    app: Router,
    sessions: Arc<SessionStore>,
}

impl TestServer {
    fn new(password: Option<&str>) -> Self {
        let snapshot = InventorySnapshot::new()
            .with_interface(CHASSIS, SVC, CHASSIS_INTERFACE)
            .with_interface(CHASSIS, SVC, ASSOCIATION_DEFINITIONS_INTERFACE)
            .with_association(CHASSIS, "assembly", &format!("{}/vrm0", CHASSIS))
            .with_interface(&format!("{}/vrm0", CHASSIS), SVC, "xyz.openbmc_project.Inventory.Item.Vrm");
        let bus = Arc::new(InMemoryBus::new(snapshot));
        let sessions = Arc::new(SessionStore::new(Duration::from_secs(3600)));
        let state = AppState {
            service: Arc::new(AssemblyService::new(Backend::from_bus(bus))),
            sessions: sessions.clone(),
            credentials: Arc::new(Credentials {
                username: "root".to_string(),
                password: password.map(str::to_string),
            }),
        };
        Self {
            app: router(state),
            sessions,
        }
    }

    async fn token(&self) -> String {
        self.sessions
            .generate("root", None, PersistenceType::Timeout)
            .await
            .session_token
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header("X-Auth-Token", token);
        }
        let request = match body {
            Some(body) => request
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }
}

#[tokio::test]
async fn test_get_assembly_requires_session() {
    let server = TestServer::new(None);
    let (status, body) = server.send(Method::GET, ASSEMBLY_URI, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "Base.1.13.0.NoValidSession");

    let (status, _) = server
        .send(Method::GET, ASSEMBLY_URI, Some("aaaaaaaaaaaaaaaaaaaa"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_get_assembly() {
    let server = TestServer::new(None);
    let token = server.token().await;
    let (status, body) = server.send(Method::GET, ASSEMBLY_URI, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["@odata.id"], ASSEMBLY_URI);
    assert_eq!(body["Assemblies@odata.count"], 1);
    assert_eq!(body["Assemblies"][0]["Name"], "vrm0");
    assert_eq!(body["Assemblies"][0]["MemberId"], "0");
}

#[tokio::test]
async fn test_unknown_chassis_is_404() {
    let server = TestServer::new(None);
    let token = server.token().await;
    let (status, body) = server
        .send(Method::GET, "/redfish/v1/Chassis/nope/Assembly", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "Base.1.13.0.ResourceNotFound");
    assert_eq!(body["error"]["@Message.ExtendedInfo"][0]["MessageArgs"], json!(["Chassis", "nope"]));
}

#[tokio::test]
async fn test_patch_assembly() {
    let server = TestServer::new(None);
    let token = server.token().await;

    let (status, body) = server
        .send(Method::PATCH, ASSEMBLY_URI, Some(&token), Some(json!({"Assemblies": []})))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, body) = server
        .send(Method::PATCH, ASSEMBLY_URI, Some(&token), Some(json!({"Name": "x"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "Base.1.13.0.PropertyUnknown");

    let (status, body) = server
        .send(
            Method::PATCH,
            ASSEMBLY_URI,
            Some(&token),
            Some(json!({"Assemblies": [{"MemberId": "0", "Oem": {"OpenBMC": {"ReadyToRemove": true}}}]})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["@Message.ExtendedInfo"][0]["MessageArgs"], json!(["ReadyToRemove"]));
}

#[tokio::test]
async fn test_login_and_logout() {
    let server = TestServer::new(Some("0penBmc"));

    let (status, _) = server
        .send(
            Method::POST,
            "/redfish/v1/SessionService/Sessions",
            None,
            Some(json!({"UserName": "root", "Password": "wrong"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/redfish/v1/SessionService/Sessions")
        .header("Content-Type", "application/json")
        .body(Body::from(json!({"UserName": "root", "Password": "0penBmc"}).to_string()))
        .unwrap();
    let response = server.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let token = response.headers()["X-Auth-Token"].to_str().unwrap().to_string();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["UserName"], "root");
    let id = body["Id"].as_str().unwrap().to_string();

    let (status, _) = server.send(Method::GET, ASSEMBLY_URI, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let session_uri = format!("/redfish/v1/SessionService/Sessions/{}", id);
    let (status, _) = server.send(Method::DELETE, &session_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = server.send(Method::GET, ASSEMBLY_URI, Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_delete_unknown_session_is_404() {
    let server = TestServer::new(None);
    let token = server.token().await;
    let (status, _) = server
        .send(Method::DELETE, "/redfish/v1/SessionService/Sessions/missing123", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_login_refused_without_configured_password() {
    let server = TestServer::new(None);
    let (status, _) = server
        .send(
            Method::POST,
            "/redfish/v1/SessionService/Sessions",
            None,
            Some(json!({"UserName": "root", "Password": ""})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
