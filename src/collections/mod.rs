//! REST collections.
//!
//! Each collection is declared as data (operations, the capability each one
//! needs, declared parameters). Routes are mounted only for operations the
//! active driver supports, so a backend without e.g. `create_port` simply
//! has no such route.

pub mod address_templates;
pub mod api;
pub mod hardware_profiles;
pub mod images;
pub mod instances;
pub mod networks;
pub mod ports;
pub mod realms;

use crate::core::context::UrlBuilder;
use crate::db::{Database, Scope};
use crate::domain::capability::{Capability, Feature};
use crate::domain::ports::{Credentials, Driver};
use crate::utils::error::{DeltacloudError, Result};
use async_trait::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::handler::Handler;
use axum::routing::{self, MethodFilter};
use axum::{Json, Router};
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub driver: Arc<dyn Driver>,
    pub db: Option<Database>,
    pub scope: Scope,
    /// Overrides the `Host` header when building hrefs.
    pub public_url: Option<String>,
}

impl AppState {
    pub fn new(driver: Arc<dyn Driver>, db: Option<Database>, provider: Option<&str>) -> Self {
        let scope = Scope::new(driver.name(), provider);
        Self {
            driver,
            db,
            scope,
            public_url: None,
        }
    }

    pub fn with_public_url(mut self, url: &str) -> Self {
        self.public_url = Some(url.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpMethod {
    Get,
    Post,
    Delete,
}

impl OpMethod {
    pub fn filter(self) -> MethodFilter {
        match self {
            OpMethod::Get => MethodFilter::GET,
            OpMethod::Post => MethodFilter::POST,
            OpMethod::Delete => MethodFilter::DELETE,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Param {
    pub name: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature: Option<Feature>,
}

impl Param {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
            feature: None,
        }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            required: false,
            feature: None,
        }
    }

    pub const fn with_feature(name: &'static str, feature: Feature) -> Self {
        Self {
            name,
            required: false,
            feature: Some(feature),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Operation {
    pub name: &'static str,
    pub method: OpMethod,
    /// Acts on `/<collection>/:id` rather than on the collection.
    pub member: bool,
    /// Extra path segment, e.g. `start` in `/instances/:id/start`.
    pub action: Option<&'static str>,
    /// `None` means the operation does not depend on the driver.
    pub capability: Option<Capability>,
    pub params: &'static [Param],
}

impl Operation {
    pub const fn index(capability: Capability) -> Self {
        Self {
            name: "index",
            method: OpMethod::Get,
            member: false,
            action: None,
            capability: Some(capability),
            params: &[],
        }
    }

    pub const fn show(capability: Capability) -> Self {
        Self {
            name: "show",
            method: OpMethod::Get,
            member: true,
            action: None,
            capability: Some(capability),
            params: &[],
        }
    }
}

#[derive(Debug)]
pub struct Collection {
    pub name: &'static str,
    pub entity: &'static str,
    pub prefix: &'static str,
    pub operations: &'static [Operation],
}

impl Collection {
    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| op.name == name)
    }

    pub fn collection_path(&self) -> String {
        format!("{}/{}", self.prefix, self.name)
    }

    pub fn path(&self, op: &Operation) -> String {
        let mut path = self.collection_path();
        if op.member {
            path.push_str("/:id");
        }
        if let Some(action) = op.action {
            path.push('/');
            path.push_str(action);
        }
        path
    }

    pub fn is_supported(&self, op: &Operation, driver: &dyn Driver) -> bool {
        op.capability.map_or(true, |cap| driver.supports(cap))
    }

    pub fn supported_operations(&self, driver: &dyn Driver) -> Vec<&Operation> {
        self.operations
            .iter()
            .filter(|op| self.is_supported(op, driver))
            .collect()
    }

    /// A collection is exposed when its index is.
    pub fn is_exposed(&self, driver: &dyn Driver) -> bool {
        self.operation("index")
            .is_some_and(|op| self.is_supported(op, driver))
    }

    /// Mounts `handler` under the operation's own path and method when the
    /// driver supports it. Operations sharing a path are merged by axum.
    pub fn mount<H, T>(
        &self,
        router: Router<AppState>,
        driver: &dyn Driver,
        op_name: &str,
        handler: H,
    ) -> Router<AppState>
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        match self.operation(op_name) {
            Some(op) if self.is_supported(op, driver) => {
                let path = self.path(op);
                tracing::debug!("Mounting {} {} ({:?} {})", self.name, op.name, op.method, path);
                router.route(&path, routing::on(op.method.filter(), handler))
            }
            Some(op) => {
                tracing::debug!(
                    "Skipping {} {}: driver lacks {:?}",
                    self.name,
                    op.name,
                    op.capability
                );
                router
            }
            None => router,
        }
    }

    /// Missing required parameters and parameters gated behind a feature
    /// the driver lacks are rejected.
    pub fn check_params(
        &self,
        op_name: &str,
        driver: &dyn Driver,
        params: &Map<String, Value>,
    ) -> Result<()> {
        let op = self
            .operation(op_name)
            .ok_or_else(|| DeltacloudError::not_supported(op_name))?;

        for param in op.params {
            let present = params.get(param.name).is_some_and(|v| !v.is_null());
            if param.required && !present {
                return Err(DeltacloudError::validation(format!(
                    "Parameter '{}' is required",
                    param.name
                )));
            }
            if let Some(feature) = param.feature {
                if present && !driver.has_feature(self.name, feature) {
                    return Err(DeltacloudError::validation(format!(
                        "Parameter '{}' requires the '{}' feature, which this driver lacks",
                        param.name,
                        feature.as_str()
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn url(&self, urls: &UrlBuilder) -> String {
        urls.collection_url(self.prefix, self.name)
    }

    pub fn entity_url(&self, urls: &UrlBuilder, id: &str) -> String {
        urls.entity_url(self.prefix, self.name, id)
    }

    /// `{"<collection>": [...]}` with an href on every entity.
    pub fn render_index<T: Serialize>(&self, urls: &UrlBuilder, items: &[T]) -> Result<Json<Value>> {
        let items = items
            .iter()
            .map(|item| self.with_href(urls, item))
            .collect::<Result<Vec<_>>>()?;
        Ok(Json(json!({ self.name: items })))
    }

    /// `{"<entity>": {...}}`
    pub fn render_entity<T: Serialize>(&self, urls: &UrlBuilder, item: &T) -> Result<Json<Value>> {
        Ok(Json(json!({ self.entity: self.with_href(urls, item)? })))
    }

    fn with_href<T: Serialize>(&self, urls: &UrlBuilder, item: &T) -> Result<Value> {
        let mut value = serde_json::to_value(item)?;
        if let Value::Object(obj) = &mut value {
            if let Some(id) = obj.get("id").and_then(Value::as_str).map(str::to_string) {
                obj.insert("href".to_string(), Value::String(self.entity_url(urls, &id)));
            }
        }
        Ok(value)
    }
}

/// Every collection served under `/api` and `/cimi`, in entry-point order.
pub fn all_collections() -> [&'static Collection; 7] {
    [
        &realms::REALMS,
        &images::IMAGES,
        &hardware_profiles::HARDWARE_PROFILES,
        &instances::INSTANCES,
        &networks::NETWORKS,
        &ports::PORTS,
        &address_templates::ADDRESS_TEMPLATES,
    ]
}

pub fn router(state: AppState) -> Router {
    let driver = state.driver.clone();
    let driver = driver.as_ref();

    Router::new()
        .route("/api", routing::get(api::entry_point))
        .merge(realms::routes(driver))
        .merge(images::routes(driver))
        .merge(hardware_profiles::routes(driver))
        .merge(instances::routes(driver))
        .merge(networks::routes(driver))
        .merge(ports::routes(driver))
        .merge(address_templates::routes(&state))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        "{} {} -> {} ({:?})",
        method,
        path,
        response.status().as_u16(),
        started.elapsed()
    );
    response
}

impl IntoResponse for DeltacloudError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!("❌ {} (category: {:?})", self, self.category());
        } else {
            tracing::debug!("Request failed: {}", self);
        }

        let body = Json(json!({
            "error": { "code": status.as_u16(), "message": self.to_string() }
        }));
        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"Deltacloud\""),
            );
        }
        response
    }
}

/// Credentials come from HTTP basic auth.
#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Credentials {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        let unauthorized = || {
            let mut response = (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": { "code": 401, "message": "Authentication required" } })),
            )
                .into_response();
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"Deltacloud\""),
            );
            response
        };

        let value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(unauthorized)?;
        parse_basic_auth(value).ok_or_else(unauthorized)
    }
}

pub fn parse_basic_auth(header_value: &str) -> Option<Credentials> {
    let encoded = header_value
        .strip_prefix("Basic ")
        .or_else(|| header_value.strip_prefix("basic "))?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some(Credentials::new(user, password))
}

#[async_trait]
impl FromRequestParts<AppState> for UrlBuilder {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        if let Some(url) = &state.public_url {
            return Ok(UrlBuilder::new(url));
        }
        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost");
        Ok(UrlBuilder::new(&format!("http://{}", host)))
    }
}

/// Request parameters from a JSON object or a urlencoded form body.
pub struct Params(pub Map<String, Value>);

impl Params {
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T> {
        serde_json::from_value(Value::Object(self.0))
            .map_err(|e| DeltacloudError::validation(format!("Invalid parameters: {}", e)))
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for Params {
    type Rejection = DeltacloudError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let axum::Form(form) = axum::Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| DeltacloudError::validation(e.body_text()))?;
            let map = form
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            return Ok(Params(map));
        }

        let bytes = axum::body::Bytes::from_request(req, state)
            .await
            .map_err(|e| DeltacloudError::validation(e.body_text()))?;
        if bytes.is_empty() {
            return Ok(Params(Map::new()));
        }
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(Params(map)),
            Ok(_) => Err(DeltacloudError::validation("Expected a JSON object")),
            Err(e) => Err(DeltacloudError::validation(format!("Malformed JSON: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{MockDriver, RhevmDriver};

    #[test]
    fn test_parse_basic_auth() {
        let header = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode("mockuser:mock:password")
        );
        let creds = parse_basic_auth(&header).unwrap();
        assert_eq!(creds.user, "mockuser");
        assert_eq!(creds.password, "mock:password");

        assert!(parse_basic_auth("Bearer abc").is_none());
        assert!(parse_basic_auth("Basic !!!").is_none());
    }

    #[test]
    fn test_paths() {
        let index = ports::PORTS.operation("index").unwrap();
        let destroy = ports::PORTS.operation("destroy").unwrap();
        assert_eq!(ports::PORTS.path(index), "/api/ports");
        assert_eq!(ports::PORTS.path(destroy), "/api/ports/:id");

        let start = instances::INSTANCES.operation("start").unwrap();
        assert_eq!(instances::INSTANCES.path(start), "/api/instances/:id/start");
    }

    #[test]
    fn test_supported_operations_follow_capabilities() {
        let rhevm = RhevmDriver::new("https://rhevm.example.com/api", reqwest::Client::new());
        assert!(!ports::PORTS.is_exposed(&rhevm));
        let names: Vec<&str> = networks::NETWORKS
            .supported_operations(&rhevm)
            .iter()
            .map(|op| op.name)
            .collect();
        assert_eq!(names, vec!["index", "show"]);

        let mock = MockDriver::new();
        assert!(ports::PORTS.is_exposed(&mock));
        assert_eq!(ports::PORTS.supported_operations(&mock).len(), 4);
    }

    #[test]
    fn test_check_params() {
        let mock = MockDriver::new();
        let empty = Map::new();
        let err = ports::PORTS.check_params("create", &mock, &empty).unwrap_err();
        assert!(err.to_string().contains("network"));

        let mut params = Map::new();
        params.insert("network".to_string(), json!("net1"));
        assert!(ports::PORTS.check_params("create", &mock, &params).is_ok());
    }

    #[test]
    fn test_feature_gated_params() {
        let rhevm = RhevmDriver::new("https://rhevm.example.com/api", reqwest::Client::new());
        let mut params = Map::new();
        params.insert("image_id".to_string(), json!("img1"));
        params.insert("keyname".to_string(), json!("mykey"));
        assert!(instances::INSTANCES
            .check_params("create", &rhevm, &params)
            .is_err());

        let mock = MockDriver::new();
        assert!(instances::INSTANCES
            .check_params("create", &mock, &params)
            .is_ok());
    }

    #[test]
    fn test_render_adds_href() {
        let urls = UrlBuilder::new("http://localhost:3001");
        let Json(body) = realms::REALMS
            .render_index(&urls, &[json!({ "id": "us", "name": "US" })])
            .unwrap();
        assert_eq!(body["realms"][0]["href"], "http://localhost:3001/api/realms/us");

        let Json(body) = realms::REALMS
            .render_entity(&urls, &json!({ "id": "eu" }))
            .unwrap();
        assert_eq!(body["realm"]["href"], "http://localhost:3001/api/realms/eu");
    }
}
