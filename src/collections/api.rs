use super::{address_templates, all_collections, AppState};
use crate::core::context::UrlBuilder;
use crate::domain::capability::features_for;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

/// `GET /api`: the driver and what it exposes. No credentials needed.
pub async fn entry_point(State(state): State<AppState>, urls: UrlBuilder) -> Json<Value> {
    let driver = state.driver.as_ref();

    let links: Vec<Value> = all_collections()
        .into_iter()
        .filter(|c| {
            if c.name == address_templates::ADDRESS_TEMPLATES.name {
                address_templates::is_available(&state)
            } else {
                c.is_exposed(driver)
            }
        })
        .map(|c| {
            let operations: Vec<Value> = c
                .supported_operations(driver)
                .iter()
                .map(|op| json!({ "name": op.name, "method": op.method }))
                .collect();
            let features: Vec<&str> = features_for(driver.features(), c.name)
                .iter()
                .map(|f| f.as_str())
                .collect();
            json!({
                "rel": c.name,
                "href": c.url(&urls),
                "operations": operations,
                "features": features,
            })
        })
        .collect();

    Json(json!({
        "api": {
            "driver": driver.name(),
            "version": env!("CARGO_PKG_VERSION"),
            "href": urls.url("/api"),
            "capabilities": driver
                .capabilities()
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>(),
            "links": links,
        }
    }))
}
