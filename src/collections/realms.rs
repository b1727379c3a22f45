use super::{AppState, Collection, Operation};
use crate::core::context::UrlBuilder;
use crate::domain::capability::Capability;
use crate::domain::filter::Filter;
use crate::domain::ports::{Credentials, Driver};
use crate::utils::error::{DeltacloudError, Result};
use axum::extract::{Path, Query, State};
use axum::{Json, Router};
use serde_json::Value;

pub static REALMS: Collection = Collection {
    name: "realms",
    entity: "realm",
    prefix: "/api",
    operations: &[
        Operation::index(Capability::Realms),
        Operation::show(Capability::Realm),
    ],
};

pub fn routes(driver: &dyn Driver) -> Router<AppState> {
    let router = REALMS.mount(Router::new(), driver, "index", index);
    REALMS.mount(router, driver, "show", show)
}

async fn index(
    State(state): State<AppState>,
    credentials: Credentials,
    urls: UrlBuilder,
    Query(filter): Query<Filter>,
) -> Result<Json<Value>> {
    let realms = state.driver.realms(&credentials, &filter).await?;
    REALMS.render_index(&urls, &realms)
}

async fn show(
    State(state): State<AppState>,
    credentials: Credentials,
    urls: UrlBuilder,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let realm = state
        .driver
        .realm(&credentials, &id)
        .await?
        .ok_or_else(|| DeltacloudError::not_found("realm", &id))?;
    REALMS.render_entity(&urls, &realm)
}
