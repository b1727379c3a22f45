use super::{AppState, Collection, Operation};
use crate::core::context::UrlBuilder;
use crate::domain::capability::Capability;
use crate::domain::filter::Filter;
use crate::domain::ports::{Credentials, Driver};
use crate::utils::error::{DeltacloudError, Result};
use axum::extract::{Path, Query, State};
use axum::{Json, Router};
use serde_json::Value;

pub static HARDWARE_PROFILES: Collection = Collection {
    name: "hardware_profiles",
    entity: "hardware_profile",
    prefix: "/api",
    operations: &[
        Operation::index(Capability::HardwareProfiles),
        Operation::show(Capability::HardwareProfile),
    ],
};

pub fn routes(driver: &dyn Driver) -> Router<AppState> {
    let router = HARDWARE_PROFILES.mount(Router::new(), driver, "index", index);
    HARDWARE_PROFILES.mount(router, driver, "show", show)
}

async fn index(
    State(state): State<AppState>,
    credentials: Credentials,
    urls: UrlBuilder,
    Query(filter): Query<Filter>,
) -> Result<Json<Value>> {
    let profiles = state.driver.hardware_profiles(&credentials, &filter).await?;
    HARDWARE_PROFILES.render_index(&urls, &profiles)
}

async fn show(
    State(state): State<AppState>,
    credentials: Credentials,
    urls: UrlBuilder,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let profile = state
        .driver
        .hardware_profile(&credentials, &id)
        .await?
        .ok_or_else(|| DeltacloudError::not_found("hardware_profile", &id))?;
    HARDWARE_PROFILES.render_entity(&urls, &profile)
}
