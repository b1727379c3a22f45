use super::{AppState, Collection, Operation};
use crate::core::context::UrlBuilder;
use crate::domain::capability::Capability;
use crate::domain::filter::Filter;
use crate::domain::ports::{Credentials, Driver};
use crate::utils::error::{DeltacloudError, Result};
use axum::extract::{Path, Query, State};
use axum::{Json, Router};
use serde_json::Value;

pub static IMAGES: Collection = Collection {
    name: "images",
    entity: "image",
    prefix: "/api",
    operations: &[
        Operation::index(Capability::Images),
        Operation::show(Capability::Image),
    ],
};

pub fn routes(driver: &dyn Driver) -> Router<AppState> {
    let router = IMAGES.mount(Router::new(), driver, "index", index);
    IMAGES.mount(router, driver, "show", show)
}

async fn index(
    State(state): State<AppState>,
    credentials: Credentials,
    urls: UrlBuilder,
    Query(filter): Query<Filter>,
) -> Result<Json<Value>> {
    let images = state.driver.images(&credentials, &filter).await?;
    IMAGES.render_index(&urls, &images)
}

async fn show(
    State(state): State<AppState>,
    credentials: Credentials,
    urls: UrlBuilder,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let image = state
        .driver
        .image(&credentials, &id)
        .await?
        .ok_or_else(|| DeltacloudError::not_found("image", &id))?;
    IMAGES.render_entity(&urls, &image)
}
