use super::{AppState, Collection, OpMethod, Operation, Param, Params};
use crate::core::context::UrlBuilder;
use crate::domain::capability::Capability;
use crate::domain::filter::Filter;
use crate::domain::model::NetworkRequest;
use crate::domain::ports::{Credentials, Driver};
use crate::utils::error::{DeltacloudError, Result};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Json, Router};
use serde_json::Value;

pub static NETWORKS: Collection = Collection {
    name: "networks",
    entity: "network",
    prefix: "/api",
    operations: &[
        Operation::index(Capability::Networks),
        Operation::show(Capability::Network),
        Operation {
            name: "create",
            method: OpMethod::Post,
            member: false,
            action: None,
            capability: Some(Capability::CreateNetwork),
            params: &[Param::optional("name"), Param::optional("address_block")],
        },
        Operation {
            name: "destroy",
            method: OpMethod::Delete,
            member: true,
            action: None,
            capability: Some(Capability::DestroyNetwork),
            params: &[],
        },
    ],
};

pub fn routes(driver: &dyn Driver) -> Router<AppState> {
    let mut router = Router::new();
    router = NETWORKS.mount(router, driver, "index", index);
    router = NETWORKS.mount(router, driver, "create", create);
    router = NETWORKS.mount(router, driver, "show", show);
    NETWORKS.mount(router, driver, "destroy", destroy)
}

async fn index(
    State(state): State<AppState>,
    credentials: Credentials,
    urls: UrlBuilder,
    Query(filter): Query<Filter>,
) -> Result<Json<Value>> {
    let networks = state.driver.networks(&credentials, &filter).await?;
    NETWORKS.render_index(&urls, &networks)
}

async fn show(
    State(state): State<AppState>,
    credentials: Credentials,
    urls: UrlBuilder,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let network = state
        .driver
        .network(&credentials, &id)
        .await?
        .ok_or_else(|| DeltacloudError::not_found("network", &id))?;
    NETWORKS.render_entity(&urls, &network)
}

async fn create(
    State(state): State<AppState>,
    credentials: Credentials,
    urls: UrlBuilder,
    params: Params,
) -> Result<(StatusCode, Json<Value>)> {
    NETWORKS.check_params("create", state.driver.as_ref(), &params.0)?;
    let request: NetworkRequest = params.into_typed()?;
    let network = state.driver.create_network(&credentials, &request).await?;
    tracing::info!("Created network {}", network.id);
    Ok((StatusCode::CREATED, NETWORKS.render_entity(&urls, &network)?))
}

async fn destroy(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.driver.destroy_network(&credentials, &id).await?;
    tracing::info!("Destroyed network {}", id);
    Ok(StatusCode::NO_CONTENT)
}
