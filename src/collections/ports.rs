use super::{AppState, Collection, OpMethod, Operation, Param, Params};
use crate::core::context::UrlBuilder;
use crate::domain::capability::Capability;
use crate::domain::filter::Filter;
use crate::domain::ports::{Credentials, Driver};
use crate::utils::error::{DeltacloudError, Result};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

pub static PORTS: Collection = Collection {
    name: "ports",
    entity: "port",
    prefix: "/api",
    operations: &[
        Operation::index(Capability::Ports),
        Operation::show(Capability::Port),
        Operation {
            name: "create",
            method: OpMethod::Post,
            member: false,
            action: None,
            capability: Some(Capability::CreatePort),
            params: &[Param::required("network")],
        },
        Operation {
            name: "destroy",
            method: OpMethod::Delete,
            member: true,
            action: None,
            capability: Some(Capability::DestroyPort),
            params: &[],
        },
    ],
};

#[derive(Debug, Deserialize)]
struct CreatePort {
    network: String,
}

pub fn routes(driver: &dyn Driver) -> Router<AppState> {
    let mut router = Router::new();
    router = PORTS.mount(router, driver, "index", index);
    router = PORTS.mount(router, driver, "create", create);
    router = PORTS.mount(router, driver, "show", show);
    PORTS.mount(router, driver, "destroy", destroy)
}

async fn index(
    State(state): State<AppState>,
    credentials: Credentials,
    urls: UrlBuilder,
    Query(filter): Query<Filter>,
) -> Result<Json<Value>> {
    let ports = state.driver.ports(&credentials, &filter).await?;
    PORTS.render_index(&urls, &ports)
}

async fn show(
    State(state): State<AppState>,
    credentials: Credentials,
    urls: UrlBuilder,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let port = state
        .driver
        .port(&credentials, &id)
        .await?
        .ok_or_else(|| DeltacloudError::not_found("port", &id))?;
    PORTS.render_entity(&urls, &port)
}

async fn create(
    State(state): State<AppState>,
    credentials: Credentials,
    urls: UrlBuilder,
    params: Params,
) -> Result<(StatusCode, Json<Value>)> {
    PORTS.check_params("create", state.driver.as_ref(), &params.0)?;
    let request: CreatePort = params.into_typed()?;
    let port = state.driver.create_port(&credentials, &request.network).await?;
    tracing::info!("Created port {} on network {}", port.id, request.network);
    Ok((StatusCode::CREATED, PORTS.render_entity(&urls, &port)?))
}

async fn destroy(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.driver.destroy_port(&credentials, &id).await?;
    tracing::info!("Destroyed port {}", id);
    Ok(StatusCode::NO_CONTENT)
}
