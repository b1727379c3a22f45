//! `/cimi/address_templates`, backed by the driver when it keeps templates
//! itself and by local storage otherwise.

use super::{AppState, Collection, OpMethod, Operation, Param, Params};
use crate::cimi::address_template::{self as cimi, AddressTemplateCreate, CimiContext};
use crate::core::context::UrlBuilder;
use crate::domain::capability::Capability;
use crate::domain::ports::Credentials;
use crate::utils::error::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Json, Router};
use serde_json::{json, Value};

pub static ADDRESS_TEMPLATES: Collection = Collection {
    name: "address_templates",
    entity: "address_template",
    prefix: "/cimi",
    operations: &[
        Operation {
            name: "index",
            method: OpMethod::Get,
            member: false,
            action: None,
            capability: None,
            params: &[],
        },
        Operation {
            name: "show",
            method: OpMethod::Get,
            member: true,
            action: None,
            capability: None,
            params: &[],
        },
        Operation {
            name: "create",
            method: OpMethod::Post,
            member: false,
            action: None,
            capability: None,
            params: &[Param::required("ip")],
        },
        Operation {
            name: "destroy",
            method: OpMethod::Delete,
            member: true,
            action: None,
            capability: None,
            params: &[],
        },
    ],
};

/// Served when there is somewhere to read templates from.
pub fn is_available(state: &AppState) -> bool {
    state.db.is_some() || state.driver.supports(Capability::AddressTemplates)
}

pub fn routes(state: &AppState) -> Router<AppState> {
    if !is_available(state) {
        tracing::debug!("Skipping address_templates: no driver support and no database");
        return Router::new();
    }
    let driver = state.driver.as_ref();
    let mut router = Router::new();
    router = ADDRESS_TEMPLATES.mount(router, driver, "index", index);
    router = ADDRESS_TEMPLATES.mount(router, driver, "create", create);
    router = ADDRESS_TEMPLATES.mount(router, driver, "show", show);
    ADDRESS_TEMPLATES.mount(router, driver, "destroy", destroy)
}

fn context<'a>(
    state: &'a AppState,
    credentials: &'a Credentials,
    urls: &'a UrlBuilder,
) -> CimiContext<'a> {
    CimiContext {
        driver: state.driver.as_ref(),
        credentials,
        db: state.db.as_ref(),
        scope: &state.scope,
        urls,
    }
}

async fn index(
    State(state): State<AppState>,
    credentials: Credentials,
    urls: UrlBuilder,
) -> Result<Json<Value>> {
    let templates = cimi::find_all(&context(&state, &credentials, &urls)).await?;
    Ok(Json(json!({
        "id": ADDRESS_TEMPLATES.url(&urls),
        "count": templates.len(),
        "addressTemplates": templates,
    })))
}

async fn show(
    State(state): State<AppState>,
    credentials: Credentials,
    urls: UrlBuilder,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let template = cimi::find(&context(&state, &credentials, &urls), &id).await?;
    Ok(Json(serde_json::to_value(template)?))
}

async fn create(
    State(state): State<AppState>,
    credentials: Credentials,
    urls: UrlBuilder,
    params: Params,
) -> Result<(StatusCode, Json<Value>)> {
    ADDRESS_TEMPLATES.check_params("create", state.driver.as_ref(), &params.0)?;
    let request: AddressTemplateCreate = params.into_typed()?;
    let template = cimi::create(&context(&state, &credentials, &urls), request).await?;
    Ok((StatusCode::CREATED, Json(serde_json::to_value(template)?)))
}

async fn destroy(
    State(state): State<AppState>,
    credentials: Credentials,
    urls: UrlBuilder,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    cimi::delete(&context(&state, &credentials, &urls), &id).await?;
    Ok(StatusCode::OK)
}
