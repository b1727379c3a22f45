use super::{AppState, Collection, OpMethod, Operation, Param, Params};
use crate::core::context::UrlBuilder;
use crate::domain::capability::{Capability, Feature};
use crate::domain::filter::Filter;
use crate::domain::model::{Instance, InstanceRequest};
use crate::domain::ports::{Credentials, Driver};
use crate::domain::state::Action;
use crate::utils::error::{DeltacloudError, Result};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Json, Router};
use serde_json::Value;

const fn action(name: &'static str, capability: Capability) -> Operation {
    Operation {
        name,
        method: OpMethod::Post,
        member: true,
        action: Some(name),
        capability: Some(capability),
        params: &[],
    }
}

pub static INSTANCES: Collection = Collection {
    name: "instances",
    entity: "instance",
    prefix: "/api",
    operations: &[
        Operation::index(Capability::Instances),
        Operation::show(Capability::Instance),
        Operation {
            name: "create",
            method: OpMethod::Post,
            member: false,
            action: None,
            capability: Some(Capability::CreateInstance),
            params: &[
                Param::required("image_id"),
                Param::optional("realm_id"),
                Param::optional("hwp_id"),
                Param::with_feature("name", Feature::UserName),
                Param::with_feature("keyname", Feature::AuthenticationKey),
                Param::with_feature("user_data", Feature::UserData),
            ],
        },
        Operation {
            name: "destroy",
            method: OpMethod::Delete,
            member: true,
            action: None,
            capability: Some(Capability::DestroyInstance),
            params: &[],
        },
        action("start", Capability::StartInstance),
        action("stop", Capability::StopInstance),
        action("reboot", Capability::RebootInstance),
    ],
};

pub fn routes(driver: &dyn Driver) -> Router<AppState> {
    let mut router = Router::new();
    router = INSTANCES.mount(router, driver, "index", index);
    router = INSTANCES.mount(router, driver, "create", create);
    router = INSTANCES.mount(router, driver, "show", show);
    router = INSTANCES.mount(router, driver, "destroy", destroy);
    router = INSTANCES.mount(router, driver, "start", start);
    router = INSTANCES.mount(router, driver, "stop", stop);
    INSTANCES.mount(router, driver, "reboot", reboot)
}

/// Actions always reflect what the driver's state machine allows next.
fn with_actions(driver: &dyn Driver, mut instance: Instance) -> Instance {
    instance.actions = driver
        .instance_state_machine()
        .actions_for(instance.state)
        .iter()
        .map(|a| a.as_str().to_string())
        .collect();
    instance
}

async fn find(driver: &dyn Driver, credentials: &Credentials, id: &str) -> Result<Instance> {
    driver
        .instance(credentials, id)
        .await?
        .ok_or_else(|| DeltacloudError::not_found("instance", id))
}

async fn index(
    State(state): State<AppState>,
    credentials: Credentials,
    urls: UrlBuilder,
    Query(filter): Query<Filter>,
) -> Result<Json<Value>> {
    let driver = state.driver.as_ref();
    let instances: Vec<Instance> = driver
        .instances(&credentials, &filter)
        .await?
        .into_iter()
        .map(|i| with_actions(driver, i))
        .collect();
    INSTANCES.render_index(&urls, &instances)
}

async fn show(
    State(state): State<AppState>,
    credentials: Credentials,
    urls: UrlBuilder,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let driver = state.driver.as_ref();
    let instance = find(driver, &credentials, &id).await?;
    INSTANCES.render_entity(&urls, &with_actions(driver, instance))
}

async fn create(
    State(state): State<AppState>,
    credentials: Credentials,
    urls: UrlBuilder,
    params: Params,
) -> Result<(StatusCode, Json<Value>)> {
    let driver = state.driver.as_ref();
    INSTANCES.check_params("create", driver, &params.0)?;
    let request: InstanceRequest = params.into_typed()?;

    let instance = driver.create_instance(&credentials, &request).await?;
    tracing::info!("Created instance {} from image {}", instance.id, request.image_id);
    let body = INSTANCES.render_entity(&urls, &with_actions(driver, instance))?;
    Ok((StatusCode::CREATED, body))
}

async fn destroy(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let driver = state.driver.as_ref();
    let instance = find(driver, &credentials, &id).await?;
    ensure_allowed(driver, &instance, Action::Destroy)?;
    driver.destroy_instance(&credentials, &id).await?;
    tracing::info!("Destroyed instance {}", id);
    Ok(StatusCode::NO_CONTENT)
}

fn ensure_allowed(driver: &dyn Driver, instance: &Instance, action: Action) -> Result<()> {
    if driver.instance_state_machine().allows(instance.state, action) {
        Ok(())
    } else {
        Err(DeltacloudError::InvalidState {
            action: action.as_str().to_string(),
            state: instance.state.to_string(),
        })
    }
}

async fn perform(
    state: &AppState,
    credentials: &Credentials,
    urls: &UrlBuilder,
    id: &str,
    action: Action,
) -> Result<Json<Value>> {
    let driver = state.driver.as_ref();
    let instance = find(driver, credentials, id).await?;
    ensure_allowed(driver, &instance, action)?;

    let updated = match action {
        Action::Start => driver.start_instance(credentials, id).await?,
        Action::Stop => driver.stop_instance(credentials, id).await?,
        Action::Reboot => driver.reboot_instance(credentials, id).await?,
        other => return Err(DeltacloudError::not_supported(other.as_str())),
    };
    tracing::info!("Instance {}: {} -> {}", id, action.as_str(), updated.state);
    INSTANCES.render_entity(urls, &with_actions(driver, updated))
}

async fn start(
    State(state): State<AppState>,
    credentials: Credentials,
    urls: UrlBuilder,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    perform(&state, &credentials, &urls, &id, Action::Start).await
}

async fn stop(
    State(state): State<AppState>,
    credentials: Credentials,
    urls: UrlBuilder,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    perform(&state, &credentials, &urls, &id, Action::Stop).await
}

async fn reboot(
    State(state): State<AppState>,
    credentials: Credentials,
    urls: UrlBuilder,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    perform(&state, &credentials, &urls, &id, Action::Reboot).await
}
