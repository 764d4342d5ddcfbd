//! Route table: CRUD + query endpoints over the monomorphized engine, plus
//! the metrics middleware layer every route passes through.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::AccessManagerError;

use super::middleware::metrics_middleware;
use super::state::ServiceState;

impl IntoResponse for AccessManagerErrorResponse {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AccessManagerError::NotFound(_) => StatusCode::NOT_FOUND,
            AccessManagerError::AlreadyExists(_) => StatusCode::CONFLICT,
            AccessManagerError::CycleDetected { .. } => StatusCode::CONFLICT,
            AccessManagerError::PostprocessingFailed(_) => StatusCode::BAD_GATEWAY,
            AccessManagerError::MonotonicityViolated { .. }
            | AccessManagerError::DrainTimeout(_)
            | AccessManagerError::FlushFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AccessManagerError::NextEventRetrievalFailed(_) | AccessManagerError::Unavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

/// Wraps [`AccessManagerError`] so it can implement `IntoResponse` without
/// violating the orphan rule.
pub struct AccessManagerErrorResponse(pub AccessManagerError);

impl From<AccessManagerError> for AccessManagerErrorResponse {
    fn from(e: AccessManagerError) -> Self {
        Self(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

type HandlerResult<T> = Result<Json<T>, AccessManagerErrorResponse>;

/// Build the full router, with tracing and permissive CORS layered on top —
/// mirroring the middleware stack the donor's service applies to every
/// route.
pub fn router(state: ServiceState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/users", get(list_users).post(add_user))
        .route("/users/:user", get(get_user).delete(remove_user))
        .route("/groups", get(list_groups).post(add_group))
        .route("/groups/:group", get(get_group).delete(remove_group))
        .route("/entity-types", get(list_entity_types).post(add_entity_type))
        .route("/entity-types/:entity_type", get(list_entities).delete(remove_entity_type))
        .route("/entity-types/:entity_type/entities", post(add_entity))
        .route("/entity-types/:entity_type/entities/:entity", axum::routing::delete(remove_entity))
        .route("/mappings/user-to-group", post(add_user_to_group))
        .route("/mappings/user-to-group/:user/:group", axum::routing::delete(remove_user_to_group))
        .route("/mappings/group-to-group", post(add_group_to_group))
        .route("/mappings/group-to-group/:from/:to", axum::routing::delete(remove_group_to_group))
        .route("/mappings/user-to-component", post(add_user_to_component))
        .route("/mappings/group-to-component", post(add_group_to_component))
        .route("/mappings/user-to-entity", post(add_user_to_entity))
        .route("/mappings/group-to-entity", post(add_group_to_entity))
        .route("/users/:user/groups", get(user_groups))
        .route("/users/:user/components", get(user_components))
        .route("/users/:user/entities", get(user_entities))
        .route(
            "/users/:user/access/components/:component/:access",
            get(user_has_component_access),
        )
        .route("/users/:user/access/entities/:entity_type/:entity", get(user_has_entity_access))
        .with_state(state)
        .layer(axum::middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Deserialize)]
struct UserBody {
    user: String,
}

async fn add_user(State(state): State<ServiceState>, Json(body): Json<UserBody>) -> HandlerResult<bool> {
    let outcome = state.manager.add_user(body.user, None)?;
    Ok(Json(outcome.changed))
}

async fn remove_user(State(state): State<ServiceState>, Path(user): Path<String>) -> HandlerResult<bool> {
    let outcome = state.manager.remove_user(&user, None)?;
    Ok(Json(outcome.changed))
}

async fn get_user(State(state): State<ServiceState>, Path(user): Path<String>) -> HandlerResult<bool> {
    Ok(Json(state.manager.contains_user(&user)))
}

async fn list_users(State(state): State<ServiceState>) -> Json<Vec<String>> {
    Json(state.manager.users())
}

#[derive(Deserialize)]
struct GroupBody {
    group: String,
}

async fn add_group(State(state): State<ServiceState>, Json(body): Json<GroupBody>) -> HandlerResult<bool> {
    Ok(Json(state.manager.add_group(body.group, None)?.changed))
}

async fn remove_group(State(state): State<ServiceState>, Path(group): Path<String>) -> HandlerResult<bool> {
    Ok(Json(state.manager.remove_group(&group, None)?.changed))
}

async fn get_group(State(state): State<ServiceState>, Path(group): Path<String>) -> HandlerResult<bool> {
    Ok(Json(state.manager.contains_group(&group)))
}

async fn list_groups(State(state): State<ServiceState>) -> Json<Vec<String>> {
    Json(state.manager.groups())
}

#[derive(Deserialize)]
struct EntityTypeBody {
    entity_type: String,
}

async fn add_entity_type(State(state): State<ServiceState>, Json(body): Json<EntityTypeBody>) -> HandlerResult<bool> {
    Ok(Json(state.manager.add_entity_type(body.entity_type, None)?.changed))
}

async fn remove_entity_type(State(state): State<ServiceState>, Path(entity_type): Path<String>) -> HandlerResult<bool> {
    Ok(Json(state.manager.remove_entity_type(&entity_type, None)?.changed))
}

async fn list_entity_types(State(state): State<ServiceState>) -> Json<Vec<String>> {
    Json(state.manager.entity_types())
}

fn list_entities_inner(state: &ServiceState, entity_type: &str) -> Vec<String> {
    state.manager.entities(entity_type)
}

async fn list_entities(State(state): State<ServiceState>, Path(entity_type): Path<String>) -> Json<Vec<String>> {
    Json(list_entities_inner(&state, &entity_type))
}

#[derive(Deserialize)]
struct EntityBody {
    entity: String,
}

async fn add_entity(
    State(state): State<ServiceState>,
    Path(entity_type): Path<String>,
    Json(body): Json<EntityBody>,
) -> HandlerResult<bool> {
    Ok(Json(state.manager.add_entity(&entity_type, body.entity, None)?.changed))
}

async fn remove_entity(
    State(state): State<ServiceState>,
    Path((entity_type, entity)): Path<(String, String)>,
) -> HandlerResult<bool> {
    Ok(Json(state.manager.remove_entity(&entity_type, &entity, None)?.changed))
}

#[derive(Deserialize)]
struct UserGroupBody {
    user: String,
    group: String,
}

async fn add_user_to_group(State(state): State<ServiceState>, Json(body): Json<UserGroupBody>) -> HandlerResult<bool> {
    Ok(Json(state.manager.add_user_to_group_mapping(body.user, body.group, None)?.changed))
}

async fn remove_user_to_group(
    State(state): State<ServiceState>,
    Path((user, group)): Path<(String, String)>,
) -> HandlerResult<bool> {
    Ok(Json(state.manager.remove_user_to_group_mapping(&user, &group, None)?.changed))
}

#[derive(Deserialize)]
struct GroupGroupBody {
    from: String,
    to: String,
}

async fn add_group_to_group(State(state): State<ServiceState>, Json(body): Json<GroupGroupBody>) -> HandlerResult<bool> {
    Ok(Json(state.manager.add_group_to_group_mapping(body.from, body.to, None)?.changed))
}

async fn remove_group_to_group(
    State(state): State<ServiceState>,
    Path((from, to)): Path<(String, String)>,
) -> HandlerResult<bool> {
    Ok(Json(state.manager.remove_group_to_group_mapping(&from, &to, None)?.changed))
}

#[derive(Deserialize)]
struct ComponentMappingBody {
    principal: String,
    component: String,
    access: String,
}

async fn add_user_to_component(
    State(state): State<ServiceState>,
    Json(body): Json<ComponentMappingBody>,
) -> HandlerResult<bool> {
    Ok(Json(
        state
            .manager
            .add_user_to_component_mapping(body.principal, body.component, body.access, None)?
            .changed,
    ))
}

async fn add_group_to_component(
    State(state): State<ServiceState>,
    Json(body): Json<ComponentMappingBody>,
) -> HandlerResult<bool> {
    Ok(Json(
        state
            .manager
            .add_group_to_component_mapping(body.principal, body.component, body.access, None)?
            .changed,
    ))
}

#[derive(Deserialize)]
struct EntityMappingBody {
    principal: String,
    entity_type: String,
    entity: String,
}

async fn add_user_to_entity(State(state): State<ServiceState>, Json(body): Json<EntityMappingBody>) -> HandlerResult<bool> {
    Ok(Json(
        state
            .manager
            .add_user_to_entity_mapping(body.principal, body.entity_type, body.entity, None)?
            .changed,
    ))
}

async fn add_group_to_entity(State(state): State<ServiceState>, Json(body): Json<EntityMappingBody>) -> HandlerResult<bool> {
    Ok(Json(
        state
            .manager
            .add_group_to_entity_mapping(body.principal, body.entity_type, body.entity, None)?
            .changed,
    ))
}

#[derive(Deserialize)]
struct IndirectQuery {
    #[serde(default)]
    indirect: bool,
}

async fn user_groups(
    State(state): State<ServiceState>,
    Path(user): Path<String>,
    axum::extract::Query(q): axum::extract::Query<IndirectQuery>,
) -> Json<Vec<String>> {
    Json(state.manager.get_user_to_group_mappings(&user, q.indirect))
}

async fn user_components(State(state): State<ServiceState>, Path(user): Path<String>) -> Json<Vec<(String, String)>> {
    Json(state.manager.get_application_components_accessible_by_user(&user).into_iter().collect())
}

async fn user_entities(State(state): State<ServiceState>, Path(user): Path<String>) -> Json<Vec<(String, String)>> {
    Json(state.manager.get_entities_accessible_by_user(&user, None).into_iter().collect())
}

async fn user_has_component_access(
    State(state): State<ServiceState>,
    Path((user, component, access)): Path<(String, String, String)>,
) -> Json<bool> {
    Json(state.manager.has_access_to_application_component(&user, &component, &access))
}

async fn user_has_entity_access(
    State(state): State<ServiceState>,
    Path((user, entity_type, entity)): Path<(String, String, String)>,
) -> Json<bool> {
    Json(state.manager.has_access_to_entity(&user, &entity_type, &entity))
}
