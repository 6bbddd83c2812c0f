//! Principal management endpoints.

use super::{
    metadata,
    types::{BlockedRequest, CreatePrincipalRequest},
    visible_target,
};
use crate::{
    api::{error::ApiError, state::ServiceState},
    principal::{
        Allowances, Principal,
        password::{hash_password, validate_strength},
    },
    privilege::Capability,
};
use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/v1/users",
    responses(
        (status = 200, description = "Every principal except the administrator", body = [Principal]),
        (status = 401, description = "Caller rejected"),
        (status = 403, description = "Missing view privilege")
    ),
    tag = "users"
)]
pub async fn list_users(
    headers: HeaderMap,
    Extension(state): Extension<Arc<ServiceState>>,
) -> Result<Json<Vec<Principal>>, ApiError> {
    state
        .guard()
        .authorize(&metadata(&headers), &[Capability::View])
        .await?;
    let principals = state
        .deadline()
        .run("principal list", state.principals().list())
        .await?;
    Ok(Json(principals))
}

#[utoipa::path(
    post,
    path = "/v1/users",
    request_body = CreatePrincipalRequest,
    responses(
        (status = 201, description = "Principal created", body = Principal),
        (status = 400, description = "Invalid principal or password"),
        (status = 401, description = "Caller rejected"),
        (status = 403, description = "Missing create privilege")
    ),
    tag = "users"
)]
pub async fn create_user(
    headers: HeaderMap,
    Extension(state): Extension<Arc<ServiceState>>,
    Json(request): Json<CreatePrincipalRequest>,
) -> Result<(StatusCode, Json<Principal>), ApiError> {
    let caller = state
        .guard()
        .authorize(&metadata(&headers), &[Capability::Create])
        .await?;

    let principal = Principal::new(Uuid::new_v4(), request.name.trim(), request.email.trim())
        .with_allowances(request.allowances);
    principal.validate_for_create()?;
    validate_strength(&request.password)?;

    let password_hash = hash_password(&request.password)?;
    state
        .deadline()
        .run(
            "principal insert",
            state.principals().create(&principal, &password_hash),
        )
        .await?;

    info!(principal_id = %principal.id, created_by = %caller.principal.id, "principal created");
    Ok((StatusCode::CREATED, Json(principal)))
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}",
    params(("id" = Uuid, Path, description = "Principal id")),
    responses(
        (status = 200, description = "Principal found", body = Principal),
        (status = 401, description = "Caller rejected"),
        (status = 403, description = "Missing view privilege"),
        (status = 404, description = "No such principal")
    ),
    tag = "users"
)]
pub async fn get_user(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(state): Extension<Arc<ServiceState>>,
) -> Result<Json<Principal>, ApiError> {
    state
        .guard()
        .authorize(&metadata(&headers), &[Capability::View])
        .await?;
    let principal = visible_target(
        state
            .deadline()
            .run("principal lookup", state.principals().get(id))
            .await,
    )?;
    Ok(Json(principal))
}

#[utoipa::path(
    delete,
    path = "/v1/users/{id}",
    params(("id" = Uuid, Path, description = "Principal id")),
    responses(
        (status = 204, description = "Principal deleted with its sessions and history"),
        (status = 401, description = "Caller rejected"),
        (status = 403, description = "Missing delete privilege"),
        (status = 404, description = "No such principal")
    ),
    tag = "users"
)]
pub async fn delete_user(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(state): Extension<Arc<ServiceState>>,
) -> Result<StatusCode, ApiError> {
    let caller = state
        .guard()
        .authorize(&metadata(&headers), &[Capability::Delete])
        .await?;
    let target = visible_target(
        state
            .deadline()
            .run("principal lookup", state.principals().get(id))
            .await,
    )?;

    if !state
        .deadline()
        .run("principal delete", state.principals().delete(target.id))
        .await?
    {
        return Err(ApiError::NotFound);
    }
    if let Err(err) = state
        .tokens()
        .purge_principal(target.id, state.deadline())
        .await
    {
        warn!(principal_id = %target.id, "failed to purge ledgers: {err}");
    }

    info!(principal_id = %target.id, deleted_by = %caller.principal.id, "principal deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/users/by-email/{email}",
    params(("email" = String, Path, description = "Principal email")),
    responses(
        (status = 200, description = "Principal found", body = Principal),
        (status = 401, description = "Caller rejected"),
        (status = 403, description = "Missing view privilege"),
        (status = 404, description = "No such principal")
    ),
    tag = "users"
)]
pub async fn get_user_by_email(
    headers: HeaderMap,
    Path(email): Path<String>,
    Extension(state): Extension<Arc<ServiceState>>,
) -> Result<Json<Principal>, ApiError> {
    state
        .guard()
        .authorize(&metadata(&headers), &[Capability::View])
        .await?;
    let principal = visible_target(
        state
            .deadline()
            .run("principal lookup", state.principals().get_by_email(&email))
            .await,
    )?;
    Ok(Json(principal))
}

#[utoipa::path(
    get,
    path = "/v1/me",
    responses(
        (status = 200, description = "The caller's current record", body = Principal),
        (status = 401, description = "Caller rejected")
    ),
    tag = "users"
)]
pub async fn me(
    headers: HeaderMap,
    Extension(state): Extension<Arc<ServiceState>>,
) -> Result<Json<Principal>, ApiError> {
    let caller = state.guard().authenticate(&metadata(&headers)).await?;
    Ok(Json(caller.principal))
}

#[utoipa::path(
    put,
    path = "/v1/users/{id}/allowances",
    params(("id" = Uuid, Path, description = "Principal id")),
    request_body = Allowances,
    responses(
        (status = 200, description = "Allowances updated", body = Principal),
        (status = 400, description = "Inconsistent allowances"),
        (status = 401, description = "Caller rejected"),
        (status = 403, description = "Missing privilege"),
        (status = 404, description = "No such principal")
    ),
    tag = "users"
)]
pub async fn update_allowances(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(state): Extension<Arc<ServiceState>>,
    Json(allowances): Json<Allowances>,
) -> Result<Json<Principal>, ApiError> {
    let caller = state
        .guard()
        .authorize(&metadata(&headers), &[Capability::ManagePermissions])
        .await?;
    allowances.validate()?;

    let mut target = visible_target(
        state
            .deadline()
            .run("principal lookup", state.principals().get(id))
            .await,
    )?;
    let own = caller.principal.allowances;
    if target.id == caller.principal.id && !(own.view && own.create) {
        return Err(ApiError::Forbidden);
    }

    if !state
        .deadline()
        .run(
            "principal update",
            state.principals().update_allowances(target.id, allowances),
        )
        .await?
    {
        return Err(ApiError::NotFound);
    }

    target.allowances = allowances;
    info!(principal_id = %target.id, updated_by = %caller.principal.id, "allowances updated");
    Ok(Json(target))
}

#[utoipa::path(
    put,
    path = "/v1/users/{id}/blocked",
    params(("id" = Uuid, Path, description = "Principal id")),
    request_body = BlockedRequest,
    responses(
        (status = 204, description = "Blocked flag updated"),
        (status = 401, description = "Caller rejected"),
        (status = 403, description = "Missing block privilege"),
        (status = 404, description = "No such principal")
    ),
    tag = "users"
)]
pub async fn update_blocked(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(state): Extension<Arc<ServiceState>>,
    Json(request): Json<BlockedRequest>,
) -> Result<StatusCode, ApiError> {
    let caller = state
        .guard()
        .authorize(&metadata(&headers), &[Capability::Block])
        .await?;
    let target = visible_target(
        state
            .deadline()
            .run("principal lookup", state.principals().get(id))
            .await,
    )?;

    if !state
        .deadline()
        .run(
            "principal update",
            state.principals().set_blocked(target.id, request.blocked),
        )
        .await?
    {
        return Err(ApiError::NotFound);
    }

    info!(
        principal_id = %target.id,
        blocked = request.blocked,
        updated_by = %caller.principal.id,
        "blocked flag updated"
    );
    Ok(StatusCode::NO_CONTENT)
}
