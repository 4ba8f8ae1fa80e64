//! Account registration, login and the user admin routes.

use super::{AppState, Payload};
use crate::auth::{verify_credentials, CredentialOutcome, CredentialRecord, StoreError, UserView};
use crate::domain::error::{ApiError, ApiResult};
use crate::domain::ids::UserId;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

const ALL_FIELDS_REQUIRED: &str = "All fields required";

#[derive(Debug, Default, Deserialize)]
pub struct CredentialsBody {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl CredentialsBody {
    /// Both fields present and non-empty
    fn required(self) -> Option<(String, String)> {
        match (self.username, self.password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some((u, p)),
            _ => None,
        }
    }
}

fn store_failure(operation: &str, error: StoreError, status: StatusCode) -> ApiError {
    warn!(operation, error = %error, "credential store call failed");
    ApiError::upstream(status)
}

fn issue_token(state: &AppState, record: &CredentialRecord) -> ApiResult<Json<Value>> {
    let token = state.issuer.issue(record).map_err(|error| {
        warn!(error = %error, "token issue failed");
        ApiError::upstream(StatusCode::INTERNAL_SERVER_ERROR)
    })?;
    Ok(Json(json!({ "token": token })))
}

/// `POST /user/register` → `{token}`
pub async fn register(
    State(state): State<AppState>,
    Payload(body): Payload<CredentialsBody>,
) -> ApiResult<Json<Value>> {
    let (username, password) = body
        .required()
        .ok_or_else(|| ApiError::message(StatusCode::BAD_REQUEST, ALL_FIELDS_REQUIRED))?;

    let record = match state
        .store
        .insert(CredentialRecord::new(username, &password))
        .await
    {
        Ok(record) => record,
        Err(StoreError::DuplicateUsername(_)) => {
            return Err(ApiError::message(
                StatusCode::BAD_REQUEST,
                "Username already taken",
            ))
        }
        Err(error) => return Err(store_failure("register", error, StatusCode::NOT_FOUND)),
    };

    info!(user = %record.id, "user registered");
    issue_token(&state, &record)
}

/// `POST /user/login` → `{token}`
///
/// Unknown user and wrong password share the 401 status. The message is
/// unified unless `auth.distinguish_login_failures` is set.
pub async fn login(
    State(state): State<AppState>,
    Payload(body): Payload<CredentialsBody>,
) -> ApiResult<Json<Value>> {
    let (username, password) = body
        .required()
        .ok_or_else(|| ApiError::message(StatusCode::BAD_REQUEST, ALL_FIELDS_REQUIRED))?;

    let outcome = verify_credentials(state.store.as_ref(), &username, &password)
        .await
        .map_err(|e| store_failure("login", e, StatusCode::NOT_FOUND))?;

    let distinguish = state.config.auth.distinguish_login_failures;
    let message = match outcome {
        CredentialOutcome::Valid(record) => return issue_token(&state, &record),
        CredentialOutcome::UnknownUser if distinguish => "Incorrect username.",
        CredentialOutcome::WrongPassword if distinguish => "Incorrect password.",
        _ => "Invalid username or password",
    };
    Err(ApiError::message(StatusCode::UNAUTHORIZED, message))
}

/// `POST /user/add` → user view
pub async fn add_user(
    State(state): State<AppState>,
    Payload(body): Payload<CredentialsBody>,
) -> ApiResult<Json<UserView>> {
    let (username, password) = body
        .required()
        .ok_or_else(|| ApiError::upstream(StatusCode::NOT_FOUND))?;

    let record = state
        .store
        .insert(CredentialRecord::new(username, &password))
        .await
        .map_err(|e| store_failure("add user", e, StatusCode::NOT_FOUND))?;
    Ok(Json(record.view()))
}

/// `GET /user/get` → all user views
pub async fn get_users(State(state): State<AppState>) -> ApiResult<Json<Vec<UserView>>> {
    let records = state
        .store
        .list()
        .await
        .map_err(|e| store_failure("list users", e, StatusCode::INTERNAL_SERVER_ERROR))?;
    Ok(Json(records.iter().map(CredentialRecord::view).collect()))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBody {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// `POST|PUT /user/update` → updated view
pub async fn update_user(
    State(state): State<AppState>,
    Payload(body): Payload<UpdateBody>,
) -> ApiResult<Json<UserView>> {
    let id = body
        .id
        .as_deref()
        .and_then(|s| UserId::parse(s).ok())
        .ok_or_else(|| ApiError::bad_request("Missing or invalid _id"))?;

    let mut record = state
        .store
        .find_by_id(id)
        .await
        .map_err(|e| store_failure("find user", e, StatusCode::BAD_REQUEST))?
        .ok_or_else(|| ApiError::upstream(StatusCode::NOT_FOUND))?;

    if let Some(username) = body.username.filter(|u| !u.is_empty()) {
        record.username = username;
    }
    if let Some(password) = body.password.filter(|p| !p.is_empty()) {
        record.set_password(&password);
    }

    let record = state
        .store
        .update(record)
        .await
        .map_err(|e| store_failure("update user", e, StatusCode::NOT_FOUND))?;
    Ok(Json(record.view()))
}

#[derive(Debug, Default, Deserialize)]
pub struct IdParam {
    #[serde(rename = "_id")]
    pub id: Option<String>,
}

/// `DELETE /user/delete?_id=` (or `_id` in the body) → `{message: view|null}`
pub async fn delete_user(
    State(state): State<AppState>,
    Query(query): Query<IdParam>,
    Payload(body): Payload<IdParam>,
) -> ApiResult<Json<Value>> {
    let Some(id) = query.id.or(body.id).as_deref().and_then(|s| UserId::parse(s).ok()) else {
        return Ok(Json(json!({ "message": null })));
    };

    let removed = state
        .store
        .delete(id)
        .await
        .map_err(|e| store_failure("delete user", e, StatusCode::NOT_FOUND))?;
    if let Some(record) = &removed {
        info!(user = %record.id, "user deleted");
    }
    Ok(Json(json!({ "message": removed.map(|r| r.view()) })))
}
