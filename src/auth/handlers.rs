use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    auth::dto::{LoginRequest, PublicUser, RegisterRequest},
    error::ApiError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/users/:id", get(get_user))
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, ApiError> {
    if value.is_empty() {
        warn!(field, "missing required field");
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(value)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), ApiError> {
    let name = required("name", payload.name.trim())?;
    let username = required("username", payload.username.trim())?;
    let password = required("password", &payload.password)?;

    let user = state.auth.register(name, username, password).await?;
    Ok((StatusCode::CREATED, Json(PublicUser::from(user))))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    let username = required("username", payload.username.trim())?;
    let password = required("password", &payload.password)?;

    match state.auth.login(username, password).await? {
        Some(user) => Ok(Json(PublicUser::from(user))),
        None => Err(ApiError::AuthenticationFailed),
    }
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PublicUser>, ApiError> {
    let Ok(id) = id.parse::<Uuid>() else {
        return Err(ApiError::NotFound("User"));
    };
    state
        .auth
        .get_user_by_id(id)
        .await?
        .map(|user| Json(PublicUser::from(user)))
        .ok_or(ApiError::NotFound("User"))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::{app::build_app, state::AppState};

    fn app() -> Router {
        build_app(AppState::fake())
    }

    async fn call(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn register_login_and_lookup() {
        let app = app();
        let (status, user) = call(
            app.clone(),
            "POST",
            "/api/v1/auth/register",
            Some(json!({"name": "Alice", "username": "alice", "password": "secret"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(user["username"], "alice");
        assert!(user.get("hashed_password").is_none());

        let (status, logged_in) = call(
            app.clone(),
            "POST",
            "/api/v1/auth/login",
            Some(json!({"username": "alice", "password": "secret"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(logged_in["id"], user["id"]);

        let uri = format!("/api/v1/users/{}", user["id"].as_str().unwrap());
        let (status, found) = call(app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found["name"], "Alice");
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let app = app();
        call(
            app.clone(),
            "POST",
            "/api/v1/auth/register",
            Some(json!({"name": "Alice", "username": "alice", "password": "secret"})),
        )
        .await;

        let unknown = call(
            app.clone(),
            "POST",
            "/api/v1/auth/login",
            Some(json!({"username": "nobody", "password": "x"})),
        )
        .await;
        let wrong = call(
            app,
            "POST",
            "/api/v1/auth/login",
            Some(json!({"username": "alice", "password": "wrongpass"})),
        )
        .await;
        assert_eq!(unknown.0, StatusCode::UNAUTHORIZED);
        assert_eq!(unknown, wrong);
    }

    #[tokio::test]
    async fn register_rejects_blank_fields() {
        let (status, body) = call(
            app(),
            "POST",
            "/api/v1/auth/register",
            Some(json!({"name": "Alice", "username": "  ", "password": "secret"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "username is required");
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let (status, _) = call(app(), "GET", "/api/v1/users/does-not-exist", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let uri = format!("/api/v1/users/{}", uuid::Uuid::new_v4());
        let (status, body) = call(app(), "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "User not found");
    }
}
