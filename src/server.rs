//! HTTP API (feature `server`)
//!
//! Bearer-token sessions in front of the protected operations. Every
//! response is wrapped in [`ApiResponse`].

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{self, CredentialHasher};
use crate::context::{AuthContext, Session};
use crate::error::DashError;
use crate::icons::{IconPage, IconQuery};
use crate::model::{
    Icon, IconPatch, Id, Menu, MenuDetail, MenuPatch, NewIcon, NewMenu, NewPermission, NewRole, NewUser,
    Permission, PermissionPatch, Registration, RoleDetail, RolePatch, UserPatch, UserView,
};
use crate::protected;
use crate::store::Store;
use crate::visibility::MenuNode;

// ============================================================================
// State
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub hasher: Arc<dyn CredentialHasher>,
    pub session_ttl_secs: Option<u64>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, hasher: Arc<dyn CredentialHasher>, session_ttl_secs: Option<u64>) -> Self {
        AppState { store, hasher, session_ttl_secs }
    }

    /// Resolve the bearer token in `headers`
    fn session(&self, headers: &HeaderMap) -> Result<Session, ApiError> {
        let token = bearer(headers).ok_or(DashError::Unauthenticated)?;
        Ok(auth::validate_session(self.store.as_ref(), token)?)
    }

    fn ctx<'a>(&'a self, session: &'a Session) -> AuthContext<'a> {
        AuthContext::new(session, self.store.as_ref())
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None, code: None }
    }
}

/// Domain error at the HTTP boundary
#[derive(Debug)]
pub struct ApiError(pub DashError);

impl From<DashError> for ApiError {
    fn from(e: DashError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
            "internal server error".to_string()
        } else {
            self.0.to_string()
        };
        let body: ApiResponse<()> = ApiResponse { success: false, data: None, error: Some(message), code: Some(self.0.kind()) };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct LoginReq {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginRes {
    token: String,
    user: UserView,
}

#[derive(Debug, Serialize)]
struct HealthRes {
    status: &'static str,
    version: &'static str,
}

// ============================================================================
// Handlers: auth
// ============================================================================

async fn health() -> Json<HealthRes> {
    Json(HealthRes { status: "ok", version: env!("CARGO_PKG_VERSION") })
}

async fn login(State(s): State<AppState>, Json(req): Json<LoginReq>) -> ApiResult<LoginRes> {
    let r = auth::login(s.store.as_ref(), s.hasher.as_ref(), &req.email, &req.password, s.session_ttl_secs)?;
    ok(LoginRes { token: r.token, user: r.user })
}

async fn logout(State(s): State<AppState>, headers: HeaderMap) -> ApiResult<bool> {
    let token = bearer(&headers).ok_or(DashError::Unauthenticated)?;
    ok(auth::logout(s.store.as_ref(), token)?)
}

async fn register(State(s): State<AppState>, Json(form): Json<Registration>) -> ApiResult<UserView> {
    ok(auth::register(s.store.as_ref(), s.hasher.as_ref(), form)?)
}

async fn navigation(State(s): State<AppState>, headers: HeaderMap) -> ApiResult<Vec<MenuNode>> {
    let session = s.session(&headers)?;
    ok(protected::navigation(&s.ctx(&session))?)
}

// ============================================================================
// Handlers: users
// ============================================================================

async fn list_users(State(s): State<AppState>, headers: HeaderMap) -> ApiResult<Vec<UserView>> {
    let session = s.session(&headers)?;
    ok(protected::list_users(&s.ctx(&session))?)
}

async fn get_user(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Id>) -> ApiResult<UserView> {
    let session = s.session(&headers)?;
    ok(protected::get_user(&s.ctx(&session), id)?)
}

async fn create_user(State(s): State<AppState>, headers: HeaderMap, Json(req): Json<NewUser>) -> ApiResult<UserView> {
    let session = s.session(&headers)?;
    ok(protected::create_user(&s.ctx(&session), s.hasher.as_ref(), req)?)
}

async fn update_user(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Id>,
    Json(req): Json<UserPatch>,
) -> ApiResult<UserView> {
    let session = s.session(&headers)?;
    ok(protected::update_user(&s.ctx(&session), s.hasher.as_ref(), id, req)?)
}

async fn delete_user(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Id>) -> ApiResult<()> {
    let session = s.session(&headers)?;
    ok(protected::delete_user(&s.ctx(&session), id)?)
}

// ============================================================================
// Handlers: roles
// ============================================================================

async fn list_roles(State(s): State<AppState>, headers: HeaderMap) -> ApiResult<Vec<RoleDetail>> {
    let session = s.session(&headers)?;
    ok(protected::list_roles(&s.ctx(&session))?)
}

async fn get_role(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Id>) -> ApiResult<RoleDetail> {
    let session = s.session(&headers)?;
    ok(protected::get_role(&s.ctx(&session), id)?)
}

async fn create_role(State(s): State<AppState>, headers: HeaderMap, Json(req): Json<NewRole>) -> ApiResult<RoleDetail> {
    let session = s.session(&headers)?;
    ok(protected::create_role(&s.ctx(&session), req)?)
}

async fn update_role(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Id>,
    Json(req): Json<RolePatch>,
) -> ApiResult<RoleDetail> {
    let session = s.session(&headers)?;
    ok(protected::update_role(&s.ctx(&session), id, req)?)
}

async fn delete_role(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Id>) -> ApiResult<()> {
    let session = s.session(&headers)?;
    ok(protected::delete_role(&s.ctx(&session), id)?)
}

// ============================================================================
// Handlers: permissions
// ============================================================================

async fn list_permissions(State(s): State<AppState>, headers: HeaderMap) -> ApiResult<Vec<Permission>> {
    let session = s.session(&headers)?;
    ok(protected::list_permissions(&s.ctx(&session))?)
}

async fn get_permission(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Id>) -> ApiResult<Permission> {
    let session = s.session(&headers)?;
    ok(protected::get_permission(&s.ctx(&session), id)?)
}

async fn create_permission(
    State(s): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NewPermission>,
) -> ApiResult<Permission> {
    let session = s.session(&headers)?;
    ok(protected::create_permission(&s.ctx(&session), req)?)
}

async fn update_permission(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Id>,
    Json(req): Json<PermissionPatch>,
) -> ApiResult<Permission> {
    let session = s.session(&headers)?;
    ok(protected::update_permission(&s.ctx(&session), id, req)?)
}

async fn delete_permission(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Id>) -> ApiResult<()> {
    let session = s.session(&headers)?;
    ok(protected::delete_permission(&s.ctx(&session), id)?)
}

// ============================================================================
// Handlers: menus
// ============================================================================

async fn list_menus(State(s): State<AppState>, headers: HeaderMap) -> ApiResult<Vec<MenuDetail>> {
    let session = s.session(&headers)?;
    ok(protected::list_menus(&s.ctx(&session))?)
}

async fn get_menu(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Id>) -> ApiResult<MenuDetail> {
    let session = s.session(&headers)?;
    ok(protected::get_menu(&s.ctx(&session), id)?)
}

async fn create_menu(State(s): State<AppState>, headers: HeaderMap, Json(req): Json<NewMenu>) -> ApiResult<Menu> {
    let session = s.session(&headers)?;
    ok(protected::create_menu(&s.ctx(&session), req)?)
}

async fn update_menu(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Id>,
    Json(req): Json<MenuPatch>,
) -> ApiResult<Menu> {
    let session = s.session(&headers)?;
    ok(protected::update_menu(&s.ctx(&session), id, req)?)
}

async fn delete_menu(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Id>) -> ApiResult<()> {
    let session = s.session(&headers)?;
    ok(protected::delete_menu(&s.ctx(&session), id)?)
}

// ============================================================================
// Handlers: icons
// ============================================================================

async fn search_icons(State(s): State<AppState>, headers: HeaderMap, Query(q): Query<IconQuery>) -> ApiResult<IconPage> {
    let session = s.session(&headers)?;
    ok(protected::search_icons(&s.ctx(&session), &q)?)
}

async fn create_icon(State(s): State<AppState>, headers: HeaderMap, Json(req): Json<NewIcon>) -> ApiResult<Icon> {
    let session = s.session(&headers)?;
    ok(protected::create_icon(&s.ctx(&session), req)?)
}

async fn update_icon(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Id>,
    Json(req): Json<IconPatch>,
) -> ApiResult<Icon> {
    let session = s.session(&headers)?;
    ok(protected::update_icon(&s.ctx(&session), id, req)?)
}

async fn delete_icon(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Id>) -> ApiResult<()> {
    let session = s.session(&headers)?;
    ok(protected::delete_icon(&s.ctx(&session), id)?)
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        // Auth
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/register", post(register))
        .route("/navigation", get(navigation))
        // Users
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", get(get_user).put(update_user).delete(delete_user))
        // Roles
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/:id", get(get_role).put(update_role).delete(delete_role))
        // Permissions
        .route("/permissions", get(list_permissions).post(create_permission))
        .route("/permissions/:id", get(get_permission).put(update_permission).delete(delete_permission))
        // Menus
        .route("/menus", get(list_menus).post(create_menu))
        .route("/menus/:id", get(get_menu).put(update_menu).delete(delete_menu))
        // Icons
        .route("/icons", get(search_icons).post(create_icon))
        .route("/icons/:id", axum::routing::put(update_icon).delete(delete_icon))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
