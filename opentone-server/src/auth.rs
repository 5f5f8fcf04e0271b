use axum::{
    async_trait, debug_handler,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{header, request::Parts},
    routing::{delete, get, patch, post},
    Json,
};
use chrono::Utc;
use opentone_core::{Credentials, NewAccount, SessionData, UpdatedUser, UserData};
use std::net::SocketAddr;

use crate::{
    errors::{ServerError, ServerResult},
    schemas::{LoginSchema, RegisterSchema, UpdateUserSchema, ValidatedJson},
    serialized::{LoginResult, ToSerialized, User},
    Router, ServerContext,
};

/// Wraps [SessionData] so [FromRequestParts] can be implemented for it
pub struct Session(SessionData);

impl Session {
    /// Returns the user of the session
    pub fn user(&self) -> UserData {
        self.0.user.clone()
    }

    pub fn token(&self) -> &str {
        &self.0.token
    }

    /// Returns the user if they hold the moderator role
    pub fn require_moderator(&self) -> Result<UserData, ServerError> {
        let user = self.user();

        if user.can_moderate() {
            Ok(user)
        } else {
            Err(ServerError::Forbidden)
        }
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for Session {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|x| x.to_str().ok())
            .ok_or(ServerError::Unauthorized)?;

        let token_parts: Vec<_> = token.split_ascii_whitespace().collect();

        if token_parts.first() != Some(&"Bearer") {
            return Err(ServerError::BadRequest("Authorization must be Bearer"));
        }

        let token = token_parts.last().cloned().unwrap_or_default();

        let session = state
            .app
            .auth
            .session(token)
            .await
            .map_err(|_| ServerError::Unauthorized)?;

        if session.expires_at < Utc::now() {
            return Err(ServerError::Unauthorized);
        }

        Ok(Self(session))
    }
}

/// A session when the request carries a valid one. Public endpoints use
/// this so owners and moderators see more than guests.
pub struct MaybeSession(pub Option<SessionData>);

impl MaybeSession {
    pub fn user(&self) -> Option<UserData> {
        self.0.as_ref().map(|s| s.user.clone())
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for MaybeSession {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        match Session::from_request_parts(parts, state).await {
            Ok(session) => Ok(Self(Some(session.0))),
            Err(_) => Ok(Self(None)),
        }
    }
}

/// The request metadata the listen recorder and the spam classifier care
/// about
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub ip: String,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

#[async_trait]
impl FromRequestParts<ServerContext> for RequestMeta {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let header_str = |name: header::HeaderName| {
            parts
                .headers
                .get(name)
                .and_then(|x| x.to_str().ok())
                .map(|x| x.to_string())
        };

        // Behind a proxy the forwarded header holds the real client,
        // first address wins
        let ip = header_str(header::HeaderName::from_static("x-forwarded-for"))
            .and_then(|x| x.split(',').next().map(|s| s.trim().to_string()))
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|c| c.0.ip().to_string())
            })
            .unwrap_or_else(|| "unknown".to_string());

        Ok(Self {
            ip,
            user_agent: header_str(header::USER_AGENT),
            referrer: header_str(header::REFERER),
        })
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    tag = "auth",
    request_body = RegisterSchema,
    responses(
        (status = 200, body = User)
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn register(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<RegisterSchema>,
) -> ServerResult<Json<User>> {
    let user = context
        .app
        .auth
        .register(NewAccount {
            login: body.login,
            email: body.email,
            password: body.password,
            display_name: body.display_name,
        })
        .await?;

    Ok(Json(user.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    tag = "auth",
    request_body = LoginSchema,
    responses(
        (status = 200, body = LoginResult),
        (status = 400, description = "Invalid credentials")
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn login(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<LoginSchema>,
) -> ServerResult<Json<LoginResult>> {
    let session = context
        .app
        .auth
        .login(Credentials {
            login: body.login,
            password: body.password,
        })
        .await?;

    Ok(Json(session.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/auth/logout",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Session was destroyed")
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn logout(
    State(context): State<ServerContext>,
    session: Session,
) -> ServerResult<()> {
    context.app.auth.logout(session.token()).await?;

    Ok(())
}

#[utoipa::path(
    get,
    path = "/v1/auth/user",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User)
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn user(session: Session) -> Json<User> {
    Json(session.user().to_serialized())
}

#[utoipa::path(
    patch,
    path = "/v1/auth/user",
    tag = "auth",
    request_body = UpdateUserSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User)
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn update_user(
    State(context): State<ServerContext>,
    session: Session,
    ValidatedJson(body): ValidatedJson<UpdateUserSchema>,
) -> ServerResult<Json<User>> {
    let updated = context
        .app
        .auth
        .update_user(UpdatedUser {
            id: session.user().id,
            display_name: body.display_name,
        })
        .await?;

    Ok(Json(updated.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", delete(logout))
        .route("/user", get(user))
        .route("/user", patch(update_user))
}
