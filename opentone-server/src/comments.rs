use axum::{
    debug_handler,
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json,
};
use opentone_core::{CommentVisibility, IncomingComment, Page};
use serde::Deserialize;

use crate::{
    auth::{MaybeSession, RequestMeta, Session},
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{NewCommentSchema, ValidatedJson},
    serialized::{Comment, ToSerialized},
    Router,
};

#[derive(Debug, Default, Deserialize)]
pub struct CommentListQuery {
    pub page: Option<u32>,
    /// Moderators pass this to see the spam queue instead
    #[serde(default)]
    pub spam: bool,
}

#[utoipa::path(
    post,
    path = "/v1/comments",
    tag = "comments",
    request_body = NewCommentSchema,
    responses(
        (status = 200, description = "Comment was accepted"),
        (status = 400, description = "Body is missing or track doesn't exist")
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn create(
    State(context): State<ServerContext>,
    session: MaybeSession,
    meta: RequestMeta,
    ValidatedJson(body): ValidatedJson<NewCommentSchema>,
) -> ServerResult<()> {
    let viewer = session.user();
    let asset = context.app.library.asset_by_id(body.track_id).await?;

    if !asset.visible_to(viewer.as_ref()) {
        return Err(ServerError::NotFound {
            resource: "asset",
            identifier: "id",
        });
    }

    // A spam verdict flags the stored row, the caller still sees success
    context
        .app
        .comments
        .create(
            &asset,
            IncomingComment {
                body: body.body,
                commenter_id: viewer.map(|u| u.id),
                remote_ip: meta.ip,
                user_agent: meta.user_agent,
                referrer: meta.referrer,
                private: body.private,
            },
        )
        .await?;

    Ok(())
}

#[utoipa::path(
    get,
    path = "/v1/comments",
    tag = "comments",
    responses(
        (status = 200, body = Vec<Comment>)
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn index(
    State(context): State<ServerContext>,
    session: MaybeSession,
    Query(query): Query<CommentListQuery>,
) -> ServerResult<Json<Vec<Comment>>> {
    let viewer = session.user();
    let is_moderator = viewer.as_ref().is_some_and(|u| u.can_moderate());
    let page = Page::new(query.page.unwrap_or(1));

    let comments = if query.spam {
        if !is_moderator {
            return Err(ServerError::Forbidden);
        }

        context.app.comments.spam_queue(page).await?
    } else {
        let visibility = if is_moderator {
            CommentVisibility::IncludingPrivate
        } else {
            CommentVisibility::Public
        };

        context.app.comments.recent(visibility, page).await?
    };

    Ok(Json(comments.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/comments/{id}",
    tag = "comments",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Comment was thrown away for good")
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn destroy(
    State(context): State<ServerContext>,
    session: Session,
    Path(comment_id): Path<i64>,
) -> ServerResult<()> {
    let comment = context.app.comments.by_id(comment_id).await?;

    if !comment.moderatable_by(&session.user()) {
        return Err(ServerError::Forbidden);
    }

    context.app.comments.destroy(comment_id).await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/comments/{id}/spam",
    tag = "comments",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Comment was flagged and the missed verdict reported")
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn spam(
    State(context): State<ServerContext>,
    session: Session,
    Path(comment_id): Path<i64>,
) -> ServerResult<()> {
    let comment = context.app.comments.by_id(comment_id).await?;

    if !comment.moderatable_by(&session.user()) {
        return Err(ServerError::Forbidden);
    }

    context.app.comments.mark_spam(comment_id).await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/comments/{id}/unspam",
    tag = "comments",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Comment was unflagged and the wrong verdict reported")
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn unspam(
    State(context): State<ServerContext>,
    session: Session,
    Path(comment_id): Path<i64>,
) -> ServerResult<()> {
    let comment = context.app.comments.by_id(comment_id).await?;

    if !comment.moderatable_by(&session.user()) {
        return Err(ServerError::Forbidden);
    }

    context.app.comments.mark_ham(comment_id).await?;

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/", post(create))
        .route("/", get(index))
        .route("/:id", delete(destroy))
        .route("/:id/spam", post(spam))
        .route("/:id/unspam", post(unspam))
}
