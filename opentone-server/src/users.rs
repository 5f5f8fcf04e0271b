use axum::{
    debug_handler,
    extract::{Path, Query, State},
    routing::{get, post},
    Json,
};
use opentone_core::{CommentVisibility, Database, Page, UserCommand, UserData};

use crate::{
    auth::{MaybeSession, Session},
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::PageQuery,
    serialized::{FollowState, Playlist, Profile, ToSerialized, TrackPage, UserComments},
    Router,
};

/// Looks up an account by login, hiding quarantined ones from everyone
/// but moderators
async fn visible_user(
    context: &ServerContext,
    login: &str,
    viewer: Option<&UserData>,
) -> Result<UserData, ServerError> {
    let user = context.app.database().user_by_login(login).await?;

    if !user.active() && !viewer.is_some_and(|v| v.can_moderate()) {
        return Err(ServerError::NotFound {
            resource: "user",
            identifier: "login",
        });
    }

    Ok(user)
}

#[utoipa::path(
    get,
    path = "/v1/users/{login}",
    tag = "users",
    responses(
        (status = 200, body = Profile)
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn profile(
    State(context): State<ServerContext>,
    session: MaybeSession,
    Path(login): Path<String>,
) -> ServerResult<Json<Profile>> {
    let viewer = session.user();
    let user = visible_user(&context, &login, viewer.as_ref()).await?;

    let tracks = context.app.library.assets_for_user(user.id).await?;

    let include_private = viewer
        .as_ref()
        .is_some_and(|v| v.id == user.id || v.can_moderate());
    let playlists = context
        .app
        .playlists
        .for_user(user.id, include_private)
        .await?;

    Ok(Json(Profile::new(&user, &tracks, &playlists)))
}

#[utoipa::path(
    get,
    path = "/v1/users/{login}/tracks/{permalink}",
    tag = "users",
    responses(
        (status = 200, body = TrackPage)
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn track(
    State(context): State<ServerContext>,
    session: MaybeSession,
    Path((login, permalink)): Path<(String, String)>,
) -> ServerResult<Json<TrackPage>> {
    let viewer = session.user();
    let (owner, asset) = context.app.library.asset_for(&login, &permalink).await?;

    if !asset.visible_to(viewer.as_ref()) {
        return Err(ServerError::NotFound {
            resource: "asset",
            identifier: "permalink",
        });
    }

    // The track owner and moderators also see private comments
    let visibility = if viewer
        .as_ref()
        .is_some_and(|v| v.id == owner.id || v.can_moderate())
    {
        CommentVisibility::IncludingPrivate
    } else {
        CommentVisibility::Public
    };

    let comments = context.app.comments.for_asset(asset.id, visibility).await?;
    let listens = context.app.listens.count_for(asset.id).await?;

    Ok(Json(TrackPage::new(&asset, &owner, listens, &comments)))
}

#[utoipa::path(
    get,
    path = "/v1/users/{login}/comments",
    tag = "users",
    responses(
        (status = 200, body = UserComments)
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn comments(
    State(context): State<ServerContext>,
    session: MaybeSession,
    Path(login): Path<String>,
    Query(query): Query<PageQuery>,
) -> ServerResult<Json<UserComments>> {
    let viewer = session.user();
    let user = visible_user(&context, &login, viewer.as_ref()).await?;
    let page = Page::new(query.page.unwrap_or(1));

    let visibility = if viewer
        .as_ref()
        .is_some_and(|v| v.id == user.id || v.can_moderate())
    {
        CommentVisibility::IncludingPrivate
    } else {
        CommentVisibility::Public
    };

    let received = context
        .app
        .comments
        .received_by(user.id, visibility, page)
        .await?;
    let made = context
        .app
        .comments
        .made_by(user.id, visibility, page)
        .await?;

    Ok(Json(UserComments::new(&received, &made)))
}

#[utoipa::path(
    post,
    path = "/v1/users/{login}/follow",
    tag = "users",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = FollowState, description = "Followed when not following, unfollowed otherwise")
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn follow(
    State(context): State<ServerContext>,
    session: Session,
    Path(login): Path<String>,
) -> ServerResult<Json<FollowState>> {
    let follower = session.user();
    let followee = visible_user(&context, &login, Some(&follower)).await?;

    if followee.id == follower.id {
        return Err(ServerError::BadRequest("You can't follow yourself"));
    }

    let db = context.app.database();

    let following = if db.following_exists(followee.id, follower.id).await? {
        db.delete_following(followee.id, follower.id).await?;
        false
    } else {
        db.create_following(followee.id, follower.id).await?;
        true
    };

    Ok(Json(FollowState { following }))
}

#[utoipa::path(
    post,
    path = "/v1/users/{login}/spam",
    tag = "users",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "User was marked as spam, hiding them and all their content")
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn spam(
    State(context): State<ServerContext>,
    session: Session,
    Path(login): Path<String>,
) -> ServerResult<()> {
    session.require_moderator()?;

    let user = context.app.database().user_by_login(&login).await?;

    UserCommand::new(context.app.context(), &user)
        .spam_and_soft_delete_with_relations()
        .await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/users/{login}/restore",
    tag = "users",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "User and all their content are visible again")
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn restore(
    State(context): State<ServerContext>,
    session: Session,
    Path(login): Path<String>,
) -> ServerResult<()> {
    session.require_moderator()?;

    let user = context.app.database().user_by_login(&login).await?;

    UserCommand::new(context.app.context(), &user)
        .restore_with_relations()
        .await?;

    Ok(())
}

#[utoipa::path(
    get,
    path = "/v1/users/{login}/playlists",
    tag = "users",
    responses(
        (status = 200, body = Vec<Playlist>)
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn playlists(
    State(context): State<ServerContext>,
    session: MaybeSession,
    Path(login): Path<String>,
) -> ServerResult<Json<Vec<Playlist>>> {
    let viewer = session.user();
    let user = visible_user(&context, &login, viewer.as_ref()).await?;

    let include_private = viewer
        .as_ref()
        .is_some_and(|v| v.id == user.id || v.can_moderate());

    let playlists = context
        .app
        .playlists
        .for_user(user.id, include_private)
        .await?;

    Ok(Json(playlists.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/users/{login}/playlists/{permalink}",
    tag = "users",
    responses(
        (status = 200, body = Playlist)
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn playlist(
    State(context): State<ServerContext>,
    session: MaybeSession,
    Path((login, permalink)): Path<(String, String)>,
) -> ServerResult<Json<Playlist>> {
    let viewer = session.user();
    let user = visible_user(&context, &login, viewer.as_ref()).await?;

    let playlist = context
        .app
        .playlists
        .by_permalink(user.id, &permalink)
        .await?;

    if !playlist.visible_to(viewer.as_ref()) {
        return Err(ServerError::NotFound {
            resource: "playlist",
            identifier: "permalink",
        });
    }

    Ok(Json(playlist.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/:login", get(profile))
        .route("/:login/follow", post(follow))
        .route("/:login/spam", post(spam))
        .route("/:login/restore", post(restore))
        .route("/:login/comments", get(comments))
        .route("/:login/tracks/:permalink", get(track))
        .route("/:login/playlists", get(playlists))
        .route("/:login/playlists/:permalink", get(playlist))
}
