use axum::{
    debug_handler,
    extract::{Multipart, Path, State},
    routing::{delete, patch, post},
    Json,
};
use opentone_core::{PlaylistData, PlaylistUpdate};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{
        AddTrackSchema, NewPlaylistSchema, ReorderTracksSchema, SortPlaylistsSchema,
        UpdatePlaylistSchema, ValidatedJson,
    },
    serialized::{Playlist, ToSerialized},
    Router,
};

/// Fetches a playlist the session user is allowed to modify
async fn editable_playlist(
    context: &ServerContext,
    session: &Session,
    playlist_id: i64,
) -> Result<PlaylistData, ServerError> {
    let playlist = context.app.playlists.by_id(playlist_id).await?;

    if !playlist.editable_by(&session.user()) {
        return Err(ServerError::Forbidden);
    }

    Ok(playlist)
}

#[utoipa::path(
    post,
    path = "/v1/playlists",
    tag = "playlists",
    request_body = NewPlaylistSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Playlist)
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn create(
    State(context): State<ServerContext>,
    session: Session,
    ValidatedJson(body): ValidatedJson<NewPlaylistSchema>,
) -> ServerResult<Json<Playlist>> {
    let playlist = context
        .app
        .playlists
        .create(&session.user(), &body.title, body.private)
        .await?;

    Ok(Json(playlist.to_serialized()))
}

#[utoipa::path(
    patch,
    path = "/v1/playlists/{id}",
    tag = "playlists",
    request_body = UpdatePlaylistSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Playlist, description = "Going public also publishes, once the playlist holds at least 2 tracks")
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn update(
    State(context): State<ServerContext>,
    session: Session,
    Path(playlist_id): Path<i64>,
    ValidatedJson(body): ValidatedJson<UpdatePlaylistSchema>,
) -> ServerResult<Json<Playlist>> {
    let playlist = editable_playlist(&context, &session, playlist_id).await?;

    let updated = context
        .app
        .playlists
        .update(
            &playlist,
            PlaylistUpdate {
                title: body.title,
                private: body.private,
            },
        )
        .await?;

    Ok(Json(updated.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/playlists/{id}",
    tag = "playlists",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Playlist was deleted")
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn destroy(
    State(context): State<ServerContext>,
    session: Session,
    Path(playlist_id): Path<i64>,
) -> ServerResult<()> {
    let playlist = editable_playlist(&context, &session, playlist_id).await?;

    context.app.playlists.destroy(playlist.id).await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/playlists/{id}/tracks",
    tag = "playlists",
    request_body = AddTrackSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Playlist)
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn add_track(
    State(context): State<ServerContext>,
    session: Session,
    Path(playlist_id): Path<i64>,
    ValidatedJson(body): ValidatedJson<AddTrackSchema>,
) -> ServerResult<Json<Playlist>> {
    let playlist = editable_playlist(&context, &session, playlist_id).await?;

    let asset = context.app.library.asset_by_id(body.track_id).await?;

    if !asset.visible_to(Some(&session.user())) {
        return Err(ServerError::NotFound {
            resource: "asset",
            identifier: "id",
        });
    }

    let updated = context
        .app
        .playlists
        .add_track(playlist.id, asset.id)
        .await?;

    Ok(Json(updated.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/playlists/{id}/tracks/{track_id}",
    tag = "playlists",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Playlist)
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn remove_track(
    State(context): State<ServerContext>,
    session: Session,
    Path((playlist_id, track_id)): Path<(i64, i64)>,
) -> ServerResult<Json<Playlist>> {
    let playlist = editable_playlist(&context, &session, playlist_id).await?;

    let updated = context
        .app
        .playlists
        .remove_track(playlist.id, track_id)
        .await?;

    Ok(Json(updated.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/playlists/{id}/reorder",
    tag = "playlists",
    request_body = ReorderTracksSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Playlist)
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn reorder(
    State(context): State<ServerContext>,
    session: Session,
    Path(playlist_id): Path<i64>,
    ValidatedJson(body): ValidatedJson<ReorderTracksSchema>,
) -> ServerResult<Json<Playlist>> {
    let playlist = editable_playlist(&context, &session, playlist_id).await?;

    let updated = context
        .app
        .playlists
        .reorder(playlist.id, &body.track_ids)
        .await?;

    Ok(Json(updated.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/playlists/sort",
    tag = "playlists",
    request_body = SortPlaylistsSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The session user's playlists were reordered")
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn sort(
    State(context): State<ServerContext>,
    session: Session,
    ValidatedJson(body): ValidatedJson<SortPlaylistsSchema>,
) -> ServerResult<()> {
    context
        .app
        .playlists
        .sort(session.user().id, &body.playlist_ids)
        .await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/playlists/{id}/pic",
    tag = "playlists",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Playlist, description = "Cover photo was stored and attached")
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn attach_pic(
    State(context): State<ServerContext>,
    session: Session,
    Path(playlist_id): Path<i64>,
    mut multipart: Multipart,
) -> ServerResult<Json<Playlist>> {
    let playlist = editable_playlist(&context, &session, playlist_id).await?;

    let field = multipart
        .next_field()
        .await
        .map_err(|_| ServerError::BadRequest("Malformed multipart body"))?
        .ok_or(ServerError::BadRequest("No photo supplied"))?;

    let data = field
        .bytes()
        .await
        .map_err(|_| ServerError::BadRequest("Malformed multipart body"))?;

    if data.is_empty() {
        return Err(ServerError::BadRequest("No photo supplied"));
    }

    let updated = context.app.playlists.attach_pic(&playlist, &data).await?;

    Ok(Json(updated.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", post(create))
        .route("/sort", post(sort))
        .route("/:id", patch(update))
        .route("/:id", delete(destroy))
        .route("/:id/tracks", post(add_track))
        .route("/:id/tracks/:track_id", delete(remove_track))
        .route("/:id/reorder", post(reorder))
        .route("/:id/pic", post(attach_pic))
}
