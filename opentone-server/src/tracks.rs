use axum::{
    debug_handler,
    extract::{Multipart, Path, Query, State},
    routing::{delete, get, patch, post},
    Json,
};
use opentone_core::{AssetCommand, Database, Page, UpdatedAsset, UploadSource};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{PageQuery, UpdateTrackSchema, ValidatedJson},
    serialized::{ToSerialized, Track, TrackListing, UploadResult},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/tracks/latest",
    tag = "tracks",
    responses(
        (status = 200, body = Vec<TrackListing>)
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn latest(
    State(context): State<ServerContext>,
    Query(query): Query<PageQuery>,
) -> ServerResult<Json<Vec<TrackListing>>> {
    let page = Page::new(query.page.unwrap_or(1));
    let entries = context.app.library.latest(page).await?;

    Ok(Json(entries.iter().map(|e| e.to_serialized()).collect()))
}

#[utoipa::path(
    post,
    path = "/v1/tracks/uploads",
    tag = "tracks",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = UploadResult),
        (status = 403, description = "New accounts may not upload this much")
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn upload(
    State(context): State<ServerContext>,
    session: Session,
    mut multipart: Multipart,
) -> ServerResult<Json<UploadResult>> {
    let mut sources = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ServerError::BadRequest("Malformed multipart body"))?
    {
        let name = field.name().unwrap_or_default().to_string();

        // Text fields named "url" carry remote sources, everything else is
        // treated as a file upload
        if name == "url" {
            let url = field
                .text()
                .await
                .map_err(|_| ServerError::BadRequest("Malformed multipart body"))?;

            sources.push(UploadSource::Url(url));
        } else {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let content_type = field.content_type().map(|c| c.to_string());

            let data = field
                .bytes()
                .await
                .map_err(|_| ServerError::BadRequest("Malformed multipart body"))?
                .to_vec();

            sources.push(UploadSource::File {
                filename,
                content_type,
                data,
            });
        }
    }

    if sources.is_empty() {
        return Err(ServerError::BadRequest("No upload sources supplied"));
    }

    let outcome = context
        .app
        .library
        .upload(&session.user(), sources)
        .await?;

    Ok(Json(outcome.to_serialized()))
}

#[utoipa::path(
    patch,
    path = "/v1/tracks/{id}",
    tag = "tracks",
    request_body = UpdateTrackSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Track)
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn update(
    State(context): State<ServerContext>,
    session: Session,
    Path(track_id): Path<i64>,
    ValidatedJson(body): ValidatedJson<UpdateTrackSchema>,
) -> ServerResult<Json<Track>> {
    let asset = context.app.library.asset_by_id(track_id).await?;

    if !asset.editable_by(&session.user()) {
        return Err(ServerError::Forbidden);
    }

    let updated = context
        .app
        .database()
        .update_asset(UpdatedAsset {
            id: asset.id,
            title: body.title,
            private: body.private,
        })
        .await?;

    Ok(Json(updated.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/tracks/{id}",
    tag = "tracks",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Track was soft deleted together with its comments and listens")
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn destroy(
    State(context): State<ServerContext>,
    session: Session,
    Path(track_id): Path<i64>,
) -> ServerResult<()> {
    let asset = context.app.library.asset_by_id(track_id).await?;

    if !asset.editable_by(&session.user()) {
        return Err(ServerError::Forbidden);
    }

    AssetCommand::new(context.app.context(), &asset)
        .soft_delete_with_relations()
        .await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/tracks/{id}/spam",
    tag = "tracks",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Track was marked as spam and hidden with its relations")
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn spam(
    State(context): State<ServerContext>,
    session: Session,
    Path(track_id): Path<i64>,
) -> ServerResult<()> {
    session.require_moderator()?;

    let asset = context.app.library.asset_by_id(track_id).await?;

    AssetCommand::new(context.app.context(), &asset)
        .spam_and_soft_delete_with_relations()
        .await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/tracks/{id}/restore",
    tag = "tracks",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Track and its relations are visible again")
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn restore(
    State(context): State<ServerContext>,
    session: Session,
    Path(track_id): Path<i64>,
) -> ServerResult<()> {
    session.require_moderator()?;

    let asset = context.app.library.asset_by_id(track_id).await?;

    AssetCommand::new(context.app.context(), &asset)
        .restore_with_relations()
        .await?;

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/latest", get(latest))
        .route("/uploads", post(upload))
        .route("/:id", patch(update))
        .route("/:id", delete(destroy))
        .route("/:id/spam", post(spam))
        .route("/:id/restore", post(restore))
}
