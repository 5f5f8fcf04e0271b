use axum::{
    body::Body,
    debug_handler,
    extract::{Path, Query, State},
    response::Response,
    routing::get,
};
use log::warn;
use opentone_core::{ListenRequest, Storage};
use serde::Deserialize;

use crate::{
    auth::{MaybeSession, RequestMeta},
    context::ServerContext,
    errors::{ServerError, ServerResult},
    Router,
};

#[derive(Debug, Default, Deserialize)]
pub struct ListenQuery {
    /// Overrides the recorded listen source, e.g. "itunes"
    pub referer: Option<String>,
}

#[utoipa::path(
    get,
    path = "/v1/users/{login}/tracks/{permalink}/audio",
    tag = "streaming",
    responses(
        (
            status = 200,
            content_type = "audio/mpeg",
            description = "The track's audio bytes. Counts a listen unless the request looks like a crawler or a refresh."
        )
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn stream_audio(
    State(context): State<ServerContext>,
    session: MaybeSession,
    meta: RequestMeta,
    Path((login, permalink)): Path<(String, String)>,
    Query(query): Query<ListenQuery>,
) -> ServerResult<Response> {
    let viewer = session.user();
    let (_, asset) = context.app.library.asset_for(&login, &permalink).await?;

    if !asset.visible_to(viewer.as_ref()) {
        return Err(ServerError::NotFound {
            resource: "asset",
            identifier: "permalink",
        });
    }

    // Listen tracking is best-effort and must never block audio delivery
    let request = ListenRequest {
        ip: meta.ip,
        user_agent: meta.user_agent,
        referrer: meta.referrer,
        source_override: query.referer,
        listener_id: viewer.map(|u| u.id),
    };

    if let Err(e) = context.app.listens.register(&asset, request).await {
        warn!("Failed to record listen for asset {}: {e}", asset.id);
    }

    let data = context.app.storage().retrieve(&asset.audio_key).await?;

    let response = Response::builder()
        .status(200)
        .header("Content-Type", asset.content_type)
        .header("Content-Length", data.len())
        .header(
            "Content-Disposition",
            format!("inline; filename=\"{}\"", asset.filename),
        )
        .body(Body::from(data))
        .map_err(|e| ServerError::Unknown(e.to_string()))?;

    Ok(response)
}

pub fn router() -> Router {
    Router::new().route("/:login/tracks/:permalink/audio", get(stream_audio))
}
