use std::borrow::BorrowMut;

use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{auth, comments, playlists, schemas, serialized, streaming, tracks, users};

#[derive(OpenApi)]
#[openapi(
    modifiers(&Security),
    info(
        description = "opentone-server exposes endpoints to interact with this opentone instance"
    ),
    paths(
        auth::register,
        auth::login,
        auth::logout,
        auth::user,
        auth::update_user,
        tracks::latest,
        tracks::upload,
        tracks::update,
        tracks::destroy,
        tracks::spam,
        tracks::restore,
        users::profile,
        users::track,
        users::comments,
        users::follow,
        users::spam,
        users::restore,
        users::playlists,
        users::playlist,
        streaming::stream_audio,
        comments::create,
        comments::index,
        comments::destroy,
        comments::spam,
        comments::unspam,
        playlists::create,
        playlists::update,
        playlists::destroy,
        playlists::add_track,
        playlists::remove_track,
        playlists::reorder,
        playlists::sort,
        playlists::attach_pic,
    ),
    components(schemas(
        serialized::User,
        serialized::LoginResult,
        serialized::Track,
        serialized::TrackListing,
        serialized::TrackPage,
        serialized::Comment,
        serialized::Playlist,
        serialized::PlaylistTrack,
        serialized::UploadResult,
        serialized::SkippedUpload,
        serialized::FollowState,
        serialized::Profile,
        serialized::UserComments,
        schemas::LoginSchema,
        schemas::RegisterSchema,
        schemas::UpdateUserSchema,
        schemas::UpdateTrackSchema,
        schemas::NewCommentSchema,
        schemas::NewPlaylistSchema,
        schemas::UpdatePlaylistSchema,
        schemas::AddTrackSchema,
        schemas::ReorderTracksSchema,
        schemas::SortPlaylistsSchema,
    ))
)]
pub struct ApiDoc;

struct Security;

impl Modify for Security {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.borrow_mut() {
            let scheme = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("Bearer <token>")
                .build();

            components.add_security_scheme("BearerAuth", SecurityScheme::Http(scheme))
        }
    }
}

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
