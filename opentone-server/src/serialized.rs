//! All schemas that are exposed from endpoints are defined here
//! along with the conversion impls

use chrono::{DateTime, Utc};
use opentone_core::{
    AssetData, CommentData, LatestEntry, PlaylistData, PlaylistTrackData, SessionData,
    SkippedMember, UploadOutcome, UserData,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    id: i64,
    login: String,
    display_name: String,
    moderator: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    token: String,
    user: User,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    id: i64,
    user_id: i64,
    title: String,
    permalink: String,
    content_type: String,
    private: bool,
    created_at: DateTime<Utc>,
}

/// A listing entry with its engagement counts
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackListing {
    #[serde(flatten)]
    track: Track,
    listens: i64,
    comments: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackPage {
    track: Track,
    owner: User,
    listens: i64,
    comments: Vec<Comment>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    id: i64,
    track_id: i64,
    commenter_id: Option<i64>,
    body: String,
    private: bool,
    spam: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    id: i64,
    user_id: i64,
    title: String,
    permalink: String,
    private: bool,
    published: bool,
    published_at: Option<DateTime<Utc>>,
    has_pic: bool,
    tracks: Vec<PlaylistTrack>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistTrack {
    position: i64,
    track: Track,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    tracks: Vec<Track>,
    album: Option<Playlist>,
    skipped: Vec<SkippedUpload>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkippedUpload {
    name: String,
    reason: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FollowState {
    pub following: bool,
}

/// Comments received on a user's tracks and comments they made elsewhere
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserComments {
    received: Vec<Comment>,
    made: Vec<Comment>,
}

impl UserComments {
    pub fn new(received: &[CommentData], made: &[CommentData]) -> Self {
        Self {
            received: received.to_vec().to_serialized(),
            made: made.to_vec().to_serialized(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    user: User,
    tracks: Vec<Track>,
    playlists: Vec<Playlist>,
}

impl Profile {
    pub fn new(user: &UserData, tracks: &[AssetData], playlists: &[PlaylistData]) -> Self {
        Self {
            user: user.to_serialized(),
            tracks: tracks.to_vec().to_serialized(),
            playlists: playlists.to_vec().to_serialized(),
        }
    }
}

impl TrackPage {
    pub fn new(
        asset: &AssetData,
        owner: &UserData,
        listens: i64,
        comments: &[CommentData],
    ) -> Self {
        Self {
            track: asset.to_serialized(),
            owner: owner.to_serialized(),
            listens,
            comments: comments.to_vec().to_serialized(),
        }
    }
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<User> for UserData {
    fn to_serialized(&self) -> User {
        User {
            id: self.id,
            login: self.login.clone(),
            display_name: self.display_name.clone(),
            moderator: self.moderator,
        }
    }
}

impl ToSerialized<LoginResult> for SessionData {
    fn to_serialized(&self) -> LoginResult {
        LoginResult {
            token: self.token.clone(),
            user: self.user.to_serialized(),
        }
    }
}

impl ToSerialized<Track> for AssetData {
    fn to_serialized(&self) -> Track {
        Track {
            id: self.id,
            user_id: self.user_id,
            title: self.title.clone(),
            permalink: self.permalink.clone(),
            content_type: self.content_type.clone(),
            private: self.private,
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<TrackListing> for LatestEntry {
    fn to_serialized(&self) -> TrackListing {
        TrackListing {
            track: self.asset.to_serialized(),
            listens: self.listens,
            comments: self.comments,
        }
    }
}

impl ToSerialized<Comment> for CommentData {
    fn to_serialized(&self) -> Comment {
        Comment {
            id: self.id,
            track_id: self.asset_id,
            commenter_id: self.commenter_id,
            body: self.body.clone(),
            private: self.private,
            spam: self.spam,
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<Playlist> for PlaylistData {
    fn to_serialized(&self) -> Playlist {
        Playlist {
            id: self.id,
            user_id: self.user_id,
            title: self.title.clone(),
            permalink: self.permalink.clone(),
            private: self.private,
            published: self.published,
            published_at: self.published_at,
            has_pic: self.pic_key.is_some(),
            tracks: self.tracks.to_serialized(),
        }
    }
}

impl ToSerialized<PlaylistTrack> for PlaylistTrackData {
    fn to_serialized(&self) -> PlaylistTrack {
        PlaylistTrack {
            position: self.position,
            track: self.asset.to_serialized(),
        }
    }
}

impl ToSerialized<UploadResult> for UploadOutcome {
    fn to_serialized(&self) -> UploadResult {
        UploadResult {
            tracks: self.assets.to_vec().to_serialized(),
            album: self.album.as_ref().map(|a| a.to_serialized()),
            skipped: self.skipped.to_vec().to_serialized(),
        }
    }
}

impl ToSerialized<SkippedUpload> for SkippedMember {
    fn to_serialized(&self) -> SkippedUpload {
        SkippedUpload {
            name: self.name.clone(),
            reason: self.reason.clone(),
        }
    }
}
