use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

mod data;
pub use data::*;

mod schema;

mod sqlite;
pub use sqlite::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;
}

impl<T> DatabaseResult for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            Err(e) => match e {
                DatabaseError::NotFound { .. } => Ok(()),
                e => Err(e),
            },
        }
    }
}

/// A page of a listing. Listings are capped so crawlers and clients can't
/// request unbounded result sets.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub number: u32,
}

impl Page {
    pub const PER_PAGE: i64 = 25;

    pub fn new(number: u32) -> Self {
        Self {
            number: number.max(1),
        }
    }

    pub fn limit(&self) -> i64 {
        Self::PER_PAGE
    }

    pub fn offset(&self) -> i64 {
        (self.number as i64 - 1) * Self::PER_PAGE
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Which comments a listing query is allowed to surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentVisibility {
    /// Spam, private, and quarantined comments are excluded
    Public,
    /// Private comments are included, spam and quarantined ones are not
    IncludingPrivate,
}

/// What a moderation cascade does to an aggregate and its dependents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quarantine {
    SoftDelete,
    SpamAndSoftDelete,
}

impl Quarantine {
    pub fn marks_spam(&self) -> bool {
        matches!(self, Self::SpamAndSoftDelete)
    }
}

/// Represents a type that can fetch and mutate opentone data in a backing store
#[async_trait]
pub trait Database: Send + Sync + 'static {
    async fn check_for_moderator(&self) -> Result<bool>;
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData>;
    async fn user_by_login(&self, login: &str) -> Result<UserData>;
    async fn create_user(&self, new_user: NewUser) -> Result<UserData>;
    async fn update_user(&self, updated_user: UpdatedUser) -> Result<UserData>;

    async fn session_by_token(&self, token: &str) -> Result<SessionData>;
    async fn create_session(&self, new_session: NewSession) -> Result<SessionData>;
    async fn delete_session_by_token(&self, token: &str) -> Result<()>;
    async fn clear_expired_sessions(&self) -> Result<()>;

    async fn asset_by_id(&self, asset_id: PrimaryKey) -> Result<AssetData>;
    async fn asset_by_permalink(&self, user_id: PrimaryKey, permalink: &str) -> Result<AssetData>;
    async fn create_asset(&self, new_asset: NewAsset) -> Result<AssetData>;
    async fn update_asset(&self, updated_asset: UpdatedAsset) -> Result<AssetData>;
    /// Latest publicly listable assets, newest first
    async fn latest_assets(&self, page: Page) -> Result<Vec<AssetData>>;
    /// Publicly listable assets of one user, newest first
    async fn assets_for_user(&self, user_id: PrimaryKey) -> Result<Vec<AssetData>>;
    async fn count_assets_for_user(&self, user_id: PrimaryKey) -> Result<i64>;

    async fn create_listen(&self, new_listen: NewListen) -> Result<ListenData>;
    async fn recent_listen_exists(
        &self,
        asset_id: PrimaryKey,
        ip: &str,
        since: DateTime<Utc>,
    ) -> Result<bool>;
    async fn count_listens_for_asset(&self, asset_id: PrimaryKey) -> Result<i64>;

    async fn comment_by_id(&self, comment_id: PrimaryKey) -> Result<CommentData>;
    async fn create_comment(&self, new_comment: NewComment) -> Result<CommentData>;
    async fn delete_comment(&self, comment_id: PrimaryKey) -> Result<()>;
    async fn set_comment_spam(&self, comment_id: PrimaryKey, spam: bool) -> Result<CommentData>;
    async fn comments_for_asset(
        &self,
        asset_id: PrimaryKey,
        visibility: CommentVisibility,
    ) -> Result<Vec<CommentData>>;
    /// Comments received on a user's tracks
    async fn comments_for_user(
        &self,
        user_id: PrimaryKey,
        visibility: CommentVisibility,
        page: Page,
    ) -> Result<Vec<CommentData>>;
    /// Comments a user has written on other tracks
    async fn comments_by_user(
        &self,
        user_id: PrimaryKey,
        visibility: CommentVisibility,
        page: Page,
    ) -> Result<Vec<CommentData>>;
    async fn recent_comments(
        &self,
        visibility: CommentVisibility,
        page: Page,
    ) -> Result<Vec<CommentData>>;
    /// The moderator spam queue
    async fn spam_comments(&self, page: Page) -> Result<Vec<CommentData>>;
    async fn count_comments_for_asset(&self, asset_id: PrimaryKey) -> Result<i64>;

    /// Marks a user and all dependent assets, comments, and listens in one
    /// transaction. Dependents that were already quarantined keep their
    /// original timestamp.
    async fn quarantine_user(&self, user_id: PrimaryKey, quarantine: Quarantine) -> Result<()>;
    async fn restore_user(&self, user_id: PrimaryKey) -> Result<()>;
    /// Marks an asset and its comments and listens in one transaction
    async fn quarantine_asset(&self, asset_id: PrimaryKey, quarantine: Quarantine) -> Result<()>;
    async fn restore_asset(&self, asset_id: PrimaryKey) -> Result<()>;

    async fn playlist_by_id(&self, playlist_id: PrimaryKey) -> Result<PlaylistData>;
    async fn playlist_by_permalink(
        &self,
        user_id: PrimaryKey,
        permalink: &str,
    ) -> Result<PlaylistData>;
    async fn playlists_for_user(
        &self,
        user_id: PrimaryKey,
        include_private: bool,
    ) -> Result<Vec<PlaylistData>>;
    async fn create_playlist(&self, new_playlist: NewPlaylist) -> Result<PlaylistData>;
    async fn update_playlist(&self, updated_playlist: UpdatedPlaylist) -> Result<PlaylistData>;
    async fn delete_playlist(&self, playlist_id: PrimaryKey) -> Result<()>;
    /// Appends a track at the end of the playlist
    async fn add_playlist_track(
        &self,
        playlist_id: PrimaryKey,
        asset_id: PrimaryKey,
    ) -> Result<()>;
    async fn remove_playlist_track(
        &self,
        playlist_id: PrimaryKey,
        asset_id: PrimaryKey,
    ) -> Result<()>;
    /// Rewrites track positions to match the given asset id order
    async fn reorder_playlist_tracks(
        &self,
        playlist_id: PrimaryKey,
        ordered_asset_ids: &[PrimaryKey],
    ) -> Result<()>;
    /// Rewrites the position of a user's playlists to match the given order
    async fn sort_playlists(
        &self,
        user_id: PrimaryKey,
        ordered_playlist_ids: &[PrimaryKey],
    ) -> Result<()>;

    async fn following_exists(
        &self,
        user_id: PrimaryKey,
        follower_id: PrimaryKey,
    ) -> Result<bool>;
    async fn create_following(&self, user_id: PrimaryKey, follower_id: PrimaryKey) -> Result<()>;
    async fn delete_following(&self, user_id: PrimaryKey, follower_id: PrimaryKey) -> Result<()>;
    async fn follower_ids_of(&self, user_id: PrimaryKey) -> Result<Vec<PrimaryKey>>;
}

#[derive(Debug)]
pub struct NewUser {
    pub login: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub moderator: bool,
}

#[derive(Debug)]
pub struct UpdatedUser {
    pub id: PrimaryKey,
    pub display_name: Option<String>,
}

#[derive(Debug)]
pub struct NewSession {
    pub token: String,
    pub user_id: PrimaryKey,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewAsset {
    pub user_id: PrimaryKey,
    pub title: String,
    pub permalink: String,
    pub filename: String,
    pub audio_key: String,
    pub content_type: String,
    pub size: i64,
    pub private: bool,
}

#[derive(Debug)]
pub struct UpdatedAsset {
    pub id: PrimaryKey,
    pub title: Option<String>,
    pub private: Option<bool>,
}

#[derive(Debug)]
pub struct NewListen {
    pub asset_id: PrimaryKey,
    pub track_owner_id: PrimaryKey,
    pub listener_id: Option<PrimaryKey>,
    pub source: String,
    pub ip: String,
    pub user_agent: String,
    /// Bound explicitly so abuse checks can reason about the exact instant
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewComment {
    pub asset_id: PrimaryKey,
    pub commenter_id: Option<PrimaryKey>,
    pub body: String,
    pub remote_ip: String,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub private: bool,
    pub spam: bool,
}

#[derive(Debug)]
pub struct NewPlaylist {
    pub user_id: PrimaryKey,
    pub title: String,
    pub permalink: String,
    pub private: bool,
}

#[derive(Debug, Default)]
pub struct UpdatedPlaylist {
    pub id: PrimaryKey,
    pub title: Option<String>,
    pub private: Option<bool>,
    pub pic_key: Option<String>,
    /// Set by the playlist manager once the publish gate has passed
    pub published_at: Option<DateTime<Utc>>,
}
