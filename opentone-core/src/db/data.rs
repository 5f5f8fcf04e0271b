use chrono::{DateTime, Utc};

/// The type used for primary keys in the database.
pub type PrimaryKey = i64;

/// An opentone account
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserData {
    pub id: PrimaryKey,
    /// The unique handle used in URLs
    pub login: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub moderator: bool,
    pub spam: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserData {
    pub fn can_moderate(&self) -> bool {
        self.moderator
    }

    /// True when the account is visible to the public at all
    pub fn active(&self) -> bool {
        !self.spam && self.deleted_at.is_none()
    }
}

/// Login session data for authentication
#[derive(Debug, Clone)]
pub struct SessionData {
    pub id: PrimaryKey,
    /// The session token, or key if you will
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// The user that is logged in
    pub user: UserData,
}

/// A single uploaded track
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AssetData {
    pub id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub title: String,
    /// Unique per user, used in URLs
    pub permalink: String,
    /// The original filename of the upload
    pub filename: String,
    /// Where the audio bytes live in storage
    pub audio_key: String,
    pub content_type: String,
    pub size: i64,
    pub private: bool,
    pub spam: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AssetData {
    /// True when the asset may appear in public listings
    pub fn publicly_listable(&self) -> bool {
        !self.private && !self.spam && self.deleted_at.is_none()
    }

    pub fn editable_by(&self, user: &UserData) -> bool {
        self.user_id == user.id || user.can_moderate()
    }

    pub fn visible_to(&self, viewer: Option<&UserData>) -> bool {
        self.publicly_listable() || viewer.is_some_and(|u| self.editable_by(u))
    }
}

/// A comment left on a track
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentData {
    pub id: PrimaryKey,
    pub asset_id: PrimaryKey,
    /// The owner of the commented track, carried so moderation checks
    /// don't need another lookup
    pub track_owner_id: PrimaryKey,
    /// None when the comment was left by a guest
    pub commenter_id: Option<PrimaryKey>,
    pub body: String,
    pub remote_ip: String,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub private: bool,
    pub spam: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CommentData {
    /// Moderators can act on any comment, track owners on comments left
    /// on their own tracks
    pub fn moderatable_by(&self, user: &UserData) -> bool {
        user.can_moderate() || self.track_owner_id == user.id
    }
}

/// One counted play of a track. Immutable once written.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ListenData {
    pub id: PrimaryKey,
    pub asset_id: PrimaryKey,
    pub track_owner_id: PrimaryKey,
    pub listener_id: Option<PrimaryKey>,
    /// Referrer, an explicit override, or "direct hit"
    pub source: String,
    pub ip: String,
    pub user_agent: String,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// An ordered collection of tracks
#[derive(Debug, Clone)]
pub struct PlaylistData {
    pub id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub title: String,
    pub permalink: String,
    pub private: bool,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    /// Where this playlist sorts among its owner's playlists
    pub position: i64,
    pub pic_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub tracks: Vec<PlaylistTrackData>,
}

impl PlaylistData {
    pub fn editable_by(&self, user: &UserData) -> bool {
        self.user_id == user.id || user.can_moderate()
    }

    pub fn visible_to(&self, viewer: Option<&UserData>) -> bool {
        !self.private || viewer.is_some_and(|u| self.editable_by(u))
    }
}

/// A track's membership in a playlist
#[derive(Debug, Clone)]
pub struct PlaylistTrackData {
    pub id: PrimaryKey,
    /// 1-based, dense
    pub position: i64,
    pub asset: AssetData,
}
