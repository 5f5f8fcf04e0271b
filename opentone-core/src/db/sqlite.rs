use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    query, query_as, query_scalar,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError, SqlitePool,
};

use super::schema;
use crate::{
    AssetData, CommentData, CommentVisibility, Database, DatabaseError, DatabaseResult,
    IntoDatabaseError, ListenData, NewAsset, NewComment, NewListen, NewPlaylist, NewSession,
    NewUser, Page, PlaylistData, PlaylistTrackData, PrimaryKey, Quarantine, Result, SessionData,
    UpdatedAsset, UpdatedPlaylist, UpdatedUser, UserData,
};

/// A SQLite database implementation for opentone
pub struct SqliteDatabase {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: PrimaryKey,
    token: String,
    user_id: PrimaryKey,
    expires_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct PlaylistRow {
    id: PrimaryKey,
    user_id: PrimaryKey,
    title: String,
    permalink: String,
    private: bool,
    published: bool,
    published_at: Option<DateTime<Utc>>,
    position: i64,
    pic_key: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct PlaylistTrackRow {
    membership_id: PrimaryKey,
    position: i64,
    #[sqlx(flatten)]
    asset: AssetData,
}

/// Comment columns plus the owner of the commented track
const COMMENT_SELECT: &str = "SELECT comments.*, assets.user_id AS track_owner_id
    FROM comments INNER JOIN assets ON comments.asset_id = assets.id";

impl SqliteDatabase {
    /// Opens or creates the database file and applies the schema
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        for statement in schema::TABLES {
            query(statement)
                .execute(&pool)
                .await
                .map_err(|e| DatabaseError::Internal(Box::new(e)))?;
        }

        Ok(Self { pool })
    }

    fn comment_filter(visibility: CommentVisibility) -> &'static str {
        match visibility {
            CommentVisibility::Public => {
                "comments.spam = 0 AND comments.deleted_at IS NULL AND comments.private = 0"
            }
            CommentVisibility::IncludingPrivate => {
                "comments.spam = 0 AND comments.deleted_at IS NULL"
            }
        }
    }

    async fn playlist_tracks(&self, playlist_id: PrimaryKey) -> Result<Vec<PlaylistTrackData>> {
        let rows: Vec<PlaylistTrackRow> = query_as(
            "SELECT
                playlist_tracks.id AS membership_id,
                playlist_tracks.position,
                assets.*
            FROM playlist_tracks
                INNER JOIN assets ON playlist_tracks.asset_id = assets.id
            WHERE playlist_tracks.playlist_id = ?
            ORDER BY playlist_tracks.position ASC",
        )
        .bind(playlist_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        let tracks = rows
            .into_iter()
            .map(|r| PlaylistTrackData {
                id: r.membership_id,
                position: r.position,
                asset: r.asset,
            })
            .collect();

        Ok(tracks)
    }

    async fn playlist_from_row(&self, row: PlaylistRow) -> Result<PlaylistData> {
        let tracks = self.playlist_tracks(row.id).await?;

        Ok(PlaylistData {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            permalink: row.permalink,
            private: row.private,
            published: row.published,
            published_at: row.published_at,
            position: row.position,
            pic_key: row.pic_key,
            created_at: row.created_at,
            tracks,
        })
    }

    /// Rewrites playlist track positions to be dense and 1-based
    async fn renumber_playlist_tracks(&self, playlist_id: PrimaryKey) -> Result<()> {
        let ids: Vec<PrimaryKey> = query_scalar(
            "SELECT id FROM playlist_tracks WHERE playlist_id = ? ORDER BY position ASC",
        )
        .bind(playlist_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        for (index, id) in ids.iter().enumerate() {
            query("UPDATE playlist_tracks SET position = ? WHERE id = ?")
                .bind(index as i64 + 1)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| e.any())?;
        }

        tx.commit().await.map_err(|e| e.any())
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn check_for_moderator(&self) -> Result<bool> {
        let result = query("SELECT id FROM users WHERE moderator = 1")
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(SqlxError::RowNotFound) => Ok(false),
            Err(e) => Err(e.any()),
        }
    }

    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        query_as("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "id"))
    }

    async fn user_by_login(&self, login: &str) -> Result<UserData> {
        query_as("SELECT * FROM users WHERE login = ?")
            .bind(login)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "login"))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        self.user_by_login(&new_user.login)
            .await
            .conflict_or_ok("user", "login", &new_user.login)?;

        let id: PrimaryKey = query_scalar(
            "INSERT INTO users (login, email, password, display_name, moderator, created_at)
             VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&new_user.login)
        .bind(&new_user.email)
        .bind(&new_user.password)
        .bind(&new_user.display_name)
        .bind(new_user.moderator)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.user_by_id(id).await
    }

    async fn update_user(&self, updated_user: UpdatedUser) -> Result<UserData> {
        let user = self.user_by_id(updated_user.id).await?;

        query("UPDATE users SET display_name = ? WHERE id = ?")
            .bind(updated_user.display_name.unwrap_or(user.display_name))
            .bind(updated_user.id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.user_by_id(updated_user.id).await
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let row: SessionRow = query_as("SELECT * FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("session", "token"))?;

        let user = self.user_by_id(row.user_id).await?;

        Ok(SessionData {
            id: row.id,
            token: row.token,
            expires_at: row.expires_at,
            user,
        })
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        self.session_by_token(&new_session.token)
            .await
            .conflict_or_ok("session", "token", &new_session.token)?;

        query("INSERT INTO sessions (token, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(&new_session.token)
            .bind(new_session.user_id)
            .bind(new_session.expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.session_by_token(&new_session.token).await
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        // Ensure session exists
        let _ = self.session_by_token(token).await?;

        query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        query("DELETE FROM sessions WHERE expires_at < ?")
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn asset_by_id(&self, asset_id: PrimaryKey) -> Result<AssetData> {
        query_as("SELECT * FROM assets WHERE id = ?")
            .bind(asset_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("asset", "id"))
    }

    async fn asset_by_permalink(&self, user_id: PrimaryKey, permalink: &str) -> Result<AssetData> {
        query_as("SELECT * FROM assets WHERE user_id = ? AND permalink = ?")
            .bind(user_id)
            .bind(permalink)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("asset", "permalink"))
    }

    async fn create_asset(&self, new_asset: NewAsset) -> Result<AssetData> {
        self.asset_by_permalink(new_asset.user_id, &new_asset.permalink)
            .await
            .conflict_or_ok("asset", "permalink", &new_asset.permalink)?;

        let id: PrimaryKey = query_scalar(
            "INSERT INTO assets
                (user_id, title, permalink, filename, audio_key, content_type, size, private, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(new_asset.user_id)
        .bind(&new_asset.title)
        .bind(&new_asset.permalink)
        .bind(&new_asset.filename)
        .bind(&new_asset.audio_key)
        .bind(&new_asset.content_type)
        .bind(new_asset.size)
        .bind(new_asset.private)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.asset_by_id(id).await
    }

    async fn update_asset(&self, updated_asset: UpdatedAsset) -> Result<AssetData> {
        let asset = self.asset_by_id(updated_asset.id).await?;

        query("UPDATE assets SET title = ?, private = ? WHERE id = ?")
            .bind(updated_asset.title.unwrap_or(asset.title))
            .bind(updated_asset.private.unwrap_or(asset.private))
            .bind(updated_asset.id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.asset_by_id(updated_asset.id).await
    }

    async fn latest_assets(&self, page: Page) -> Result<Vec<AssetData>> {
        query_as(
            "SELECT * FROM assets
             WHERE private = 0 AND spam = 0 AND deleted_at IS NULL
             ORDER BY id DESC LIMIT ? OFFSET ?",
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn assets_for_user(&self, user_id: PrimaryKey) -> Result<Vec<AssetData>> {
        query_as(
            "SELECT * FROM assets
             WHERE user_id = ? AND private = 0 AND spam = 0 AND deleted_at IS NULL
             ORDER BY id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn count_assets_for_user(&self, user_id: PrimaryKey) -> Result<i64> {
        query_scalar("SELECT COUNT(*) FROM assets WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn create_listen(&self, new_listen: NewListen) -> Result<ListenData> {
        let id: PrimaryKey = query_scalar(
            "INSERT INTO listens
                (asset_id, track_owner_id, listener_id, source, ip, user_agent, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(new_listen.asset_id)
        .bind(new_listen.track_owner_id)
        .bind(new_listen.listener_id)
        .bind(&new_listen.source)
        .bind(&new_listen.ip)
        .bind(&new_listen.user_agent)
        .bind(new_listen.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        query_as("SELECT * FROM listens WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("listen", "id"))
    }

    async fn recent_listen_exists(
        &self,
        asset_id: PrimaryKey,
        ip: &str,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        let count: i64 = query_scalar(
            "SELECT COUNT(*) FROM listens WHERE asset_id = ? AND ip = ? AND created_at > ?",
        )
        .bind(asset_id)
        .bind(ip)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(count > 0)
    }

    async fn count_listens_for_asset(&self, asset_id: PrimaryKey) -> Result<i64> {
        query_scalar("SELECT COUNT(*) FROM listens WHERE asset_id = ? AND deleted_at IS NULL")
            .bind(asset_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn comment_by_id(&self, comment_id: PrimaryKey) -> Result<CommentData> {
        query_as(&format!("{COMMENT_SELECT} WHERE comments.id = ?"))
            .bind(comment_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("comment", "id"))
    }

    async fn create_comment(&self, new_comment: NewComment) -> Result<CommentData> {
        let id: PrimaryKey = query_scalar(
            "INSERT INTO comments
                (asset_id, commenter_id, body, remote_ip, user_agent, referrer, private, spam, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(new_comment.asset_id)
        .bind(new_comment.commenter_id)
        .bind(&new_comment.body)
        .bind(&new_comment.remote_ip)
        .bind(&new_comment.user_agent)
        .bind(&new_comment.referrer)
        .bind(new_comment.private)
        .bind(new_comment.spam)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.comment_by_id(id).await
    }

    async fn delete_comment(&self, comment_id: PrimaryKey) -> Result<()> {
        // Ensure comment exists
        let _ = self.comment_by_id(comment_id).await?;

        query("DELETE FROM comments WHERE id = ?")
            .bind(comment_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn set_comment_spam(&self, comment_id: PrimaryKey, spam: bool) -> Result<CommentData> {
        // Ensure comment exists
        let _ = self.comment_by_id(comment_id).await?;

        query("UPDATE comments SET spam = ? WHERE id = ?")
            .bind(spam)
            .bind(comment_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.comment_by_id(comment_id).await
    }

    async fn comments_for_asset(
        &self,
        asset_id: PrimaryKey,
        visibility: CommentVisibility,
    ) -> Result<Vec<CommentData>> {
        let filter = Self::comment_filter(visibility);

        query_as(&format!(
            "{COMMENT_SELECT} WHERE comments.asset_id = ? AND {filter}
             ORDER BY comments.id DESC"
        ))
        .bind(asset_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn comments_for_user(
        &self,
        user_id: PrimaryKey,
        visibility: CommentVisibility,
        page: Page,
    ) -> Result<Vec<CommentData>> {
        let filter = Self::comment_filter(visibility);

        query_as(&format!(
            "{COMMENT_SELECT} WHERE assets.user_id = ? AND {filter}
             ORDER BY comments.id DESC LIMIT ? OFFSET ?"
        ))
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn comments_by_user(
        &self,
        user_id: PrimaryKey,
        visibility: CommentVisibility,
        page: Page,
    ) -> Result<Vec<CommentData>> {
        let filter = Self::comment_filter(visibility);

        query_as(&format!(
            "{COMMENT_SELECT} WHERE comments.commenter_id = ? AND {filter}
             ORDER BY comments.id DESC LIMIT ? OFFSET ?"
        ))
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn recent_comments(
        &self,
        visibility: CommentVisibility,
        page: Page,
    ) -> Result<Vec<CommentData>> {
        let filter = Self::comment_filter(visibility);

        query_as(&format!(
            "{COMMENT_SELECT} WHERE {filter}
             ORDER BY comments.id DESC LIMIT ? OFFSET ?"
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn spam_comments(&self, page: Page) -> Result<Vec<CommentData>> {
        query_as(&format!(
            "{COMMENT_SELECT} WHERE comments.spam = 1 AND comments.deleted_at IS NULL
             ORDER BY comments.id DESC LIMIT ? OFFSET ?"
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn count_comments_for_asset(&self, asset_id: PrimaryKey) -> Result<i64> {
        query_scalar(
            "SELECT COUNT(*) FROM comments
             WHERE asset_id = ? AND spam = 0 AND private = 0 AND deleted_at IS NULL",
        )
        .bind(asset_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn quarantine_user(&self, user_id: PrimaryKey, quarantine: Quarantine) -> Result<()> {
        // Ensure user exists
        let _ = self.user_by_id(user_id).await?;

        let now = Utc::now();
        let spam = quarantine.marks_spam();

        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        query("UPDATE users SET spam = spam OR ?, deleted_at = COALESCE(deleted_at, ?) WHERE id = ?")
            .bind(spam)
            .bind(now)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        query(
            "UPDATE assets SET spam = spam OR ?, deleted_at = COALESCE(deleted_at, ?)
             WHERE user_id = ?",
        )
        .bind(spam)
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        // Comments the user wrote carry their spam state, comments received
        // on their tracks are merely hidden along with the tracks
        query(
            "UPDATE comments SET spam = spam OR ?, deleted_at = COALESCE(deleted_at, ?)
             WHERE commenter_id = ?",
        )
        .bind(spam)
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        query(
            "UPDATE comments SET deleted_at = COALESCE(deleted_at, ?)
             WHERE asset_id IN (SELECT id FROM assets WHERE user_id = ?)",
        )
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        query(
            "UPDATE listens SET deleted_at = COALESCE(deleted_at, ?)
             WHERE asset_id IN (SELECT id FROM assets WHERE user_id = ?)",
        )
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        tx.commit().await.map_err(|e| e.any())
    }

    async fn restore_user(&self, user_id: PrimaryKey) -> Result<()> {
        // Ensure user exists
        let _ = self.user_by_id(user_id).await?;

        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        query("UPDATE users SET spam = 0, deleted_at = NULL WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        query("UPDATE assets SET spam = 0, deleted_at = NULL WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        query("UPDATE comments SET spam = 0, deleted_at = NULL WHERE commenter_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        query(
            "UPDATE comments SET deleted_at = NULL
             WHERE asset_id IN (SELECT id FROM assets WHERE user_id = ?)",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        query(
            "UPDATE listens SET deleted_at = NULL
             WHERE asset_id IN (SELECT id FROM assets WHERE user_id = ?)",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        tx.commit().await.map_err(|e| e.any())
    }

    async fn quarantine_asset(&self, asset_id: PrimaryKey, quarantine: Quarantine) -> Result<()> {
        // Ensure asset exists
        let _ = self.asset_by_id(asset_id).await?;

        let now = Utc::now();
        let spam = quarantine.marks_spam();

        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        query(
            "UPDATE assets SET spam = spam OR ?, deleted_at = COALESCE(deleted_at, ?)
             WHERE id = ?",
        )
        .bind(spam)
        .bind(now)
        .bind(asset_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        query("UPDATE comments SET deleted_at = COALESCE(deleted_at, ?) WHERE asset_id = ?")
            .bind(now)
            .bind(asset_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        query("UPDATE listens SET deleted_at = COALESCE(deleted_at, ?) WHERE asset_id = ?")
            .bind(now)
            .bind(asset_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        tx.commit().await.map_err(|e| e.any())
    }

    async fn restore_asset(&self, asset_id: PrimaryKey) -> Result<()> {
        // Ensure asset exists
        let _ = self.asset_by_id(asset_id).await?;

        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        query("UPDATE assets SET spam = 0, deleted_at = NULL WHERE id = ?")
            .bind(asset_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        query("UPDATE comments SET deleted_at = NULL WHERE asset_id = ?")
            .bind(asset_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        query("UPDATE listens SET deleted_at = NULL WHERE asset_id = ?")
            .bind(asset_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        tx.commit().await.map_err(|e| e.any())
    }

    async fn playlist_by_id(&self, playlist_id: PrimaryKey) -> Result<PlaylistData> {
        let row: PlaylistRow = query_as("SELECT * FROM playlists WHERE id = ?")
            .bind(playlist_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("playlist", "id"))?;

        self.playlist_from_row(row).await
    }

    async fn playlist_by_permalink(
        &self,
        user_id: PrimaryKey,
        permalink: &str,
    ) -> Result<PlaylistData> {
        let row: PlaylistRow = query_as("SELECT * FROM playlists WHERE user_id = ? AND permalink = ?")
            .bind(user_id)
            .bind(permalink)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("playlist", "permalink"))?;

        self.playlist_from_row(row).await
    }

    async fn playlists_for_user(
        &self,
        user_id: PrimaryKey,
        include_private: bool,
    ) -> Result<Vec<PlaylistData>> {
        let rows: Vec<PlaylistRow> = query_as(
            "SELECT * FROM playlists
             WHERE user_id = ? AND (private = 0 OR ?)
             ORDER BY position ASC, id ASC",
        )
        .bind(user_id)
        .bind(include_private)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        let mut playlists = Vec::with_capacity(rows.len());

        for row in rows {
            playlists.push(self.playlist_from_row(row).await?);
        }

        Ok(playlists)
    }

    async fn create_playlist(&self, new_playlist: NewPlaylist) -> Result<PlaylistData> {
        self.playlist_by_permalink(new_playlist.user_id, &new_playlist.permalink)
            .await
            .conflict_or_ok("playlist", "permalink", &new_playlist.permalink)?;

        let id: PrimaryKey = query_scalar(
            "INSERT INTO playlists (user_id, title, permalink, private, position, created_at)
             VALUES (?, ?, ?, ?,
                (SELECT COALESCE(MAX(position), 0) + 1 FROM playlists WHERE user_id = ?),
                ?)
             RETURNING id",
        )
        .bind(new_playlist.user_id)
        .bind(&new_playlist.title)
        .bind(&new_playlist.permalink)
        .bind(new_playlist.private)
        .bind(new_playlist.user_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.playlist_by_id(id).await
    }

    async fn update_playlist(&self, updated_playlist: UpdatedPlaylist) -> Result<PlaylistData> {
        let playlist = self.playlist_by_id(updated_playlist.id).await?;

        query(
            "UPDATE playlists SET
                title = ?,
                private = ?,
                pic_key = ?,
                published = published OR ?,
                published_at = COALESCE(published_at, ?)
             WHERE id = ?",
        )
        .bind(updated_playlist.title.unwrap_or(playlist.title))
        .bind(updated_playlist.private.unwrap_or(playlist.private))
        .bind(updated_playlist.pic_key.or(playlist.pic_key))
        .bind(updated_playlist.published_at.is_some())
        .bind(updated_playlist.published_at)
        .bind(updated_playlist.id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.playlist_by_id(updated_playlist.id).await
    }

    async fn delete_playlist(&self, playlist_id: PrimaryKey) -> Result<()> {
        // Ensure playlist exists
        let _ = self.playlist_by_id(playlist_id).await?;

        query("DELETE FROM playlists WHERE id = ?")
            .bind(playlist_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn add_playlist_track(
        &self,
        playlist_id: PrimaryKey,
        asset_id: PrimaryKey,
    ) -> Result<()> {
        // Ensure both sides exist
        let _ = self.playlist_by_id(playlist_id).await?;
        let _ = self.asset_by_id(asset_id).await?;

        query(
            "INSERT INTO playlist_tracks (playlist_id, asset_id, position)
             VALUES (?, ?,
                (SELECT COALESCE(MAX(position), 0) + 1 FROM playlist_tracks WHERE playlist_id = ?))",
        )
        .bind(playlist_id)
        .bind(asset_id)
        .bind(playlist_id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())
        .map(|_| ())
    }

    async fn remove_playlist_track(
        &self,
        playlist_id: PrimaryKey,
        asset_id: PrimaryKey,
    ) -> Result<()> {
        let membership: PrimaryKey = query_scalar(
            "SELECT id FROM playlist_tracks WHERE playlist_id = ? AND asset_id = ?
             ORDER BY position ASC LIMIT 1",
        )
        .bind(playlist_id)
        .bind(asset_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("playlist track", "playlist_id:asset_id"))?;

        query("DELETE FROM playlist_tracks WHERE id = ?")
            .bind(membership)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.renumber_playlist_tracks(playlist_id).await
    }

    async fn reorder_playlist_tracks(
        &self,
        playlist_id: PrimaryKey,
        ordered_asset_ids: &[PrimaryKey],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        for (index, asset_id) in ordered_asset_ids.iter().enumerate() {
            query("UPDATE playlist_tracks SET position = ? WHERE playlist_id = ? AND asset_id = ?")
                .bind(index as i64 + 1)
                .bind(playlist_id)
                .bind(asset_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| e.any())?;
        }

        tx.commit().await.map_err(|e| e.any())
    }

    async fn sort_playlists(
        &self,
        user_id: PrimaryKey,
        ordered_playlist_ids: &[PrimaryKey],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        for (index, playlist_id) in ordered_playlist_ids.iter().enumerate() {
            query("UPDATE playlists SET position = ? WHERE user_id = ? AND id = ?")
                .bind(index as i64 + 1)
                .bind(user_id)
                .bind(playlist_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| e.any())?;
        }

        tx.commit().await.map_err(|e| e.any())
    }

    async fn following_exists(
        &self,
        user_id: PrimaryKey,
        follower_id: PrimaryKey,
    ) -> Result<bool> {
        let count: i64 =
            query_scalar("SELECT COUNT(*) FROM followings WHERE user_id = ? AND follower_id = ?")
                .bind(user_id)
                .bind(follower_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| e.any())?;

        Ok(count > 0)
    }

    async fn create_following(&self, user_id: PrimaryKey, follower_id: PrimaryKey) -> Result<()> {
        if self.following_exists(user_id, follower_id).await? {
            return Err(DatabaseError::Conflict {
                resource: "following",
                field: "user:follower",
                value: format!("{user_id}:{follower_id}"),
            });
        }

        query("INSERT INTO followings (user_id, follower_id, created_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(follower_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn delete_following(&self, user_id: PrimaryKey, follower_id: PrimaryKey) -> Result<()> {
        query("DELETE FROM followings WHERE user_id = ? AND follower_id = ?")
            .bind(user_id)
            .bind(follower_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn follower_ids_of(&self, user_id: PrimaryKey) -> Result<Vec<PrimaryKey>> {
        query_scalar("SELECT follower_id FROM followings WHERE user_id = ? ORDER BY id ASC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}
