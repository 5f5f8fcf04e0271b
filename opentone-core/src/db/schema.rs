//! Table definitions applied on startup. Statements are idempotent so an
//! existing database file is opened without a separate migration step.

pub(crate) const TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        login TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL,
        password TEXT NOT NULL,
        display_name TEXT NOT NULL,
        moderator BOOLEAN NOT NULL DEFAULT 0,
        spam BOOLEAN NOT NULL DEFAULT 0,
        deleted_at TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        token TEXT NOT NULL UNIQUE,
        user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        expires_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS assets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users (id),
        title TEXT NOT NULL,
        permalink TEXT NOT NULL,
        filename TEXT NOT NULL,
        audio_key TEXT NOT NULL,
        content_type TEXT NOT NULL,
        size INTEGER NOT NULL,
        private BOOLEAN NOT NULL DEFAULT 0,
        spam BOOLEAN NOT NULL DEFAULT 0,
        deleted_at TEXT,
        created_at TEXT NOT NULL,
        UNIQUE (user_id, permalink)
    )",
    "CREATE TABLE IF NOT EXISTS comments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        asset_id INTEGER NOT NULL REFERENCES assets (id),
        commenter_id INTEGER REFERENCES users (id),
        body TEXT NOT NULL,
        remote_ip TEXT NOT NULL,
        user_agent TEXT,
        referrer TEXT,
        private BOOLEAN NOT NULL DEFAULT 0,
        spam BOOLEAN NOT NULL DEFAULT 0,
        deleted_at TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS listens (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        asset_id INTEGER NOT NULL REFERENCES assets (id),
        track_owner_id INTEGER NOT NULL REFERENCES users (id),
        listener_id INTEGER REFERENCES users (id),
        source TEXT NOT NULL,
        ip TEXT NOT NULL,
        user_agent TEXT NOT NULL,
        deleted_at TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_listens_dedupe
        ON listens (asset_id, ip, created_at)",
    "CREATE TABLE IF NOT EXISTS playlists (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users (id),
        title TEXT NOT NULL,
        permalink TEXT NOT NULL,
        private BOOLEAN NOT NULL DEFAULT 1,
        published BOOLEAN NOT NULL DEFAULT 0,
        published_at TEXT,
        position INTEGER NOT NULL DEFAULT 0,
        pic_key TEXT,
        created_at TEXT NOT NULL,
        UNIQUE (user_id, permalink)
    )",
    "CREATE TABLE IF NOT EXISTS playlist_tracks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        playlist_id INTEGER NOT NULL REFERENCES playlists (id) ON DELETE CASCADE,
        asset_id INTEGER NOT NULL REFERENCES assets (id),
        position INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS followings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users (id),
        follower_id INTEGER NOT NULL REFERENCES users (id),
        created_at TEXT NOT NULL,
        UNIQUE (user_id, follower_id)
    )",
];
