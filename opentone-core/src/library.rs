use chrono::{Duration, Utc};
use log::{info, warn};
use thiserror::Error;

use crate::{
    ingest::{title_for, PendingTrack, SkippedMember, UploadSource},
    util::{permalink, random_string},
    AssetData, Database, DatabaseError, Job, JobQueue, NewAsset, OpentoneContext, Page,
    PlaylistData, Playlists, PrimaryKey, Storage, StorageError, UserData,
};

/// Upload ingestion and track browsing
pub struct Library<Db> {
    context: OpentoneContext<Db>,
}

#[derive(Debug, Error)]
pub enum UploadError {
    /// The fixed user-facing message for the new-account rate limit
    #[error(
        "To prevent abuse, new users are limited to 25 uploads in their first day. Come back tomorrow!"
    )]
    NewUserLimit,
    #[error("No audio could be ingested from this upload")]
    NothingIngested,
    #[error(transparent)]
    Db(#[from] DatabaseError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What a single upload request produced
#[derive(Debug)]
pub struct UploadOutcome {
    pub assets: Vec<AssetData>,
    /// Auto-created when the request yielded more than one track
    pub album: Option<PlaylistData>,
    pub skipped: Vec<SkippedMember>,
}

/// A track from a public listing with its engagement counts
#[derive(Debug)]
pub struct LatestEntry {
    pub asset: AssetData,
    pub listens: i64,
    pub comments: i64,
}

impl<Db> Library<Db>
where
    Db: Database,
{
    /// How many tracks a brand new account may upload
    pub const NEW_USER_UPLOAD_LIMIT: i64 = 25;
    /// How old an account has to be before the limit stops applying
    const NEW_ACCOUNT_WINDOW_HOURS: i64 = 24;

    pub fn new(context: &OpentoneContext<Db>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Ingests a batch of upload sources. Individual bad sources or archive
    /// members are skipped, the rate limit rejects the whole request before
    /// anything is touched.
    pub async fn upload(
        &self,
        uploader: &UserData,
        sources: Vec<UploadSource>,
    ) -> Result<UploadOutcome, UploadError> {
        self.check_upload_allowance(uploader).await?;

        let mut pending = Vec::new();
        let mut skipped = Vec::new();
        let mut album_hint = None;

        for source in sources {
            let label = source.label();

            match source.resolve().await {
                Ok(expansion) => {
                    pending.extend(expansion.tracks);
                    skipped.extend(expansion.skipped);
                    album_hint = album_hint.or(expansion.album_hint);
                }
                Err(e) => skipped.push(SkippedMember {
                    name: label,
                    reason: e.to_string(),
                }),
            }
        }

        let mut assets = Vec::new();

        for track in pending {
            let name = track.filename.clone();

            match self.create_track(uploader, track).await {
                Ok(asset) => assets.push(asset),
                Err(e) => skipped.push(SkippedMember {
                    name,
                    reason: e.to_string(),
                }),
            }
        }

        if assets.is_empty() {
            return Err(UploadError::NothingIngested);
        }

        self.notify_followers(uploader, &assets).await;

        let album = if assets.len() > 1 {
            Some(self.create_album(uploader, album_hint, &assets).await?)
        } else {
            None
        };

        info!(
            "{} uploaded {} track(s), skipped {}",
            uploader.login,
            assets.len(),
            skipped.len()
        );

        Ok(UploadOutcome {
            assets,
            album,
            skipped,
        })
    }

    /// Latest public tracks with their engagement counts
    pub async fn latest(&self, page: Page) -> Result<Vec<LatestEntry>, DatabaseError> {
        let assets = self.context.database.latest_assets(page).await?;
        let mut entries = Vec::with_capacity(assets.len());

        for asset in assets {
            let listens = self.context.database.count_listens_for_asset(asset.id).await?;
            let comments = self
                .context
                .database
                .count_comments_for_asset(asset.id)
                .await?;

            entries.push(LatestEntry {
                asset,
                listens,
                comments,
            });
        }

        Ok(entries)
    }

    pub async fn asset_by_id(&self, asset_id: PrimaryKey) -> Result<AssetData, DatabaseError> {
        self.context.database.asset_by_id(asset_id).await
    }

    /// Looks up a track by its owner's login and the track permalink
    pub async fn asset_for(
        &self,
        login: &str,
        permalink: &str,
    ) -> Result<(UserData, AssetData), DatabaseError> {
        let user = self.context.database.user_by_login(login).await?;
        let asset = self
            .context
            .database
            .asset_by_permalink(user.id, permalink)
            .await?;

        Ok((user, asset))
    }

    pub async fn assets_for_user(
        &self,
        user_id: PrimaryKey,
    ) -> Result<Vec<AssetData>, DatabaseError> {
        self.context.database.assets_for_user(user_id).await
    }

    async fn check_upload_allowance(&self, uploader: &UserData) -> Result<(), UploadError> {
        let account_age = Utc::now() - uploader.created_at;

        if account_age < Duration::hours(Self::NEW_ACCOUNT_WINDOW_HOURS) {
            let count = self
                .context
                .database
                .count_assets_for_user(uploader.id)
                .await?;

            if count >= Self::NEW_USER_UPLOAD_LIMIT {
                return Err(UploadError::NewUserLimit);
            }
        }

        Ok(())
    }

    async fn create_track(
        &self,
        uploader: &UserData,
        track: PendingTrack,
    ) -> Result<AssetData, UploadError> {
        let title = title_for(&track.filename, &track.data);
        let permalink =
            unique_asset_permalink(&*self.context.database, uploader.id, &permalink(&title))
                .await?;

        let audio_key = format!("audio-{}-{}", uploader.id, random_string(16));
        self.context.storage.store(&audio_key, &track.data).await?;

        let asset = self
            .context
            .database
            .create_asset(NewAsset {
                user_id: uploader.id,
                title,
                permalink,
                filename: track.filename,
                audio_key,
                content_type: track.content_type,
                size: track.data.len() as i64,
                private: false,
            })
            .await?;

        self.context.jobs.enqueue(Job::WaveformExtract {
            asset_id: asset.id,
        });

        Ok(asset)
    }

    async fn notify_followers(&self, uploader: &UserData, assets: &[AssetData]) {
        let followers = match self.context.database.follower_ids_of(uploader.id).await {
            Ok(followers) => followers,
            Err(e) => {
                // Notifications are best-effort, the upload already happened
                warn!("Couldn't load followers of {}: {e}", uploader.login);
                return;
            }
        };

        for asset in assets {
            for follower_id in &followers {
                self.context.jobs.enqueue(Job::AssetNotification {
                    asset_id: asset.id,
                    follower_id: *follower_id,
                });
            }
        }
    }

    async fn create_album(
        &self,
        uploader: &UserData,
        album_hint: Option<String>,
        assets: &[AssetData],
    ) -> Result<PlaylistData, UploadError> {
        let title = album_hint.unwrap_or_else(|| "New Album".to_string());
        let playlists = Playlists::new(&self.context);

        let playlist = playlists.create(uploader, &title, false).await?;

        for asset in assets {
            playlists.add_track(playlist.id, asset.id).await?;
        }

        playlists.by_id(playlist.id).await.map_err(Into::into)
    }
}

/// Probes for a free permalink, appending a counter on collision
async fn unique_asset_permalink<Db: Database>(
    db: &Db,
    user_id: PrimaryKey,
    base: &str,
) -> Result<String, DatabaseError> {
    let mut candidate = base.to_string();
    let mut suffix = 2;

    loop {
        match db.asset_by_permalink(user_id, &candidate).await {
            Err(DatabaseError::NotFound { .. }) => return Ok(candidate),
            Ok(_) => {
                candidate = format!("{base}-{suffix}");
                suffix += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::{create_user, test_harness, zip_bytes};
    use crate::ListenRequest;

    fn mp3_source(filename: &str) -> UploadSource {
        UploadSource::File {
            filename: filename.to_string(),
            content_type: Some("audio/mpeg".to_string()),
            data: vec![0u8; 128],
        }
    }

    #[tokio::test]
    async fn test_single_upload_creates_one_asset_and_no_album() {
        let harness = test_harness("library_single").await;
        let library = Library::new(&harness.context);

        let user = create_user(&harness.context.database, "arthur").await;

        let outcome = library
            .upload(&user, vec![mp3_source("muppets.mp3")])
            .await
            .expect("upload succeeds");

        assert_eq!(outcome.assets.len(), 1);
        assert!(outcome.album.is_none());
        assert_eq!(outcome.assets[0].title, "muppets");
        assert_eq!(outcome.assets[0].permalink, "muppets");

        // The audio bytes made it into storage
        let stored = harness
            .context
            .storage
            .retrieve(&outcome.assets[0].audio_key)
            .await
            .unwrap();
        assert_eq!(stored.len(), 128);

        // One waveform job, no followers to notify
        let jobs: Vec<_> = harness.jobs.try_iter().collect();
        assert_eq!(
            jobs,
            vec![Job::WaveformExtract {
                asset_id: outcome.assets[0].id
            }]
        );
    }

    #[tokio::test]
    async fn test_zip_with_three_members_creates_an_album() {
        let harness = test_harness("library_album_zip").await;
        let library = Library::new(&harness.context);

        let user = create_user(&harness.context.database, "arthur").await;

        let data = zip_bytes(&[
            ("one.mp3", &[1u8; 32]),
            ("two.mp3", &[2u8; 32]),
            ("three.mp3", &[3u8; 32]),
        ]);

        let outcome = library
            .upload(
                &user,
                vec![UploadSource::File {
                    filename: "Le Duc Vacherin.zip".to_string(),
                    content_type: Some("application/zip".to_string()),
                    data,
                }],
            )
            .await
            .expect("upload succeeds");

        assert_eq!(outcome.assets.len(), 3);

        let album = outcome.album.expect("an album is created");
        assert_eq!(album.title, "Le Duc Vacherin");
        assert_eq!(album.tracks.len(), 3);

        let playlists = harness
            .context
            .database
            .playlists_for_user(user.id, true)
            .await
            .unwrap();
        assert_eq!(playlists.len(), 1);
    }

    #[tokio::test]
    async fn test_zip_with_one_valid_member_creates_no_album() {
        let harness = test_harness("library_partial_zip").await;
        let library = Library::new(&harness.context);

        let user = create_user(&harness.context.database, "arthur").await;

        let data = zip_bytes(&[("song.mp3", &[1u8; 32]), ("readme.txt", &[2u8; 8])]);

        let outcome = library
            .upload(
                &user,
                vec![UploadSource::File {
                    filename: "1valid-1invalid.zip".to_string(),
                    content_type: Some("application/zip".to_string()),
                    data,
                }],
            )
            .await
            .expect("upload succeeds");

        assert_eq!(outcome.assets.len(), 1);
        assert!(outcome.album.is_none());
        assert_eq!(outcome.skipped.len(), 1);

        let playlists = harness
            .context
            .database
            .playlists_for_user(user.id, true)
            .await
            .unwrap();
        assert!(playlists.is_empty());
    }

    #[tokio::test]
    async fn test_two_files_in_one_request_create_an_album() {
        let harness = test_harness("library_two_files").await;
        let library = Library::new(&harness.context);

        let user = create_user(&harness.context.database, "arthur").await;

        let outcome = library
            .upload(&user, vec![mp3_source("one.mp3"), mp3_source("two.mp3")])
            .await
            .expect("upload succeeds");

        assert_eq!(outcome.assets.len(), 2);
        assert!(outcome.album.is_some());
    }

    #[tokio::test]
    async fn test_new_user_upload_limit() {
        let harness = test_harness("library_rate_limit").await;
        let library = Library::new(&harness.context);

        // The account was created just now, so the window applies
        let user = create_user(&harness.context.database, "brandnewuser").await;

        for n in 0..Library::<crate::SqliteDatabase>::NEW_USER_UPLOAD_LIMIT {
            library
                .upload(&user, vec![mp3_source(&format!("track{n}.mp3"))])
                .await
                .expect("upload under the limit succeeds");
        }

        let result = library.upload(&user, vec![mp3_source("one-too-many.mp3")]).await;

        assert!(matches!(result, Err(UploadError::NewUserLimit)));
        assert_eq!(
            result.unwrap_err().to_string(),
            "To prevent abuse, new users are limited to 25 uploads in their first day. Come back tomorrow!"
        );

        // Nothing was created for the rejected request
        let count = harness
            .context
            .database
            .count_assets_for_user(user.id)
            .await
            .unwrap();
        assert_eq!(count, Library::<crate::SqliteDatabase>::NEW_USER_UPLOAD_LIMIT);
    }

    #[tokio::test]
    async fn test_followers_are_notified_per_asset() {
        let harness = test_harness("library_notifications").await;
        let library = Library::new(&harness.context);
        let db = &harness.context.database;

        let artist = create_user(db, "arthur").await;
        let follower_one = create_user(db, "sudara").await;
        let follower_two = create_user(db, "aaron").await;

        db.create_following(artist.id, follower_one.id).await.unwrap();
        db.create_following(artist.id, follower_two.id).await.unwrap();

        let outcome = library
            .upload(&artist, vec![mp3_source("muppets.mp3")])
            .await
            .expect("upload succeeds");

        let jobs: Vec<_> = harness.jobs.try_iter().collect();
        let notifications = jobs
            .iter()
            .filter(|j| matches!(j, Job::AssetNotification { .. }))
            .count();

        assert_eq!(notifications, 2);
        assert!(jobs.contains(&Job::WaveformExtract {
            asset_id: outcome.assets[0].id
        }));
    }

    #[tokio::test]
    async fn test_duplicate_titles_get_suffixed_permalinks() {
        let harness = test_harness("library_permalinks").await;
        let library = Library::new(&harness.context);

        let user = create_user(&harness.context.database, "arthur").await;

        let first = library
            .upload(&user, vec![mp3_source("muppets.mp3")])
            .await
            .unwrap();
        let second = library
            .upload(&user, vec![mp3_source("muppets.mp3")])
            .await
            .unwrap();

        assert_eq!(first.assets[0].permalink, "muppets");
        assert_eq!(second.assets[0].permalink, "muppets-2");
    }

    #[tokio::test]
    async fn test_latest_reports_engagement_counts() {
        let harness = test_harness("library_latest").await;
        let library = Library::new(&harness.context);

        let user = create_user(&harness.context.database, "arthur").await;
        let outcome = library
            .upload(&user, vec![mp3_source("muppets.mp3")])
            .await
            .unwrap();

        crate::Listens::new(&harness.context)
            .register(
                &outcome.assets[0],
                ListenRequest {
                    ip: "10.0.0.1".to_string(),
                    user_agent: Some("iTunes/x.x.x".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let latest = library.latest(Page::default()).await.unwrap();

        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].listens, 1);
        assert_eq!(latest[0].comments, 0);
    }
}
