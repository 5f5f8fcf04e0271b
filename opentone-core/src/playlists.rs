use chrono::Utc;

use crate::{
    util::{permalink, random_string},
    Database, DatabaseError, NewPlaylist, OpentoneContext, PlaylistData, PrimaryKey, Storage,
    UpdatedPlaylist, UserData,
};

/// Playlist CRUD, ordering, and the publish transition
pub struct Playlists<Db> {
    context: OpentoneContext<Db>,
}

/// Fields a playlist owner may change in one request
#[derive(Debug, Default)]
pub struct PlaylistUpdate {
    pub title: Option<String>,
    pub private: Option<bool>,
}

impl<Db> Playlists<Db>
where
    Db: Database,
{
    /// A playlist this small isn't an album yet, it doesn't get published
    pub const MINIMUM_PUBLISH_TRACKS: usize = 2;

    pub fn new(context: &OpentoneContext<Db>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub async fn create(
        &self,
        owner: &UserData,
        title: &str,
        private: bool,
    ) -> Result<PlaylistData, DatabaseError> {
        let permalink =
            unique_playlist_permalink(&*self.context.database, owner.id, &permalink(title)).await?;

        self.context
            .database
            .create_playlist(NewPlaylist {
                user_id: owner.id,
                title: title.to_string(),
                permalink,
                private,
            })
            .await
    }

    pub async fn by_id(&self, playlist_id: PrimaryKey) -> Result<PlaylistData, DatabaseError> {
        self.context.database.playlist_by_id(playlist_id).await
    }

    pub async fn by_permalink(
        &self,
        user_id: PrimaryKey,
        permalink: &str,
    ) -> Result<PlaylistData, DatabaseError> {
        self.context
            .database
            .playlist_by_permalink(user_id, permalink)
            .await
    }

    pub async fn for_user(
        &self,
        user_id: PrimaryKey,
        include_private: bool,
    ) -> Result<Vec<PlaylistData>, DatabaseError> {
        self.context
            .database
            .playlists_for_user(user_id, include_private)
            .await
    }

    /// Applies an update. Flipping a playlist public is also the publish
    /// intent: it goes through only when the playlist has enough tracks,
    /// otherwise the rest of the update still applies.
    pub async fn update(
        &self,
        playlist: &PlaylistData,
        update: PlaylistUpdate,
    ) -> Result<PlaylistData, DatabaseError> {
        let wants_public = update.private == Some(false);

        let published_at = (wants_public
            && !playlist.published
            && playlist.tracks.len() >= Self::MINIMUM_PUBLISH_TRACKS)
            .then(Utc::now);

        self.context
            .database
            .update_playlist(UpdatedPlaylist {
                id: playlist.id,
                title: update.title,
                private: update.private,
                pic_key: None,
                published_at,
            })
            .await
    }

    pub async fn destroy(&self, playlist_id: PrimaryKey) -> Result<(), DatabaseError> {
        self.context.database.delete_playlist(playlist_id).await
    }

    pub async fn add_track(
        &self,
        playlist_id: PrimaryKey,
        asset_id: PrimaryKey,
    ) -> Result<PlaylistData, DatabaseError> {
        self.context
            .database
            .add_playlist_track(playlist_id, asset_id)
            .await?;

        self.by_id(playlist_id).await
    }

    pub async fn remove_track(
        &self,
        playlist_id: PrimaryKey,
        asset_id: PrimaryKey,
    ) -> Result<PlaylistData, DatabaseError> {
        self.context
            .database
            .remove_playlist_track(playlist_id, asset_id)
            .await?;

        self.by_id(playlist_id).await
    }

    pub async fn reorder(
        &self,
        playlist_id: PrimaryKey,
        ordered_asset_ids: &[PrimaryKey],
    ) -> Result<PlaylistData, DatabaseError> {
        self.context
            .database
            .reorder_playlist_tracks(playlist_id, ordered_asset_ids)
            .await?;

        self.by_id(playlist_id).await
    }

    /// Orders a user's playlists themselves
    pub async fn sort(
        &self,
        user_id: PrimaryKey,
        ordered_playlist_ids: &[PrimaryKey],
    ) -> Result<(), DatabaseError> {
        self.context
            .database
            .sort_playlists(user_id, ordered_playlist_ids)
            .await
    }

    /// Stores a cover photo and records it on the playlist. Resized
    /// variants are the attachment pipeline's business.
    pub async fn attach_pic(
        &self,
        playlist: &PlaylistData,
        data: &[u8],
    ) -> Result<PlaylistData, DatabaseError> {
        let pic_key = format!("pic-{}-{}", playlist.id, random_string(12));

        self.context
            .storage
            .store(&pic_key, data)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        self.context
            .database
            .update_playlist(UpdatedPlaylist {
                id: playlist.id,
                pic_key: Some(pic_key),
                ..Default::default()
            })
            .await
    }
}

/// Probes for a free permalink, appending a counter on collision
pub(crate) async fn unique_playlist_permalink<Db: Database>(
    db: &Db,
    user_id: PrimaryKey,
    base: &str,
) -> Result<String, DatabaseError> {
    let mut candidate = base.to_string();
    let mut suffix = 2;

    loop {
        match db.playlist_by_permalink(user_id, &candidate).await {
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
    use crate::testing::{create_asset, create_user, test_harness};

    #[tokio::test]
    async fn test_publish_requires_two_tracks() {
        let harness = test_harness("playlists_publish_gate").await;
        let playlists = Playlists::new(&harness.context);

        let user = create_user(&harness.context.database, "jamie").await;
        let asset = create_asset(&harness.context.database, &user, "Only Song").await;

        let playlist = playlists.create(&user, "Sparse", true).await.unwrap();
        let playlist = playlists.add_track(playlist.id, asset.id).await.unwrap();

        let updated = playlists
            .update(
                &playlist,
                PlaylistUpdate {
                    title: None,
                    private: Some(false),
                },
            )
            .await
            .unwrap();

        // The privacy change applies, the publish intent does not
        assert!(!updated.private);
        assert!(!updated.published);
        assert!(updated.published_at.is_none());
    }

    #[tokio::test]
    async fn test_publish_with_enough_tracks_stamps_published_at() {
        let harness = test_harness("playlists_publish").await;
        let playlists = Playlists::new(&harness.context);

        let user = create_user(&harness.context.database, "henri").await;
        let first = create_asset(&harness.context.database, &user, "Manufacturer").await;
        let second = create_asset(&harness.context.database, &user, "Polderkaas").await;

        let playlist = playlists.create(&user, "Cheese", true).await.unwrap();
        playlists.add_track(playlist.id, first.id).await.unwrap();
        let playlist = playlists.add_track(playlist.id, second.id).await.unwrap();

        assert!(playlist.published_at.is_none());

        let updated = playlists
            .update(
                &playlist,
                PlaylistUpdate {
                    title: None,
                    private: Some(false),
                },
            )
            .await
            .unwrap();

        assert!(updated.published);
        assert!(updated.published_at.is_some());
    }

    #[tokio::test]
    async fn test_track_order_is_dense_and_reorderable() {
        let harness = test_harness("playlists_reorder").await;
        let playlists = Playlists::new(&harness.context);

        let user = create_user(&harness.context.database, "henri").await;
        let a = create_asset(&harness.context.database, &user, "A").await;
        let b = create_asset(&harness.context.database, &user, "B").await;
        let c = create_asset(&harness.context.database, &user, "C").await;

        let playlist = playlists.create(&user, "Ordered", true).await.unwrap();
        playlists.add_track(playlist.id, a.id).await.unwrap();
        playlists.add_track(playlist.id, b.id).await.unwrap();
        let playlist = playlists.add_track(playlist.id, c.id).await.unwrap();

        let positions: Vec<_> = playlist.tracks.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);

        let playlist = playlists
            .reorder(playlist.id, &[c.id, a.id, b.id])
            .await
            .unwrap();
        let order: Vec<_> = playlist.tracks.iter().map(|t| t.asset.id).collect();
        assert_eq!(order, vec![c.id, a.id, b.id]);

        // Removing the middle track keeps positions dense
        let playlist = playlists.remove_track(playlist.id, a.id).await.unwrap();
        let positions: Vec<_> = playlist.tracks.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_permalink_collisions_get_a_suffix() {
        let harness = test_harness("playlists_permalink").await;
        let playlists = Playlists::new(&harness.context);

        let user = create_user(&harness.context.database, "arthur").await;

        let first = playlists.create(&user, "Mixtape", true).await.unwrap();
        let second = playlists.create(&user, "Mixtape", true).await.unwrap();

        assert_eq!(first.permalink, "mixtape");
        assert_eq!(second.permalink, "mixtape-2");
    }

    #[tokio::test]
    async fn test_attach_pic_stores_and_records_key() {
        let harness = test_harness("playlists_pic").await;
        let playlists = Playlists::new(&harness.context);

        let user = create_user(&harness.context.database, "arthur").await;
        let playlist = playlists.create(&user, "With Cover", true).await.unwrap();

        let updated = playlists
            .attach_pic(&playlist, &[0xFF, 0xD8, 0xFF])
            .await
            .unwrap();

        let key = updated.pic_key.expect("pic key is recorded");
        let stored = harness.context.storage.retrieve(&key).await.unwrap();
        assert_eq!(stored, vec![0xFF, 0xD8, 0xFF]);
    }
}
