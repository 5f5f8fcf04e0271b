use log::info;

use crate::{AssetData, Database, DatabaseError, OpentoneContext, Quarantine, UserData};

/// Moderation command over a user aggregate. Every operation updates the
/// user and all dependent assets, comments, and listens in one transaction,
/// so public listings never see a half-applied cascade.
pub struct UserCommand<'a, Db> {
    context: &'a OpentoneContext<Db>,
    user: &'a UserData,
}

impl<'a, Db> UserCommand<'a, Db>
where
    Db: Database,
{
    pub fn new(context: &'a OpentoneContext<Db>, user: &'a UserData) -> Self {
        Self { context, user }
    }

    /// Hides the user and everything that hangs off them. Rows stay in
    /// place for auditing and reversal.
    pub async fn soft_delete_with_relations(&self) -> Result<(), DatabaseError> {
        self.context
            .database
            .quarantine_user(self.user.id, Quarantine::SoftDelete)
            .await?;

        info!("Soft deleted user {} with relations", self.user.login);

        Ok(())
    }

    /// Same as a soft delete, but also marks the user and their content
    /// as spam
    pub async fn spam_and_soft_delete_with_relations(&self) -> Result<(), DatabaseError> {
        self.context
            .database
            .quarantine_user(self.user.id, Quarantine::SpamAndSoftDelete)
            .await?;

        info!("Marked user {} as spam with relations", self.user.login);

        Ok(())
    }

    /// Reverses either cascade
    pub async fn restore_with_relations(&self) -> Result<(), DatabaseError> {
        self.context.database.restore_user(self.user.id).await?;

        info!("Restored user {} with relations", self.user.login);

        Ok(())
    }
}

/// Moderation command over a single asset and its comments and listens
pub struct AssetCommand<'a, Db> {
    context: &'a OpentoneContext<Db>,
    asset: &'a AssetData,
}

impl<'a, Db> AssetCommand<'a, Db>
where
    Db: Database,
{
    pub fn new(context: &'a OpentoneContext<Db>, asset: &'a AssetData) -> Self {
        Self { context, asset }
    }

    pub async fn soft_delete_with_relations(&self) -> Result<(), DatabaseError> {
        self.context
            .database
            .quarantine_asset(self.asset.id, Quarantine::SoftDelete)
            .await?;

        info!("Soft deleted asset {} with relations", self.asset.id);

        Ok(())
    }

    pub async fn spam_and_soft_delete_with_relations(&self) -> Result<(), DatabaseError> {
        self.context
            .database
            .quarantine_asset(self.asset.id, Quarantine::SpamAndSoftDelete)
            .await?;

        info!("Marked asset {} as spam with relations", self.asset.id);

        Ok(())
    }

    pub async fn restore_with_relations(&self) -> Result<(), DatabaseError> {
        self.context.database.restore_asset(self.asset.id).await?;

        info!("Restored asset {} with relations", self.asset.id);

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::{create_asset, create_user, test_harness};
    use crate::{CommentVisibility, Comments, IncomingComment, Page};

    async fn leave_comment(harness: &crate::testing::TestHarness, asset: &AssetData, body: &str) {
        Comments::new(&harness.context)
            .create(
                asset,
                IncomingComment {
                    body: body.to_string(),
                    remote_ip: "10.0.0.1".to_string(),
                    ..Default::default()
                },
            )
            .await
            .expect("comment is created");
    }

    #[tokio::test]
    async fn test_asset_spam_cascade_hides_from_listings() {
        let harness = test_harness("moderation_asset_spam").await;
        let db = &harness.context.database;

        let user = create_user(db, "sudara").await;
        let first = create_asset(db, &user, "First Song").await;
        let second = create_asset(db, &user, "Second Song").await;
        leave_comment(&harness, &first, "nice").await;

        AssetCommand::new(&harness.context, &first)
            .spam_and_soft_delete_with_relations()
            .await
            .unwrap();

        let listed = db.latest_assets(Page::default()).await.unwrap();
        let titles: Vec<_> = listed.iter().map(|a| a.title.as_str()).collect();

        assert!(!titles.contains(&"First Song"));
        assert!(titles.contains(&"Second Song"));

        // The row is still there, just flagged
        let row = db.asset_by_id(first.id).await.unwrap();
        assert!(row.spam);
        assert!(row.deleted_at.is_some());

        // Its comments went with it
        let comments = db
            .comments_for_asset(first.id, CommentVisibility::Public)
            .await
            .unwrap();
        assert!(comments.is_empty());
    }

    #[tokio::test]
    async fn test_user_soft_delete_cascades_to_assets() {
        let harness = test_harness("moderation_user_delete").await;
        let db = &harness.context.database;

        let user = create_user(db, "henri").await;
        let asset = create_asset(db, &user, "Polderkaas").await;

        UserCommand::new(&harness.context, &user)
            .soft_delete_with_relations()
            .await
            .unwrap();

        let listed = db.latest_assets(Page::default()).await.unwrap();
        assert!(listed.iter().all(|a| a.id != asset.id));

        let row = db.asset_by_id(asset.id).await.unwrap();
        assert!(row.deleted_at.is_some());
        // A plain soft delete is not a spam verdict
        assert!(!row.spam);

        let owner = db.user_by_id(user.id).await.unwrap();
        assert!(owner.deleted_at.is_some());
    }

    #[tokio::test]
    async fn test_restore_reverses_the_cascade() {
        let harness = test_harness("moderation_restore").await;
        let db = &harness.context.database;

        let user = create_user(db, "arthur").await;
        let asset = create_asset(db, &user, "Come Back Soon").await;

        UserCommand::new(&harness.context, &user)
            .spam_and_soft_delete_with_relations()
            .await
            .unwrap();
        assert!(db.latest_assets(Page::default()).await.unwrap().is_empty());

        UserCommand::new(&harness.context, &user)
            .restore_with_relations()
            .await
            .unwrap();

        let listed = db.latest_assets(Page::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, asset.id);

        let owner = db.user_by_id(user.id).await.unwrap();
        assert!(owner.active());
    }

    #[tokio::test]
    async fn test_spam_user_flags_their_comments_elsewhere() {
        let harness = test_harness("moderation_commenter_spam").await;
        let db = &harness.context.database;

        let spammer = create_user(db, "mallory").await;
        let victim = create_user(db, "sudara").await;
        let asset = create_asset(db, &victim, "Innocent Song").await;

        Comments::new(&harness.context)
            .create(
                &asset,
                IncomingComment {
                    body: "Totally legit".to_string(),
                    commenter_id: Some(spammer.id),
                    remote_ip: "10.0.0.66".to_string(),
                    ..Default::default()
                },
            )
            .await
            .expect("comment is created");

        UserCommand::new(&harness.context, &spammer)
            .spam_and_soft_delete_with_relations()
            .await
            .unwrap();

        // The victim's track is untouched, the spammer's comment is gone
        // from its listing
        let listed = db.latest_assets(Page::default()).await.unwrap();
        assert_eq!(listed.len(), 1);

        let comments = db
            .comments_for_asset(asset.id, CommentVisibility::Public)
            .await
            .unwrap();
        assert!(comments.is_empty());
    }
}
