use log::warn;
use thiserror::Error;

use crate::{
    AssetData, CommentData, CommentSubmission, CommentVisibility, Database, DatabaseError,
    NewComment, OpentoneContext, Page, PrimaryKey, SpamClassifier, Verdict,
};

/// Comment creation, listing, and the spam workflow
pub struct Comments<Db> {
    context: OpentoneContext<Db>,
}

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("Comment body can't be empty")]
    EmptyBody,
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

/// A comment as submitted by a visitor, along with the request metadata
/// the classifier wants to see
#[derive(Debug, Clone, Default)]
pub struct IncomingComment {
    pub body: String,
    pub commenter_id: Option<PrimaryKey>,
    pub remote_ip: String,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub private: bool,
}

impl<Db> Comments<Db>
where
    Db: Database,
{
    pub fn new(context: &OpentoneContext<Db>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Stores a comment after running it past the classifier. A spam verdict
    /// flags the row instead of rejecting it, so spammers don't learn they
    /// were caught. An unavailable classifier counts as ham.
    pub async fn create(
        &self,
        asset: &AssetData,
        incoming: IncomingComment,
    ) -> Result<CommentData, CommentError> {
        let body = incoming.body.trim().to_string();

        if body.is_empty() {
            return Err(CommentError::EmptyBody);
        }

        let submission = CommentSubmission {
            body: body.clone(),
            remote_ip: incoming.remote_ip.clone(),
            user_agent: incoming.user_agent.clone(),
            referrer: incoming.referrer.clone(),
        };

        let verdict = match self.context.classifier.classify(&submission).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!("Classifier unavailable, assuming ham: {e}");
                Verdict::Ham
            }
        };

        let comment = self
            .context
            .database
            .create_comment(NewComment {
                asset_id: asset.id,
                commenter_id: incoming.commenter_id,
                body,
                remote_ip: incoming.remote_ip,
                user_agent: incoming.user_agent,
                referrer: incoming.referrer,
                private: incoming.private,
                spam: verdict.is_spam(),
            })
            .await?;

        Ok(comment)
    }

    pub async fn by_id(&self, comment_id: PrimaryKey) -> Result<CommentData, DatabaseError> {
        self.context.database.comment_by_id(comment_id).await
    }

    /// Hard delete, distinct from spam-flagging and not reversible
    pub async fn destroy(&self, comment_id: PrimaryKey) -> Result<(), DatabaseError> {
        self.context.database.delete_comment(comment_id).await
    }

    /// Flags a comment as spam and tells the classifier it missed one
    pub async fn mark_spam(&self, comment_id: PrimaryKey) -> Result<CommentData, DatabaseError> {
        let comment = self
            .context
            .database
            .set_comment_spam(comment_id, true)
            .await?;

        self.report(&comment, Verdict::Spam).await;

        Ok(comment)
    }

    /// Clears the spam flag and tells the classifier it was too eager
    pub async fn mark_ham(&self, comment_id: PrimaryKey) -> Result<CommentData, DatabaseError> {
        let comment = self
            .context
            .database
            .set_comment_spam(comment_id, false)
            .await?;

        self.report(&comment, Verdict::Ham).await;

        Ok(comment)
    }

    pub async fn for_asset(
        &self,
        asset_id: PrimaryKey,
        visibility: CommentVisibility,
    ) -> Result<Vec<CommentData>, DatabaseError> {
        self.context
            .database
            .comments_for_asset(asset_id, visibility)
            .await
    }

    /// Comments received on a user's tracks
    pub async fn received_by(
        &self,
        user_id: PrimaryKey,
        visibility: CommentVisibility,
        page: Page,
    ) -> Result<Vec<CommentData>, DatabaseError> {
        self.context
            .database
            .comments_for_user(user_id, visibility, page)
            .await
    }

    /// Comments a user has made on other tracks
    pub async fn made_by(
        &self,
        user_id: PrimaryKey,
        visibility: CommentVisibility,
        page: Page,
    ) -> Result<Vec<CommentData>, DatabaseError> {
        self.context
            .database
            .comments_by_user(user_id, visibility, page)
            .await
    }

    pub async fn recent(
        &self,
        visibility: CommentVisibility,
        page: Page,
    ) -> Result<Vec<CommentData>, DatabaseError> {
        self.context.database.recent_comments(visibility, page).await
    }

    /// The moderator spam queue
    pub async fn spam_queue(&self, page: Page) -> Result<Vec<CommentData>, DatabaseError> {
        self.context.database.spam_comments(page).await
    }

    async fn report(&self, comment: &CommentData, correct: Verdict) {
        let submission = CommentSubmission::from(comment);

        if let Err(e) = self.context.classifier.report(&submission, correct).await {
            warn!("Failed to report verdict correction: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::{create_asset, create_user, test_harness};

    fn incoming(body: &str) -> IncomingComment {
        IncomingComment {
            body: body.to_string(),
            remote_ip: "10.0.0.1".to_string(),
            user_agent: Some("Mozilla/5.0".to_string()),
            referrer: None,
            commenter_id: None,
            private: false,
        }
    }

    #[tokio::test]
    async fn test_empty_body_is_rejected() {
        let harness = test_harness("comments_empty").await;
        let comments = Comments::new(&harness.context);

        let user = create_user(&harness.context.database, "sudara").await;
        let asset = create_asset(&harness.context.database, &user, "Song 1").await;

        let result = comments.create(&asset, incoming("   ")).await;

        assert!(matches!(result, Err(CommentError::EmptyBody)));
    }

    #[tokio::test]
    async fn test_spam_verdict_flags_but_still_succeeds() {
        let harness = test_harness("comments_spam_verdict").await;
        let comments = Comments::new(&harness.context);

        let user = create_user(&harness.context.database, "sudara").await;
        let asset = create_asset(&harness.context.database, &user, "Song 1").await;

        harness.classifier.set_verdict(Verdict::Spam);

        let comment = comments
            .create(&asset, incoming("Buy cheap watches"))
            .await
            .expect("submission still succeeds");

        assert!(comment.spam);

        // Flagged comments stay out of the public listing
        let visible = comments
            .for_asset(asset.id, CommentVisibility::Public)
            .await
            .unwrap();

        assert!(visible.is_empty());
    }

    #[tokio::test]
    async fn test_ham_verdict_is_publicly_listed() {
        let harness = test_harness("comments_ham_verdict").await;
        let comments = Comments::new(&harness.context);

        let user = create_user(&harness.context.database, "sudara").await;
        let asset = create_asset(&harness.context.database, &user, "Song 1").await;

        let comment = comments
            .create(&asset, incoming("Lovely track!"))
            .await
            .expect("comment is created");

        assert!(!comment.spam);
        assert_eq!(comment.track_owner_id, user.id);

        let visible = comments
            .for_asset(asset.id, CommentVisibility::Public)
            .await
            .unwrap();

        assert_eq!(visible.len(), 1);
    }

    #[tokio::test]
    async fn test_private_comments_are_hidden_from_public() {
        let harness = test_harness("comments_private").await;
        let comments = Comments::new(&harness.context);

        let user = create_user(&harness.context.database, "sudara").await;
        let asset = create_asset(&harness.context.database, &user, "Song 1").await;

        let mut private = incoming("Just for you");
        private.private = true;

        comments
            .create(&asset, private)
            .await
            .expect("comment is created");

        let public = comments
            .for_asset(asset.id, CommentVisibility::Public)
            .await
            .unwrap();
        let owner_view = comments
            .for_asset(asset.id, CommentVisibility::IncludingPrivate)
            .await
            .unwrap();

        assert!(public.is_empty());
        assert_eq!(owner_view.len(), 1);
    }

    #[tokio::test]
    async fn test_mark_spam_reports_false_negative() {
        let harness = test_harness("comments_mark_spam").await;
        let comments = Comments::new(&harness.context);

        let user = create_user(&harness.context.database, "sudara").await;
        let asset = create_asset(&harness.context.database, &user, "Song 1").await;

        let comment = comments
            .create(&asset, incoming("Sneaky spam"))
            .await
            .expect("comment is created");
        assert!(!comment.spam);

        let flagged = comments.mark_spam(comment.id).await.unwrap();
        assert!(flagged.spam);

        let reports = harness.classifier.reports();
        assert_eq!(reports, vec![("Sneaky spam".to_string(), Verdict::Spam)]);

        let queue = comments.spam_queue(Page::default()).await.unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_mark_ham_reports_false_positive() {
        let harness = test_harness("comments_mark_ham").await;
        let comments = Comments::new(&harness.context);

        let user = create_user(&harness.context.database, "sudara").await;
        let asset = create_asset(&harness.context.database, &user, "Song 1").await;

        harness.classifier.set_verdict(Verdict::Spam);

        let comment = comments
            .create(&asset, incoming("Actually fine"))
            .await
            .expect("comment is created");
        assert!(comment.spam);

        let cleared = comments.mark_ham(comment.id).await.unwrap();
        assert!(!cleared.spam);

        let reports = harness.classifier.reports();
        assert_eq!(reports, vec![("Actually fine".to_string(), Verdict::Ham)]);

        let visible = comments
            .for_asset(asset.id, CommentVisibility::Public)
            .await
            .unwrap();
        assert_eq!(visible.len(), 1);
    }

    #[tokio::test]
    async fn test_destroy_is_terminal() {
        let harness = test_harness("comments_destroy").await;
        let comments = Comments::new(&harness.context);

        let user = create_user(&harness.context.database, "sudara").await;
        let asset = create_asset(&harness.context.database, &user, "Song 1").await;

        let comment = comments
            .create(&asset, incoming("Soon gone"))
            .await
            .expect("comment is created");

        comments.destroy(comment.id).await.unwrap();

        let result = comments.by_id(comment.id).await;
        assert!(matches!(
            result,
            Err(DatabaseError::NotFound { resource: "comment", .. })
        ));
    }

    #[tokio::test]
    async fn test_classifier_outage_counts_as_ham() {
        let harness = test_harness("comments_outage").await;
        let comments = Comments::new(&harness.context);

        let user = create_user(&harness.context.database, "sudara").await;
        let asset = create_asset(&harness.context.database, &user, "Song 1").await;

        harness.classifier.fail_next();

        let comment = comments
            .create(&asset, incoming("Still accepted"))
            .await
            .expect("comment is created despite outage");

        assert!(!comment.spam);
    }
}
