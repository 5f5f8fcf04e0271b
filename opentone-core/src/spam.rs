use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use thiserror::Error;

use crate::CommentData;

pub type BoxedSpamClassifier = Arc<dyn SpamClassifier>;

/// The verdict of a content classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ham,
    Spam,
}

impl Verdict {
    pub fn is_spam(&self) -> bool {
        matches!(self, Self::Spam)
    }
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Failed to reach classifier: {0}")]
    Transport(String),
    #[error("Classifier returned an unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Everything the classifier gets to see about a submission
#[derive(Debug, Clone)]
pub struct CommentSubmission {
    pub body: String,
    pub remote_ip: String,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

impl From<&CommentData> for CommentSubmission {
    fn from(comment: &CommentData) -> Self {
        Self {
            body: comment.body.clone(),
            remote_ip: comment.remote_ip.clone(),
            user_agent: comment.user_agent.clone(),
            referrer: comment.referrer.clone(),
        }
    }
}

/// An external content classification service.
///
/// Implementations must never panic on transport failures, the caller
/// decides how much it trusts an unavailable classifier.
#[async_trait]
pub trait SpamClassifier: Send + Sync + 'static {
    async fn classify(&self, submission: &CommentSubmission) -> Result<Verdict, ClassifierError>;

    /// Reports a wrong verdict back to the classifier. `correct` is what the
    /// verdict should have been.
    async fn report(
        &self,
        submission: &CommentSubmission,
        correct: Verdict,
    ) -> Result<(), ClassifierError>;
}

/// Talks to an Akismet-compatible classification endpoint
pub struct AkismetClassifier {
    client: Client,
    key: String,
    site_url: String,
}

impl AkismetClassifier {
    pub fn new(key: &str, site_url: &str) -> Self {
        Self {
            client: Client::new(),
            key: key.to_string(),
            site_url: site_url.to_string(),
        }
    }

    fn endpoint(&self, action: &str) -> String {
        format!("https://{}.rest.akismet.com/1.1/{}", self.key, action)
    }

    fn form(&self, submission: &CommentSubmission) -> Vec<(&'static str, String)> {
        vec![
            ("blog", self.site_url.clone()),
            ("user_ip", submission.remote_ip.clone()),
            (
                "user_agent",
                submission.user_agent.clone().unwrap_or_default(),
            ),
            ("referrer", submission.referrer.clone().unwrap_or_default()),
            ("comment_type", "comment".to_string()),
            ("comment_content", submission.body.clone()),
        ]
    }

    async fn post(
        &self,
        action: &str,
        submission: &CommentSubmission,
    ) -> Result<String, ClassifierError> {
        let response = self
            .client
            .post(self.endpoint(action))
            .form(&self.form(submission))
            .send()
            .await
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;

        response
            .text()
            .await
            .map_err(|e| ClassifierError::Transport(e.to_string()))
    }
}

#[async_trait]
impl SpamClassifier for AkismetClassifier {
    async fn classify(&self, submission: &CommentSubmission) -> Result<Verdict, ClassifierError> {
        let body = self.post("comment-check", submission).await?;

        match body.trim() {
            "true" => Ok(Verdict::Spam),
            "false" => Ok(Verdict::Ham),
            other => Err(ClassifierError::UnexpectedResponse(other.to_string())),
        }
    }

    async fn report(
        &self,
        submission: &CommentSubmission,
        correct: Verdict,
    ) -> Result<(), ClassifierError> {
        let action = match correct {
            // The classifier said ham, it should have said spam
            Verdict::Spam => "submit-spam",
            // The classifier said spam, it should have said ham
            Verdict::Ham => "submit-ham",
        };

        self.post(action, submission).await.map(|_| ())
    }
}

/// Passes everything through as ham. Used when no classifier is configured.
pub struct NullClassifier;

#[async_trait]
impl SpamClassifier for NullClassifier {
    async fn classify(&self, _submission: &CommentSubmission) -> Result<Verdict, ClassifierError> {
        Ok(Verdict::Ham)
    }

    async fn report(
        &self,
        _submission: &CommentSubmission,
        _correct: Verdict,
    ) -> Result<(), ClassifierError> {
        Ok(())
    }
}
