//! Shared fixtures for the test suites in this crate

use std::{
    io::Write,
    sync::Arc,
};

use async_trait::async_trait;
use crossbeam::channel::Receiver;
use parking_lot::Mutex;
use zip::{write::SimpleFileOptions, ZipWriter};

use crate::{
    AssetData, ChannelJobQueue, ClassifierError, CommentSubmission, Database, Job, MemoryStorage,
    NewAsset, NewUser, OpentoneContext, SpamClassifier, SqliteDatabase, UserData, Verdict,
};

/// A context over a throwaway database, plus handles onto the collaborator
/// seams so tests can observe what the services did
pub struct TestHarness {
    pub context: OpentoneContext<SqliteDatabase>,
    pub jobs: Receiver<Job>,
    pub classifier: Arc<ScriptedClassifier>,
}

pub async fn test_harness(name: &str) -> TestHarness {
    let database = test_database(name).await;
    let classifier = Arc::new(ScriptedClassifier::default());
    let (queue, jobs) = ChannelJobQueue::new();

    let context = OpentoneContext {
        database,
        classifier: classifier.clone(),
        jobs: Arc::new(queue),
        storage: Arc::new(MemoryStorage::default()),
    };

    TestHarness {
        context,
        jobs,
        classifier,
    }
}

/// Creates a fresh database file under the system temp dir
pub async fn test_database(name: &str) -> Arc<SqliteDatabase> {
    let path = std::env::temp_dir().join(format!(
        "opentone-test-{}-{}.db",
        std::process::id(),
        name
    ));

    let _ = std::fs::remove_file(&path);

    Arc::new(
        SqliteDatabase::open(&path)
            .await
            .expect("test database opens"),
    )
}

pub async fn create_user(db: &Arc<SqliteDatabase>, login: &str) -> UserData {
    db.create_user(NewUser {
        login: login.to_string(),
        email: format!("{login}@example.com"),
        password: "not-a-real-hash".to_string(),
        display_name: login.to_string(),
        moderator: false,
    })
    .await
    .expect("test user is created")
}

pub async fn create_asset(db: &Arc<SqliteDatabase>, user: &UserData, title: &str) -> AssetData {
    let permalink = crate::util::permalink(title);

    db.create_asset(NewAsset {
        user_id: user.id,
        title: title.to_string(),
        permalink: permalink.clone(),
        filename: format!("{permalink}.mp3"),
        audio_key: format!("audio-test-{permalink}"),
        content_type: "audio/mpeg".to_string(),
        size: 128,
        private: false,
    })
    .await
    .expect("test asset is created")
}

/// Builds an in-memory ZIP archive from (name, bytes) pairs
pub fn zip_bytes(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    for (name, data) in members {
        writer.start_file(name.to_string(), options).expect("member starts");
        writer.write_all(data).expect("member is written");
    }

    writer.finish().expect("archive is finished").into_inner()
}

/// A classifier with a scripted verdict that records correction reports
pub struct ScriptedClassifier {
    verdict: Mutex<Verdict>,
    fail_next: Mutex<bool>,
    reports: Mutex<Vec<(String, Verdict)>>,
}

impl Default for ScriptedClassifier {
    fn default() -> Self {
        Self {
            verdict: Mutex::new(Verdict::Ham),
            fail_next: Mutex::new(false),
            reports: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedClassifier {
    pub fn set_verdict(&self, verdict: Verdict) {
        *self.verdict.lock() = verdict;
    }

    /// The next classify call fails as if the service were unreachable
    pub fn fail_next(&self) {
        *self.fail_next.lock() = true;
    }

    pub fn reports(&self) -> Vec<(String, Verdict)> {
        self.reports.lock().clone()
    }
}

#[async_trait]
impl SpamClassifier for ScriptedClassifier {
    async fn classify(&self, _submission: &CommentSubmission) -> Result<Verdict, ClassifierError> {
        if std::mem::take(&mut *self.fail_next.lock()) {
            return Err(ClassifierError::Transport("scripted outage".to_string()));
        }

        Ok(*self.verdict.lock())
    }

    async fn report(
        &self,
        submission: &CommentSubmission,
        correct: Verdict,
    ) -> Result<(), ClassifierError> {
        self.reports
            .lock()
            .push((submission.body.clone(), correct));

        Ok(())
    }
}
