mod auth;
mod comments;
mod db;
mod ingest;
mod jobs;
mod library;
mod listens;
mod moderation;
mod playlists;
mod spam;
mod storage;
mod util;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

pub use auth::*;
pub use comments::*;
pub use db::*;
pub use ingest::{IngestError, SkippedMember, UploadSource};
pub use jobs::*;
pub use library::*;
pub use listens::*;
pub use moderation::*;
pub use playlists::*;
pub use spam::*;
pub use storage::*;

/// The opentone system, facilitating uploads, listens, comments, playlists,
/// and moderation over a backing store and its external collaborators.
pub struct Opentone<Db> {
    context: OpentoneContext<Db>,

    pub auth: Auth<Db>,
    pub library: Library<Db>,
    pub listens: Listens<Db>,
    pub comments: Comments<Db>,
    pub playlists: Playlists<Db>,
}

/// A type passed to the various services to access the database and the
/// external collaborator seams
pub struct OpentoneContext<Db> {
    pub database: Arc<Db>,
    pub classifier: BoxedSpamClassifier,
    pub jobs: BoxedJobQueue,
    pub storage: BoxedStorage,
}

impl<Db> Opentone<Db>
where
    Db: Database,
{
    pub fn new(
        database: Db,
        classifier: BoxedSpamClassifier,
        jobs: BoxedJobQueue,
        storage: BoxedStorage,
    ) -> Self {
        let database = Arc::new(database);

        let context = OpentoneContext {
            database: database.clone(),
            classifier,
            jobs,
            storage,
        };

        Self {
            auth: Auth::new(&database),
            library: Library::new(&context),
            listens: Listens::new(&context),
            comments: Comments::new(&context),
            playlists: Playlists::new(&context),
            context,
        }
    }

    pub fn context(&self) -> &OpentoneContext<Db> {
        &self.context
    }

    pub fn database(&self) -> &Arc<Db> {
        &self.context.database
    }

    pub fn storage(&self) -> &BoxedStorage {
        &self.context.storage
    }
}

impl<Db> Clone for OpentoneContext<Db>
where
    Db: Database,
{
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            classifier: self.classifier.clone(),
            jobs: self.jobs.clone(),
            storage: self.storage.clone(),
        }
    }
}
