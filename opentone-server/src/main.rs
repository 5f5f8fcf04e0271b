use std::{env, path::PathBuf, sync::Arc, thread};

use log::{info, warn};
use opentone_core::{
    AkismetClassifier, AuthError, BoxedSpamClassifier, ChannelJobQueue, FsStorage, NewAccount,
    NullClassifier, Opentone, SqliteDatabase,
};
use opentone_server::{logging, run_server, ServerContext};

#[tokio::main]
async fn main() {
    logging::init_logger();

    let database_path =
        PathBuf::from(env::var("OPENTONE_DATABASE").unwrap_or_else(|_| "opentone.db".to_string()));
    let storage_dir =
        PathBuf::from(env::var("OPENTONE_STORAGE_DIR").unwrap_or_else(|_| "storage".to_string()));
    let site_url = env::var("OPENTONE_SITE_URL")
        .unwrap_or_else(|_| "https://opentone.example".to_string());

    info!("Opening database at {}...", database_path.display());

    let database = SqliteDatabase::open(&database_path)
        .await
        .expect("database opens");

    let storage = FsStorage::new(&storage_dir).expect("storage directory is writable");

    let classifier: BoxedSpamClassifier = match env::var("OPENTONE_AKISMET_KEY") {
        Ok(key) => Arc::new(AkismetClassifier::new(&key, &site_url)),
        Err(_) => {
            warn!("No classifier key configured, comments won't be filtered");
            Arc::new(NullClassifier)
        }
    };

    let (job_queue, job_receiver) = ChannelJobQueue::new();

    // Deployments attach real workers to the queue. Draining it here keeps
    // enqueue fire-and-forget even when nothing else is listening.
    thread::spawn(move || {
        for job in job_receiver {
            info!("Job ready for workers: {job:?}");
        }
    });

    let app = Opentone::new(database, classifier, Arc::new(job_queue), Arc::new(storage));

    // First run: mint the moderator account when credentials are configured
    if let (Ok(login), Ok(password)) = (
        env::var("OPENTONE_MODERATOR_LOGIN"),
        env::var("OPENTONE_MODERATOR_PASSWORD"),
    ) {
        let result = app
            .auth
            .register_moderator(NewAccount {
                email: format!("{login}@{}", site_url.trim_start_matches("https://")),
                display_name: login.clone(),
                login,
                password,
            })
            .await;

        match result {
            Ok(user) => info!("Created moderator account {}", user.login),
            Err(AuthError::ModeratorExists) => {}
            Err(e) => warn!("Couldn't create the moderator account: {e}"),
        }
    }

    info!("Initialized successfully.");

    run_server(ServerContext { app: Arc::new(app) }).await;
}
