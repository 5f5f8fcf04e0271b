use std::sync::Arc;

use opentone_core::{Opentone, SqliteDatabase};

/// The concrete application type this server fronts
pub type App = Opentone<SqliteDatabase>;

#[derive(Clone)]
pub struct ServerContext {
    pub app: Arc<App>,
}
