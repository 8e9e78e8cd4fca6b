use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::credentials::Credentials;
use crate::config::Config;
use crate::organizer::cache::ProjectionCache;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub credentials: Arc<Credentials>,
    /// Organizer views of the public post collection.
    pub projections: Arc<ProjectionCache>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> anyhow::Result<Self> {
        let credentials = Credentials::from_config(&config.auth)?;
        Ok(Self {
            db,
            config,
            credentials: Arc::new(credentials),
            projections: Arc::new(ProjectionCache::new()),
        })
    }

    /// Called after every successful write to the posts table.
    pub fn posts_changed(&self) {
        self.projections.invalidate();
    }
}
