use std::path::PathBuf;
use std::sync::Arc;

use super::errors::AppError;
use crate::ai::AIProvider;
use crate::db::Database;
use crate::profile::Profile;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db_path: PathBuf,
    pub llm: Arc<dyn AIProvider>,
    /// Used by /generate-resume when the request carries no profile.
    pub default_profile: Option<Arc<Profile>>,
}

impl AppState {
    pub fn new(
        db_path: PathBuf,
        llm: Arc<dyn AIProvider>,
        default_profile: Option<Profile>,
    ) -> Self {
        Self {
            db_path,
            llm,
            default_profile: default_profile.map(Arc::new),
        }
    }

    /// Runs `f` on a fresh connection on the blocking pool.
    pub async fn with_db<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let db = Database::open_at(&path)?;
            f(&db)
        })
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(AppError::Database)
    }
}
