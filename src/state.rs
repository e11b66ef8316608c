use std::sync::Arc;

use sqlx::SqlitePool;

use crate::naming::NameResolver;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub resolver: Arc<dyn NameResolver>,
}
