use crate::storage::Database;
use crate::store::Store;
use std::path::PathBuf;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
}

impl AppState {
    pub fn new(data_path: PathBuf, data: Database) -> Self {
        Self {
            store: Store::new(data_path, data),
        }
    }
}
