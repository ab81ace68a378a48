pub mod app;
pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod progress;
pub mod stats;
pub mod storage;
pub mod store;
pub mod state;

pub use app::router;
pub use config::Config;
pub use state::AppState;
pub use storage::load_data;
pub use store::Store;
