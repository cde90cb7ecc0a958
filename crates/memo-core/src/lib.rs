pub mod error;
pub mod types;
pub mod config;
pub mod persistence;
pub mod provider;
pub mod store;
pub mod query;
pub mod service;
pub mod util;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_HASH: &str = env!("GIT_HASH");
pub const LOGO: &str = "📝";
