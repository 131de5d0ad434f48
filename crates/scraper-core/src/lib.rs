pub mod config;
pub mod domain;
pub mod error;
pub mod hostname;

pub use config::ScraperConfig;
pub use domain::{Archive, EndpointIdentity, LocalFile, RemoteFile, SyncRecord};
pub use error::{ScraperError, ScraperResult};
