pub mod health;
pub mod operator;
pub mod uploader;

pub use health::{check_health, is_healthy};
pub use operator::{build_operator, ObjectStoreConfig};
pub use uploader::upload_archive;
