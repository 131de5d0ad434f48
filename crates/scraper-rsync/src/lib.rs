pub mod downloader;
pub mod lister;

pub use downloader::download_files;
pub use lister::{list_remote_files, local_destination};
