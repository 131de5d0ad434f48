pub mod packer;
pub mod scanner;

pub use packer::{cleanup_after_upload, group_into_batches, seal_batch, SealedArchive};
pub use scanner::{prune_empty_dirs, scan_window};
