pub mod fs;
pub mod sync;

pub use fs::{file_fingerprint, file_name_of, list_files, remove_suffix};
