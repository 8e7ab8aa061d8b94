pub mod fs;

pub use fs::{collect_files, copy_dir, dir_size, is_excluded_dir, is_hidden, remove_dir_all_if_exists};
