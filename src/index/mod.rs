pub mod directory_index;
pub mod path_utils;

pub use directory_index::{DirectoryIndex, DEFAULT_LISTING_CAPACITY, ROOT_ID};
