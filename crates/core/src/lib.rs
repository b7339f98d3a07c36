pub mod acl;
pub mod batch;
pub mod cache;
pub mod error;
pub mod hashing;
pub mod ini_file;
pub mod localized;
pub mod metadata;
pub mod part;
pub mod paths;
pub mod settings;
pub mod thumbnails;
pub mod tree;
pub mod tree_json;
pub mod types;
pub mod viewer;
