pub mod download_batch;
pub mod part_download;
pub mod part_model;
