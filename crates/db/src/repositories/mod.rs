//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool`, or an open transaction when the caller needs several
//! statements to commit together.

pub mod download_batch_repo;
pub mod part_download_repo;
pub mod part_model_repo;

pub use download_batch_repo::DownloadBatchRepo;
pub use part_download_repo::PartDownloadRepo;
pub use part_model_repo::PartModelRepo;
