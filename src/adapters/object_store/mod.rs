//! Remote object storage
//!
//! The uploader depends on [`ObjectStore`] only; [`S3ObjectStore`] is the
//! production implementation.

pub mod s3;
pub mod traits;

pub use s3::S3ObjectStore;
pub use traits::ObjectStore;
