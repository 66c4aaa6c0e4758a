//! Export of result tables and upload of the produced files
//!
//! - [`table`] streams a table into chunked CSV files
//! - [`upload`] ships those files to object storage with retries

pub mod table;
pub mod upload;

pub use table::{ExportOutcome, TableExportReport, TableExporter};
pub use upload::{object_key, ObjectStoreUploader, UploadPolicy, UploadReceipt};
