//! # Upload Handling
//!
//! The write path behind `POST /data/save`:
//! - **request**: screens the multipart body into a typed `UploadRequest`
//! - **key**: generates the random, extension-suffixed storage key
//! - **pipeline**: writes the blob, then the record

pub mod key;
pub mod pipeline;
pub mod request;

pub use pipeline::{PipelineError, UploadPipeline};
pub use request::{read_upload_request, UploadRejection};
