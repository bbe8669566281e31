//! Error types of the detach and attach operations.
//!
//! Each operation distinguishes three outcomes:
//!
//! - `Ok(_)`: the transformation and any requested write-out succeeded;
//! - an error for which `is_output_error()` is true:
//!   the transformation succeeded but writing to the output sink failed,
//!   and the result can still be recovered from the error;
//! - any other error: the transformation itself failed.
//!
//! [`DetachError`] and [`AttachError`] are declared
//! next to their respective operations.
use snafu::{Backtrace, Snafu};

pub use crate::attach::AttachError;
pub use crate::detach::DetachError;

/// An error which may occur while writing an object to an output sink.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum OutputError {
    /// Could not encode the DICOM object
    EncodeObject {
        backtrace: Backtrace,
        source: dicom_object::WriteError,
    },
    /// Could not write the encoded object to the sink
    WriteSink {
        backtrace: Backtrace,
        source: std::io::Error,
    },
    /// Could not finalize the output sink
    Finish {
        backtrace: Backtrace,
        source: std::io::Error,
    },
}
