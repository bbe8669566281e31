//! DICOM overlay management
//!
//! This crate detaches the overlay plane attributes of a DICOM object
//! into a separate [DICOM JSON][1] document,
//! and attaches them back again.
//!
//! [1]: https://dicom.nema.org/medical/dicom/current/output/chtml/part18/chapter_F.html
//!
//! Detaching splits a DICOM object in two disjoint parts:
//! the overlay attributes, serialized to JSON,
//! and all remaining attributes,
//! which can be written to an output sink as a regular DICOM object.
//! Attaching is the inverse operation:
//! the overlay attributes are parsed from JSON
//! and merged into a DICOM object read from a byte source.
//!
//! Which attributes are overlay attributes
//! is decided by an [`OverlayClassifier`].
//! By default, only the attributes in the group of
//! [`OVERLAY_REFERENCE_TAG`] are detached (see [`is_overlay_tag`]).
//!
//! # Example
//!
//! ```no_run
//! use std::fs::File;
//! use dicom_overlay::{attach_overlay_json_to, detach_overlay_json_to};
//!
//! // split
//! let mut remaining = File::create("path/to/no-overlays.dcm")?;
//! let json = detach_overlay_json_to(File::open("path/to/file.dcm")?, &mut remaining)?;
//!
//! // join
//! let mut restored = File::create("path/to/restored.dcm")?;
//! let merged = attach_overlay_json_to(
//!     &json,
//!     File::open("path/to/no-overlays.dcm")?,
//!     &mut restored,
//! )?;
//! # Result::<(), Box<dyn std::error::Error>>::Ok(())
//! ```
//!
//! See [`OverlayOptions`] for the available options,
//! such as the classifier to use.
//!
//! # Errors
//!
//! The operations report three kinds of outcome:
//! complete success,
//! success of the transformation with a failure to write the output
//! (in which case the result is kept in the error value),
//! and failure of the transformation itself.
//! See the [`error`] module for the details.
pub mod attach;
pub mod classify;
pub mod detach;
pub mod error;
pub mod io;
mod options;

pub use crate::attach::{
    attach_overlay_json, attach_overlay_json_from, attach_overlay_json_to, flatten_meta,
    merge_overlay,
};
pub use crate::classify::{
    is_overlay_tag, OverlayClassifier, OverlayGroup, RepeatingOverlayGroups, OVERLAY_REFERENCE_TAG,
};
pub use crate::detach::{detach_overlay_json, detach_overlay_json_to, take_overlay, Detached};
pub use crate::error::{AttachError, DetachError, OutputError};
pub use crate::io::StagedOutput;
pub use crate::options::OverlayOptions;
