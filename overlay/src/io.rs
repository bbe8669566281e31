//! Reading input DICOM objects and writing output DICOM objects.
//!
//! Output sinks are accessed through [`StagedOutput`],
//! which encodes the whole object in memory first,
//! so that an encoding failure never leaves a partial object in the sink.
use std::io::{Read, Write};

use dicom_encoding::transfer_syntax::TransferSyntaxIndex;
use dicom_object::file::ReadPreamble;
use dicom_object::{DefaultDicomObject, OpenFileOptions};
use dicom_transfer_syntax_registry::TransferSyntaxRegistry;
use snafu::ResultExt;

use crate::error::{EncodeObjectSnafu, FinishSnafu, OutputError, WriteSinkSnafu};

/// Read a DICOM object from a byte source:
/// the file meta group,
/// followed by the main data set up to the end of the source.
pub(crate) fn read_object<R>(
    source: R,
    read_preamble: ReadPreamble,
) -> Result<DefaultDicomObject, dicom_object::ReadError>
where
    R: Read,
{
    let obj = OpenFileOptions::new()
        .read_preamble(read_preamble)
        .read_all()
        .from_reader(source)?;

    tracing::debug!(
        "Read DICOM object in {}",
        transfer_syntax_name(obj.meta().transfer_syntax())
    );
    Ok(obj)
}

/// Encode the given DICOM object into the sink and finalize it.
pub(crate) fn write_object<W>(obj: &DefaultDicomObject, sink: &mut W) -> Result<(), OutputError>
where
    W: ?Sized + Write,
{
    let mut output = StagedOutput::new(sink);
    output.stage(obj)?;
    output.commit()
}

fn transfer_syntax_name(uid: &str) -> &str {
    TransferSyntaxRegistry
        .get(uid)
        .map(|ts| ts.name())
        .unwrap_or(uid)
}

/// Scoped access to an output sink.
///
/// Objects are encoded into an in-memory staging buffer.
/// The staged bytes only reach the sink on [`commit`](StagedOutput::commit),
/// which then flushes the sink.
/// Dropping the guard without committing discards whatever was staged.
///
/// # Example
///
/// ```
/// # use dicom_core::{DataElement, PrimitiveValue, VR};
/// # use dicom_dictionary_std::{tags, uids};
/// # use dicom_object::{FileMetaTableBuilder, InMemDicomObject};
/// use dicom_overlay::StagedOutput;
///
/// let obj = InMemDicomObject::from_element_iter([
///     DataElement::new(tags::PATIENT_NAME, VR::PN, PrimitiveValue::from("Doe^John")),
/// ])
/// .with_meta(
///     FileMetaTableBuilder::new()
///         .media_storage_sop_class_uid(uids::SECONDARY_CAPTURE_IMAGE_STORAGE)
///         .media_storage_sop_instance_uid("2.25.1")
///         .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN),
/// )?;
///
/// let mut sink = Vec::new();
/// let mut output = StagedOutput::new(&mut sink);
/// output.stage(&obj)?;
/// output.commit()?;
/// assert!(!sink.is_empty());
/// # Result::<(), Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Debug)]
pub struct StagedOutput<'w, W: ?Sized + Write> {
    sink: &'w mut W,
    staged: Vec<u8>,
    committed: bool,
}

impl<'w, W> StagedOutput<'w, W>
where
    W: ?Sized + Write,
{
    /// Acquire the sink for the duration of this guard.
    pub fn new(sink: &'w mut W) -> Self {
        StagedOutput {
            sink,
            staged: Vec::new(),
            committed: false,
        }
    }

    /// Encode the object (file meta group and data set)
    /// into the staging buffer.
    pub fn stage(&mut self, obj: &DefaultDicomObject) -> Result<(), OutputError> {
        obj.write_all(&mut self.staged).context(EncodeObjectSnafu)
    }

    /// The number of bytes staged so far.
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Write all staged bytes to the sink and flush it.
    pub fn commit(mut self) -> Result<(), OutputError> {
        self.committed = true;
        self.sink.write_all(&self.staged).context(WriteSinkSnafu)?;
        self.sink.flush().context(FinishSnafu)?;
        tracing::debug!("Wrote {} bytes to output", self.staged.len());
        Ok(())
    }
}

impl<W> Drop for StagedOutput<'_, W>
where
    W: ?Sized + Write,
{
    fn drop(&mut self) {
        if !self.committed && !self.staged.is_empty() {
            tracing::warn!(
                "Discarding {} bytes of uncommitted output",
                self.staged.len()
            );
        }
    }
}
