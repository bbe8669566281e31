//! Attachment of overlay attributes to a DICOM object.
use std::io::{Read, Write};

use dicom_core::header::Header;
use dicom_core::{DataElement, DicomValue, PrimitiveValue, VR};
use dicom_object::mem::InMemElement;
use dicom_object::{DefaultDicomObject, InMemDicomObject};
use snafu::{Backtrace, ResultExt, Snafu};

use crate::error::OutputError;
use crate::io::{read_object, write_object};
use crate::OverlayOptions;

/// An error which may occur when attaching overlay attributes.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum AttachError {
    /// Could not parse the overlay attributes from JSON
    ParseOverlay {
        backtrace: Backtrace,
        source: serde_json::Error,
    },
    /// Could not read the input DICOM object
    ReadInput {
        backtrace: Backtrace,
        source: dicom_object::ReadError,
    },
    /// Overlay attributes were attached,
    /// but the merged object could not be written
    #[snafu(display("Could not write merged DICOM object"))]
    WriteOutput {
        #[snafu(backtrace)]
        source: OutputError,
        merged: Box<InMemDicomObject>,
    },
}

impl AttachError {
    /// Whether only the write-out to the output sink failed,
    /// meaning that the merged result is still available
    /// through [`into_merged`](AttachError::into_merged).
    pub fn is_output_error(&self) -> bool {
        matches!(self, AttachError::WriteOutput { .. })
    }

    /// Recover the merged result,
    /// if the error happened after the transformation.
    pub fn into_merged(self) -> Option<InMemDicomObject> {
        match self {
            AttachError::WriteOutput { merged, .. } => Some(*merged),
            _ => None,
        }
    }
}

/// Insert all elements of `overlay` into `target`,
/// replacing any existing element with the same tag.
///
/// Returns the number of elements replaced.
pub fn merge_overlay(target: &mut InMemDicomObject, overlay: InMemDicomObject) -> usize {
    let mut replaced = 0;
    for elem in overlay {
        let tag = elem.tag();
        if target.put(elem).is_some() {
            tracing::debug!("Overlay attribute {} replaced an existing element", tag);
            replaced += 1;
        }
    }
    replaced
}

/// Turn a DICOM file object into a single collection of attributes,
/// containing the main data set
/// plus the data elements of its file meta group.
pub fn flatten_meta(obj: DefaultDicomObject) -> InMemDicomObject {
    let meta_elements: Vec<InMemElement> = obj
        .meta()
        .to_element_iter()
        .filter_map(|e| match e.value() {
            DicomValue::Primitive(value) => Some(InMemElement::new(e.tag(), e.vr(), value.clone())),
            _ => None,
        })
        .collect();

    let mut flat = obj.into_inner();
    for elem in meta_elements {
        flat.put(elem);
    }
    flat
}

/// Turn the inline binary values of word-oriented value representations
/// (OW, OL, OV, OF, OD) back into the numeric form
/// in which they are decoded from a DICOM file,
/// including those in sequence items.
///
/// DICOM JSON carries these values as little endian bytes.
/// Values with a byte length which is not a multiple of the word size
/// are left as bytes.
fn restore_word_values(obj: InMemDicomObject) -> InMemDicomObject {
    InMemDicomObject::from_element_iter(obj.into_iter().map(|elem| {
        let tag = elem.tag();
        let vr = elem.vr();
        let mut value = elem.into_value();

        if let Some(items) = value.items_mut() {
            for item in items.iter_mut() {
                let taken = std::mem::replace(item, InMemDicomObject::new_empty());
                *item = restore_word_values(taken);
            }
        }

        let words = match &value {
            DicomValue::Primitive(PrimitiveValue::U8(bytes)) => words_from_le_bytes(vr, bytes),
            _ => None,
        };
        if let Some(words) = words {
            value = DicomValue::Primitive(words);
        }
        DataElement::new(tag, vr, value)
    }))
}

fn words_from_le_bytes(vr: VR, bytes: &[u8]) -> Option<PrimitiveValue> {
    let word_size = match vr {
        VR::OW => 2,
        VR::OL | VR::OF => 4,
        VR::OV | VR::OD => 8,
        _ => return None,
    };
    if bytes.len() % word_size != 0 {
        tracing::warn!(
            "{:?} value of {} bytes is not a whole number of words, keeping bytes",
            vr,
            bytes.len()
        );
        return None;
    }

    let words = bytes.chunks_exact(word_size);
    let value = match vr {
        VR::OW => PrimitiveValue::U16(words.map(|c| u16::from_le_bytes([c[0], c[1]])).collect()),
        VR::OL => PrimitiveValue::U32(words.map(|c| u32::from_le_bytes(quad(c))).collect()),
        VR::OF => PrimitiveValue::F32(words.map(|c| f32::from_le_bytes(quad(c))).collect()),
        VR::OV => PrimitiveValue::U64(words.map(|c| u64::from_le_bytes(octet(c))).collect()),
        _ => PrimitiveValue::F64(words.map(|c| f64::from_le_bytes(octet(c))).collect()),
    };
    Some(value)
}

fn quad(c: &[u8]) -> [u8; 4] {
    [c[0], c[1], c[2], c[3]]
}

fn octet(c: &[u8]) -> [u8; 8] {
    [c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]
}

impl<C> OverlayOptions<C> {
    /// Parse overlay attributes from DICOM JSON.
    ///
    /// Attributes are accepted as they are,
    /// regardless of whether they would be classified as overlay attributes.
    /// Binary values of word-oriented value representations such as OW
    /// are restored to the same form as when read from a DICOM file.
    pub fn parse_overlay(&self, overlay_json: &str) -> Result<InMemDicomObject, AttachError> {
        dicom_json::from_str(overlay_json)
            .context(ParseOverlaySnafu)
            .map(restore_word_values)
    }

    /// Attach the overlay attributes in DICOM JSON
    /// to an object already in memory.
    ///
    /// The file meta group is kept separate in the output,
    /// which is the form in which the object would be written.
    pub fn attach_object(
        &self,
        overlay_json: &str,
        mut obj: DefaultDicomObject,
    ) -> Result<DefaultDicomObject, AttachError> {
        let overlay = self.parse_overlay(overlay_json)?;
        let replaced = merge_overlay(&mut obj, overlay);
        if replaced > 0 {
            tracing::debug!("{} attributes were replaced by overlay attributes", replaced);
        }
        Ok(obj)
    }

    /// Parse the overlay attributes in DICOM JSON,
    /// without attaching them to any object.
    ///
    /// This is the same as [`parse_overlay`](OverlayOptions::parse_overlay).
    pub fn attach_overlay_json(&self, overlay_json: &str) -> Result<InMemDicomObject, AttachError> {
        self.parse_overlay(overlay_json)
    }

    /// Read a DICOM object from the given source
    /// and attach the overlay attributes in DICOM JSON.
    ///
    /// Returns the merged data set
    /// together with the elements of the file meta group
    /// in a single collection.
    pub fn attach_from_reader<R>(
        &self,
        overlay_json: &str,
        source: R,
    ) -> Result<InMemDicomObject, AttachError>
    where
        R: Read,
    {
        self.attach_merged(overlay_json, source).map(flatten_meta)
    }

    /// Read a DICOM object from the given source,
    /// attach the overlay attributes in DICOM JSON,
    /// and write the merged object to the given sink.
    ///
    /// Returns the merged data set
    /// together with the elements of the file meta group
    /// in a single collection,
    /// whereas the sink receives the file meta group and the data set
    /// as separate sections.
    /// If only the writing fails,
    /// the merged collection is kept in the returned error
    /// (see [`AttachError::into_merged`]).
    pub fn attach_to_writer<R, W>(
        &self,
        overlay_json: &str,
        source: R,
        sink: &mut W,
    ) -> Result<InMemDicomObject, AttachError>
    where
        R: Read,
        W: ?Sized + Write,
    {
        let merged = self.attach_merged(overlay_json, source)?;
        let written = write_object(&merged, sink);
        let flat = flatten_meta(merged);
        match written {
            Ok(()) => Ok(flat),
            Err(source) => Err(AttachError::WriteOutput {
                source,
                merged: Box::new(flat),
            }),
        }
    }

    fn attach_merged<R>(
        &self,
        overlay_json: &str,
        source: R,
    ) -> Result<DefaultDicomObject, AttachError>
    where
        R: Read,
    {
        // overlay first, so that malformed JSON is reported
        // before consuming the input
        let overlay = self.parse_overlay(overlay_json)?;
        let mut obj = read_object(source, self.read_preamble).context(ReadInputSnafu)?;
        merge_overlay(&mut obj, overlay);
        Ok(obj)
    }
}

/// Parse overlay attributes from DICOM JSON
/// using the default options.
pub fn attach_overlay_json(overlay_json: &str) -> Result<InMemDicomObject, AttachError> {
    OverlayOptions::new().attach_overlay_json(overlay_json)
}

/// Read a DICOM object from the given source
/// and attach the overlay attributes in DICOM JSON,
/// using the default options.
pub fn attach_overlay_json_from<R>(
    overlay_json: &str,
    source: R,
) -> Result<InMemDicomObject, AttachError>
where
    R: Read,
{
    OverlayOptions::new().attach_from_reader(overlay_json, source)
}

/// Read a DICOM object from the given source,
/// attach the overlay attributes in DICOM JSON,
/// and write the merged object to the given sink,
/// using the default options.
pub fn attach_overlay_json_to<R, W>(
    overlay_json: &str,
    source: R,
    sink: &mut W,
) -> Result<InMemDicomObject, AttachError>
where
    R: Read,
    W: ?Sized + Write,
{
    OverlayOptions::new().attach_to_writer(overlay_json, source, sink)
}
