//! Detachment of overlay attributes from a DICOM object.
use std::io::{Read, Write};

use dicom_core::header::Header;
use dicom_core::{DicomValue, Tag};
use dicom_json::DicomJson;
use dicom_object::{DefaultDicomObject, InMemDicomObject};
use snafu::{Backtrace, ResultExt, Snafu};

use crate::classify::OverlayClassifier;
use crate::error::OutputError;
use crate::io::{read_object, write_object};
use crate::OverlayOptions;

/// An error which may occur when detaching overlay attributes.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum DetachError {
    /// Could not read the input DICOM object
    ReadInput {
        backtrace: Backtrace,
        source: dicom_object::ReadError,
    },
    /// The value of an overlay attribute cannot be represented in DICOM JSON
    #[snafu(display("Unsupported value in overlay attribute {}", tag))]
    UnsupportedValue { tag: Tag, backtrace: Backtrace },
    /// Could not serialize the overlay attributes to JSON
    SerializeOverlay {
        backtrace: Backtrace,
        source: serde_json::Error,
    },
    /// Overlay attributes were detached,
    /// but the remaining object could not be written
    #[snafu(display("Could not write remaining DICOM object"))]
    WriteOutput {
        #[snafu(backtrace)]
        source: OutputError,
        detached: Box<Detached>,
    },
}

impl DetachError {
    /// Whether only the write-out to the output sink failed,
    /// meaning that the detached result is still available
    /// through [`into_detached`](DetachError::into_detached).
    pub fn is_output_error(&self) -> bool {
        matches!(self, DetachError::WriteOutput { .. })
    }

    /// Recover the detached result,
    /// if the error happened after the transformation.
    pub fn into_detached(self) -> Option<Detached> {
        match self {
            DetachError::WriteOutput { detached, .. } => Some(*detached),
            _ => None,
        }
    }
}

/// The outcome of detaching the overlay attributes of a DICOM object.
#[derive(Debug, Clone, PartialEq)]
pub struct Detached {
    /// The DICOM object without its overlay attributes.
    /// The file meta group is kept as is.
    pub remaining: DefaultDicomObject,
    /// The detached overlay attributes in DICOM JSON.
    pub overlay_json: String,
    /// The number of attributes detached.
    pub overlay_len: usize,
}

/// Move all attributes accepted by the classifier
/// from `obj` into a new object.
///
/// Together, the returned object and what is left of `obj`
/// hold exactly the attributes that `obj` held before the call.
pub fn take_overlay<C>(obj: &mut InMemDicomObject, classifier: &C) -> InMemDicomObject
where
    C: ?Sized + OverlayClassifier,
{
    let tags: Vec<Tag> = (&*obj)
        .into_iter()
        .map(|e| e.tag())
        .filter(|tag| classifier.is_overlay(*tag))
        .collect();

    let mut overlay = InMemDicomObject::new_empty();
    for tag in tags {
        if let Ok(elem) = obj.take_element(tag) {
            overlay.put(elem);
        }
    }
    overlay
}

/// Look for an encapsulated value anywhere in the object,
/// including the items of its sequences.
/// Returns the tag of the outermost element holding it.
fn find_encapsulated(obj: &InMemDicomObject) -> Option<Tag> {
    obj.into_iter().find_map(|e| match e.value() {
        DicomValue::PixelSequence { .. } => Some(e.tag()),
        DicomValue::Sequence { .. } => e
            .value()
            .items()
            .and_then(|items| items.iter().find_map(find_encapsulated))
            .map(|_| e.tag()),
        _ => None,
    })
}

impl<C> OverlayOptions<C>
where
    C: OverlayClassifier,
{
    /// Detach the overlay attributes of an object already in memory.
    pub fn detach_object(&self, mut obj: DefaultDicomObject) -> Result<Detached, DetachError> {
        let overlay = take_overlay(&mut obj, &self.classifier);

        // encapsulated fragments have no DICOM JSON representation
        if let Some(tag) = find_encapsulated(&overlay) {
            return UnsupportedValueSnafu { tag }.fail();
        }

        let overlay_json = self
            .overlay_to_json(&overlay)
            .context(SerializeOverlaySnafu)?;
        let overlay_len = (&overlay).into_iter().count();

        tracing::debug!("Detached {} overlay attributes", overlay_len);

        Ok(Detached {
            remaining: obj,
            overlay_json,
            overlay_len,
        })
    }

    /// Read a DICOM object from the given source
    /// and detach its overlay attributes.
    pub fn detach_from_reader<R>(&self, source: R) -> Result<Detached, DetachError>
    where
        R: Read,
    {
        let obj = read_object(source, self.read_preamble).context(ReadInputSnafu)?;
        self.detach_object(obj)
    }

    /// Read a DICOM object from the given source,
    /// detach its overlay attributes,
    /// and write the remaining object to the given sink.
    ///
    /// If only the writing fails,
    /// the detached result is kept in the returned error
    /// (see [`DetachError::into_detached`]).
    pub fn detach_to_writer<R, W>(&self, source: R, sink: &mut W) -> Result<Detached, DetachError>
    where
        R: Read,
        W: ?Sized + Write,
    {
        let detached = self.detach_from_reader(source)?;
        match write_object(&detached.remaining, sink) {
            Ok(()) => Ok(detached),
            Err(source) => Err(DetachError::WriteOutput {
                source,
                detached: Box::new(detached),
            }),
        }
    }

    /// Read a DICOM object from the given source
    /// and return its overlay attributes in DICOM JSON.
    pub fn detach_overlay_json<R>(&self, source: R) -> Result<String, DetachError>
    where
        R: Read,
    {
        self.detach_from_reader(source).map(|d| d.overlay_json)
    }

    fn overlay_to_json(&self, overlay: &InMemDicomObject) -> Result<String, serde_json::Error> {
        let json = DicomJson::from(overlay);
        if self.pretty_json {
            serde_json::to_string_pretty(&json)
        } else {
            serde_json::to_string(&json)
        }
    }
}

/// Read a DICOM object from the given source
/// and return its overlay attributes in DICOM JSON,
/// using the default options.
pub fn detach_overlay_json<R>(source: R) -> Result<String, DetachError>
where
    R: Read,
{
    OverlayOptions::new().detach_overlay_json(source)
}

/// Read a DICOM object from the given source,
/// write it without its overlay attributes to the given sink,
/// and return the overlay attributes in DICOM JSON,
/// using the default options.
pub fn detach_overlay_json_to<R, W>(source: R, sink: &mut W) -> Result<String, DetachError>
where
    R: Read,
    W: ?Sized + Write,
{
    OverlayOptions::new()
        .detach_to_writer(source, sink)
        .map(|d| d.overlay_json)
}

#[cfg(test)]
mod tests {
    use dicom_core::value::{DataSetSequence, PixelFragmentSequence};
    use dicom_core::{DataElement, PrimitiveValue, VR};
    use dicom_dictionary_std::{tags, uids};
    use dicom_object::FileMetaTableBuilder;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::classify::{OverlayGroup, RepeatingOverlayGroups};

    fn file_object(obj: InMemDicomObject) -> DefaultDicomObject {
        obj.with_meta(
            FileMetaTableBuilder::new()
                .media_storage_sop_class_uid(uids::SECONDARY_CAPTURE_IMAGE_STORAGE)
                .media_storage_sop_instance_uid("2.25.123456789")
                .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN),
        )
        .unwrap()
    }

    fn scenario() -> InMemDicomObject {
        InMemDicomObject::from_element_iter([
            DataElement::new(tags::PATIENT_NAME, VR::PN, PrimitiveValue::from("PatientName")),
            DataElement::new(Tag(0x6000, 0x0010), VR::US, PrimitiveValue::from(4_u16)),
            DataElement::new(Tag(0x6000, 0x0011), VR::US, PrimitiveValue::from(4_u16)),
            DataElement::new(
                Tag(0x6000, 0x3000),
                VR::OB,
                PrimitiveValue::from(vec![0x0F_u8, 0xF0]),
            ),
            DataElement::new(Tag(0x6002, 0x0010), VR::US, PrimitiveValue::from(8_u16)),
        ])
    }

    #[test]
    fn take_overlay_partitions_data_set() {
        let original = scenario();
        let mut remaining = original.clone();
        let overlay = take_overlay(&mut remaining, &OverlayGroup::default());

        let overlay_tags: Vec<_> = (&overlay).into_iter().map(|e| e.tag()).collect();
        let remaining_tags: Vec<_> = (&remaining).into_iter().map(|e| e.tag()).collect();

        assert_eq!(
            overlay_tags,
            vec![Tag(0x6000, 0x0010), Tag(0x6000, 0x0011), Tag(0x6000, 0x3000)]
        );
        assert_eq!(remaining_tags, vec![tags::PATIENT_NAME, Tag(0x6002, 0x0010)]);

        // nothing lost, nothing duplicated
        let mut rejoined = remaining.clone();
        for e in overlay {
            assert!(rejoined.put(e).is_none());
        }
        assert_eq!(rejoined, original);
    }

    #[test]
    fn take_overlay_with_nothing_to_take() {
        let mut obj = InMemDicomObject::from_element_iter([DataElement::new(
            tags::PATIENT_NAME,
            VR::PN,
            PrimitiveValue::from("Doe^John"),
        )]);
        let overlay = take_overlay(&mut obj, &OverlayGroup::default());
        assert_eq!(overlay, InMemDicomObject::new_empty());
        assert!(obj.element(tags::PATIENT_NAME).is_ok());
    }

    #[test]
    fn detach_object_emits_ordered_json() {
        let detached = OverlayOptions::new()
            .detach_object(file_object(scenario()))
            .unwrap();

        assert_eq!(detached.overlay_len, 3);
        let value: serde_json::Value = serde_json::from_str(&detached.overlay_json).unwrap();
        assert_eq!(
            value,
            json!({
                "60000010": { "vr": "US", "Value": [4] },
                "60000011": { "vr": "US", "Value": [4] },
                "60003000": { "vr": "OB", "InlineBinary": "D/A=" },
            })
        );
        // keys in ascending tag order
        let p1 = detached.overlay_json.find("60000010").unwrap();
        let p2 = detached.overlay_json.find("60000011").unwrap();
        let p3 = detached.overlay_json.find("60003000").unwrap();
        assert!(p1 < p2 && p2 < p3);

        assert!(detached.remaining.element(Tag(0x6000, 0x0010)).is_err());
        assert!(detached.remaining.element(Tag(0x6002, 0x0010)).is_ok());
        assert!(detached.remaining.element(tags::PATIENT_NAME).is_ok());
    }

    #[test]
    fn detach_object_without_overlay() {
        let obj = file_object(InMemDicomObject::from_element_iter([DataElement::new(
            tags::PATIENT_NAME,
            VR::PN,
            PrimitiveValue::from("Doe^John"),
        )]));
        let detached = OverlayOptions::new().detach_object(obj.clone()).unwrap();

        assert_eq!(detached.overlay_json, "{}");
        assert_eq!(detached.overlay_len, 0);
        assert_eq!(detached.remaining, obj);
    }

    #[test]
    fn detach_with_other_classifiers() {
        let detached = OverlayOptions::new()
            .classifier(RepeatingOverlayGroups)
            .detach_object(file_object(scenario()))
            .unwrap();
        assert_eq!(detached.overlay_len, 4);
        assert!(detached.remaining.element(Tag(0x6002, 0x0010)).is_err());

        let detached = OverlayOptions::new()
            .classifier(|tag: Tag| tag == tags::PATIENT_NAME)
            .detach_object(file_object(scenario()))
            .unwrap();
        assert_eq!(detached.overlay_len, 1);
        assert!(detached.remaining.element(tags::PATIENT_NAME).is_err());
    }

    #[test]
    fn pretty_json_has_same_content() {
        let compact = OverlayOptions::new()
            .detach_object(file_object(scenario()))
            .unwrap();
        let pretty = OverlayOptions::new()
            .pretty_json(true)
            .detach_object(file_object(scenario()))
            .unwrap();

        assert!(pretty.overlay_json.contains('\n'));
        assert!(!compact.overlay_json.contains('\n'));
        let a: serde_json::Value = serde_json::from_str(&compact.overlay_json).unwrap();
        let b: serde_json::Value = serde_json::from_str(&pretty.overlay_json).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn encapsulated_overlay_value_is_rejected() {
        let mut obj = scenario();
        obj.put(DataElement::new(
            Tag(0x6000, 0x3000),
            VR::OB,
            DicomValue::PixelSequence(PixelFragmentSequence::new_fragments(vec![vec![
                0x55_u8, 0x55,
            ]])),
        ));

        let err = OverlayOptions::new()
            .detach_object(file_object(obj))
            .unwrap_err();
        assert!(matches!(
            err,
            DetachError::UnsupportedValue { tag, .. } if tag == Tag(0x6000, 0x3000)
        ));
        assert!(!err.is_output_error());
    }

    #[test]
    fn encapsulated_value_in_sequence_item_is_rejected() {
        let item = InMemDicomObject::from_element_iter([DataElement::new(
            tags::PIXEL_DATA,
            VR::OB,
            DicomValue::PixelSequence(PixelFragmentSequence::new_fragments(vec![vec![
                0x55_u8, 0x55,
            ]])),
        )]);
        let mut obj = scenario();
        obj.put(DataElement::new(
            Tag(0x6000, 0x1500),
            VR::SQ,
            DicomValue::Sequence(DataSetSequence::from(vec![item])),
        ));

        let err = OverlayOptions::new()
            .detach_object(file_object(obj))
            .unwrap_err();
        assert!(matches!(
            err,
            DetachError::UnsupportedValue { tag, .. } if tag == Tag(0x6000, 0x1500)
        ));
    }

    #[test]
    fn sequence_without_encapsulated_values_is_detached() {
        let item = InMemDicomObject::from_element_iter([DataElement::new(
            Tag(0x0008, 0x0100),
            VR::SH,
            PrimitiveValue::from("CODE01"),
        )]);
        let mut obj = scenario();
        obj.put(DataElement::new(
            Tag(0x6000, 0x1500),
            VR::SQ,
            DicomValue::Sequence(DataSetSequence::from(vec![item])),
        ));

        let detached = OverlayOptions::new()
            .detach_object(file_object(obj))
            .unwrap();
        assert_eq!(detached.overlay_len, 4);
        assert!(detached.overlay_json.contains("60001500"));
    }
}
