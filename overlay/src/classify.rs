//! Classification of DICOM attribute tags as overlay attributes.
//!
//! Detachment moves every attribute accepted by an [`OverlayClassifier`]
//! out of the main data set.
//! The default classifier is [`OverlayGroup`],
//! which accepts the attributes of a single overlay plane group:
//! the group of [`OVERLAY_REFERENCE_TAG`], `(6000,xxxx)`.
//! The remaining overlay planes of the repeating group family
//! (`(6002,xxxx)` through `(601E,xxxx)`)
//! are only accepted when [`RepeatingOverlayGroups`] is chosen explicitly.
use dicom_core::Tag;

/// _Overlay Columns_ `(6000,0011)`,
/// the reference attribute which identifies the overlay group.
pub const OVERLAY_REFERENCE_TAG: Tag = Tag(0x6000, 0x0011);

/// Check whether the given tag is in the same group as
/// [`OVERLAY_REFERENCE_TAG`].
///
/// Only the first overlay plane is matched:
/// `(6002,0011)` is not an overlay tag by this definition.
///
/// # Example
///
/// ```
/// # use dicom_core::Tag;
/// use dicom_overlay::is_overlay_tag;
///
/// assert!(is_overlay_tag(Tag(0x6000, 0x3000)));
/// assert!(!is_overlay_tag(Tag(0x6002, 0x3000)));
/// assert!(!is_overlay_tag(Tag(0x0010, 0x0010)));
/// ```
#[inline]
pub fn is_overlay_tag(tag: Tag) -> bool {
    tag.group() == OVERLAY_REFERENCE_TAG.group()
}

/// A rule deciding which attributes are detached as overlay attributes.
///
/// Any function or closure of type `Fn(Tag) -> bool`
/// is also a classifier.
pub trait OverlayClassifier {
    /// Whether the attribute with this tag belongs to the overlay set.
    fn is_overlay(&self, tag: Tag) -> bool;
}

impl<F> OverlayClassifier for F
where
    F: Fn(Tag) -> bool,
{
    fn is_overlay(&self, tag: Tag) -> bool {
        self(tag)
    }
}

/// Classifier accepting all attributes of exactly one group.
///
/// The default group is that of [`OVERLAY_REFERENCE_TAG`] (`0x6000`),
/// making `OverlayGroup::default()` equivalent to [`is_overlay_tag`].
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub struct OverlayGroup(pub u16);

impl OverlayGroup {
    /// Create a classifier for the given group number.
    pub fn new(group: u16) -> Self {
        OverlayGroup(group)
    }

    /// Create a classifier for the group of the given tag.
    pub fn of(tag: Tag) -> Self {
        OverlayGroup(tag.group())
    }

    /// The group number accepted.
    pub fn group(self) -> u16 {
        self.0
    }
}

impl Default for OverlayGroup {
    fn default() -> Self {
        OverlayGroup::of(OVERLAY_REFERENCE_TAG)
    }
}

impl OverlayClassifier for OverlayGroup {
    fn is_overlay(&self, tag: Tag) -> bool {
        tag.group() == self.0
    }
}

/// Classifier accepting the full repeating overlay group family:
/// the even groups from `0x6000` to `0x601E`,
/// one per overlay plane.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub struct RepeatingOverlayGroups;

impl RepeatingOverlayGroups {
    /// First group of the family.
    pub const FIRST_GROUP: u16 = 0x6000;
    /// Last group of the family.
    pub const LAST_GROUP: u16 = 0x601E;
}

impl OverlayClassifier for RepeatingOverlayGroups {
    fn is_overlay(&self, tag: Tag) -> bool {
        let group = tag.group();
        (Self::FIRST_GROUP..=Self::LAST_GROUP).contains(&group) && group % 2 == 0
    }
}
