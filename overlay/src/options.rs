//! Configuration of the detach and attach operations.
use dicom_object::file::ReadPreamble;

use crate::classify::{OverlayClassifier, OverlayGroup};

/// A builder type for detaching and attaching overlay attributes
/// with additional options.
///
/// # Example
///
/// Create an `OverlayOptions`,
/// call adaptor methods in a chain,
/// and finish with one of the detach or attach methods.
///
/// ```no_run
/// # use std::fs::File;
/// use dicom_overlay::{OverlayOptions, RepeatingOverlayGroups};
///
/// let mut out = File::create("path/to/no-overlays.dcm")?;
/// let detached = OverlayOptions::new()
///     // detach all overlay planes, not just the first one
///     .classifier(RepeatingOverlayGroups)
///     .pretty_json(true)
///     .detach_to_writer(File::open("path/to/file.dcm")?, &mut out)?;
/// println!("{}", detached.overlay_json);
/// # Result::<(), Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Debug, Default, Clone)]
#[non_exhaustive]
pub struct OverlayOptions<C = OverlayGroup> {
    pub(crate) classifier: C,
    pub(crate) pretty_json: bool,
    pub(crate) read_preamble: ReadPreamble,
}

impl OverlayOptions {
    /// Create options with the default settings:
    /// only group `6000` is detached,
    /// JSON is compact,
    /// and the input preamble is detected automatically.
    pub fn new() -> Self {
        OverlayOptions::default()
    }
}

impl<C> OverlayOptions<C> {
    /// Set the rule deciding which attributes are detached.
    ///
    /// The default is [`OverlayGroup::default()`],
    /// which only accepts attributes in group `6000`.
    pub fn classifier<Cl>(self, classifier: Cl) -> OverlayOptions<Cl>
    where
        Cl: OverlayClassifier,
    {
        OverlayOptions {
            classifier,
            pretty_json: self.pretty_json,
            read_preamble: self.read_preamble,
        }
    }

    /// Set whether detached overlay attributes
    /// are serialized as pretty-printed JSON.
    ///
    /// Compact JSON is produced by default.
    pub fn pretty_json(mut self, pretty: bool) -> Self {
        self.pretty_json = pretty;
        self
    }

    /// Set whether to read the 128-byte DICOM file preamble
    /// from input sources.
    pub fn read_preamble(mut self, option: ReadPreamble) -> Self {
        self.read_preamble = option;
        self
    }

    /// Retrieve the classifier in use.
    pub fn get_classifier(&self) -> &C {
        &self.classifier
    }
}
