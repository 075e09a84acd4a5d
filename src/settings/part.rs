//! The settings part and its read/modify/commit lifecycle.

use super::options::WriteOptions;
use super::tree::{FlagKind, SettingsTree};
use super::types::{OnOff, ProtectionKind};
use crate::error::{Error, Result};
use crate::package::PackagePart;
use std::io::{Read, Write};
use tracing::{debug, warn};

/// Where a part is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartState {
    /// Constructed from package storage, not read yet
    Unloaded,
    /// Tree available for reading and editing
    Loaded,
    /// A read failed; the part must be reconstructed
    Unusable,
}

#[derive(Debug)]
enum State {
    Unloaded,
    Loaded(SettingsTree),
    Unusable,
}

/// The settings part of a word-processing document.
///
/// # Example
///
/// ```
/// use docx_settings::{ProtectionKind, SettingsPart};
///
/// let mut settings = SettingsPart::new();
/// settings.set_zoom_percent(50)?;
/// settings.set_enforcement_edit_value(ProtectionKind::ReadOnly)?;
///
/// assert_eq!(settings.zoom_percent()?, 50);
/// assert!(settings.is_enforced_with(ProtectionKind::ReadOnly));
/// # Ok::<(), docx_settings::Error>(())
/// ```
pub struct SettingsPart {
    part: Option<Box<dyn PackagePart>>,
    state: State,
    options: WriteOptions,
}

impl SettingsPart {
    /// Create a new settings part with an empty tree and no package storage.
    pub fn new() -> Self {
        Self {
            part: None,
            state: State::Loaded(SettingsTree::new()),
            options: WriteOptions::default(),
        }
    }

    /// Wrap an existing package part. Nothing is read until
    /// [`on_document_read`](Self::on_document_read).
    pub fn from_part(part: Box<dyn PackagePart>) -> Self {
        Self {
            part: Some(part),
            state: State::Unloaded,
            options: WriteOptions::default(),
        }
    }

    /// Set the options used by [`commit`](Self::commit).
    pub fn with_write_options(mut self, options: WriteOptions) -> Self {
        self.options = options;
        self
    }

    /// Give a part package storage to commit to, replacing any previous one.
    pub fn attach_part(&mut self, part: Box<dyn PackagePart>) {
        self.part = Some(part);
    }

    /// Name of the backing package part, if any.
    pub fn part_name(&self) -> Option<&str> {
        self.part.as_deref().map(|part| part.name())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PartState {
        match self.state {
            State::Unloaded => PartState::Unloaded,
            State::Loaded(_) => PartState::Loaded,
            State::Unusable => PartState::Unusable,
        }
    }

    /// Read and parse the backing part, replacing the current tree.
    ///
    /// On failure the part becomes unusable.
    pub fn on_document_read(&mut self) -> Result<()> {
        if matches!(self.state, State::Unusable) {
            return Err(Error::PartUnusable);
        }
        let part = self.part.as_deref().ok_or(Error::NoBackingPart)?;
        let name = part.name().to_string();

        match read_tree(part) {
            Ok(tree) => {
                debug!(part = %name, children = tree.len(), "read settings part");
                self.state = State::Loaded(tree);
                Ok(())
            }
            Err(cause) => {
                warn!(part = %name, error = %cause, "settings part could not be read");
                self.state = State::Unusable;
                Err(Error::PartParse {
                    part: name,
                    cause: Box::new(cause),
                })
            }
        }
    }

    /// The loaded tree.
    pub fn tree(&self) -> Result<&SettingsTree> {
        match self.state {
            State::Loaded(ref tree) => Ok(tree),
            State::Unloaded => Err(Error::PartNotLoaded),
            State::Unusable => Err(Error::PartUnusable),
        }
    }

    /// The loaded tree, mutably.
    pub fn tree_mut(&mut self) -> Result<&mut SettingsTree> {
        match self.state {
            State::Loaded(ref mut tree) => Ok(tree),
            State::Unloaded => Err(Error::PartNotLoaded),
            State::Unusable => Err(Error::PartUnusable),
        }
    }

    /// Zoom percentage (`w:zoom/@w:percent`).
    ///
    /// Fails with [`Error::MissingSubstructure`] when no zoom is configured;
    /// this getter never creates the node.
    pub fn zoom_percent(&self) -> Result<i64> {
        self.tree()?
            .zoom()
            .ok_or(Error::MissingSubstructure("w:zoom"))?
            .percent_value()
    }

    /// Set the zoom percentage, creating `w:zoom` if needed.
    pub fn set_zoom_percent(&mut self, percent: i64) -> Result<()> {
        self.tree_mut()?.zoom_or_insert().set_percent_value(percent);
        Ok(())
    }

    /// Whether protection of `kind` is enforced.
    ///
    /// Never fails: absent protection, or a part that is not loaded,
    /// reports `false`.
    pub fn is_enforced_with(&self, kind: ProtectionKind) -> bool {
        self.tree()
            .ok()
            .and_then(SettingsTree::document_protection)
            .is_some_and(|protection| protection.is_enforced_with(kind))
    }

    /// Whether any protection is enforced.
    pub fn is_enforced(&self) -> bool {
        self.tree()
            .ok()
            .and_then(SettingsTree::document_protection)
            .is_some_and(|protection| protection.is_enforced())
    }

    /// The stored protection kind, enforced or not.
    pub fn enforcement_edit_value(&self) -> Result<Option<ProtectionKind>> {
        Ok(self
            .tree()?
            .document_protection()
            .and_then(|protection| protection.edit))
    }

    /// Enforce protection of `kind`, replacing any previous kind.
    pub fn set_enforcement_edit_value(&mut self, kind: ProtectionKind) -> Result<()> {
        let protection = self.tree_mut()?.document_protection_or_insert();
        protection.enforcement = Some(OnOff::One);
        protection.edit = Some(kind);
        Ok(())
    }

    /// Turn enforcement off, keeping the recorded protection kind.
    ///
    /// Creates `w:documentProtection` if absent so the document always
    /// carries an explicit off marker afterwards.
    pub fn remove_enforcement(&mut self) -> Result<()> {
        self.tree_mut()?.document_protection_or_insert().enforcement = Some(OnOff::Zero);
        Ok(())
    }

    /// Whether revisions are tracked (`w:trackRevisions`).
    pub fn is_track_revisions(&self) -> Result<bool> {
        self.flag(FlagKind::TrackRevisions)
    }

    /// Turn revision tracking on or off.
    pub fn set_track_revisions(&mut self, on: bool) -> Result<()> {
        self.set_flag(FlagKind::TrackRevisions, on)
    }

    /// Whether fields are updated on open (`w:updateFields`).
    pub fn is_update_fields(&self) -> Result<bool> {
        self.flag(FlagKind::UpdateFields)
    }

    /// Ask the application to update fields when the document is opened.
    pub fn set_update_fields(&mut self, on: bool) -> Result<()> {
        self.set_flag(FlagKind::UpdateFields, on)
    }

    fn flag(&self, kind: FlagKind) -> Result<bool> {
        Ok(self.tree()?.flag(kind).is_some_and(|flag| flag.is_on()))
    }

    fn set_flag(&mut self, kind: FlagKind, on: bool) -> Result<()> {
        self.tree_mut()?.flag_or_insert(kind).set(on);
        Ok(())
    }

    /// Serialize the current tree into `writer`.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        let xml = self.tree()?.to_xml(&self.options)?;
        writer.write_all(&xml)?;
        writer.flush()?;
        Ok(())
    }

    /// Serialize the current tree and store it in the backing part.
    ///
    /// May be called any number of times; each commit reflects the latest
    /// edits.
    pub fn commit(&mut self) -> Result<()> {
        let xml = self.tree()?.to_xml(&self.options);
        let part = self.part.as_deref_mut().ok_or(Error::NoBackingPart)?;
        let name = part.name().to_string();

        let written = xml.and_then(|xml| write_part(part, &xml).map(|_| xml.len()));
        match written {
            Ok(bytes) => {
                debug!(part = %name, bytes, "committed settings part");
                Ok(())
            }
            Err(cause) => Err(Error::PartWrite {
                part: name,
                cause: Box::new(cause),
            }),
        }
    }
}

impl Default for SettingsPart {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SettingsPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsPart")
            .field("part", &self.part_name())
            .field("state", &self.state())
            .finish()
    }
}

fn read_tree(part: &dyn PackagePart) -> Result<SettingsTree> {
    let mut data = Vec::new();
    part.input_stream()?.read_to_end(&mut data)?;
    SettingsTree::parse(&data)
}

fn write_part(part: &mut dyn PackagePart, xml: &[u8]) -> Result<()> {
    let mut out = part.output_stream()?;
    out.write_all(xml)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::MemoryPart;
    use std::io;

    const SETTINGS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:settings xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:zoom w:percent="80"/>
  <w:documentProtection w:edit="forms" w:enforcement="1"/>
  <w:defaultTabStop w:val="708"/>
</w:settings>"#;

    fn loaded(xml: &str) -> SettingsPart {
        let mut settings =
            SettingsPart::from_part(Box::new(MemoryPart::new("word/settings.xml", xml)));
        settings.on_document_read().unwrap();
        settings
    }

    /// Part whose output stream always fails.
    struct ReadOnlyPart;

    impl PackagePart for ReadOnlyPart {
        fn name(&self) -> &str {
            "word/settings.xml"
        }

        fn input_stream(&self) -> io::Result<Box<dyn Read + '_>> {
            Ok(Box::new(SETTINGS_XML.as_bytes()))
        }

        fn output_stream(&mut self) -> io::Result<Box<dyn Write + '_>> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }
    }

    #[test]
    fn test_construction_is_lazy() {
        let settings =
            SettingsPart::from_part(Box::new(MemoryPart::new("word/settings.xml", "garbage")));
        assert_eq!(settings.state(), PartState::Unloaded);
        assert!(matches!(settings.zoom_percent(), Err(Error::PartNotLoaded)));
        assert!(!settings.is_enforced_with(ProtectionKind::ReadOnly));
    }

    #[test]
    fn test_read_existing() {
        let settings = loaded(SETTINGS_XML);
        assert_eq!(settings.state(), PartState::Loaded);
        assert_eq!(settings.zoom_percent().unwrap(), 80);
        assert!(settings.is_enforced_with(ProtectionKind::Forms));
        assert!(!settings.is_enforced_with(ProtectionKind::ReadOnly));
    }

    #[test]
    fn test_fresh_part_create_on_demand() {
        let mut settings = SettingsPart::new();
        assert!(matches!(
            settings.zoom_percent(),
            Err(Error::MissingSubstructure("w:zoom"))
        ));

        settings.set_zoom_percent(50).unwrap();
        assert_eq!(settings.zoom_percent().unwrap(), 50);
    }

    #[test]
    fn test_absence_predicate() {
        let settings = SettingsPart::new();
        for kind in ProtectionKind::ALL {
            assert!(!settings.is_enforced_with(kind));
        }
        assert!(!settings.is_enforced());
        assert_eq!(settings.enforcement_edit_value().unwrap(), None);
    }

    #[test]
    fn test_enforcement_idempotent() {
        let mut once = SettingsPart::new();
        once.set_enforcement_edit_value(ProtectionKind::Comments).unwrap();

        let mut twice = SettingsPart::new();
        twice.set_enforcement_edit_value(ProtectionKind::Comments).unwrap();
        twice.set_enforcement_edit_value(ProtectionKind::Comments).unwrap();

        assert_eq!(once.tree().unwrap(), twice.tree().unwrap());
        assert!(twice.is_enforced_with(ProtectionKind::Comments));
    }

    #[test]
    fn test_enforcement_last_write_wins() {
        let mut settings = loaded(SETTINGS_XML);
        settings.set_enforcement_edit_value(ProtectionKind::TrackedChanges).unwrap();
        assert!(settings.is_enforced_with(ProtectionKind::TrackedChanges));
        assert!(!settings.is_enforced_with(ProtectionKind::Forms));
    }

    #[test]
    fn test_disable_preserves_kind() {
        let mut settings = SettingsPart::new();
        settings.set_enforcement_edit_value(ProtectionKind::ReadOnly).unwrap();
        settings.remove_enforcement().unwrap();

        assert!(!settings.is_enforced_with(ProtectionKind::ReadOnly));
        assert_eq!(
            settings.enforcement_edit_value().unwrap(),
            Some(ProtectionKind::ReadOnly)
        );
    }

    #[test]
    fn test_remove_enforcement_creates_off_marker() {
        let mut settings = SettingsPart::new();
        settings.remove_enforcement().unwrap();

        let protection = settings.tree().unwrap().document_protection().unwrap();
        assert_eq!(protection.enforcement, Some(OnOff::Zero));
        assert_eq!(protection.edit, None);
    }

    #[test]
    fn test_true_spelling_is_not_the_sentinel() {
        let settings = loaded(
            r#"<w:settings xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:documentProtection w:edit="readOnly" w:enforcement="true"/></w:settings>"#,
        );
        assert!(!settings.is_enforced_with(ProtectionKind::ReadOnly));
    }

    #[test]
    fn test_on_off_flags() {
        let mut settings = loaded(
            r#"<w:settings xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:updateFields/></w:settings>"#,
        );
        assert!(settings.is_update_fields().unwrap());
        assert!(!settings.is_track_revisions().unwrap());

        settings.set_update_fields(false).unwrap();
        settings.set_track_revisions(true).unwrap();
        assert!(!settings.is_update_fields().unwrap());
        assert!(settings.is_track_revisions().unwrap());

        // trackRevisions precedes updateFields in the schema sequence.
        let mut out = Vec::new();
        settings.write_to(&mut out).unwrap();
        let xml = String::from_utf8(out).unwrap();
        assert!(xml.contains(r#"<w:updateFields w:val="0"/>"#), "{xml}");
        assert!(xml.find("<w:trackRevisions").unwrap() < xml.find("<w:updateFields").unwrap());
    }

    #[test]
    fn test_malformed_zoom() {
        let settings = loaded(
            r#"<w:settings xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:zoom w:percent="large"/></w:settings>"#,
        );
        assert!(matches!(
            settings.zoom_percent(),
            Err(Error::MalformedValue { attribute: "w:percent", .. })
        ));
    }

    #[test]
    fn test_malformed_input_makes_part_unusable() {
        let mut settings = SettingsPart::from_part(Box::new(MemoryPart::new(
            "word/settings.xml",
            "not xml at all",
        )));
        let err = settings.on_document_read().unwrap_err();
        assert!(matches!(err, Error::PartParse { .. }));
        assert_eq!(settings.state(), PartState::Unusable);

        assert!(matches!(settings.on_document_read(), Err(Error::PartUnusable)));
        assert!(matches!(settings.set_zoom_percent(1), Err(Error::PartUnusable)));
        assert!(matches!(settings.commit(), Err(Error::PartUnusable)));
    }

    #[test]
    fn test_second_root_makes_part_unusable() {
        let xml = r#"<w:settings xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:zoom w:percent="5"/></w:settings><w:settings/>garbage"#;
        let mut settings =
            SettingsPart::from_part(Box::new(MemoryPart::new("word/settings.xml", xml)));

        match settings.on_document_read() {
            Err(Error::PartParse { part, cause }) => {
                assert_eq!(part, "word/settings.xml");
                assert!(matches!(*cause, Error::InvalidData(_)));
            }
            other => panic!("expected a parse failure, got {other:?}"),
        }
        assert_eq!(settings.state(), PartState::Unusable);
        assert!(matches!(settings.zoom_percent(), Err(Error::PartUnusable)));
    }

    #[test]
    fn test_read_without_stream() {
        let mut settings =
            SettingsPart::from_part(Box::new(MemoryPart::empty("word/settings.xml")));
        let err = settings.on_document_read().unwrap_err();
        match err {
            Error::PartParse { cause, .. } => assert!(matches!(*cause, Error::Io(_))),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_commit_round_trip() {
        let mut settings = loaded(SETTINGS_XML);
        settings.set_zoom_percent(150).unwrap();
        settings.commit().unwrap();
        settings.set_update_fields(true).unwrap();
        settings.commit().unwrap();

        let mut buf = Vec::new();
        settings.write_to(&mut buf).unwrap();
        let reread = SettingsTree::parse(&buf).unwrap();
        assert_eq!(reread.zoom().unwrap().percent_value().unwrap(), 150);
        assert!(reread.document_protection().unwrap().is_enforced_with(ProtectionKind::Forms));
        assert_eq!(&reread, settings.tree().unwrap());

        let xml = String::from_utf8(buf).unwrap();
        assert!(xml.contains(r#"<w:defaultTabStop w:val="708"/>"#));
    }

    #[test]
    fn test_commit_fresh_part_needs_storage() {
        let mut settings = SettingsPart::new();
        assert!(matches!(settings.commit(), Err(Error::NoBackingPart)));

        settings.attach_part(Box::new(MemoryPart::empty("word/settings.xml")));
        settings.set_track_revisions(true).unwrap();
        settings.commit().unwrap();
        assert!(settings.is_track_revisions().unwrap());
        assert!(!settings.is_update_fields().unwrap());
    }

    #[test]
    fn test_commit_write_failure() {
        let mut settings = SettingsPart::from_part(Box::new(ReadOnlyPart));
        settings.on_document_read().unwrap();
        match settings.commit() {
            Err(Error::PartWrite { part, cause }) => {
                assert_eq!(part, "word/settings.xml");
                assert!(matches!(*cause, Error::Io(_)));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        // A failed commit leaves the tree usable.
        assert_eq!(settings.zoom_percent().unwrap(), 80);
    }

    #[test]
    fn test_write_options_apply() {
        let settings =
            SettingsPart::new().with_write_options(WriteOptions::new().with_declaration(false));
        let mut buf = Vec::new();
        settings.write_to(&mut buf).unwrap();
        assert!(buf.starts_with(b"<w:settings"));
    }
}
