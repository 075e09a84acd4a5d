//! # docx-settings
//!
//! Typed read/modify/write access to the settings part of Word documents.
//!
//! The settings part (`word/settings.xml`) carries document-wide options
//! such as the zoom level and editing protection. This library parses it
//! into a typed tree, lets callers change the options it models, and writes
//! it back without disturbing anything else in the part.
//!
//! ## Quick Start
//!
//! ```no_run
//! use docx_settings::ProtectionKind;
//!
//! // Inspect a document
//! let summary = docx_settings::read_settings("report.docx")?;
//! println!("{:?}", summary.zoom_percent);
//!
//! // Make it read-only
//! docx_settings::edit_settings("report.docx", "locked.docx", |settings| {
//!     settings.set_enforcement_edit_value(ProtectionKind::ReadOnly)
//! })?;
//! # Ok::<(), docx_settings::Error>(())
//! ```
//!
//! ## Part lifecycle
//!
//! ```no_run
//! use docx_settings::package::OoxmlPackage;
//!
//! let package = OoxmlPackage::open("report.docx")?;
//! let mut settings = docx_settings::open_settings(&package)?;
//! settings.set_zoom_percent(120)?;
//! settings.commit()?;
//! package.save("report-zoomed.docx")?;
//! # Ok::<(), docx_settings::Error>(())
//! ```

pub mod error;
pub mod package;
pub mod settings;

// Re-exports
pub use error::{Error, Result};
pub use package::{MemoryPart, OoxmlPackage, PackagePart, Relationship, Relationships};
pub use settings::{
    OnOff, PartState, ProtectionKind, SettingsPart, SettingsSummary, SettingsTree, WriteOptions,
};

use std::path::Path;

/// Construct and read the settings part of a package's main document.
///
/// # Example
///
/// ```no_run
/// use docx_settings::package::OoxmlPackage;
///
/// let package = OoxmlPackage::open("document.docx")?;
/// let settings = docx_settings::open_settings(&package)?;
/// println!("protected: {}", settings.is_enforced());
/// # Ok::<(), docx_settings::Error>(())
/// ```
pub fn open_settings(package: &OoxmlPackage) -> Result<SettingsPart> {
    let mut settings = package
        .settings_part()?
        .ok_or_else(|| Error::MissingComponent("settings part".to_string()))?;
    settings.on_document_read()?;
    Ok(settings)
}

/// Summarize the settings of a document file.
///
/// # Example
///
/// ```no_run
/// let summary = docx_settings::read_settings("document.docx")?;
/// println!("{}", summary.to_json()?);
/// # Ok::<(), docx_settings::Error>(())
/// ```
pub fn read_settings(path: impl AsRef<Path>) -> Result<SettingsSummary> {
    let package = OoxmlPackage::open(path)?;
    let settings = open_settings(&package)?;
    SettingsSummary::from_part(&settings)
}

/// Edit the settings of `input` and save the result to `output`.
///
/// `input` and `output` may be the same path.
pub fn edit_settings<F>(input: impl AsRef<Path>, output: impl AsRef<Path>, edit: F) -> Result<()>
where
    F: FnOnce(&mut SettingsPart) -> Result<()>,
{
    let package = OoxmlPackage::open(input)?;
    let mut settings = open_settings(&package)?;
    edit(&mut settings)?;
    settings.commit()?;
    package.save(output)
}
