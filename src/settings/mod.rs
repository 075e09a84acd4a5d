//! The settings part (`word/settings.xml`) of a WordprocessingML package.
//!
//! [`SettingsPart`] owns the lifecycle: it is constructed unread from
//! package storage (or fresh with an empty tree), parsed on
//! [`SettingsPart::on_document_read`], edited through typed accessors and
//! written back on [`SettingsPart::commit`].

mod options;
mod part;
mod summary;
mod tree;
mod types;

pub use options::WriteOptions;
pub use part::{PartState, SettingsPart};
pub use summary::{ProtectionSummary, SettingsSummary};
pub use tree::{
    DocumentProtection, FlagKind, OnOffFlag, SettingsTree, Zoom, NAMESPACE_PREFIXES, WORDML_NS,
};
pub use types::{OnOff, ProtectionKind};
