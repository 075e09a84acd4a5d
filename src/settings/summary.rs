//! Serializable snapshot of the modelled settings.

use super::part::SettingsPart;
use super::types::ProtectionKind;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Document protection as reported in a summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionSummary {
    /// Recorded protection kind
    pub edit: Option<ProtectionKind>,
    /// Whether enforcement is on
    pub enforced: bool,
}

/// The settings this crate understands, read from a loaded part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSummary {
    /// Zoom percentage, if configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zoom_percent: Option<i64>,
    /// Document protection, if present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protection: Option<ProtectionSummary>,
    /// `w:trackRevisions`
    pub track_revisions: bool,
    /// `w:updateFields`
    pub update_fields: bool,
}

impl SettingsSummary {
    /// Build a summary. A malformed zoom value is reported as an error.
    pub fn from_part(part: &SettingsPart) -> Result<Self> {
        let zoom_percent = match part.zoom_percent() {
            Ok(percent) => Some(percent),
            Err(Error::MissingSubstructure(_)) => None,
            Err(e) => return Err(e),
        };

        let protection = part
            .tree()?
            .document_protection()
            .map(|protection| ProtectionSummary {
                edit: protection.edit,
                enforced: protection.is_enforced(),
            });

        Ok(Self {
            zoom_percent,
            protection,
            track_revisions: part.is_track_revisions()?,
            update_fields: part.is_update_fields()?,
        })
    }

    /// Render as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::InvalidData(format!("JSON serialization error: {}", e)))
    }
}
