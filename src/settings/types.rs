//! Simple-type values used by the settings part.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Document protection kind (`ST_DocProtect`).
///
/// Names which editing restriction applies while protection is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProtectionKind {
    /// No editing restriction
    None,
    /// Document may not be edited
    ReadOnly,
    /// Only comments may be added
    Comments,
    /// Edits are allowed but always tracked
    TrackedChanges,
    /// Only form fields may be filled in
    Forms,
}

impl ProtectionKind {
    /// All protection kinds, in schema order.
    pub const ALL: [ProtectionKind; 5] = [
        ProtectionKind::None,
        ProtectionKind::ReadOnly,
        ProtectionKind::Comments,
        ProtectionKind::TrackedChanges,
        ProtectionKind::Forms,
    ];

    /// Returns the attribute token for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtectionKind::None => "none",
            ProtectionKind::ReadOnly => "readOnly",
            ProtectionKind::Comments => "comments",
            ProtectionKind::TrackedChanges => "trackedChanges",
            ProtectionKind::Forms => "forms",
        }
    }
}

impl FromStr for ProtectionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(ProtectionKind::None),
            "readOnly" => Ok(ProtectionKind::ReadOnly),
            "comments" => Ok(ProtectionKind::Comments),
            "trackedChanges" => Ok(ProtectionKind::TrackedChanges),
            "forms" => Ok(ProtectionKind::Forms),
            _ => Err(Error::MalformedValue {
                attribute: "w:edit",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ProtectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On/off value (`ST_OnOff`).
///
/// The schema allows several spellings for the same truth value. The
/// spelling is kept so that a parsed value is written back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OnOff {
    /// `"1"`, the form Word writes
    One,
    /// `"0"`
    Zero,
    /// `"true"`
    True,
    /// `"false"`
    False,
    /// `"on"`
    On,
    /// `"off"`
    Off,
}

impl OnOff {
    /// Returns the attribute token for this value.
    pub fn as_str(&self) -> &'static str {
        match self {
            OnOff::One => "1",
            OnOff::Zero => "0",
            OnOff::True => "true",
            OnOff::False => "false",
            OnOff::On => "on",
            OnOff::Off => "off",
        }
    }

    /// Whether this is the single `"1"` sentinel that marks protection
    /// enforcement as active.
    pub fn is_on_sentinel(&self) -> bool {
        *self == OnOff::One
    }

    /// Truth value under the lenient reading used for plain on/off flags.
    pub fn is_truthy(&self) -> bool {
        matches!(self, OnOff::One | OnOff::True | OnOff::On)
    }
}

impl From<bool> for OnOff {
    fn from(value: bool) -> Self {
        if value {
            OnOff::One
        } else {
            OnOff::Zero
        }
    }
}

impl FromStr for OnOff {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1" => Ok(OnOff::One),
            "0" => Ok(OnOff::Zero),
            "true" => Ok(OnOff::True),
            "false" => Ok(OnOff::False),
            "on" => Ok(OnOff::On),
            "off" => Ok(OnOff::Off),
            _ => Err(Error::MalformedValue {
                attribute: "w:val",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for OnOff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
