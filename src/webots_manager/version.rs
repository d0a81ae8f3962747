//! # Version Identifier
//!
//! A Webots release is named by a `major.minor.patch` triple. The textual form
//! is used both for display and as a filesystem name: every installed release
//! lives in `<work_root>/<major.minor.patch>/` and the active pointer
//! `<work_root>/used` is a symlink whose target is exactly that string.
//!
//! Because the string doubles as a directory name, parsing is strict:
//! `format(parse(s)) == s` for every accepted `s`. Leading zeros, signs and
//! surrounding whitespace are rejected so two different directory names can
//! never map to the same version.
//!
//! Ordering is the tuple order `(major, minor, patch)`, so `1.2.3 < 1.10.0`.

use crate::error::{ManagerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        text.parse()
    }
}

fn parse_component(part: &str, text: &str) -> Result<u32> {
    let well_formed = !part.is_empty()
        && part.bytes().all(|b| b.is_ascii_digit())
        && (part == "0" || !part.starts_with('0'));
    if !well_formed {
        return Err(ManagerError::Parse(text.to_string()));
    }
    part.parse()
        .map_err(|_| ManagerError::Parse(text.to_string()))
}

impl FromStr for Version {
    type Err = ManagerError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split('.');
        let (Some(major), Some(minor), Some(patch), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ManagerError::Parse(s.to_string()));
        };

        Ok(Version {
            major: parse_component(major, s)?,
            minor: parse_component(minor, s)?,
            patch: parse_component(patch, s)?,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl TryFrom<String> for Version {
    type Error = ManagerError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}
