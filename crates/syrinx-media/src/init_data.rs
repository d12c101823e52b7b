#![forbid(unsafe_code)]

//! Initialization data identifying which content keys a session needs.

use std::{fmt, str::FromStr};

use bytes::Bytes;

use crate::MediaError;

/// Recognized initialization-data encodings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InitDataKind {
    /// Common-encryption `pssh` boxes.
    Cenc,
    /// Raw key identifiers.
    Keyids,
    /// Container-embedded (WebM) data.
    Webm,
}

impl InitDataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cenc => "cenc",
            Self::Keyids => "keyids",
            Self::Webm => "webm",
        }
    }
}

impl fmt::Display for InitDataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InitDataKind {
    type Err = MediaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "cenc" => Ok(Self::Cenc),
            "keyids" => Ok(Self::Keyids),
            "webm" => Ok(Self::Webm),
            other => Err(MediaError::UnknownInitDataKind(other.to_string())),
        }
    }
}

/// An initialization-data kind tag plus the opaque payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitData {
    pub kind: InitDataKind,
    pub data: Bytes,
}

impl InitData {
    pub fn new(kind: InitDataKind, data: Bytes) -> Self {
        Self { kind, data }
    }
}
