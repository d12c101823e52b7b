#![forbid(unsafe_code)]

//! Encryption contexts: the playback variants whose codecs shape the
//! key-system configuration request.

/// Whether a context is a video rendition or an audio variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
}

impl TrackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

/// A playback variant carrying the codec identifier used to build candidate
/// key-system configurations. Immutable once parsed from a manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptionContext {
    pub kind: TrackKind,
    pub codec: String,
}

impl EncryptionContext {
    pub fn video<S: Into<String>>(codec: S) -> Self {
        Self {
            kind: TrackKind::Video,
            codec: codec.into(),
        }
    }

    pub fn audio<S: Into<String>>(codec: S) -> Self {
        Self {
            kind: TrackKind::Audio,
            codec: codec.into(),
        }
    }

    /// Full MIME content type for capability negotiation.
    pub fn content_type(&self) -> String {
        format!("{}/mp4;codecs=\"{}\"", self.kind.as_str(), self.codec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_rendering() {
        let video = EncryptionContext::video("avc1.42E01E");
        assert_eq!(video.content_type(), "video/mp4;codecs=\"avc1.42E01E\"");

        let audio = EncryptionContext::audio("mp4a.40.2");
        assert_eq!(audio.content_type(), "audio/mp4;codecs=\"mp4a.40.2\"");
    }
}
