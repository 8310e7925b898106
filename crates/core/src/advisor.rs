//! Default output format selection.
//!
//! The advisor maps a file's declared media kind (a MIME-like string such as
//! `video/quicktime`) to the output format offered by default. Callers may
//! always override the suggestion before a job starts.

use serde::{Deserialize, Serialize};

/// Broad media category derived from a declared media kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaCategory {
    Video,
    Audio,
    Image,
    /// Anything that is not video, audio or image, including unknown kinds.
    Document,
}

impl MediaCategory {
    /// Classifies a declared media kind. Matching is a case-insensitive
    /// prefix match, so `Video/MP4` and `video` are both video.
    pub fn from_media_kind(media_kind: &str) -> Self {
        let kind = media_kind.trim().to_ascii_lowercase();
        if kind.starts_with("video") {
            Self::Video
        } else if kind.starts_with("audio") {
            Self::Audio
        } else if kind.starts_with("image") {
            Self::Image
        } else {
            Self::Document
        }
    }

    /// Returns the default output format for this category.
    pub fn default_format(&self) -> &'static str {
        match self {
            Self::Video => "mp4",
            Self::Audio => "mp3",
            Self::Image => "jpg",
            Self::Document => "pdf",
        }
    }

    /// Returns the string representation for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Image => "image",
            Self::Document => "document",
        }
    }
}

/// Suggests default output formats.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatAdvisor;

impl FormatAdvisor {
    /// Suggests an output format for the given media kind.
    ///
    /// Total and deterministic: empty or unrecognized kinds yield `pdf`.
    pub fn suggest(media_kind: &str) -> &'static str {
        MediaCategory::from_media_kind(media_kind).default_format()
    }
}

/// Normalizes a user supplied format: trims whitespace, drops a leading `.`
/// and lowercases. Returns `None` when nothing is left.
pub fn normalize_format(format: &str) -> Option<String> {
    let trimmed = format.trim().trim_start_matches('.').trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggest_known_kinds() {
        assert_eq!(FormatAdvisor::suggest("video/mp4"), "mp4");
        assert_eq!(FormatAdvisor::suggest("audio/wav"), "mp3");
        assert_eq!(FormatAdvisor::suggest("image/png"), "jpg");
        assert_eq!(FormatAdvisor::suggest("application/pdf"), "pdf");
    }

    #[test]
    fn test_suggest_empty_and_unknown() {
        assert_eq!(FormatAdvisor::suggest(""), "pdf");
        assert_eq!(FormatAdvisor::suggest("   "), "pdf");
        assert_eq!(FormatAdvisor::suggest("text/plain"), "pdf");
        assert_eq!(FormatAdvisor::suggest("not a mime type"), "pdf");
    }

    #[test]
    fn test_suggest_is_case_insensitive() {
        assert_eq!(FormatAdvisor::suggest("VIDEO/QuickTime"), "mp4");
        assert_eq!(FormatAdvisor::suggest("Audio/FLAC"), "mp3");
        assert_eq!(FormatAdvisor::suggest("IMAGE/webp"), "jpg");
    }

    #[test]
    fn test_suggest_prefix_only() {
        // Only the prefix matters, the subtype is ignored.
        assert_eq!(FormatAdvisor::suggest("video"), "mp4");
        assert_eq!(FormatAdvisor::suggest("application/video"), "pdf");
    }

    #[test]
    fn test_media_category() {
        assert_eq!(MediaCategory::from_media_kind("image/gif"), MediaCategory::Image);
        assert_eq!(MediaCategory::from_media_kind(""), MediaCategory::Document);
        assert_eq!(MediaCategory::Audio.as_str(), "audio");
    }

    #[test]
    fn test_normalize_format() {
        assert_eq!(normalize_format("MP4"), Some("mp4".to_string()));
        assert_eq!(normalize_format(" .jpg "), Some("jpg".to_string()));
        assert_eq!(normalize_format(""), None);
        assert_eq!(normalize_format("  . "), None);
    }
}
