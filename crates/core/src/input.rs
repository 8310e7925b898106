//! File input boundary.
//!
//! The orchestration core only needs a name, a declared media kind, a size and
//! a way to read the bytes. How files are selected is up to the caller.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

/// A read-only handle to a user selected file.
#[async_trait]
pub trait InputFile: Send + Sync {
    /// File name as shown to the user (no directory).
    fn name(&self) -> &str;

    /// Declared media kind, e.g. `video/mp4`. May be empty or wrong.
    fn media_kind(&self) -> &str;

    /// Size in bytes.
    fn byte_len(&self) -> u64;

    /// Reads the full contents.
    async fn read(&self) -> io::Result<Vec<u8>>;
}

/// An input file held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    name: String,
    media_kind: String,
    data: Vec<u8>,
}

impl MemoryFile {
    pub fn new(name: impl Into<String>, media_kind: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_kind: media_kind.into(),
            data,
        }
    }
}

#[async_trait]
impl InputFile for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn media_kind(&self) -> &str {
        &self.media_kind
    }

    fn byte_len(&self) -> u64 {
        self.data.len() as u64
    }

    async fn read(&self) -> io::Result<Vec<u8>> {
        Ok(self.data.clone())
    }
}

/// An input file on the local file system.
///
/// The media kind is inferred from the extension, the way a browser file
/// picker would declare it. Contents are read lazily.
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    name: String,
    media_kind: String,
    byte_len: u64,
}

impl LocalFile {
    /// Opens metadata for `path`. Fails if the path does not exist or is not
    /// a regular file.
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            ));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let media_kind = media_kind_for_path(&path).to_string();

        Ok(Self {
            path,
            name,
            media_kind,
            byte_len: metadata.len(),
        })
    }

    /// Path on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl InputFile for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn media_kind(&self) -> &str {
        &self.media_kind
    }

    fn byte_len(&self) -> u64 {
        self.byte_len
    }

    async fn read(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

/// Infers a media kind from a file extension. Unknown extensions yield an
/// empty string, like a browser does for unregistered types.
pub fn media_kind_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        // Video
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "wmv" => "video/x-ms-wmv",
        // Audio
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "ogg" | "oga" => "audio/ogg",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "opus" => "audio/opus",
        // Image
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        "heic" => "image/heic",
        // Documents
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "odt" => "application/vnd.oasis.opendocument.text",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::FormatAdvisor;

    #[test]
    fn test_media_kind_for_path() {
        assert_eq!(media_kind_for_path(Path::new("clip.MOV")), "video/quicktime");
        assert_eq!(media_kind_for_path(Path::new("/a/b/song.flac")), "audio/flac");
        assert_eq!(media_kind_for_path(Path::new("photo.jpeg")), "image/jpeg");
        assert!(media_kind_for_path(Path::new("report.docx")).starts_with("application/"));
        assert_eq!(media_kind_for_path(Path::new("archive")), "");
        assert_eq!(media_kind_for_path(Path::new("data.xyz")), "");
    }

    #[test]
    fn test_inferred_kinds_feed_the_advisor() {
        assert_eq!(FormatAdvisor::suggest(media_kind_for_path(Path::new("a.mkv"))), "mp4");
        assert_eq!(FormatAdvisor::suggest(media_kind_for_path(Path::new("a.wav"))), "mp3");
        assert_eq!(FormatAdvisor::suggest(media_kind_for_path(Path::new("a.png"))), "jpg");
        assert_eq!(FormatAdvisor::suggest(media_kind_for_path(Path::new("a.txt"))), "pdf");
    }

    #[tokio::test]
    async fn test_memory_file() {
        let file = MemoryFile::new("movie.mov", "video/quicktime", vec![1, 2, 3]);
        assert_eq!(file.name(), "movie.mov");
        assert_eq!(file.media_kind(), "video/quicktime");
        assert_eq!(file.byte_len(), 3);
        assert_eq!(file.read().await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.wav");
        std::fs::write(&path, b"RIFF....WAVE").unwrap();

        let file = LocalFile::open(&path).await.unwrap();
        assert_eq!(file.name(), "track.wav");
        assert_eq!(file.media_kind(), "audio/wav");
        assert_eq!(file.byte_len(), 12);
        assert_eq!(file.path(), path.as_path());
        assert_eq!(file.read().await.unwrap(), b"RIFF....WAVE".to_vec());
    }

    #[tokio::test]
    async fn test_local_file_missing() {
        let result = LocalFile::open("/nonexistent/file.mp4").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_local_file_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalFile::open(dir.path()).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
