//! Raw upload storage and image type detection.

use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Detects the image type from leading magic bytes.
#[must_use]
pub fn sniff_media_type(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some("image/png"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => Some("image/tiff"),
        [b'B', b'M', ..] => Some("image/bmp"),
        _ => None,
    }
}

/// File extension (with leading dot) for a stored upload.
///
/// The client filename's extension wins when it is short and alphanumeric;
/// otherwise it is derived from the media type.
#[must_use]
pub fn extension_for(filename: &str, media_type: &str) -> String {
    let from_name = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase);

    let ext = from_name.unwrap_or_else(|| {
        match media_type {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/tiff" => "tiff",
            "image/bmp" => "bmp",
            _ => "bin",
        }
        .to_string()
    });
    format!(".{ext}")
}

/// Directory of raw uploads, one file per submission.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    /// Opens the store, creating its directory.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Root directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `{id}{extension}`; never overwrites.
    pub async fn save(&self, id: &str, extension: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.dir.join(format!("{id}{extension}"));
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_media_type() {
        assert_eq!(sniff_media_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_media_type(b"\x89PNG\r\n\x1a\n\0\0"), Some("image/png"));
        assert_eq!(sniff_media_type(b"GIF89a"), Some("image/gif"));
        assert_eq!(sniff_media_type(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff_media_type(b"II*\0"), Some("image/tiff"));
        assert_eq!(sniff_media_type(b"%PDF-1.7"), None);
        assert_eq!(sniff_media_type(b""), None);
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("scan.JPG", "image/jpeg"), ".jpg");
        assert_eq!(extension_for("scan", "image/png"), ".png");
        assert_eq!(extension_for("../../etc/passwd", "image/webp"), ".webp");
        assert_eq!(extension_for("weird.ex t", "image/heic"), ".bin");
    }

    #[tokio::test]
    async fn test_save_is_write_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::open(dir.path().join("uploads")).unwrap();

        let path = store.save("abc", ".png", b"bytes").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"bytes");
        assert_eq!(path.file_name().unwrap(), "abc.png");

        let again = store.save("abc", ".png", b"other").await.unwrap_err();
        assert_eq!(again.kind(), io::ErrorKind::AlreadyExists);
    }
}
