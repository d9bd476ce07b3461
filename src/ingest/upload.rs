//! Size-bounded upload storage.
//!
//! Uploads are renamed to a fresh UUID so nothing from the client-supplied
//! filename except a sanitized extension reaches the filesystem.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{info, warn};

use super::sniff::{essence, is_media_type, OCTET_STREAM, SNIFF_LEN};
use super::{MediaError, MediaIngestor, ValidationError};
use crate::domain::new_id;

/// Extension used when nothing better is known
pub const GENERIC_EXTENSION: &str = ".bin";

const COPY_BUFFER_LEN: usize = 32 * 1024;

/// Prefix of in-flight uploads inside the audio directory
const UPLOAD_TEMP_PREFIX: &str = ".upload-";

/// Preferred extensions for the content types uploads usually arrive as
const EXTENSION_TABLE: &[(&str, &str)] = &[
    ("audio/mpeg", ".mp3"),
    ("audio/mp3", ".mp3"),
    ("audio/mp4", ".m4a"),
    ("audio/x-m4a", ".m4a"),
    ("audio/wav", ".wav"),
    ("audio/wave", ".wav"),
    ("audio/x-wav", ".wav"),
    ("audio/webm", ".webm"),
    ("video/webm", ".webm"),
    ("audio/ogg", ".ogg"),
    ("application/ogg", ".ogg"),
    ("audio/flac", ".flac"),
    ("audio/aiff", ".aiff"),
    ("video/mp4", ".m4a"),
    ("video/quicktime", ".m4a"),
];

impl MediaIngestor {
    /// Stream an upload into the audio directory.
    ///
    /// Returns the path of the stored file. Nothing is left on disk when the
    /// upload is rejected or fails midway.
    pub async fn save_upload<R>(
        &self,
        mut reader: R,
        original_filename: &str,
    ) -> Result<PathBuf, MediaError>
    where
        R: AsyncRead + Unpin,
    {
        let sample = read_sample(&mut reader)
            .await
            .map_err(|e| MediaError::io(Path::new(original_filename), e))?;

        let content_type = self.sniffer.sniff(&sample);
        let ext = normalize_extension(original_filename)
            .unwrap_or_else(|| extension_for_content_type(&content_type));

        if essence(&content_type) != OCTET_STREAM && !is_media_type(&content_type) {
            warn!(
                content_type = %content_type,
                extension = %ext,
                "Unrecognized audio MIME type, continuing"
            );
        }

        let path = self.audio_dir.join(format!("{}{}", new_id(), ext));
        let written = self.write_with_limit(&path, &sample, &mut reader).await?;

        info!(
            path = %path.display(),
            bytes = written,
            content_type = %content_type,
            "Upload saved"
        );
        Ok(path)
    }

    /// Write the sample and then the rest of the reader, enforcing the limit.
    ///
    /// Bytes go to a temporary file in the audio directory which is renamed
    /// to `path` only once the stream is complete. The temporary file is
    /// removed when the upload fails or the future is dropped.
    async fn write_with_limit<R>(
        &self,
        path: &Path,
        sample: &[u8],
        reader: &mut R,
    ) -> Result<u64, MediaError>
    where
        R: AsyncRead + Unpin,
    {
        let limit = self.max_upload_bytes;
        let exceeds = |total: u64| limit > 0 && total > limit;

        // The sample is already in memory; reject it before creating a file
        if exceeds(sample.len() as u64) {
            return Err(ValidationError::UploadTooLarge { limit }.into());
        }

        let (file, temp_path) = tempfile::Builder::new()
            .prefix(UPLOAD_TEMP_PREFIX)
            .tempfile_in(&self.audio_dir)
            .map_err(|e| MediaError::io(&self.audio_dir, e))?
            .into_parts();
        let mut out = File::from_std(file);

        out.write_all(sample)
            .await
            .map_err(|e| MediaError::io(&temp_path, e))?;
        let mut total = sample.len() as u64;

        let mut buf = vec![0u8; COPY_BUFFER_LEN];
        loop {
            let n = reader
                .read(&mut buf)
                .await
                .map_err(|e| MediaError::io(path, e))?;
            if n == 0 {
                break;
            }

            total += n as u64;
            if exceeds(total) {
                return Err(ValidationError::UploadTooLarge { limit }.into());
            }

            out.write_all(&buf[..n])
                .await
                .map_err(|e| MediaError::io(&temp_path, e))?;
        }

        out.shutdown().await.map_err(|e| MediaError::io(&temp_path, e))?;
        drop(out);

        temp_path
            .persist(path)
            .map_err(|e| MediaError::io(path, e.error))?;
        Ok(total)
    }
}

/// Read up to `SNIFF_LEN` bytes, stopping early only at end of stream
async fn read_sample<R>(reader: &mut R) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut sample = vec![0u8; SNIFF_LEN];
    let mut filled = 0;
    while filled < SNIFF_LEN {
        let n = reader.read(&mut sample[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    sample.truncate(filled);
    Ok(sample)
}

/// Extension of the client filename as `.ext`, lowercased.
///
/// Anything that is not plain ASCII alphanumeric is ignored.
pub fn normalize_extension(filename: &str) -> Option<String> {
    let ext = Path::new(filename.trim()).extension()?.to_str()?.trim();
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(format!(".{}", ext.to_ascii_lowercase()))
}

/// Extension for a sniffed content type, falling back to `.bin`
pub fn extension_for_content_type(content_type: &str) -> String {
    let essence = essence(content_type);
    if essence == OCTET_STREAM {
        return GENERIC_EXTENSION.to_string();
    }

    if let Some((_, ext)) = EXTENSION_TABLE.iter().find(|(ct, _)| *ct == essence) {
        return ext.to_string();
    }

    mime_guess::get_mime_extensions_str(&essence)
        .and_then(|exts| exts.first())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_else(|| GENERIC_EXTENSION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension("lecture.MP3"), Some(".mp3".to_string()));
        assert_eq!(normalize_extension("week 1.final.m4a"), Some(".m4a".to_string()));
        assert_eq!(normalize_extension("noext"), None);
        assert_eq!(normalize_extension("weird.m p3"), None);
        assert_eq!(normalize_extension(""), None);
    }

    #[test]
    fn test_extension_for_content_type() {
        assert_eq!(extension_for_content_type("audio/mpeg"), ".mp3");
        assert_eq!(extension_for_content_type("audio/wave"), ".wav");
        assert_eq!(extension_for_content_type("video/quicktime"), ".m4a");
        assert_eq!(extension_for_content_type("application/x-unknown-thing"), ".bin");
    }

    #[tokio::test]
    async fn test_read_sample_stops_at_sniff_len() {
        let data = vec![7u8; SNIFF_LEN * 2];
        let mut reader = &data[..];
        let sample = read_sample(&mut reader).await.unwrap();
        assert_eq!(sample.len(), SNIFF_LEN);
        assert_eq!(reader.len(), SNIFF_LEN);
    }
}
