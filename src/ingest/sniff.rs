//! Content-type sniffing from the first bytes of an upload.

/// Number of leading bytes a sniffer looks at
pub const SNIFF_LEN: usize = 512;

/// Generic binary content type
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Capability to guess a MIME type from a sample
pub trait ContentSniffer: Send + Sync {
    /// Guess the content type of `sample` (at most `SNIFF_LEN` bytes)
    fn sniff(&self, sample: &[u8]) -> String;
}

/// Magic-number sniffer for common audio, video and document formats
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureSniffer;

/// `(offset, magic, content type)`, checked in order
const SIGNATURES: &[(usize, &[u8], &str)] = &[
    (0, b"%PDF-", "application/pdf"),
    (0, b"\x89PNG\r\n\x1a\n", "image/png"),
    (0, b"\xFF\xD8\xFF", "image/jpeg"),
    (0, b"GIF87a", "image/gif"),
    (0, b"GIF89a", "image/gif"),
    (0, b"ID3", "audio/mpeg"),
    (0, b"OggS\x00", "application/ogg"),
    (0, b"fLaC", "audio/flac"),
    (0, b"MThd\x00\x00\x00\x06", "audio/midi"),
    (0, b"\x1A\x45\xDF\xA3", "video/webm"),
    (0, b"#!AMR", "audio/amr"),
    (0, b"PK\x03\x04", "application/zip"),
    (0, b"\x1F\x8B\x08", "application/x-gzip"),
];

impl ContentSniffer for SignatureSniffer {
    fn sniff(&self, sample: &[u8]) -> String {
        let sample = &sample[..sample.len().min(SNIFF_LEN)];
        if sample.is_empty() {
            return OCTET_STREAM.to_string();
        }

        for (offset, magic, content_type) in SIGNATURES {
            if sample.len() >= offset + magic.len() && &sample[*offset..offset + magic.len()] == *magic {
                return content_type.to_string();
            }
        }

        if let Some(content_type) = sniff_container(sample) {
            return content_type.to_string();
        }

        // MPEG audio frame sync without an ID3 tag
        if sample.len() >= 2 && sample[0] == 0xFF && sample[1] & 0xE0 == 0xE0 && sample[1] & 0x06 != 0 {
            return "audio/mpeg".to_string();
        }

        if sample.iter().any(|b| is_binary_byte(*b)) {
            OCTET_STREAM.to_string()
        } else {
            "text/plain; charset=utf-8".to_string()
        }
    }
}

/// RIFF, IFF and ISO base media containers carry their type further in
fn sniff_container(sample: &[u8]) -> Option<&'static str> {
    if sample.len() >= 12 && &sample[..4] == b"RIFF" {
        return match &sample[8..12] {
            b"WAVE" => Some("audio/wave"),
            b"AVI " => Some("video/avi"),
            _ => None,
        };
    }

    if sample.len() >= 12 && &sample[..4] == b"FORM" {
        return match &sample[8..12] {
            b"AIFF" | b"AIFC" => Some("audio/aiff"),
            _ => None,
        };
    }

    if sample.len() >= 12 && &sample[4..8] == b"ftyp" {
        let box_size = u32::from_be_bytes([sample[0], sample[1], sample[2], sample[3]]) as usize;
        if box_size < 12 || box_size % 4 != 0 {
            return None;
        }
        return match &sample[8..12] {
            b"M4A " | b"M4B " | b"M4P " => Some("audio/mp4"),
            b"qt  " => Some("video/quicktime"),
            _ => Some("video/mp4"),
        };
    }

    None
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

/// Strip parameters such as `; charset=utf-8` and lowercase
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Whether a content type is something the transcoder can take
pub fn is_media_type(content_type: &str) -> bool {
    let essence = essence(content_type);
    essence.starts_with("audio/") || essence.starts_with("video/") || essence == "application/ogg"
}
