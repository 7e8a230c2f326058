//! MIME sniffing from magic bytes, used when an upload arrives without a type.

/// Fallback type for unrecognised content
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Detect MIME type from file content
pub fn detect(data: &[u8]) -> &'static str {
    if data.len() < 8 {
        return OCTET_STREAM;
    }

    match &data[0..8] {
        [0xFF, 0xD8, 0xFF, ..] => return "image/jpeg",
        [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A] => return "image/png",
        [0x47, 0x49, 0x46, 0x38, ..] => return "image/gif",
        [0x25, 0x50, 0x44, 0x46, ..] => return "application/pdf",
        [0x1A, 0x45, 0xDF, 0xA3, ..] => return "video/webm",
        [0x49, 0x44, 0x33, ..] => return "audio/mpeg",
        [0x4F, 0x67, 0x67, 0x53, ..] => return "audio/ogg",
        _ => {}
    }

    if data.len() >= 12 && &data[0..4] == b"RIFF" {
        return match &data[8..12] {
            b"WEBP" => "image/webp",
            b"WAVE" => "audio/wav",
            b"AVI " => "video/x-msvideo",
            _ => OCTET_STREAM,
        };
    }

    // ISO base media: HEIC/HEIF, MP4, QuickTime
    if data.len() >= 12 && &data[4..8] == b"ftyp" {
        return match &data[8..12] {
            b"heic" | b"heix" => "image/heic",
            b"mif1" => "image/heif",
            b"qt  " => "video/quicktime",
            b"M4A " => "audio/mp4",
            _ => "video/mp4",
        };
    }

    OCTET_STREAM
}
