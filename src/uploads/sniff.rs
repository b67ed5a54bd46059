/// MIME type implied by the magic bytes at the start of `head`.
pub(super) fn mime_type(head: &[u8]) -> Option<&'static str> {
    image::guess_format(head)
        .ok()
        .map(|format| format.to_mime_type())
}

/// MIME type conventionally stored under `extension` (lower case, no dot).
pub(super) fn mime_for_extension(extension: &str) -> Option<&'static str> {
    image::ImageFormat::from_extension(extension).map(|format| format.to_mime_type())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_allowed_image_formats() {
        assert_eq!(mime_type(b"\x89PNG\r\n\x1a\n"), Some("image/png"));
        assert_eq!(mime_type(b"\xff\xd8\xff\xe0\x00\x10JFIF"), Some("image/jpeg"));
        assert_eq!(mime_type(b"GIF89a\x01\x00"), Some("image/gif"));
        assert_eq!(mime_type(b"GIF87a\x01\x00"), Some("image/gif"));
    }

    #[test]
    fn extensions_map_to_their_image_type() {
        assert_eq!(mime_for_extension("png"), Some("image/png"));
        assert_eq!(mime_for_extension("jpg"), Some("image/jpeg"));
        assert_eq!(mime_for_extension("jpeg"), Some("image/jpeg"));
        assert_eq!(mime_for_extension("gif"), Some("image/gif"));
        assert_eq!(mime_for_extension("exe"), None);
    }

    #[test]
    fn unknown_content_has_no_type() {
        assert_eq!(mime_type(b"MZ\x90\x00\x03\x00"), None);
        assert_eq!(mime_type(b"#!/bin/sh\nrm -rf /"), None);
        assert_eq!(mime_type(b""), None);
    }
}
