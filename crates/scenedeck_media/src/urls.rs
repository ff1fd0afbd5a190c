/// Media categories the decode pipeline distinguishes.
///
/// `Image` is the catch-all for static rasters; the general-purpose decoder
/// sorts out the actual format.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum MediaType {
    Image,
    Gif,
    Webp,
}

impl MediaType {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match extract_mime_type(content_type) {
            "image/gif" => Some(MediaType::Gif),
            "image/webp" => Some(MediaType::Webp),
            mime if mime.starts_with("image/") => Some(MediaType::Image),
            _ => None,
        }
    }

    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let mime = mime_guess::from_path(path).first_raw()?;
        Self::from_content_type(mime)
    }

    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(MediaType::Gif)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(MediaType::Webp)
        } else {
            None
        }
    }
}

/// Decide how to decode a fetched resource: the content-type header wins,
/// then the URL extension, then magic bytes. Anything unrecognized is
/// handed to the general-purpose static decoder.
pub fn resolve_media_type(url: &str, content_type: Option<&str>, bytes: &[u8]) -> MediaType {
    content_type
        .and_then(MediaType::from_content_type)
        .or_else(|| MediaType::from_url(url))
        .or_else(|| MediaType::sniff(bytes))
        .unwrap_or(MediaType::Image)
}

fn extract_mime_type(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
}
