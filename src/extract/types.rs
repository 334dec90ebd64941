/// What a resolved post ultimately contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
    Gallery,
}

/// Kind of a single gallery entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Video,
    Image,
}

#[derive(Debug, Clone)]
pub struct MediaItem {
    pub kind: ItemKind,
    pub url: String,
}

/// One downloadable quality variant of a video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFormat {
    pub format_id: String,
    pub container: String,
    pub height: u32,
    pub approx_bytes: Option<u64>,
}

/// Normalized result of extracting a social-media post.
///
/// Exactly one of `media_url` / `items` carries data: `media_url` for
/// videos and images, `items` for galleries. Once handed to the router a
/// descriptor is never mutated; callers that need the item list later keep
/// the descriptor alive instead of re-deriving it.
#[derive(Debug, Clone)]
pub struct MediaDescriptor {
    pub kind: MediaKind,
    pub title: String,
    pub author: String,
    pub source_url: String,
    pub media_url: Option<String>,
    pub items: Vec<MediaItem>,
    pub formats: Vec<MediaFormat>,
}

impl MediaDescriptor {
    pub fn video(title: &str, author: &str, source_url: &str, media_url: String) -> Self {
        Self {
            kind: MediaKind::Video,
            title: title.to_string(),
            author: author.to_string(),
            source_url: source_url.to_string(),
            media_url: Some(media_url),
            items: Vec::new(),
            formats: Vec::new(),
        }
    }

    pub fn image(title: &str, author: &str, source_url: &str, media_url: String) -> Self {
        Self {
            kind: MediaKind::Image,
            media_url: Some(media_url),
            ..Self::video(title, author, source_url, String::new())
        }
    }

    pub fn gallery(title: &str, author: &str, source_url: &str, items: Vec<MediaItem>) -> Self {
        Self {
            kind: MediaKind::Gallery,
            title: title.to_string(),
            author: author.to_string(),
            source_url: source_url.to_string(),
            media_url: None,
            items,
            formats: Vec::new(),
        }
    }

    /// Last-resort descriptor that forwards the original URL untouched,
    /// betting that the opaque downloader can still resolve it.
    pub fn optimistic(title: &str, url: &str) -> Self {
        Self::video(title, "Unknown", url, url.to_string())
    }

    pub fn with_formats(mut self, formats: Vec<MediaFormat>) -> Self {
        self.formats = normalize_formats(formats);
        self
    }
}

/// Deduplicates by vertical resolution, keeping the largest variant at each
/// height, and sorts best-first.
pub fn normalize_formats(mut formats: Vec<MediaFormat>) -> Vec<MediaFormat> {
    formats.sort_by(|a, b| {
        b.height
            .cmp(&a.height)
            .then_with(|| b.approx_bytes.unwrap_or(0).cmp(&a.approx_bytes.unwrap_or(0)))
    });
    formats.dedup_by_key(|f| f.height);
    formats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(id: &str, height: u32, bytes: u64) -> MediaFormat {
        MediaFormat {
            format_id: id.to_string(),
            container: "mp4".to_string(),
            height,
            approx_bytes: Some(bytes),
        }
    }

    #[test]
    fn test_normalize_formats_sorts_descending() {
        let formats = normalize_formats(vec![
            format("a", 360, 10),
            format("b", 1080, 40),
            format("c", 720, 30),
        ]);
        let heights: Vec<u32> = formats.iter().map(|f| f.height).collect();
        assert_eq!(heights, vec![1080, 720, 360]);
    }

    #[test]
    fn test_normalize_formats_keeps_largest_per_height() {
        let formats = normalize_formats(vec![
            format("small", 720, 10),
            format("large", 720, 50),
        ]);
        assert_eq!(formats.len(), 1);
        assert_eq!(formats[0].format_id, "large");
    }

    #[test]
    fn test_normalize_formats_empty() {
        assert!(normalize_formats(Vec::new()).is_empty());
    }

    #[test]
    fn test_gallery_descriptor_has_no_media_url() {
        let descriptor = MediaDescriptor::gallery(
            "title",
            "author",
            "https://example.com/post",
            vec![MediaItem {
                kind: ItemKind::Image,
                url: "https://example.com/a.jpg".to_string(),
            }],
        );
        assert_eq!(descriptor.kind, MediaKind::Gallery);
        assert!(descriptor.media_url.is_none());
        assert_eq!(descriptor.items.len(), 1);
    }

    #[test]
    fn test_optimistic_forwards_url() {
        let descriptor = MediaDescriptor::optimistic("Media", "https://example.com/x");
        assert_eq!(descriptor.kind, MediaKind::Video);
        assert_eq!(descriptor.media_url.as_deref(), Some("https://example.com/x"));
        assert!(descriptor.formats.is_empty());
    }
}
