use crate::extract::types::normalize_formats;
use crate::extract::{MediaDescriptor, MediaFormat, MediaKind};

/// Keep the interactive menu small.
pub const MAX_QUALITY_CHOICES: usize = 5;

/// Container types the delivery platform plays inline.
const COMPATIBLE_CONTAINERS: [&str; 1] = ["mp4"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuEntry {
    /// A concrete quality variant discovered for the video.
    Quality {
        format_id: String,
        height: u32,
        approx_bytes: Option<u64>,
    },
    /// Best-available default when no variants were discoverable.
    Best,
    /// Audio extraction, offered for every video.
    AudioOnly,
    /// Single image download.
    Image,
    /// Whole-gallery download.
    Album { count: usize },
}

/// Shapes a descriptor's formats into a finite choice set. Pure — no I/O.
///
/// Every video yields at least a default and an audio choice, whether or
/// not structured formats were discoverable.
pub fn select_menu(descriptor: &MediaDescriptor) -> Vec<MenuEntry> {
    match descriptor.kind {
        MediaKind::Gallery => vec![MenuEntry::Album {
            count: descriptor.items.len(),
        }],
        MediaKind::Image => vec![MenuEntry::Image],
        MediaKind::Video => {
            let mut entries: Vec<MenuEntry> = compatible_formats(&descriptor.formats)
                .into_iter()
                .take(MAX_QUALITY_CHOICES)
                .map(|format| MenuEntry::Quality {
                    format_id: format.format_id,
                    height: format.height,
                    approx_bytes: format.approx_bytes,
                })
                .collect();

            if entries.is_empty() {
                entries.push(MenuEntry::Best);
            }
            entries.push(MenuEntry::AudioOnly);
            entries
        }
    }
}

/// Platform-playable formats with a known resolution, deduplicated per
/// height and ordered best-first.
fn compatible_formats(formats: &[MediaFormat]) -> Vec<MediaFormat> {
    let filtered = formats
        .iter()
        .filter(|format| {
            format.height > 0 && COMPATIBLE_CONTAINERS.contains(&format.container.as_str())
        })
        .cloned()
        .collect();
    normalize_formats(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ItemKind, MediaItem};

    fn video_with(formats: Vec<MediaFormat>) -> MediaDescriptor {
        MediaDescriptor::video(
            "title",
            "author",
            "https://example.com/post",
            "https://example.com/video.mp4".to_string(),
        )
        .with_formats(formats)
    }

    fn format(id: &str, container: &str, height: u32, bytes: u64) -> MediaFormat {
        MediaFormat {
            format_id: id.to_string(),
            container: container.to_string(),
            height,
            approx_bytes: Some(bytes),
        }
    }

    #[test]
    fn test_video_menu_sorted_descending_no_duplicates() {
        let descriptor = video_with(vec![
            format("a", "mp4", 360, 10),
            format("b", "mp4", 1080, 40),
            format("c", "mp4", 720, 30),
            format("d", "mp4", 720, 20),
        ]);
        let menu = select_menu(&descriptor);

        let heights: Vec<u32> = menu
            .iter()
            .filter_map(|entry| match entry {
                MenuEntry::Quality { height, .. } => Some(*height),
                _ => None,
            })
            .collect();
        assert_eq!(heights, vec![1080, 720, 360]);
        assert_eq!(menu.last(), Some(&MenuEntry::AudioOnly));
    }

    #[test]
    fn test_video_menu_truncated_to_bound() {
        let formats = (1..=8)
            .map(|i| format(&format!("f{i}"), "mp4", i * 100, 10))
            .collect();
        let menu = select_menu(&video_with(formats));

        let quality_count = menu
            .iter()
            .filter(|entry| matches!(entry, MenuEntry::Quality { .. }))
            .count();
        assert_eq!(quality_count, MAX_QUALITY_CHOICES);
    }

    #[test]
    fn test_video_without_formats_gets_best_and_audio() {
        let menu = select_menu(&video_with(Vec::new()));
        assert_eq!(menu, vec![MenuEntry::Best, MenuEntry::AudioOnly]);
    }

    #[test]
    fn test_incompatible_formats_fall_back_to_best() {
        let descriptor = video_with(vec![
            format("webm", "webm", 1080, 40),
            format("noheight", "mp4", 0, 10),
        ]);
        let menu = select_menu(&descriptor);
        assert_eq!(menu, vec![MenuEntry::Best, MenuEntry::AudioOnly]);
    }

    #[test]
    fn test_image_menu() {
        let descriptor = MediaDescriptor::image(
            "pic",
            "author",
            "https://example.com/post",
            "https://example.com/pic.jpg".to_string(),
        );
        assert_eq!(select_menu(&descriptor), vec![MenuEntry::Image]);
    }

    #[test]
    fn test_gallery_menu_counts_items() {
        let items = (0..3)
            .map(|i| MediaItem {
                kind: ItemKind::Image,
                url: format!("https://example.com/{i}.jpg"),
            })
            .collect();
        let descriptor =
            MediaDescriptor::gallery("album", "author", "https://example.com/post", items);
        assert_eq!(select_menu(&descriptor), vec![MenuEntry::Album { count: 3 }]);
    }
}
