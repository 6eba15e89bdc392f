use crate::config::StorageConfig;

/// Media families the upload route accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    /// Classify a declared MIME type by its primary component.
    ///
    /// Returns `None` for anything that is neither `video/*` nor `image/*`.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let primary = content_type.split('/').next().unwrap_or_default().trim();

        if primary.eq_ignore_ascii_case("video") {
            Some(Self::Video)
        } else if primary.eq_ignore_ascii_case("image") {
            Some(Self::Image)
        } else {
            None
        }
    }

    /// Container that stores this kind of media
    pub fn container<'a>(&self, config: &'a StorageConfig) -> &'a str {
        match self {
            Self::Video => &config.video_container,
            Self::Image => &config.image_container,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Image => "image",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_video_and_image() {
        assert_eq!(MediaKind::from_content_type("video/mp4"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_content_type("image/jpeg"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_content_type("Video/QuickTime"), Some(MediaKind::Video));
    }

    #[test]
    fn test_classify_rejects_other_families() {
        assert_eq!(MediaKind::from_content_type("audio/mpeg"), None);
        assert_eq!(MediaKind::from_content_type("application/octet-stream"), None);
        assert_eq!(MediaKind::from_content_type(""), None);
        assert_eq!(MediaKind::from_content_type("videos/mp4"), None);
    }

    #[test]
    fn test_container_names() {
        let config = StorageConfig::default();
        assert_eq!(MediaKind::Video.container(&config), "videos");
        assert_eq!(MediaKind::Image.container(&config), "images");
    }
}
