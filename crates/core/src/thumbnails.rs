//! Thumbnail rendering boundary.

use std::sync::Arc;

use serde::Serialize;

use crate::settings::{DataSource, Settings};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Thumbnail {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// Turns a source image (path relative to its data source root) into a
/// displayable thumbnail.
pub trait ThumbnailRenderer: Send + Sync {
    fn render(&self, ds: &DataSource, image_path: &str) -> Option<Thumbnail>;
}

/// Serves source images as-is, scaled by the client to the configured box.
pub struct DirectThumbnails {
    settings: Arc<Settings>,
}

impl DirectThumbnails {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }
}

impl ThumbnailRenderer for DirectThumbnails {
    fn render(&self, ds: &DataSource, image_path: &str) -> Option<Thumbnail> {
        let (width, height) = self.settings.thumbnail_size;
        Some(Thumbnail {
            url: self.settings.static_url(ds, image_path),
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_thumbnail_uses_static_url_and_box() {
        let ds = DataSource::new("ds1", "/data/ds1");
        let mut settings = Settings::with_data_sources(vec![ds.clone()]);
        settings.thumbnail_size = (64, 48);

        let thumb = DirectThumbnails::new(Arc::new(settings))
            .render(&ds, "widgets/0000-index/thumbnails/gear.png")
            .unwrap();
        assert_eq!(thumb.url, "/static/ds/ds1/widgets/0000-index/thumbnails/gear.png");
        assert_eq!((thumb.width, thumb.height), (64, 48));
    }
}
