use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::assets::decode::{PreparedImage, decode_image};
use crate::foundation::error::{CardsmithError, CardsmithResult};

/// Front-loaded, cached image IO. Renderers never touch the filesystem
/// directly; they go through the store, so one deck render decodes each
/// shared asset (frame, icons) once.
#[derive(Debug, Default)]
pub struct AssetStore {
    cache: HashMap<PathBuf, Arc<PreparedImage>>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and cache a raster asset. Unreadable or undecodable files are
    /// `MissingAsset`; callers decide whether that degrades to a
    /// placeholder or propagates.
    pub fn load(&mut self, path: &Path) -> CardsmithResult<Arc<PreparedImage>> {
        if let Some(hit) = self.cache.get(path) {
            return Ok(Arc::clone(hit));
        }
        let bytes = std::fs::read(path)
            .map_err(|e| CardsmithError::missing_asset(format!("read '{}': {e}", path.display())))?;
        let prepared = decode_image(&bytes).map_err(|e| {
            CardsmithError::missing_asset(format!("decode '{}': {e}", path.display()))
        })?;
        let prepared = Arc::new(prepared);
        self.cache.insert(path.to_path_buf(), Arc::clone(&prepared));
        Ok(prepared)
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn write_png(path: &Path, w: u32, h: u32) {
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba([255, 0, 0, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        std::fs::write(path, buf).unwrap();
    }

    #[test]
    fn load_caches_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        write_png(&path, 2, 3);

        let mut store = AssetStore::new();
        let first = store.load(&path).unwrap();
        let second = store.load(&path).unwrap();
        assert_eq!(first.width, 2);
        assert_eq!(first.height, 3);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.cached_count(), 1);
    }

    #[test]
    fn missing_file_is_missing_asset() {
        let mut store = AssetStore::new();
        let err = store.load(Path::new("/nope.png")).unwrap_err();
        assert!(err.to_string().contains("missing asset:"));
    }
}
