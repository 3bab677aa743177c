use std::sync::Arc;

use super::BoundedCache;
use crate::sprite::{SpriteSheet, Thumbnail};

pub const DEFAULT_BIG_CAPACITY: usize = 30;
pub const DEFAULT_SMALL_CAPACITY: usize = 10;

/// Two-tier image cache
///
/// - big tier: decoded sprite sheets keyed by their URL; a sheet leaving this
///   tier for any reason is recycled.
/// - small tier: cropped thumbnails keyed by requested offset.
#[derive(Debug)]
pub struct SpriteCache {
    big: BoundedCache<String, Arc<SpriteSheet>>,
    small: BoundedCache<i64, Thumbnail>,
}

impl SpriteCache {
    #[must_use]
    pub fn new(big_capacity: usize, small_capacity: usize) -> Self {
        Self {
            big: BoundedCache::with_eviction_hook(
                big_capacity,
                Box::new(|url: &String, sheet: &Arc<SpriteSheet>| {
                    if sheet.recycle() {
                        tracing::debug!(url = %url, "Recycled sprite sheet leaving cache");
                    }
                }),
            ),
            small: BoundedCache::new(small_capacity),
        }
    }

    pub fn get_small(&mut self, offset: i64) -> Option<Thumbnail> {
        self.small.get(&offset).cloned()
    }

    pub fn put_small(&mut self, offset: i64, thumbnail: Thumbnail) {
        self.small.put(offset, thumbnail);
    }

    pub fn get_big(&mut self, url: &str) -> Option<Arc<SpriteSheet>> {
        self.big.get(&url.to_string()).cloned()
    }

    /// Insert a sheet; the one it displaces (if any) is recycled.
    pub fn put_big(&mut self, url: impl Into<String>, sheet: Arc<SpriteSheet>) {
        self.big.put(url.into(), sheet);
    }

    pub fn resize(&mut self, big_capacity: usize, small_capacity: usize) {
        self.big.resize(big_capacity);
        self.small.resize(small_capacity);
    }

    /// Drop only the thumbnails; their offset keys are session relative.
    pub fn clear_small(&mut self) {
        self.small.clear();
    }

    /// Recycle every sheet and empty both tiers.
    pub fn clear(&mut self) {
        self.big.clear();
        self.small.clear();
    }

    #[must_use]
    pub fn big_len(&self) -> usize {
        self.big.len()
    }

    #[must_use]
    pub fn small_len(&self) -> usize {
        self.small.len()
    }

    #[must_use]
    pub fn capacities(&self) -> (usize, usize) {
        (self.big.capacity(), self.small.capacity())
    }
}

impl Default for SpriteCache {
    fn default() -> Self {
        Self::new(DEFAULT_BIG_CAPACITY, DEFAULT_SMALL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn sheet() -> Arc<SpriteSheet> {
        Arc::new(SpriteSheet::from_image(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]))))
    }

    fn thumb() -> Thumbnail {
        Arc::new(RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 255])))
    }

    #[test]
    fn test_default_capacities() {
        assert_eq!(SpriteCache::default().capacities(), (30, 10));
    }

    #[test]
    fn test_big_tier_overflow_recycles_exactly_the_oldest() {
        let mut cache = SpriteCache::new(30, 10);
        let sheets: Vec<_> = (0..31).map(|_| sheet()).collect();
        for (i, s) in sheets.iter().enumerate() {
            cache.put_big(format!("http://d/a/{i}.jpg"), s.clone());
        }

        assert_eq!(cache.big_len(), 30);
        assert!(sheets[0].is_recycled());
        assert!(sheets[1..].iter().all(|s| !s.is_recycled()));
        assert!(cache.get_big("http://d/a/0.jpg").is_none());
        // a second recycle is a no-op, so release happened once
        assert!(!sheets[0].recycle());
    }

    #[test]
    fn test_get_big_refreshes_recency() {
        let mut cache = SpriteCache::new(2, 10);
        let (a, b, c) = (sheet(), sheet(), sheet());
        cache.put_big("a", a.clone());
        cache.put_big("b", b.clone());
        assert!(cache.get_big("a").is_some());
        cache.put_big("c", c);

        assert!(!a.is_recycled());
        assert!(b.is_recycled());
    }

    #[test]
    fn test_replacing_sheet_recycles_previous() {
        let mut cache = SpriteCache::default();
        let (old, new) = (sheet(), sheet());
        cache.put_big("u", old.clone());
        cache.put_big("u", new.clone());

        assert!(old.is_recycled());
        assert!(!new.is_recycled());
        assert_eq!(cache.big_len(), 1);
    }

    #[test]
    fn test_clear_recycles_everything() {
        let mut cache = SpriteCache::default();
        let sheets: Vec<_> = (0..3).map(|_| sheet()).collect();
        for (i, s) in sheets.iter().enumerate() {
            cache.put_big(i.to_string(), s.clone());
        }
        cache.put_small(5, thumb());
        cache.clear();

        assert!(sheets.iter().all(|s| s.is_recycled()));
        assert_eq!(cache.big_len(), 0);
        assert_eq!(cache.small_len(), 0);
    }

    #[test]
    fn test_small_tier_lru() {
        let mut cache = SpriteCache::new(30, 2);
        cache.put_small(1, thumb());
        cache.put_small(2, thumb());
        assert!(cache.get_small(1).is_some());
        cache.put_small(3, thumb());

        assert!(cache.get_small(1).is_some());
        assert!(cache.get_small(2).is_none());
        assert!(cache.get_small(3).is_some());
    }

    #[test]
    fn test_resize_both_tiers() {
        let mut cache = SpriteCache::default();
        let sheets: Vec<_> = (0..5).map(|_| sheet()).collect();
        for (i, s) in sheets.iter().enumerate() {
            cache.put_big(i.to_string(), s.clone());
            cache.put_small(i as i64, thumb());
        }
        cache.resize(2, 3);

        assert_eq!(cache.capacities(), (2, 3));
        assert_eq!(cache.big_len(), 2);
        assert_eq!(cache.small_len(), 3);
        assert_eq!(sheets.iter().filter(|s| s.is_recycled()).count(), 3);
    }

    #[test]
    fn test_clear_small_keeps_sheets() {
        let mut cache = SpriteCache::default();
        let s = sheet();
        cache.put_big("u", s.clone());
        cache.put_small(1, thumb());
        cache.clear_small();

        assert_eq!(cache.small_len(), 0);
        assert_eq!(cache.big_len(), 1);
        assert!(!s.is_recycled());
    }
}
