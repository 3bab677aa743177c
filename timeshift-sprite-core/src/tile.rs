//! Mapping a playback offset onto a sprite sheet and a tile within it.

use crate::manifest::ManifestEntry;
use crate::{Error, Result};

/// Pixel rectangle of one tile, right/bottom exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl TileRect {
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

/// Where a given offset lives inside an entry's sprite sheet series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLocation {
    /// Offset normalized into the entry's own timeline
    pub relative_offset: i64,
    /// Sprite sheet number, appended to the entry path to form the sheet URL
    pub sheet_index: i64,
    /// Tile number within the sheet, row-major
    pub tile_index: u32,
    pub row: u32,
    pub col: u32,
    pub rect: TileRect,
}

/// Normalize a session offset into the entry's timeline.
///
/// Positive when the session started after the entry window opened.
#[must_use]
pub const fn relative_offset(offset: i64, session_start: i64, entry: &ManifestEntry) -> i64 {
    offset.saturating_add(session_start.saturating_sub(entry.start_time))
}

/// Locate the tile for `offset`. The entry must be valid.
pub fn locate(offset: i64, session_start: i64, entry: &ManifestEntry) -> Result<TileLocation> {
    if !entry.is_valid() {
        return Err(Error::InvalidParam("manifest entry is not valid".to_string()));
    }

    let relative_offset = relative_offset(offset, session_start, entry);
    if relative_offset < 0 {
        return Err(Error::InvalidParam(format!(
            "offset {offset} is {} seconds before the sprite window",
            -relative_offset
        )));
    }

    let interval = i64::from(entry.interval_seconds);
    let cols = i64::from(entry.cols);
    let seconds_per_sheet = entry
        .seconds_per_sheet()
        .ok_or_else(|| Error::InvalidParam("sprite grid spans too many seconds".to_string()))?;

    let sheet_index = relative_offset / seconds_per_sheet;
    let tile_index = (relative_offset % seconds_per_sheet) / interval;
    let row = tile_index / cols;
    let col = tile_index % cols;

    let left = col * i64::from(entry.tile_width);
    let top = row * i64::from(entry.tile_height);
    let right = left + i64::from(entry.tile_width);
    let bottom = top + i64::from(entry.tile_height);

    let to_u32 = |v: i64| {
        u32::try_from(v).map_err(|_| Error::InvalidParam(format!("tile coordinate {v} out of range")))
    };

    Ok(TileLocation {
        relative_offset,
        sheet_index,
        tile_index: to_u32(tile_index)?,
        row: to_u32(row)?,
        col: to_u32(col)?,
        rect: TileRect {
            left: to_u32(left)?,
            top: to_u32(top)?,
            right: to_u32(right)?,
            bottom: to_u32(bottom)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> ManifestEntry {
        ManifestEntry {
            start_time: 1000,
            end_time: 2000,
            duration_seconds: 1000.0,
            remote_path: "/a/".to_string(),
            cols: 5,
            rows: 5,
            interval_seconds: 10,
            tile_width: 160,
            tile_height: 90,
        }
    }

    #[test]
    fn test_locate_worked_example() {
        let loc = locate(120, 1000, &entry()).unwrap();

        assert_eq!(loc.relative_offset, 120);
        assert_eq!(loc.sheet_index, 0);
        assert_eq!(loc.tile_index, 12);
        assert_eq!((loc.row, loc.col), (2, 2));
        assert_eq!(
            loc.rect,
            TileRect { left: 320, top: 180, right: 480, bottom: 270 }
        );
        assert_eq!(loc.rect.width(), 160);
        assert_eq!(loc.rect.height(), 90);
    }

    #[test]
    fn test_locate_second_sheet() {
        // 250 seconds per sheet; 255 lands on the first tile of sheet 1
        let loc = locate(255, 1000, &entry()).unwrap();
        assert_eq!(loc.sheet_index, 1);
        assert_eq!(loc.tile_index, 0);
        assert_eq!(loc.rect, TileRect { left: 0, top: 0, right: 160, bottom: 90 });
    }

    #[test]
    fn test_relative_offset_sign() {
        // session started 30s after the entry window
        assert_eq!(relative_offset(10, 1030, &entry()), 40);
        // session started 30s before the entry window
        assert_eq!(relative_offset(40, 970, &entry()), 10);
    }

    #[test]
    fn test_negative_relative_offset_is_invalid_param() {
        let err = locate(10, 970, &entry()).unwrap_err();
        assert_eq!(err.code(), crate::FetchCode::ParamInvalid);
    }

    #[test]
    fn test_invalid_entry_is_rejected() {
        let broken = ManifestEntry { rows: 0, ..entry() };
        assert!(locate(10, 1000, &broken).is_err());
    }

    #[test]
    fn test_overflowing_grid_is_invalid_param() {
        let huge = ManifestEntry {
            interval_seconds: 4_194_304,
            cols: 2_097_152,
            rows: 2_097_152,
            ..entry()
        };
        let err = locate(10, 1000, &huge).unwrap_err();
        assert_eq!(err.code(), crate::FetchCode::ParamInvalid);
    }

    #[test]
    fn test_tile_index_always_within_grid() {
        let e = ManifestEntry { cols: 3, rows: 2, interval_seconds: 7, ..entry() };
        for offset in 0..500 {
            let loc = locate(offset, 1000, &e).unwrap();
            assert!(loc.tile_index < 6, "offset {offset} gave tile {}", loc.tile_index);
            assert!(loc.col < 3);
            assert!(loc.row < 2);
            assert_eq!(loc.tile_index, loc.row * 3 + loc.col);
        }
    }
}
