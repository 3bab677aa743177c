//! One sprite sheet series as described by the timeshift manifest.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Time window, grid geometry and remote path prefix of a sprite sheet series.
///
/// Numeric fields accept either a JSON number or a numeric string; anything
/// else decodes as zero, and a missing or non-string `path` decodes as empty.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ManifestEntry {
    /// Unix seconds, inclusive
    #[serde(default, deserialize_with = "lenient_i64")]
    pub start_time: i64,
    /// Unix seconds, exclusive
    #[serde(default, deserialize_with = "lenient_i64")]
    pub end_time: i64,
    #[serde(default, rename = "duration", deserialize_with = "lenient_f64")]
    pub duration_seconds: f64,
    #[serde(default, rename = "path", deserialize_with = "lenient_string")]
    pub remote_path: String,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub cols: i32,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub rows: i32,
    #[serde(default, rename = "interval", deserialize_with = "lenient_i32")]
    pub interval_seconds: i32,
    #[serde(default, rename = "width", deserialize_with = "lenient_i32")]
    pub tile_width: i32,
    #[serde(default, rename = "height", deserialize_with = "lenient_i32")]
    pub tile_height: i32,
}

impl ManifestEntry {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.remote_path.trim().is_empty()
            && self.start_time > 0
            && self.end_time > 0
            && self.cols > 0
            && self.rows > 0
            && self.interval_seconds > 0
            && self.tile_width > 0
            && self.tile_height > 0
            && self.seconds_per_sheet().is_some()
    }

    /// Whether the absolute timestamp falls in `[start_time, end_time)`.
    #[must_use]
    pub const fn covers(&self, timestamp: i64) -> bool {
        timestamp >= self.start_time && timestamp < self.end_time
    }

    /// Seconds of stream covered by one full sprite sheet, `None` for an
    /// empty or overflowing grid.
    #[must_use]
    pub fn seconds_per_sheet(&self) -> Option<i64> {
        i64::from(self.interval_seconds)
            .checked_mul(i64::from(self.cols))?
            .checked_mul(i64::from(self.rows))
            .filter(|seconds| *seconds > 0)
    }
}

/// Decode a manifest body: a JSON array of entry objects.
pub fn parse_manifest(body: &[u8]) -> crate::Result<Vec<ManifestEntry>> {
    let values: Vec<Value> = serde_json::from_slice(body)?;
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            if !value.is_object() {
                return Err(crate::Error::Parse(format!(
                    "manifest element {index} is not an object"
                )));
            }
            serde_json::from_value(value).map_err(Into::into)
        })
        .collect()
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_default(),
        Value::String(s) => parse_numeric_str(&s).map_or(0, |f| f as i64),
        _ => 0,
    })
}

fn lenient_i32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    // Narrowing wraps like a JVM int cast; absurd grids are rejected by `is_valid`
    lenient_i64(deserializer).map(|v| v as i32)
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().unwrap_or_default(),
        Value::String(s) => parse_numeric_str(&s).unwrap_or_default(),
        _ => 0.0,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

fn parse_numeric_str(s: &str) -> Option<f64> {
    let s = s.trim();
    s.parse::<i64>()
        .map(|v| v as f64)
        .ok()
        .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ManifestEntry {
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
    fn test_parse_full_entry() {
        let body = br#"[{"start_time":1000,"end_time":2000,"duration":1000.5,"path":"/live/s_","cols":5,"rows":4,"interval":10,"height":90,"width":160}]"#;
        let entries = parse_manifest(body).unwrap();

        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.start_time, 1000);
        assert_eq!(e.end_time, 2000);
        assert!((e.duration_seconds - 1000.5).abs() < f64::EPSILON);
        assert_eq!(e.remote_path, "/live/s_");
        assert_eq!((e.cols, e.rows), (5, 4));
        assert_eq!(e.interval_seconds, 10);
        assert_eq!((e.tile_width, e.tile_height), (160, 90));
        assert!(e.is_valid());
    }

    #[test]
    fn test_missing_fields_default() {
        let entries = parse_manifest(br#"[{"start_time":5}]"#).unwrap();
        let e = &entries[0];
        assert_eq!(e.start_time, 5);
        assert_eq!(e.end_time, 0);
        assert!(e.remote_path.is_empty());
        assert!(!e.is_valid());
    }

    #[test]
    fn test_numeric_strings_and_garbage() {
        let body = br#"[{"start_time":"1000","end_time":2000.9,"cols":"abc","rows":null,"path":42,"duration":"3.5"}]"#;
        let e = &parse_manifest(body).unwrap()[0];
        assert_eq!(e.start_time, 1000);
        assert_eq!(e.end_time, 2000);
        assert_eq!(e.cols, 0);
        assert_eq!(e.rows, 0);
        assert_eq!(e.remote_path, "42");
        assert!((e.duration_seconds - 3.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_non_array_is_parse_error() {
        assert!(matches!(parse_manifest(br#"{"start_time":1}"#), Err(crate::Error::Parse(_))));
        assert!(matches!(parse_manifest(b"not json"), Err(crate::Error::Parse(_))));
    }

    #[test]
    fn test_non_object_element_is_parse_error() {
        assert!(matches!(parse_manifest(br#"[{"start_time":1}, 7]"#), Err(crate::Error::Parse(_))));
    }

    #[test]
    fn test_empty_array() {
        assert!(parse_manifest(b"[]").unwrap().is_empty());
    }

    #[test]
    fn test_validity_requires_every_field() {
        assert!(sample().is_valid());

        let blank_path = ManifestEntry { remote_path: "   ".to_string(), ..sample() };
        assert!(!blank_path.is_valid());

        let no_interval = ManifestEntry { interval_seconds: 0, ..sample() };
        assert!(!no_interval.is_valid());

        let negative_width = ManifestEntry { tile_width: -160, ..sample() };
        assert!(!negative_width.is_valid());

        let no_start = ManifestEntry { start_time: 0, ..sample() };
        assert!(!no_start.is_valid());
    }

    #[test]
    fn test_covers_is_half_open() {
        let e = sample();
        assert!(!e.covers(999));
        assert!(e.covers(1000));
        assert!(e.covers(1999));
        assert!(!e.covers(2000));
    }

    #[test]
    fn test_seconds_per_sheet() {
        assert_eq!(sample().seconds_per_sheet(), Some(250));
        assert_eq!(ManifestEntry { rows: 0, ..sample() }.seconds_per_sheet(), None);
    }

    #[test]
    fn test_overflowing_grid_is_invalid() {
        let huge = ManifestEntry {
            interval_seconds: 4_194_304,
            cols: 2_097_152,
            rows: 2_097_152,
            ..sample()
        };
        assert_eq!(huge.seconds_per_sheet(), None);
        assert!(!huge.is_valid());
    }
}
