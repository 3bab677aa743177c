use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use chrono::{Local, NaiveDateTime, TimeZone};
use clap::Parser;

/// Fetch timeshift sprite thumbnails for a recorded live stream
#[derive(Debug, Parser)]
#[command(name = "timeshift-sprite", version, about)]
pub struct Args {
    /// Config file (toml, yaml or json)
    #[arg(short, long, env = "TSPRITE_CONFIG")]
    pub config: Option<String>,

    /// Playback domain, optionally with port
    #[arg(long, env = "TSPRITE_DOMAIN")]
    pub domain: String,

    /// Application path, e.g. `live`
    #[arg(long, env = "TSPRITE_PATH", default_value = "live")]
    pub path: String,

    #[arg(long, env = "TSPRITE_STREAM_ID")]
    pub stream_id: String,

    /// Window start: unix seconds or local `YYYY-MM-DD HH:MM:SS`
    #[arg(long, value_parser = parse_timestamp)]
    pub start: i64,

    /// Window end: unix seconds or local `YYYY-MM-DD HH:MM:SS`
    #[arg(long, value_parser = parse_timestamp)]
    pub end: i64,

    /// Offset into the window: seconds or `HH:MM:SS`. Repeatable.
    #[arg(long = "offset", required = true, value_parser = parse_offset)]
    pub offsets: Vec<i64>,

    /// Directory thumbnails are written to
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// How long to wait for each thumbnail
    #[arg(long, default_value_t = 30)]
    pub wait_seconds: u64,
}

impl Args {
    pub fn validate(&self) -> Result<()> {
        if self.end <= self.start {
            bail!("--end ({}) must be after --start ({})", self.end, self.start);
        }
        if self.wait_seconds == 0 {
            bail!("--wait-seconds must be greater than 0");
        }
        Ok(())
    }
}

/// Unix seconds, or a local wall-clock time.
pub fn parse_timestamp(value: &str) -> Result<i64> {
    let value = value.trim();
    if let Ok(ts) = value.parse::<i64>() {
        return Ok(ts);
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .map_err(|e| anyhow!("invalid timestamp '{value}': {e}"))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp())
        .ok_or_else(|| anyhow!("'{value}' does not exist in the local timezone"))
}

/// Seconds, `MM:SS` or `HH:MM:SS`.
pub fn parse_offset(value: &str) -> Result<i64> {
    let value = value.trim();
    let parts = value
        .split(':')
        .map(|p| p.parse::<i64>().map_err(|e| anyhow!("invalid offset '{value}': {e}")))
        .collect::<Result<Vec<_>>>()?;

    if parts.iter().any(|p| *p < 0) {
        bail!("offset '{value}' must not be negative");
    }

    match parts.as_slice() {
        [s] => Ok(*s),
        [m, s] => Ok(m * 60 + s),
        [h, m, s] => Ok(h * 3600 + m * 60 + s),
        _ => bail!("invalid offset '{value}': expected seconds, MM:SS or HH:MM:SS"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_unix() {
        assert_eq!(parse_timestamp("1700000000").unwrap(), 1_700_000_000);
    }

    #[test]
    fn test_parse_timestamp_local() {
        let ts = parse_timestamp("2026-01-15 12:30:00").unwrap();
        let expected = Local
            .with_ymd_and_hms(2026, 1, 15, 12, 30, 0)
            .earliest()
            .unwrap()
            .timestamp();
        assert_eq!(ts, expected);
    }

    #[test]
    fn test_parse_timestamp_garbage() {
        assert!(parse_timestamp("yesterday").is_err());
        assert!(parse_timestamp("2026-13-01 00:00:00").is_err());
    }

    #[test]
    fn test_parse_offset_forms() {
        assert_eq!(parse_offset("120").unwrap(), 120);
        assert_eq!(parse_offset("2:05").unwrap(), 125);
        assert_eq!(parse_offset("01:00:10").unwrap(), 3610);
    }

    #[test]
    fn test_parse_offset_rejects_bad_input() {
        assert!(parse_offset("-5").is_err());
        assert!(parse_offset("1:2:3:4").is_err());
        assert!(parse_offset("ten").is_err());
    }

    #[test]
    fn test_cli_parses() {
        let args = Args::try_parse_from([
            "timeshift-sprite",
            "--domain",
            "play.example.com",
            "--stream-id",
            "s1",
            "--start",
            "1000",
            "--end",
            "2000",
            "--offset",
            "120",
            "--offset",
            "00:02:10",
        ])
        .unwrap();

        assert_eq!(args.path, "live");
        assert_eq!(args.offsets, vec![120, 130]);
        assert_eq!(args.wait_seconds, 30);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_window() {
        let args = Args::try_parse_from([
            "timeshift-sprite",
            "--domain",
            "d",
            "--stream-id",
            "s",
            "--start",
            "2000",
            "--end",
            "1000",
            "--offset",
            "1",
        ])
        .unwrap();
        assert!(args.validate().is_err());
    }
}
