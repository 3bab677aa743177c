use url::Url;

use crate::{Error, Result};

/// Which recording window thumbnails are fetched for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Playback host, optionally with port
    pub domain: String,
    /// Application path segment, e.g. `live`
    pub path: String,
    pub stream_id: String,
    /// Unix seconds; offsets are relative to this
    pub start_ts: i64,
    pub end_ts: i64,
}

impl Session {
    #[must_use]
    pub fn new(
        domain: impl Into<String>,
        path: impl Into<String>,
        stream_id: impl Into<String>,
        start_ts: i64,
        end_ts: i64,
    ) -> Self {
        Self {
            domain: domain.into(),
            path: path.into(),
            stream_id: stream_id.into(),
            start_ts,
            end_ts,
        }
    }

    /// Sprite manifest URL for the whole session window.
    pub fn manifest_url(&self, scheme: &str) -> Result<String> {
        self.require_domain()?;
        validated(&format!(
            "{scheme}://{}/{}/{}.json?txTimeshift=on&tsFormat=unix&tsSpritemode=1&tsStart={}&tsEnd={}",
            self.domain, self.path, self.stream_id, self.start_ts, self.end_ts
        ))
    }

    /// URL of sprite sheet `sheet_index` under a manifest entry's path prefix.
    pub fn sprite_url(&self, scheme: &str, entry_path: &str, sheet_index: i64) -> Result<String> {
        self.require_domain()?;
        validated(&format!(
            "{scheme}://{}{entry_path}{sheet_index}.jpg?txTimeshift=on",
            self.domain
        ))
    }

    fn require_domain(&self) -> Result<()> {
        if self.domain.trim().is_empty() {
            return Err(Error::InvalidParam("session domain is empty".to_string()));
        }
        Ok(())
    }
}

fn validated(raw: &str) -> Result<String> {
    Ok(Url::parse(raw)?.into())
}
