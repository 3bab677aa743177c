//! In-flight request bookkeeping
//!
//! Tracks the single outstanding manifest fetch, the sprite sheet downloads in
//! progress (one per URL) and which offset the caller asked for last.
//!
//! Guards are tagged with the session epoch they were issued in. Resetting the
//! coordinator starts a new epoch, after which guards from the old one release
//! nothing and report themselves stale.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Last-request-wins policy cell.
///
/// Asynchronous completions resolve against whatever offset is stored here
/// when they finish, not the offset that started them.
#[derive(Debug, Default)]
pub struct CurrentRequest(AtomicI64);

impl CurrentRequest {
    pub fn set(&self, offset: i64) {
        self.0.store(offset, Ordering::SeqCst);
    }

    #[must_use]
    pub fn get(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct InFlight {
    epoch: u64,
    fetching_manifest: bool,
    downloading: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct RequestCoordinator {
    in_flight: Arc<Mutex<InFlight>>,
    current: CurrentRequest,
}

impl RequestCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the manifest fetch slot, or `None` if a fetch is already running.
    pub fn begin_manifest_fetch(&self) -> Option<ManifestFetchGuard> {
        self.claim_manifest(None)
    }

    /// Like [`Self::begin_manifest_fetch`], but also `None` once the
    /// coordinator has moved past `epoch`.
    pub fn begin_manifest_fetch_in(&self, epoch: u64) -> Option<ManifestFetchGuard> {
        self.claim_manifest(Some(epoch))
    }

    /// Claim the download slot for `url`, or `None` if it is already downloading.
    pub fn begin_image_download(&self, url: &str) -> Option<ImageDownloadGuard> {
        self.claim_download(url, None)
    }

    /// Like [`Self::begin_image_download`], but also `None` once the
    /// coordinator has moved past `epoch`.
    pub fn begin_image_download_in(&self, url: &str, epoch: u64) -> Option<ImageDownloadGuard> {
        self.claim_download(url, Some(epoch))
    }

    fn claim_manifest(&self, expected_epoch: Option<u64>) -> Option<ManifestFetchGuard> {
        let mut state = self.in_flight.lock();
        if expected_epoch.is_some_and(|epoch| epoch != state.epoch) || state.fetching_manifest {
            return None;
        }
        state.fetching_manifest = true;
        Some(ManifestFetchGuard {
            in_flight: self.in_flight.clone(),
            epoch: state.epoch,
        })
    }

    fn claim_download(&self, url: &str, expected_epoch: Option<u64>) -> Option<ImageDownloadGuard> {
        let mut state = self.in_flight.lock();
        if expected_epoch.is_some_and(|epoch| epoch != state.epoch)
            || !state.downloading.insert(url.to_string())
        {
            return None;
        }
        Some(ImageDownloadGuard {
            in_flight: self.in_flight.clone(),
            epoch: state.epoch,
            url: url.to_string(),
        })
    }

    pub fn set_current_request(&self, offset: i64) {
        self.current.set(offset);
    }

    #[must_use]
    pub fn current_request(&self) -> i64 {
        self.current.get()
    }

    #[must_use]
    pub fn is_fetching_manifest(&self) -> bool {
        self.in_flight.lock().fetching_manifest
    }

    #[must_use]
    pub fn is_downloading(&self, url: &str) -> bool {
        self.in_flight.lock().downloading.contains(url)
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.in_flight.lock().epoch
    }

    #[must_use]
    pub fn is_current_epoch(&self, epoch: u64) -> bool {
        self.in_flight.lock().epoch == epoch
    }

    /// Forget every in-flight mark, reset the current offset and start a new epoch.
    pub fn reset(&self) -> u64 {
        let mut state = self.in_flight.lock();
        state.epoch = state.epoch.wrapping_add(1);
        state.fetching_manifest = false;
        state.downloading.clear();
        self.current.set(0);
        state.epoch
    }
}

/// Held while a manifest fetch is outstanding; releases the slot on drop.
#[derive(Debug)]
#[must_use = "dropping the guard immediately releases the manifest fetch slot"]
pub struct ManifestFetchGuard {
    in_flight: Arc<Mutex<InFlight>>,
    epoch: u64,
}

impl ManifestFetchGuard {
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// False once the coordinator has been reset since this guard was issued.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.in_flight.lock().epoch == self.epoch
    }
}

impl Drop for ManifestFetchGuard {
    fn drop(&mut self) {
        let mut state = self.in_flight.lock();
        if state.epoch == self.epoch {
            state.fetching_manifest = false;
        }
    }
}

/// Held while a sprite sheet download is outstanding; releases its URL on drop.
#[derive(Debug)]
#[must_use = "dropping the guard immediately releases the download slot"]
pub struct ImageDownloadGuard {
    in_flight: Arc<Mutex<InFlight>>,
    epoch: u64,
    url: String,
}

impl ImageDownloadGuard {
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn is_current(&self) -> bool {
        self.in_flight.lock().epoch == self.epoch
    }
}

impl Drop for ImageDownloadGuard {
    fn drop(&mut self) {
        let mut state = self.in_flight.lock();
        if state.epoch == self.epoch {
            state.downloading.remove(&self.url);
        }
    }
}
