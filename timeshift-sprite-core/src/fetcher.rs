//! Timeshift sprite thumbnail fetcher
//!
//! Resolves a playback offset to a thumbnail: cropped-thumbnail cache, then
//! decoded sprite sheet cache, then the manifest, then the network. Requests
//! return immediately and every outcome, cached or not, goes through the
//! registered [`FetchCallback`].
//!
//! Asynchronous completions follow a last-request-wins policy: when a
//! manifest or sprite sheet arrives it is used to answer the offset most
//! recently passed to [`SpriteFetcher::get_thumbnail`], which may differ from
//! the one that triggered the fetch.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::cache::SpriteCache;
use crate::config::FetcherConfig;
use crate::coordinator::{ImageDownloadGuard, ManifestFetchGuard, RequestCoordinator};
use crate::error::FetchCode;
use crate::manifest::{parse_manifest, ManifestStore};
use crate::session::Session;
use crate::sprite::{SpriteSheet, Thumbnail};
use crate::tile::{self, TileRect};
use crate::transport::{HttpTransport, Transport};
use crate::{Error, Result};

/// Outcome of one delivery.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub code: FetchCode,
    /// Offset the result was resolved against
    pub offset: i64,
    pub image: Option<Thumbnail>,
}

impl FetchResult {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }
}

/// Receiver of fetch results. Called from whichever task finished the work.
pub trait FetchCallback: Send + Sync {
    fn on_fetch_done(&self, result: FetchResult);
}

impl<F> FetchCallback for F
where
    F: Fn(FetchResult) + Send + Sync,
{
    fn on_fetch_done(&self, result: FetchResult) {
        self(result);
    }
}

/// Forwards every result into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelCallback {
    tx: mpsc::UnboundedSender<FetchResult>,
}

impl ChannelCallback {
    /// A callback and the receiving end of its channel.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<FetchResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl FetchCallback for ChannelCallback {
    fn on_fetch_done(&self, result: FetchResult) {
        if self.tx.send(result).is_err() {
            debug!("Fetch result receiver dropped");
        }
    }
}

#[derive(Debug)]
struct State {
    session: Session,
    manifest: ManifestStore,
    cache: SpriteCache,
}

/// What to do next for an offset, decided under the state lock. `epoch` is
/// the session epoch the decision was made in.
enum Step {
    Deliver(FetchCode, Option<Thumbnail>),
    Crop {
        epoch: u64,
        url: String,
        sheet: Arc<SpriteSheet>,
        rect: TileRect,
    },
    FetchManifest { epoch: u64, url: String },
    FetchSprite { epoch: u64, url: String },
}

/// Behaviour when no valid manifest entry covers the offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnMissingManifest {
    Fetch,
    Fail,
}

struct Inner {
    config: FetcherConfig,
    transport: Arc<dyn Transport>,
    runtime: Handle,
    coordinator: RequestCoordinator,
    state: Mutex<State>,
    callback: RwLock<Option<Arc<dyn FetchCallback>>>,
}

/// Sprite thumbnail fetcher for one playback session at a time.
///
/// Cheap to clone; clones share caches and in-flight state.
#[derive(Clone)]
pub struct SpriteFetcher {
    inner: Arc<Inner>,
}

impl SpriteFetcher {
    /// Create a fetcher that spawns its network work on the current Tokio runtime.
    pub fn new(transport: Arc<dyn Transport>, config: FetcherConfig) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Runtime(format!("no Tokio runtime available: {e}")))?;
        Ok(Self::with_runtime(transport, config, runtime))
    }

    /// Create a fetcher backed by [`HttpTransport`].
    pub fn with_http(config: FetcherConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Self::new(transport, config)
    }

    #[must_use]
    pub fn with_runtime(transport: Arc<dyn Transport>, config: FetcherConfig, runtime: Handle) -> Self {
        let cache = SpriteCache::new(config.big_cache_capacity, config.small_cache_capacity);
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                runtime,
                coordinator: RequestCoordinator::new(),
                state: Mutex::new(State {
                    session: Session::default(),
                    manifest: ManifestStore::default(),
                    cache,
                }),
                callback: RwLock::new(None),
            }),
        }
    }

    /// Point the fetcher at a recording window.
    pub fn init(
        &self,
        domain: impl Into<String>,
        path: impl Into<String>,
        stream_id: impl Into<String>,
        start_ts: i64,
        end_ts: i64,
    ) {
        self.init_session(Session::new(domain, path, stream_id, start_ts, end_ts));
    }

    /// Switch to `session`. Switching to a different session drops the
    /// manifest, the cropped thumbnails and any in-flight work; decoded sprite
    /// sheets are keyed by URL and kept.
    pub fn init_session(&self, session: Session) {
        let mut state = self.inner.state.lock();
        if state.session == session {
            return;
        }

        let epoch = self.inner.coordinator.reset();
        state.manifest.reset(session.start_ts);
        state.cache.clear_small();
        info!(
            domain = %session.domain,
            path = %session.path,
            stream_id = %session.stream_id,
            start_ts = session.start_ts,
            end_ts = session.end_ts,
            epoch,
            "Sprite fetcher session initialized"
        );
        state.session = session;
    }

    pub fn set_callback<C: FetchCallback + 'static>(&self, callback: C) {
        *self.inner.callback.write() = Some(Arc::new(callback));
    }

    pub fn remove_callback(&self) {
        *self.inner.callback.write() = None;
    }

    /// Request the thumbnail at `offset` seconds into the session.
    ///
    /// Never blocks; the result arrives through the callback, immediately for
    /// cache hits.
    pub fn get_thumbnail(&self, offset: i64) {
        self.inner.coordinator.set_current_request(offset);
        let step = self.inner.plan(offset, OnMissingManifest::Fetch);
        self.inner.execute(offset, step);
    }

    /// Resize the sprite sheet and thumbnail tiers; overflow is evicted now.
    pub fn set_cache_size(&self, big_capacity: usize, small_capacity: usize) {
        if big_capacity == 0 || small_capacity == 0 {
            warn!(big_capacity, small_capacity, "Zero cache capacity clamped to 1");
        }
        self.inner.state.lock().cache.resize(big_capacity, small_capacity);
    }

    /// Forget the session, manifest, caches, in-flight work and callback.
    pub fn clear(&self) {
        let epoch = {
            let mut state = self.inner.state.lock();
            let epoch = self.inner.coordinator.reset();
            state.session = Session::default();
            state.manifest.reset(0);
            state.cache.clear();
            epoch
        };
        self.remove_callback();
        debug!(epoch, "Sprite fetcher cleared");
    }

    #[must_use]
    pub fn session(&self) -> Session {
        self.inner.state.lock().session.clone()
    }

    #[must_use]
    pub fn current_request(&self) -> i64 {
        self.inner.coordinator.current_request()
    }

    /// Entries in the sprite sheet and thumbnail tiers.
    #[must_use]
    pub fn cache_len(&self) -> (usize, usize) {
        let state = self.inner.state.lock();
        (state.cache.big_len(), state.cache.small_len())
    }

    #[must_use]
    pub fn cache_capacity(&self) -> (usize, usize) {
        self.inner.state.lock().cache.capacities()
    }
}

impl std::fmt::Debug for SpriteFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpriteFetcher")
            .field("state", &*self.inner.state.lock())
            .field("coordinator", &self.inner.coordinator)
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn plan(&self, offset: i64, on_missing: OnMissingManifest) -> Step {
        let mut guard = self.state.lock();
        let State { session, manifest, cache } = &mut *guard;
        let epoch = self.coordinator.epoch();

        if let Some(thumbnail) = cache.get_small(offset) {
            debug!(offset, "Thumbnail cache hit");
            return Step::Deliver(FetchCode::Success, Some(thumbnail));
        }

        let Some(entry) = manifest.lookup_valid(offset) else {
            return match on_missing {
                OnMissingManifest::Fetch => match session.manifest_url(&self.config.scheme) {
                    Ok(url) => Step::FetchManifest { epoch, url },
                    Err(e) => {
                        warn!(offset, error = %e, "Cannot build sprite manifest url");
                        Step::Deliver(e.code(), None)
                    }
                },
                OnMissingManifest::Fail => {
                    warn!(offset, "No valid sprite manifest entry covers offset");
                    Step::Deliver(FetchCode::ServerError, None)
                }
            };
        };

        let location = match tile::locate(offset, session.start_ts, entry) {
            Ok(location) => location,
            Err(e) => {
                warn!(offset, error = %e, "Cannot locate thumbnail tile");
                return Step::Deliver(e.code(), None);
            }
        };

        let url = match session.sprite_url(&self.config.scheme, &entry.remote_path, location.sheet_index) {
            Ok(url) => url,
            Err(e) => {
                warn!(offset, error = %e, "Cannot build sprite sheet url");
                return Step::Deliver(e.code(), None);
            }
        };

        match cache.get_big(&url) {
            Some(sheet) => {
                debug!(offset, url = %url, "Sprite sheet cache hit");
                Step::Crop {
                    epoch,
                    url,
                    sheet,
                    rect: location.rect,
                }
            }
            None => Step::FetchSprite { epoch, url },
        }
    }

    fn execute(self: &Arc<Self>, offset: i64, step: Step) {
        match step {
            Step::Deliver(code, image) => self.notify(code, offset, image),
            Step::Crop { epoch, url, sheet, rect } => match sheet.crop(rect) {
                Some(thumbnail) => {
                    self.cache_thumbnail(epoch, offset, thumbnail.clone());
                    self.notify(FetchCode::Success, offset, Some(thumbnail));
                }
                None => {
                    debug!(offset, url = %url, "Cached sprite sheet yielded no tile, downloading again");
                    self.start_sprite_fetch(epoch, url);
                }
            },
            Step::FetchManifest { epoch, url } => self.start_manifest_fetch(epoch, url),
            Step::FetchSprite { epoch, url } => self.start_sprite_fetch(epoch, url),
        }
    }

    fn start_manifest_fetch(self: &Arc<Self>, epoch: u64, url: String) {
        let Some(guard) = self.coordinator.begin_manifest_fetch_in(epoch) else {
            debug!(url = %url, epoch, "Sprite manifest fetch already in flight or session changed");
            return;
        };
        let this = Arc::clone(self);
        self.runtime.spawn(async move {
            this.run_manifest_fetch(url, guard).await;
        });
    }

    fn start_sprite_fetch(self: &Arc<Self>, epoch: u64, url: String) {
        let Some(guard) = self.coordinator.begin_image_download_in(&url, epoch) else {
            debug!(url = %url, epoch, "Sprite sheet download already in flight or session changed");
            return;
        };
        let this = Arc::clone(self);
        self.runtime.spawn(async move {
            this.run_sprite_fetch(url, guard).await;
        });
    }

    async fn run_manifest_fetch(self: Arc<Self>, url: String, guard: ManifestFetchGuard) {
        let result = self.transport.fetch_manifest(&url).await;

        let epoch = guard.epoch();
        let stale = !guard.is_current();
        drop(guard);
        if stale {
            debug!(url = %url, epoch, "Discarding sprite manifest from a previous session");
            return;
        }

        let entries = match result.and_then(|body| parse_manifest(&body)) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(url = %url, error = %e, "Sprite manifest fetch failed");
                self.notify_in_epoch(epoch, e.code(), self.coordinator.current_request(), None);
                return;
            }
        };

        {
            let mut state = self.state.lock();
            if !self.coordinator.is_current_epoch(epoch) {
                return;
            }
            debug!(url = %url, entries = entries.len(), "Sprite manifest installed");
            state.manifest.replace_all(entries);
        }

        let offset = self.coordinator.current_request();
        let step = self.plan(offset, OnMissingManifest::Fail);
        if !self.coordinator.is_current_epoch(epoch) {
            debug!(offset, epoch, "Session changed before the manifest answer was delivered");
            return;
        }
        self.execute(offset, step);
    }

    async fn run_sprite_fetch(self: Arc<Self>, url: String, guard: ImageDownloadGuard) {
        let result = self.transport.fetch_sprite(&url).await;

        let epoch = guard.epoch();
        let stale = !guard.is_current();
        drop(guard);
        if stale {
            debug!(url = %url, epoch, "Discarding sprite sheet from a previous session");
            return;
        }

        let body = match result {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %url, error = %e, "Sprite sheet fetch failed");
                self.notify_in_epoch(epoch, e.code(), self.coordinator.current_request(), None);
                return;
            }
        };

        let sheet = match tokio::task::spawn_blocking(move || SpriteSheet::decode(&body)).await {
            Ok(Ok(sheet)) => Arc::new(sheet),
            Ok(Err(e)) => {
                warn!(url = %url, error = %e, "Sprite sheet decode failed");
                self.notify_in_epoch(epoch, e.code(), self.coordinator.current_request(), None);
                return;
            }
            Err(e) => {
                error!(url = %url, error = %e, "Sprite sheet decode task failed");
                self.notify_in_epoch(epoch, FetchCode::ServerError, self.coordinator.current_request(), None);
                return;
            }
        };

        {
            let mut state = self.state.lock();
            if !self.coordinator.is_current_epoch(epoch) {
                sheet.recycle();
                return;
            }
            let (width, height) = sheet.dimensions();
            debug!(url = %url, width, height, "Sprite sheet cached");
            state.cache.put_big(url, sheet);
        }

        let offset = self.coordinator.current_request();
        match self.crop_from_cache(offset) {
            Some(thumbnail) => self.notify_in_epoch(epoch, FetchCode::Success, offset, Some(thumbnail)),
            None => {
                warn!(offset, "No thumbnail could be cropped for the current offset");
                self.notify_in_epoch(epoch, FetchCode::ServerError, offset, None);
            }
        }
    }

    /// Answer `offset` from the caches only.
    fn crop_from_cache(&self, offset: i64) -> Option<Thumbnail> {
        match self.plan(offset, OnMissingManifest::Fail) {
            Step::Deliver(FetchCode::Success, image) => image,
            Step::Crop { epoch, sheet, rect, .. } => {
                let thumbnail = sheet.crop(rect)?;
                self.cache_thumbnail(epoch, offset, thumbnail.clone());
                Some(thumbnail)
            }
            _ => None,
        }
    }

    fn cache_thumbnail(&self, epoch: u64, offset: i64, thumbnail: Thumbnail) {
        let mut state = self.state.lock();
        if self.coordinator.is_current_epoch(epoch) {
            state.cache.put_small(offset, thumbnail);
        }
    }

    /// Deliver a completion result unless the session moved on while it ran.
    fn notify_in_epoch(&self, epoch: u64, code: FetchCode, offset: i64, image: Option<Thumbnail>) {
        if !self.coordinator.is_current_epoch(epoch) {
            debug!(code = %code, offset, epoch, "Dropping result from a previous session");
            return;
        }
        self.notify(code, offset, image);
    }

    fn notify(&self, code: FetchCode, offset: i64, image: Option<Thumbnail>) {
        debug!(code = %code, offset, "Delivering thumbnail result");
        let callback = self.callback.read().clone();
        match callback {
            Some(callback) => callback.on_fetch_done(FetchResult { code, offset, image }),
            None => debug!(offset, "No fetch callback registered, result dropped"),
        }
    }
}
