// Timeshift sprite thumbnails
//
// Resolves a playback offset inside a recorded live stream to a thumbnail cut
// from the stream's sprite sheets, fetching the sprite manifest and sheets
// over HTTP on demand and caching both decoded sheets and cropped tiles.
//
// Layout:
// - manifest / tile: manifest model and offset-to-tile arithmetic
// - sprite / cache: decoded sheets and the two-tier LRU cache
// - coordinator: single-flight guards and the current-request cell
// - transport: HTTP boundary
// - fetcher: orchestration and the public API

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod manifest;
pub mod session;
pub mod sprite;
pub mod tile;
pub mod transport;

pub use cache::SpriteCache;
pub use config::{Config, FetcherConfig, LoggingConfig};
pub use coordinator::RequestCoordinator;
pub use error::{Error, FetchCode, Result};
pub use fetcher::{ChannelCallback, FetchCallback, FetchResult, SpriteFetcher};
pub use manifest::{ManifestEntry, ManifestStore};
pub use session::Session;
pub use sprite::{SpriteSheet, Thumbnail};
pub use tile::{TileLocation, TileRect};
pub use transport::{HttpTransport, Transport};
