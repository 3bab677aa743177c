pub mod bounded;
pub mod sprite;

pub use bounded::{BoundedCache, EvictionHook};
pub use sprite::{SpriteCache, DEFAULT_BIG_CAPACITY, DEFAULT_SMALL_CAPACITY};
