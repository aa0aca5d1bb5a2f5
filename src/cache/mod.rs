pub mod audio;
pub mod store;

pub use audio::{AudioCache, Transcriber};
pub use store::{CacheSpace, CacheStore, JsonDirStore, MemoryStore};
