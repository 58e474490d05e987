//! Image byte fetching for photos and avatars
//!
//! Photo records only carry URLs; the bytes are fetched on demand by an
//! [`ImageDownloader`] and kept in an [`ImageCache`] (memory, optionally
//! backed by disk). Callers usually keep one cache for photos and one for
//! avatars.

mod downloader;
mod store;

pub use downloader::{FetchedImage, ImageDownloader};
pub use store::{DiskStore, ImageCache, ImageStore, MemoryStore};
