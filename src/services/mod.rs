pub mod thumbnail;

pub use thumbnail::{ServiceStats, ThumbnailConfig, ThumbnailService, ThumbnailServiceBuilder};
