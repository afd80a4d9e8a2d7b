pub mod thumbnail;

pub use thumbnail::{ItemKey, Locator, ThumbnailRequest, ThumbnailResult};
