//! Built-in configuration presets for common site themes.
//!
//! A preset only builds a [`SourceConfig`](crate::config::SourceConfig); the
//! result is registered like any hand-written configuration and can be
//! tweaked before that. Each preset is behind its own feature flag:
//!
//! - `preset-madara` - [`MadaraPreset`] for Madara WordPress sites
//! - `preset-mangathemesia` - [`MangaThemesiaPreset`] for MangaThemesia sites
//! - `all-presets` - both (default)
//!
//! ```bash
//! cargo build --no-default-features --features preset-madara
//! ```

#[cfg(feature = "preset-madara")]
pub mod madara;

#[cfg(feature = "preset-mangathemesia")]
pub mod mangathemesia;

#[cfg(feature = "preset-madara")]
pub use madara::MadaraPreset;

#[cfg(feature = "preset-mangathemesia")]
pub use mangathemesia::MangaThemesiaPreset;
