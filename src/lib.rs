//! Kura: a personal media archive.
//!
//! Media files are identified by content digest, copied into a media store,
//! enriched with thumbnails and a resolved location, and grouped into derived
//! collections (month, day, camera, place, hashtag). GPX tracks supply
//! locations for photos that carry no coordinates of their own.

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod geocode;
pub mod import;
pub mod index;
pub mod logging;
pub mod model;
pub mod notify;
pub mod scanner;
pub mod storage;
pub mod track;

pub use app::Archive;
pub use config::Config;
pub use error::ImportError;
