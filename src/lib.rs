//! Daily image rotation - replaces yesterday's image set with a fresh batch
//!
//! Each run purges the previous day's images from the CDN and the metadata
//! store, fetches a batch of random portrait photos from Unsplash, uploads
//! them to the CDN in bounded groups and records each image by date.

pub mod app;
pub mod cdn;
pub mod config;
pub mod error;
pub mod metadata;
pub mod models;
pub mod provider;
pub mod retention;

pub use error::{Error, Result};
