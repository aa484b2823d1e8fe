//! Podcast feed editor: load an RSS/Atom podcast feed, edit it, regenerate an
//! RSS 2.0 document and publish it to S3.
//!
//! - [`feed`] - feed model, tolerant reader, normalizer, serializer, fetcher
//! - [`publish`] - S3 publishing behind the [`publish::Publisher`] trait
//! - [`server`] - axum HTTP API
//! - [`config`] - TOML file plus environment overrides

pub mod config;
pub mod feed;
pub mod publish;
pub mod server;
pub mod util;
