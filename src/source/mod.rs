//! # Video Sources
//!
//! Turns a remote post identifier or an uploaded byte buffer into exactly one
//! local video file. Remote media is fetched by an external scraper behind the
//! [`RemoteFetcher`] trait, which reports the files it produced.

pub mod fetcher;
pub mod resolver;

pub use fetcher::{InstaloaderFetcher, RemoteFetcher, YtDlpFetcher};
pub use resolver::{ResolvedSource, SourceResolver};
