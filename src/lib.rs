#![crate_name = "kiste"]

//! kiste is a temporary content drop over HTTP.
//!
//! Content is uploaded by making a `POST` request to `/post`. The response
//! carries a short random key, and the content can then be fetched by anyone
//! who knows the key until it expires:
//!
//! ``` ignore,
//! $ curl -d 'hello' http://localhost:8080/post
//! {"key":"aB3xY9z"}
//! $ curl http://localhost:8080/aB3xY9z
//! hello
//! ```
//!
//! Content is stored gzipped on the local filesystem, one file per record
//! under the content directory, and survives restarts until the expiry
//! sweeper reaps it. The declared `Content-Type` is preserved and echoed
//! back on retrieval. A weight-bounded in-memory cache fronts the disk so
//! that hot keys are served without touching the filesystem.
//!
//! ## Running the daemon
//!
//! The daemon binds 127.0.0.1:8080 by default and reads further settings
//! from `config.json` in the working directory. See `cargo run -- --help`
//! for the argument options.

/// Command line settings.
pub mod arg;

/// Keys and defaults of the json configuration file.
pub mod config;

/// gzip helpers for content bodies.
pub mod codec;

/// A single content record and its on-disk encoding.
pub mod record;

/// Random key generation for new uploads.
pub mod token;

/// Per-client request budgets.
pub mod ratelimit;

/// Bounded worker pools for blocking jobs.
pub mod pool;

/// Filesystem persistence of content records.
pub mod store;

/// In-memory record cache with shared loads.
pub mod cache;

/// Handle upload and retrieval requests.
pub mod request;

/// Encapsulates an outgoing response to remote.
pub mod response;

/// Log served requests to the application log.
pub mod trace;

/// Delete expired records from the content directory.
pub mod sweep;

/// Service wiring and the HTTP surface.
pub mod server;
