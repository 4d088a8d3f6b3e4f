use std::sync::Arc;

use chrono::Utc;
use log::error;
use serde_json::json;

use crate::cache::{
    ContentCache,
    Promise,
};
use crate::codec;
use crate::pool::Workers;
use crate::ratelimit::RateLimiter;
use crate::record::Record;
use crate::store::ContentStore;
use crate::token;
use crate::token::TokenGenerator;
use crate::trace;

/// Everything the request handlers need, shared across the HTTP workers.
pub struct App {
    pub store: Arc<ContentStore>,
    pub cache: ContentCache,
    pub tokens: TokenGenerator,
    pub post_limit: RateLimiter,
    pub read_limit: RateLimiter,
    pub io_pool: Arc<Workers>,
    pub log_pool: Arc<Workers>,
    /// Lifetime granted to new records, in milliseconds.
    pub lifetime_ms: i64,
    /// Stored-size cap per record, in bytes.
    pub max_content_length: usize,
}

#[derive(Debug, PartialEq)]
/// Status codes to represent the result of a request.
pub enum RequestResultType {
    /// New record accepted.
    Created,
    /// Record has been found.
    Found,
    /// Invalid input from client.
    InputError,
    /// No record behind the requested path.
    NotFound,
    /// Stored form of the record exceeds the size cap.
    TooLarge,
    /// Client exhausted its request budget.
    RateLimited,
    /// Record could not be uncompressed for the client.
    DecodeError,
}

/// Interface to interpret and build the response for a request.
pub struct RequestResult {
    /// Result code of the request.
    pub typ: RequestResultType,
    /// Plain text or json body to send to the client.
    pub v: Option<String>,
    /// Record backing a retrieval response.
    pub record: Option<Arc<Record>>,
    /// Body to serve when the record is sent uncompressed.
    pub body: Option<Vec<u8>>,
    /// Whether the stored form is served as-is with a gzip content encoding.
    pub compressed: bool,
    /// Key of a newly created record.
    pub key: Option<String>,
    /// Expiry of the record behind the response.
    pub expiry: Option<i64>,
}

impl RequestResult {
    pub fn new(typ: RequestResultType) -> RequestResult {
        RequestResult {
            typ: typ,
            v: None,
            record: None,
            body: None,
            compressed: false,
            key: None,
            expiry: None,
        }
    }

    pub fn with_content(mut self, s: String) -> RequestResult {
        self.v = Some(s);
        self
    }

    pub fn with_record(mut self, record: Arc<Record>) -> RequestResult {
        self.expiry = Some(record.expiry);
        self.record = Some(record);
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> RequestResult {
        self.body = Some(body);
        self
    }

    pub fn with_key(mut self, key: String) -> RequestResult {
        self.key = Some(key);
        self
    }

    pub fn with_expiry(mut self, expiry: i64) -> RequestResult {
        self.expiry = Some(expiry);
        self
    }

    pub fn compressed(mut self) -> RequestResult {
        self.compressed = true;
        self
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Accept an upload and schedule its save.
///
/// The body is size-checked against its stored form: a body the client
/// already gzipped passes through, an oversized plain body is compressed
/// here so the check is meaningful, and everything else is compressed later
/// on the i/o pool. The new key is readable from the cache as soon as this
/// returns; durability follows asynchronously.
///
/// # Arguments
///
/// * `app` - Shared service state.
/// * `body` - The uploaded content.
/// * `media_type` - Declared MIME type of the content.
/// * `already_compressed` - Whether the client sent a gzip body.
/// * `ip` - Client address for rate limiting and the access log.
/// * `user_agent` - Client user agent, for the access log only.
pub fn process_post(app: &App, body: Vec<u8>, media_type: String, already_compressed: bool, ip: &str, user_agent: Option<String>) -> RequestResult {
    if body.is_empty() {
        return RequestResult::new(RequestResultType::InputError)
            .with_content(String::from("Missing content"));
    }
    if app.post_limit.check(ip) {
        return RequestResult::new(RequestResultType::RateLimited)
            .with_content(String::from("Rate limit exceeded"));
    }

    let key = app.tokens.generate();

    let mut body = body;
    let mut requires_compression = false;
    if !already_compressed {
        if body.len() > app.max_content_length {
            // compress now so the size check runs against the stored form
            body = match codec::compress(&body) {
                Ok(v) => v,
                Err(e) => {
                    error!("compress failed: {}", e);
                    return RequestResult::new(RequestResultType::NotFound)
                        .with_content(String::from("Invalid path"));
                },
            };
        } else {
            requires_compression = true;
        }
    }

    if body.len() > app.max_content_length {
        return RequestResult::new(RequestResultType::TooLarge)
            .with_content(String::from("Content too large"));
    }

    let expiry = now_ms() + app.lifetime_ms;

    trace::log_post(
        &app.log_pool,
        key.clone(),
        media_type.clone(),
        String::from(ip),
        user_agent,
        body.len(),
        requires_compression,
    );

    let promise = Arc::new(Promise::new());
    app.cache.put(&key, promise.clone());

    let store = app.store.clone();
    let cache = app.cache.clone();
    let save_key = key.clone();
    app.io_pool.execute(move || {
        store.save(&save_key, media_type, body, expiry, requires_compression, &promise);
        // reinsert so the cache accounts the resolved weight
        cache.put(&save_key, promise);
    });

    let reply = json!({"key": key.as_str()}).to_string();
    RequestResult::new(RequestResultType::Created)
        .with_key(key)
        .with_expiry(expiry)
        .with_content(reply)
}

/// Serve a stored record.
///
/// # Arguments
///
/// * `app` - Shared service state.
/// * `path` - Request path with the leading slash stripped.
/// * `accepts_gzip` - Whether the client advertised gzip support.
/// * `ip` - Client address for rate limiting and the access log.
/// * `user_agent` - Client user agent, for the access log only.
pub fn process_get(app: &App, path: &str, accepts_gzip: bool, ip: &str, user_agent: Option<String>) -> RequestResult {
    if path.is_empty() || path.contains('.') || !token::is_valid(path) {
        return RequestResult::new(RequestResultType::NotFound)
            .with_content(String::from("Invalid path"));
    }
    if app.read_limit.check(ip) {
        return RequestResult::new(RequestResultType::RateLimited)
            .with_content(String::from("Rate limit exceeded"));
    }

    trace::log_read(
        &app.log_pool,
        String::from(path),
        String::from(ip),
        user_agent,
        accepts_gzip,
    );

    let record = match app.cache.get(path) {
        Ok(v) => v,
        Err(_) => {
            // already logged by the loader
            return RequestResult::new(RequestResultType::NotFound)
                .with_content(String::from("Invalid path"));
        },
    };

    if record.is_empty() || record.body.is_empty() {
        return RequestResult::new(RequestResultType::NotFound)
            .with_content(String::from("Invalid path"));
    }

    if accepts_gzip {
        return RequestResult::new(RequestResultType::Found)
            .with_record(record)
            .compressed();
    }

    match codec::decompress(&record.body) {
        Ok(v) => {
            RequestResult::new(RequestResultType::Found)
                .with_record(record)
                .with_body(v)
        },
        Err(e) => {
            error!("cannot uncompress {}: {}", record.key, e);
            RequestResult::new(RequestResultType::DecodeError)
                .with_content(String::from("Unable to uncompress data"))
        },
    }
}
