use std::path::Path;
use std::sync::Arc;
use std::thread;

use log::error;
use thiserror::Error;
use tiny_http::{
    Method,
    Request,
    Response,
    Server,
    StatusCode,
};

use crate::cache::ContentCache;
use crate::config::Config;
use crate::pool::Workers;
use crate::ratelimit::RateLimiter;
use crate::request::{
    process_get,
    process_post,
    App,
    RequestResult,
    RequestResultType,
};
use crate::response;
use crate::store::ContentStore;
use crate::sweep;
use crate::token::TokenGenerator;

/// Threads looping on the accept queue. Handlers block on cache promises
/// while the i/o pool does the disk work, so a handful is plenty.
const HTTP_WORKERS: usize = 4;

const INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("cannot prepare storage: {0}")]
    Storage(String),
    #[error("cannot bind server: {0}")]
    Bind(String),
}

/// Assemble the shared state behind the handlers and start the sweeper.
///
/// # Arguments
///
/// * `config` - Resolved configuration.
/// * `data_dir` - Directory the content directory is created under.
pub fn build_app(config: &Config, data_dir: &Path) -> Result<App, ServiceError> {
    let tokens = match TokenGenerator::new(config.key_length) {
        Ok(v) => v,
        Err(e) => {
            return Err(ServiceError::Config(e.to_string()));
        },
    };
    let store = match ContentStore::new(&data_dir.join("content")) {
        Ok(v) => Arc::new(v),
        Err(e) => {
            return Err(ServiceError::Storage(e.to_string()));
        },
    };
    let io_pool = Arc::new(Workers::new("kiste-io", config.core_pool_size));
    let log_pool = Arc::new(Workers::new("kiste-log", 1));
    let cache = ContentCache::new(
        store.clone(),
        io_pool.clone(),
        config.cache_max_bytes(),
        config.cache_ttl(),
    );

    match sweep::spawn(store.clone(), io_pool.clone(), config.cache_ttl()) {
        Ok(_) => {},
        Err(e) => {
            return Err(ServiceError::Storage(e.to_string()));
        },
    };

    Ok(App {
        store: store,
        cache: cache,
        tokens: tokens,
        post_limit: RateLimiter::new(config.post_rate_period(), config.post_rate_limit),
        read_limit: RateLimiter::new(config.read_rate_period(), config.read_rate_limit),
        io_pool: io_pool,
        log_pool: log_pool,
        lifetime_ms: config.lifetime_ms(),
        max_content_length: config.max_content_length(),
    })
}

/// A bound server together with its shared handler state.
pub struct Service {
    pub config: Config,
    pub app: Arc<App>,
    server: Server,
}

/// Bind the listen socket and assemble the service.
pub fn build(config: Config, data_dir: &Path) -> Result<Service, ServiceError> {
    let app = Arc::new(build_app(&config, data_dir)?);
    let server = match Server::http((config.host.as_str(), config.port)) {
        Ok(v) => v,
        Err(e) => {
            return Err(ServiceError::Bind(e.to_string()));
        },
    };
    Ok(Service {
        config: config,
        app: app,
        server: server,
    })
}

impl Service {
    /// The port actually bound, which differs from the configured one when
    /// that was 0.
    pub fn port(&self) -> u16 {
        match self.server.server_addr().to_ip() {
            Some(v) => v.port(),
            None => 0,
        }
    }
}

/// Spawn the HTTP workers. The handles run until the server is dropped.
pub fn start(service: Arc<Service>) -> Vec<thread::JoinHandle<()>> {
    let mut handles = vec!();
    for i in 0..HTTP_WORKERS {
        let service = service.clone();
        let r = thread::Builder::new()
            .name(format!("kiste-http-{}", i))
            .spawn(move || {
                loop {
                    match service.server.recv() {
                        Ok(req) => {
                            handle_request(&service.app, req);
                        },
                        Err(e) => {
                            error!("{}", e);
                            break;
                        },
                    };
                }
            });
        match r {
            Ok(v) => {
                handles.push(v);
            },
            Err(e) => {
                error!("cannot spawn http worker: {}", e);
            },
        };
    }
    handles
}

/// Whether an Accept-Encoding value advertises gzip. Tokens are split on
/// a comma and a space, and matched whole.
fn accepts_compressed(header: &str) -> bool {
    header.split(", ").any(|v| v == "gzip")
}

fn handle_request(app: &App, mut req: Request) {
    let method = req.method().clone();
    // tiny_http keeps any query string in the url; routing and keys use
    // the path only
    let url = String::from(req.url());
    let url = match url.find('?') {
        Some(v) => String::from(&url[..v]),
        None => url,
    };

    let mut media_type: Option<String> = None;
    let mut already_compressed = false;
    let mut accepts_gzip = false;
    let mut real_ip: Option<String> = None;
    let mut user_agent: Option<String> = None;
    for h in req.headers() {
        let k = &h.field;
        if k.equiv("Content-Type") {
            media_type = Some(h.value.to_string());
        } else if k.equiv("Content-Encoding") {
            already_compressed = h.value.as_str() == "gzip";
        } else if k.equiv("Accept-Encoding") {
            accepts_gzip = accepts_compressed(h.value.as_str());
        } else if k.equiv("x-real-ip") {
            real_ip = Some(h.value.to_string());
        } else if k.equiv("User-Agent") {
            user_agent = Some(h.value.to_string());
        }
    }

    // behind a reverse proxy the socket peer is the proxy, not the client
    let ip = match real_ip {
        Some(v) => v,
        None => {
            match req.remote_addr() {
                Some(v) => v.ip().to_string(),
                None => String::from("unknown"),
            }
        },
    };

    match method {
        Method::Options => {
            let allowed_method = match url.as_str() {
                "/post" => "POST",
                _ => "GET",
            };
            response::preflight_response(req, allowed_method);
        },
        Method::Post => {
            if url != "/post" {
                let r = RequestResult::new(RequestResultType::NotFound)
                    .with_content(String::from("Invalid path"));
                response::exec_response(req, r);
                return;
            }
            let mut body: Vec<u8> = vec!();
            match req.as_reader().read_to_end(&mut body) {
                Ok(_) => {},
                Err(e) => {
                    error!("cannot read request body: {}", e);
                    let r = RequestResult::new(RequestResultType::NotFound)
                        .with_content(String::from("Invalid path"));
                    response::exec_response(req, r);
                    return;
                },
            };
            let media_type = match media_type {
                Some(v) => {
                    match v.is_ascii() && !v.is_empty() {
                        true => v,
                        false => mime::TEXT_PLAIN.to_string(),
                    }
                },
                None => mime::TEXT_PLAIN.to_string(),
            };
            let r = process_post(app, body, media_type, already_compressed, &ip, user_agent);
            response::exec_response(req, r);
        },
        Method::Get => {
            if url == "/" {
                index_response(req);
                return;
            }
            let path = match url.strip_prefix('/') {
                Some(v) => String::from(v),
                None => url,
            };
            let r = process_get(app, &path, accepts_gzip, &ip, user_agent);
            response::exec_response(req, r);
        },
        _ => {
            let r = RequestResult::new(RequestResultType::NotFound)
                .with_content(String::from("Invalid path"));
            response::exec_response(req, r);
        },
    };
}

fn index_response(req: Request) {
    let mut res = Response::from_data(INDEX_HTML.as_bytes().to_vec());
    res = res.with_status_code(StatusCode(200));
    for v in response::origin_headers() {
        res.add_header(v);
    }
    match response::header("Content-Type", "text/html; charset=utf-8") {
        Some(v) => {
            res.add_header(v);
        },
        None => {},
    };
    match req.respond(res) {
        Ok(_) => {},
        Err(e) => {
            error!("cannot respond: {}", e);
        },
    };
}

#[cfg(test)]
mod tests {
    use super::accepts_compressed;

    #[test]
    fn test_accepts_compressed() {
        assert!(accepts_compressed("gzip"));
        assert!(accepts_compressed("deflate, gzip"));
        assert!(accepts_compressed("gzip, deflate, br"));
        assert!(!accepts_compressed("deflate"));
        assert!(!accepts_compressed("gzip;q=0"));
        assert!(!accepts_compressed("x-gzip"));
    }
}
