use std::net::IpAddr;

use log::info;

use crate::pool::Workers;

// Resolution and formatting happen on the log worker so a slow PTR lookup
// never holds up a request handler.

fn resolve_hostname(ip: &str) -> Option<String> {
    let addr: IpAddr = match ip.parse() {
        Ok(v) => v,
        Err(_) => {
            return None;
        },
    };
    match dns_lookup::lookup_addr(&addr) {
        Ok(v) => {
            if v == ip {
                return None;
            }
            Some(v)
        },
        Err(_) => None,
    }
}

fn origin_line(ip: &str) -> String {
    match resolve_hostname(ip) {
        Some(v) => format!("{} ({})", ip, v),
        None => String::from(ip),
    }
}

/// Queue an access log entry for an accepted upload.
pub fn log_post(pool: &Workers, key: String, media_type: String, ip: String, user_agent: Option<String>, size: usize, requires_compression: bool) {
    pool.execute(move || {
        info!("[POST]");
        info!("    key = {}", key);
        info!("    type = {}", media_type);
        info!("    user agent = {}", user_agent.unwrap_or_else(|| String::from("null")));
        info!("    origin = {}", origin_line(&ip));
        info!("    content size = {} KB", size / 1024);
        info!("    compressed = {}", !requires_compression);
    });
}

/// Queue an access log entry for a retrieval.
pub fn log_read(pool: &Workers, key: String, ip: String, user_agent: Option<String>, accepts_gzip: bool) {
    pool.execute(move || {
        info!("[REQUEST]");
        info!("    key = {}", key);
        info!("    user agent = {}", user_agent.unwrap_or_else(|| String::from("null")));
        info!("    origin = {}", origin_line(&ip));
        info!("    supports compression = {}", accepts_gzip);
    });
}
