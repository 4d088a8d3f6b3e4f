use std::str::FromStr;

use ascii::AsciiString;
use chrono::{
    TimeZone,
    Utc,
};
use log::{
    debug,
    error,
};
use tiny_http::{
    Header,
    HeaderField,
    Request,
    Response,
    StatusCode,
};

use crate::request::{
    RequestResult,
    RequestResultType,
};

/// Build a header, refusing values tiny_http cannot carry.
pub fn header(field: &str, value: &str) -> Option<Header> {
    let field = match HeaderField::from_str(field) {
        Ok(v) => v,
        Err(_) => {
            return None;
        },
    };
    let value = match AsciiString::from_ascii(value) {
        Ok(v) => v,
        Err(_) => {
            return None;
        },
    };
    Some(Header {
        field: field,
        value: value,
    })
}

/// Headers attached to every response.
pub fn origin_headers() -> Vec<Header> {
    let mut headers: Vec<Header> = vec!();
    match header("Access-Control-Allow-Origin", "*") {
        Some(v) => {
            headers.push(v);
        },
        None => {},
    };
    let server_header_v = format!("kiste/{}, tiny_http (Rust)", env!("CARGO_PKG_VERSION"));
    match header("Server", server_header_v.as_str()) {
        Some(v) => {
            headers.push(v);
        },
        None => {},
    };
    headers
}

/// Format an epoch-millisecond instant as an RFC 1123 HTTP date.
pub fn http_date(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(v) => v.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        None => String::new(),
    }
}

fn respond<R: std::io::Read>(req: Request, res: Response<R>) {
    match req.respond(res) {
        Ok(_) => {},
        Err(e) => {
            error!("cannot respond: {}", e);
        },
    };
}

/// Answer a CORS preflight.
pub fn preflight_response(req: Request, allowed_method: &str) {
    let mut res = Response::empty(StatusCode(200));
    for v in origin_headers() {
        res.add_header(v);
    }
    match header("Access-Control-Allow-Methods", allowed_method) {
        Some(v) => {
            res.add_header(v);
        },
        None => {},
    };
    match header("Access-Control-Allow-Headers", "Content-Type") {
        Some(v) => {
            res.add_header(v);
        },
        None => {},
    };
    match header("Access-Control-Max-Age", "86400") {
        Some(v) => {
            res.add_header(v);
        },
        None => {},
    };
    respond(req, res);
    debug!("served options request");
}

/// Map a handler result onto the wire.
pub fn exec_response(req: Request, r: RequestResult) {
    let res_status: StatusCode;
    match r.typ {
        RequestResultType::Created => {
            res_status = StatusCode(201);
        },
        RequestResultType::Found => {
            res_status = StatusCode(200);
        },
        RequestResultType::InputError => {
            res_status = StatusCode(400);
        },
        RequestResultType::NotFound => {
            res_status = StatusCode(404);
        },
        RequestResultType::TooLarge => {
            res_status = StatusCode(413);
        },
        RequestResultType::RateLimited => {
            res_status = StatusCode(429);
        },
        RequestResultType::DecodeError => {
            res_status = StatusCode(404);
        },
    };

    match r.typ {
        RequestResultType::Created => {
            let mut res = Response::from_data(r.v.unwrap_or_default().into_bytes());
            res = res.with_status_code(res_status);
            for v in origin_headers() {
                res.add_header(v);
            }
            match header("Content-Type", "application/json") {
                Some(v) => {
                    res.add_header(v);
                },
                None => {},
            };
            match r.key {
                Some(key) => {
                    match header("Location", key.as_str()) {
                        Some(v) => {
                            res.add_header(v);
                        },
                        None => {},
                    };
                },
                None => {},
            };
            match r.expiry {
                Some(expiry) => {
                    match header("Expiry", http_date(expiry).as_str()) {
                        Some(v) => {
                            res.add_header(v);
                        },
                        None => {},
                    };
                },
                None => {},
            };
            respond(req, res);
        },
        RequestResultType::Found => {
            let record = match r.record {
                Some(v) => v,
                None => {
                    let mut res = Response::from_string("Invalid path");
                    res = res.with_status_code(StatusCode(404));
                    for v in origin_headers() {
                        res.add_header(v);
                    }
                    respond(req, res);
                    return;
                },
            };
            let data = match r.compressed {
                true => record.body.clone(),
                false => r.body.unwrap_or_default(),
            };
            let mut res = Response::from_data(data);
            res = res.with_status_code(res_status);
            for v in origin_headers() {
                res.add_header(v);
            }
            match header("Content-Type", record.media_type.as_str()) {
                Some(v) => {
                    res.add_header(v);
                },
                None => {},
            };
            match header("Cache-Control", "public, max-age=86400") {
                Some(v) => {
                    res.add_header(v);
                },
                None => {},
            };
            match header("Expires", http_date(record.expiry).as_str()) {
                Some(v) => {
                    res.add_header(v);
                },
                None => {},
            };
            if r.compressed {
                match header("Content-Encoding", "gzip") {
                    Some(v) => {
                        res.add_header(v);
                    },
                    None => {},
                };
            }
            respond(req, res);
        },
        _ => {
            let mut res = Response::from_string(r.v.unwrap_or_default());
            res = res.with_status_code(res_status);
            for v in origin_headers() {
                res.add_header(v);
            }
            respond(req, res);
        },
    };
}

#[cfg(test)]
mod tests {
    use super::{
        header,
        http_date,
    };

    #[test]
    fn test_http_date() {
        assert_eq!(http_date(0), "Thu, 01 Jan 1970 00:00:00 GMT");
        assert_eq!(http_date(1700000000000), "Tue, 14 Nov 2023 22:13:20 GMT");
    }

    #[test]
    fn test_header_rejects_non_ascii() {
        assert!(header("Content-Type", "text/plain").is_some());
        assert!(header("Content-Type", "text/pläin").is_none());
    }
}
