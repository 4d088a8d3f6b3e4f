use std::io::Read;
use std::sync::Arc;

use tempfile::tempdir;
use tempfile::TempDir;

use kiste::codec;
use kiste::config::Config;
use kiste::server;
use kiste::server::Service;

fn start(mut config: Config) -> (Arc<Service>, TempDir, String) {
    let d = tempdir().unwrap();
    config.port = 0;
    let service = Arc::new(server::build(config, d.path()).unwrap());
    server::start(service.clone());
    let base = format!("http://127.0.0.1:{}", service.port());
    (service, d, base)
}

fn read_body(res: ureq::Response) -> Vec<u8> {
    let mut buf: Vec<u8> = vec!();
    res.into_reader().read_to_end(&mut buf).unwrap();
    buf
}

#[test]
fn test_post_get_roundtrip() {
    let (_service, _d, base) = start(Config::default());

    let res = ureq::post(&format!("{}/post", base))
        .set("Content-Type", "text/plain")
        .send_bytes(b"hello")
        .unwrap();
    assert_eq!(res.status(), 201);
    let key = res.header("Location").unwrap().to_string();
    assert_eq!(key.len(), 7);
    assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
    assert!(res.header("Expiry").is_some());
    assert_eq!(res.header("Access-Control-Allow-Origin"), Some("*"));
    let body = String::from_utf8(read_body(res)).unwrap();
    assert_eq!(body, format!("{{\"key\":\"{}\"}}", key));

    // compressed form for a gzip-capable client
    let res = ureq::get(&format!("{}/{}", base, key))
        .set("Accept-Encoding", "gzip")
        .call()
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.header("Content-Encoding"), Some("gzip"));
    assert_eq!(res.header("Content-Type"), Some("text/plain"));
    assert_eq!(res.header("Cache-Control"), Some("public, max-age=86400"));
    assert!(res.header("Expires").is_some());
    let body = read_body(res);
    assert_eq!(codec::decompress(&body).unwrap(), b"hello".to_vec());

    // plain form otherwise
    let res = ureq::get(&format!("{}/{}", base, key)).call().unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.header("Content-Encoding").is_none());
    assert_eq!(read_body(res), b"hello".to_vec());
}

#[test]
fn test_media_type_echo() {
    let (_service, _d, base) = start(Config::default());

    let res = ureq::post(&format!("{}/post", base))
        .set("Content-Type", "application/json")
        .send_bytes(b"{\"a\": 1}")
        .unwrap();
    let key = res.header("Location").unwrap().to_string();

    let res = ureq::get(&format!("{}/{}", base, key)).call().unwrap();
    assert_eq!(res.header("Content-Type"), Some("application/json"));

    // absent content type defaults to text/plain
    let res = ureq::post(&format!("{}/post", base))
        .send_bytes(b"untyped")
        .unwrap();
    let key = res.header("Location").unwrap().to_string();
    let res = ureq::get(&format!("{}/{}", base, key)).call().unwrap();
    assert_eq!(res.header("Content-Type"), Some("text/plain"));
}

#[test]
fn test_post_empty_body() {
    let (_service, _d, base) = start(Config::default());

    let r = ureq::post(&format!("{}/post", base)).send_bytes(b"");
    match r {
        Err(ureq::Error::Status(code, res)) => {
            assert_eq!(code, 400);
            assert_eq!(res.into_string().unwrap(), "Missing content");
        },
        _ => panic!("expected status error"),
    };
}

#[test]
fn test_post_too_large() {
    let mut config = Config::default();
    config.max_content_length_mb = 1;
    let (_service, d, base) = start(config);

    // 2 MB that gzip cannot save
    let mut x: u32 = 0xcafef00d;
    let body: Vec<u8> = (0..2 * 1024 * 1024).map(|_| {
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        (x & 0xff) as u8
    }).collect();

    let r = ureq::post(&format!("{}/post", base)).send_bytes(&body);
    match r {
        Err(ureq::Error::Status(code, res)) => {
            assert_eq!(code, 413);
            assert_eq!(res.into_string().unwrap(), "Content too large");
        },
        _ => panic!("expected status error"),
    };

    let count = std::fs::read_dir(d.path().join("content")).unwrap().count();
    assert_eq!(count, 0);
}

#[test]
fn test_post_rate_limit() {
    let mut config = Config::default();
    config.post_rate_limit = 3;
    let (_service, _d, base) = start(config);

    for _ in 0..3 {
        let res = ureq::post(&format!("{}/post", base))
            .set("x-real-ip", "203.0.113.7")
            .send_bytes(b"x")
            .unwrap();
        assert_eq!(res.status(), 201);
    }
    let r = ureq::post(&format!("{}/post", base))
        .set("x-real-ip", "203.0.113.7")
        .send_bytes(b"x");
    match r {
        Err(ureq::Error::Status(code, res)) => {
            assert_eq!(code, 429);
            assert_eq!(res.into_string().unwrap(), "Rate limit exceeded");
        },
        _ => panic!("expected status error"),
    };

    // another client address still gets through
    let res = ureq::post(&format!("{}/post", base))
        .set("x-real-ip", "203.0.113.8")
        .send_bytes(b"x")
        .unwrap();
    assert_eq!(res.status(), 201);
}

#[test]
fn test_invalid_paths() {
    let (_service, _d, base) = start(Config::default());

    for path in ["abc.def", "foo$", "foo%20bar"] {
        let r = ureq::get(&format!("{}/{}", base, path)).call();
        match r {
            Err(ureq::Error::Status(code, res)) => {
                assert_eq!(code, 404);
                assert_eq!(res.into_string().unwrap(), "Invalid path");
            },
            _ => panic!("expected status error for {}", path),
        };
    }

    let r = ureq::get(&format!("{}/{}", base, "no5uch0")).call();
    match r {
        Err(ureq::Error::Status(code, _)) => {
            assert_eq!(code, 404);
        },
        _ => panic!("expected status error"),
    };
}

#[test]
fn test_query_string_ignored() {
    let (_service, _d, base) = start(Config::default());

    let res = ureq::post(&format!("{}/post", base))
        .send_bytes(b"hello")
        .unwrap();
    let key = res.header("Location").unwrap().to_string();

    let res = ureq::get(&format!("{}/{}?x=1", base, key)).call().unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(read_body(res), b"hello".to_vec());

    let res = ureq::get(&format!("{}/?utm=1", base)).call().unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.header("Content-Type"), Some("text/html; charset=utf-8"));
}

#[test]
fn test_index_page() {
    let (_service, _d, base) = start(Config::default());

    let res = ureq::get(&format!("{}/", base)).call().unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.header("Content-Type"), Some("text/html; charset=utf-8"));
    assert!(res.into_string().unwrap().contains("<html"));
}

#[test]
fn test_preflight() {
    let (_service, _d, base) = start(Config::default());

    let res = ureq::request("OPTIONS", &format!("{}/post", base)).call().unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.header("Access-Control-Allow-Methods"), Some("POST"));
    assert_eq!(res.header("Access-Control-Allow-Headers"), Some("Content-Type"));
    assert_eq!(res.header("Access-Control-Max-Age"), Some("86400"));

    let res = ureq::request("OPTIONS", &format!("{}/abc1234", base)).call().unwrap();
    assert_eq!(res.header("Access-Control-Allow-Methods"), Some("GET"));
}

#[test]
fn test_gzip_upload_passthrough() {
    let (_service, _d, base) = start(Config::default());

    let z = codec::compress(b"precompressed").unwrap();
    let res = ureq::post(&format!("{}/post", base))
        .set("Content-Encoding", "gzip")
        .set("Content-Type", "text/plain")
        .send_bytes(&z)
        .unwrap();
    assert_eq!(res.status(), 201);
    let key = res.header("Location").unwrap().to_string();

    let res = ureq::get(&format!("{}/{}", base, key))
        .set("Accept-Encoding", "gzip")
        .call()
        .unwrap();
    assert_eq!(read_body(res), z);
}

#[test]
fn test_restart_survival() {
    let d: TempDir;
    let key: String;
    {
        let (_service, d_inner, base) = start(Config::default());
        let res = ureq::post(&format!("{}/post", base))
            .send_bytes(b"durable")
            .unwrap();
        key = res.header("Location").unwrap().to_string();

        // wait for the queued save to land before "restarting"
        let fp = d_inner.path().join("content").join(&key);
        for _ in 0..100 {
            if fp.exists() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        assert!(fp.exists());
        d = d_inner;
    }
    let mut config = Config::default();
    config.port = 0;
    let service = Arc::new(server::build(config, d.path()).unwrap());
    server::start(service.clone());
    let base = format!("http://127.0.0.1:{}", service.port());

    let res = ureq::get(&format!("{}/{}", base, key)).call().unwrap();
    assert_eq!(read_body(res), b"durable".to_vec());
}
