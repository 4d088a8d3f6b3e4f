use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use env_logger;
use log::{
    error,
    info,
};

use kiste::arg::Settings;
use kiste::config;
use kiste::server;

fn main() {
    env_logger::init();

    let settings = Settings::from_args();

    let config_path = match &settings.config {
        Some(v) => v.clone(),
        None => PathBuf::from("config.json"),
    };
    let mut config = match config::load(&config_path) {
        Ok(v) => v,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        },
    };
    match settings.host {
        Some(v) => {
            config.host = v;
        },
        None => {},
    };
    match settings.port {
        Some(v) => {
            config.port = v;
        },
        None => {},
    };

    let service = match server::build(config, &settings.dir) {
        Ok(v) => v,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        },
    };
    info!("listening on {}:{}", service.config.host, service.port());

    let service = Arc::new(service);
    let handles = server::start(service);
    for h in handles {
        match h.join() {
            Ok(_) => {},
            Err(_) => {
                error!("http worker died");
            },
        };
    }
}
