use std::fs::{
    read_dir,
    remove_file,
};
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use log::{
    error,
    info,
};

use crate::pool::Workers;
use crate::store::ContentStore;

/// One pass over the content directory, deleting records past their
/// expiry. Only the record head is read, never the body. A failure on one
/// file is logged and does not stop the pass.
pub fn sweep(store: &ContentStore) {
    let entries = match read_dir(store.dir()) {
        Ok(v) => v,
        Err(e) => {
            error!("cannot scan content dir: {}", e);
            return;
        },
    };
    let now = Utc::now().timestamp_millis();
    for entry in entries {
        let entry = match entry {
            Ok(v) => v,
            Err(e) => {
                error!("cannot read dir entry: {}", e);
                continue;
            },
        };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let record = match store.load_meta(&path) {
            Ok(v) => v,
            Err(e) => {
                error!("cannot sweep {:?}: {}", path, e);
                continue;
            },
        };
        if record.should_expire(now) {
            match remove_file(&path) {
                Ok(_) => {
                    info!("expired: {}", record.key);
                },
                Err(e) => {
                    error!("cannot delete {:?}: {}", path, e);
                },
            };
        }
    }
}

/// Schedule a sweep on the i/o pool every `interval`, forever. Cache
/// entries for reaped keys are left to idle out on their own.
pub fn spawn(store: Arc<ContentStore>, pool: Arc<Workers>, interval: Duration) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name(String::from("kiste-sweep"))
        .spawn(move || {
            loop {
                thread::sleep(interval);
                let store = store.clone();
                pool.execute(move || {
                    sweep(&store);
                });
            }
        })
}
