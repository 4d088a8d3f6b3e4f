use std::sync::mpsc;
use std::sync::{
    Arc,
    Mutex,
};
use std::thread;

use log::error;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed set of named threads draining a shared job queue.
///
/// The service runs two of these: the i/o pool, which owns every blocking
/// disk operation, and a single-thread pool that serializes access log
/// emission. Threads exit when the pool is dropped and the queue drains.
pub struct Workers {
    tx: mpsc::Sender<Job>,
}

impl Workers {
    pub fn new(name: &str, size: usize) -> Workers {
        let size = size.max(1);
        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));
        for i in 0..size {
            let rx = rx.clone();
            let r = thread::Builder::new()
                .name(format!("{}-{}", name, i))
                .spawn(move || {
                    loop {
                        let job = {
                            let queue = rx.lock().unwrap();
                            queue.recv()
                        };
                        match job {
                            Ok(v) => v(),
                            Err(_) => break,
                        };
                    }
                });
            match r {
                Ok(_) => {},
                Err(e) => {
                    error!("cannot spawn worker thread: {}", e);
                },
            };
        }
        Workers {
            tx: tx,
        }
    }

    /// Queue a job for the next free worker.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) {
        match self.tx.send(Box::new(job)) {
            Ok(_) => {},
            Err(e) => {
                error!("worker pool is gone, dropping job: {}", e);
            },
        };
    }
}
