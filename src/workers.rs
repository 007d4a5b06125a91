//! Fixed-size worker pool for cryptographic calls
//!
//! Signing and verification are CPU work; a [`CryptoPool`] moves that work
//! off the calling thread onto a fixed set of background workers. The pool
//! runs the same pure [`crate::jwa`] functions that run in-process, so
//! behavior is identical either way. When a signer or verifier carries a
//! pool, every one of its calls becomes asynchronous.

use std::{sync::Arc, thread};

use crossbeam_channel::Sender;
use futures::channel::oneshot;
use parking_lot::Mutex;
use tracing::debug;

use crate::{
    error::{self, Error},
    jwa::{self, Algorithm},
    key::Key,
};

enum Job {
    Sign {
        algorithm: Algorithm,
        key: Key,
        input: Vec<u8>,
        reply: oneshot::Sender<Result<Vec<u8>, Error>>,
    },
    Verify {
        algorithm: Algorithm,
        key: Key,
        input: Vec<u8>,
        signature: Vec<u8>,
        reply: oneshot::Sender<Result<bool, Error>>,
    },
}

struct PoolInner {
    tx: Sender<Job>,
    handles: Vec<thread::JoinHandle<()>>,
}

/// A fixed-size pool of crypto worker threads
///
/// `start` and `stop` are both idempotent. A stopped pool lets queued jobs
/// drain before its workers exit; dispatching to a pool that was never
/// started starts it first.
pub struct CryptoPool {
    size: usize,
    inner: Mutex<Option<PoolInner>>,
}

impl std::fmt::Debug for CryptoPool {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("CryptoPool")
            .field("size", &self.size)
            .field("running", &self.inner.lock().is_some())
            .finish()
    }
}

impl CryptoPool {
    /// A pool of `size` workers, not yet started
    #[must_use]
    pub fn new(size: usize) -> Arc<Self> {
        Arc::new(Self {
            size: size.max(1),
            inner: Mutex::new(None),
        })
    }

    /// Starts the workers; a no-op when already running
    pub fn start(&self) {
        let mut inner = self.inner.lock();
        if inner.is_some() {
            return;
        }

        debug!(size = self.size, "starting crypto worker pool");
        let (tx, rx) = crossbeam_channel::unbounded::<Job>();
        let handles = (0..self.size)
            .map(|_| {
                let rx = rx.clone();
                thread::spawn(move || {
                    for job in rx {
                        match job {
                            Job::Sign {
                                algorithm,
                                key,
                                input,
                                reply,
                            } => {
                                // A dropped receiver abandons the job
                                let _ = reply.send(jwa::sign(algorithm, &key, &input));
                            }
                            Job::Verify {
                                algorithm,
                                key,
                                input,
                                signature,
                                reply,
                            } => {
                                let _ =
                                    reply.send(jwa::verify(algorithm, &key, &input, &signature));
                            }
                        }
                    }
                })
            })
            .collect();

        *inner = Some(PoolInner { tx, handles });
    }

    /// Stops the workers, draining queued jobs first; a no-op when already
    /// stopped
    pub fn stop(&self) {
        let inner = self.inner.lock().take();
        if let Some(PoolInner { tx, handles }) = inner {
            debug!("stopping crypto worker pool");
            drop(tx);
            for handle in handles {
                let _ = handle.join();
            }
        }
    }

    fn dispatch(&self, job: Job) {
        let mut inner = self.inner.lock();
        if inner.is_none() {
            drop(inner);
            self.start();
            inner = self.inner.lock();
        }
        let running = inner.as_ref().expect("pool was just started");
        // The receiver outlives this call; sending cannot fail
        let _ = running.tx.send(job);
    }

    pub(crate) async fn sign(
        &self,
        algorithm: Algorithm,
        key: Key,
        input: Vec<u8>,
    ) -> Result<Vec<u8>, Error> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(Job::Sign {
            algorithm,
            key,
            input,
            reply,
        });
        rx.await.map_err(error::sign_error)?
    }

    pub(crate) async fn verify(
        &self,
        algorithm: Algorithm,
        key: Key,
        input: Vec<u8>,
        signature: Vec<u8>,
    ) -> Result<bool, Error> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(Job::Verify {
            algorithm,
            key,
            input,
            signature,
            reply,
        });
        rx.await.map_err(error::verify_error)?
    }
}

impl Drop for CryptoPool {
    fn drop(&mut self) {
        self.stop();
    }
}
