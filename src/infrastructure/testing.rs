//! Test doubles for the configuration store.

use std::sync::mpsc::{Receiver, Sender};
use std::sync::Mutex;

use crate::domain::{AppError, Result};

use super::ConfigStore;

/// In-memory store returning a fixed dump and recording every load.
#[derive(Debug, Default)]
pub struct MemoryStore {
    dump: Vec<u8>,
    fail_dump: bool,
    fail_load: bool,
    loads: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryStore {
    pub fn with_dump(dump: &[u8]) -> Self {
        Self {
            dump: dump.to_vec(),
            ..Self::default()
        }
    }

    pub fn failing_dump() -> Self {
        Self {
            fail_dump: true,
            ..Self::default()
        }
    }

    pub fn failing_load() -> Self {
        Self {
            fail_load: true,
            ..Self::default()
        }
    }

    pub fn loads(&self) -> Vec<(String, Vec<u8>)> {
        self.loads.lock().unwrap().clone()
    }
}

impl ConfigStore for MemoryStore {
    fn dump(&self, _namespace: &str) -> Result<Vec<u8>> {
        if self.fail_dump {
            return Err(AppError::tool("memory", "dump exited with status 1"));
        }
        Ok(self.dump.clone())
    }

    fn load(&self, namespace: &str, data: &[u8]) -> Result<()> {
        if self.fail_load {
            return Err(AppError::tool("memory", "load exited with status 1"));
        }
        self.loads
            .lock()
            .unwrap()
            .push((namespace.to_string(), data.to_vec()));
        Ok(())
    }
}

/// Store whose `dump` blocks until released, to hold an operation in `Running`.
pub struct GatedStore {
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl GatedStore {
    /// Returns the store, a receiver signalled when `dump` is entered, and
    /// a sender that lets `dump` return.
    pub fn new() -> (Self, Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let store = Self {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };
        (store, entered_rx, release_tx)
    }
}

impl ConfigStore for GatedStore {
    fn dump(&self, _namespace: &str) -> Result<Vec<u8>> {
        let _ = self.entered.lock().unwrap().send(());
        let _ = self.release.lock().unwrap().recv();
        Ok(b"gated=true\n".to_vec())
    }

    fn load(&self, _namespace: &str, _data: &[u8]) -> Result<()> {
        Ok(())
    }
}
