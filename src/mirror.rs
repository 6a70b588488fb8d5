//! Background worker that mirrors classified images into per-class folders.
//!
//! Jobs are handled one at a time in submission order, so a removal queued
//! after a copy of the same file always runs after it. Failures are logged
//! and otherwise dropped: the result table is authoritative, the mirror is a
//! convenience.

use crossbeam_channel::{Receiver, Sender};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use tracing::{debug, error, warn};

#[derive(Debug)]
pub enum MirrorJob {
    Copy { src: PathBuf, dst: PathBuf },
    Remove { path: PathBuf },
    /// Acknowledged once every job queued before it has run
    Flush(Sender<()>),
}

#[derive(Debug)]
pub struct FileMirror {
    tx: Option<Sender<MirrorJob>>,
    handle: Option<JoinHandle<()>>,
}

impl FileMirror {
    pub fn spawn() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = std::thread::Builder::new()
            .name("file-mirror".into())
            .spawn(move || run(rx));
        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("Could not start the copy worker, class folders will not be filled: {e}");
                None
            }
        };
        Self {
            tx: handle.as_ref().map(|_| tx),
            handle,
        }
    }

    fn send(&self, job: MirrorJob) {
        if let Some(tx) = &self.tx {
            if let Err(e) = tx.send(job) {
                warn!("Copy worker is gone, dropping {:?}", e.into_inner());
            }
        }
    }

    /// Queue a copy of `src` to `dst`; the parent folder is created if needed
    pub fn copy(&self, src: &Path, dst: &Path) {
        self.send(MirrorJob::Copy {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
        });
    }

    /// Queue the removal of `path`; a missing file is not an error
    pub fn remove(&self, path: &Path) {
        self.send(MirrorJob::Remove {
            path: path.to_path_buf(),
        });
    }

    /// Block until every job queued so far has run
    pub fn flush(&self) {
        let Some(tx) = &self.tx else { return };
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        if tx.send(MirrorJob::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }
}

impl Drop for FileMirror {
    fn drop(&mut self) {
        // closing the channel ends the worker loop once the queue is drained
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Copy worker panicked");
            }
        }
    }
}

fn run(rx: Receiver<MirrorJob>) {
    for job in rx {
        match job {
            MirrorJob::Copy { src, dst } => {
                if let Some(parent) = dst.parent() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        warn!("Cannot create {}: {e}", parent.display());
                        continue;
                    }
                }
                match std::fs::copy(&src, &dst) {
                    Ok(_) => debug!("Copied {} -> {}", src.display(), dst.display()),
                    Err(e) => warn!("Copy {} -> {} failed: {e}", src.display(), dst.display()),
                }
            }
            MirrorJob::Remove { path } => match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Cannot remove {}: {e}", path.display()),
            },
            MirrorJob::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("Copy worker stopped");
}
