// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Tunnel Launcher Contributors

//! Owner-thread executor
//!
//! Front ends require every property notification to arrive on one thread.
//! The core never assumes a GUI event loop; it only needs something that can
//! run closures on that designated thread.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};

/// Unit of work handed to the owner thread
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Marshals work onto the owner thread
pub trait Dispatcher: Send + Sync {
    /// Run `job` on the owner thread and wait for it to finish.
    /// Runs inline when already on the owner thread.
    fn invoke(&self, job: Job);

    /// Queue `job` on the owner thread without waiting
    fn begin_invoke(&self, job: Job);

    fn is_owner_thread(&self) -> bool;
}

/// A dedicated thread draining a FIFO job queue.
///
/// Jobs run in submission order. A panicking job is logged and does not
/// take the thread down.
pub struct OwnerThread {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

impl OwnerThread {
    pub fn spawn(name: &str) -> io::Result<Arc<Self>> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            for job in receiver {
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    tracing::error!("Owner thread job panicked");
                }
            }
            tracing::debug!("Owner thread queue closed");
        })?;

        Ok(Arc::new(Self {
            sender: Mutex::new(Some(sender)),
            thread_id: handle.thread().id(),
            handle: Mutex::new(Some(handle)),
        }))
    }

    /// Block until every job queued so far has run
    pub fn flush(&self) {
        self.invoke(Box::new(|| {}));
    }

    /// Close the queue and wait for the remaining jobs to drain.
    /// Does not join when called from the owner thread itself.
    pub fn shutdown(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        if self.is_owner_thread() {
            return;
        }
        let handle = self.handle.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::warn!("Owner thread exited with a panic");
            }
        }
    }
}

impl Dispatcher for OwnerThread {
    fn invoke(&self, job: Job) {
        if self.is_owner_thread() {
            job();
            return;
        }

        let (done_tx, done_rx) = mpsc::sync_channel::<()>(1);
        self.begin_invoke(Box::new(move || {
            job();
            let _ = done_tx.send(());
        }));
        // Err means the job was dropped unrun because the queue is closed
        let _ = done_rx.recv();
    }

    fn begin_invoke(&self, job: Job) {
        let sent = match self.sender.lock() {
            Ok(sender) => sender.as_ref().map(|s| s.send(job).is_ok()).unwrap_or(false),
            Err(_) => false,
        };
        if !sent {
            tracing::debug!("Owner thread is shut down, dropping job");
        }
    }

    fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

impl Drop for OwnerThread {
    fn drop(&mut self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_jobs_run_in_order_on_owner_thread() {
        let owner = OwnerThread::spawn("test-owner").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..50 {
            let seen = seen.clone();
            let owner_check = owner.clone();
            owner.begin_invoke(Box::new(move || {
                assert!(owner_check.is_owner_thread());
                seen.lock().unwrap().push(i);
            }));
        }
        owner.flush();

        assert_eq!(*seen.lock().unwrap(), (0..50).collect::<Vec<_>>());
        assert!(!owner.is_owner_thread());
    }

    #[test]
    fn test_invoke_from_owner_thread_runs_inline() {
        let owner = OwnerThread::spawn("test-owner").unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        let inner_owner = owner.clone();
        let inner_count = count.clone();
        owner.invoke(Box::new(move || {
            let nested_count = inner_count.clone();
            // Would deadlock if it queued instead of running inline
            inner_owner.invoke(Box::new(move || {
                nested_count.fetch_add(1, Ordering::SeqCst);
            }));
            inner_count.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_job_does_not_kill_thread() {
        let owner = OwnerThread::spawn("test-owner").unwrap();
        owner.begin_invoke(Box::new(|| panic!("boom")));

        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        owner.invoke(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invoke_after_shutdown_returns() {
        let owner = OwnerThread::spawn("test-owner").unwrap();
        owner.shutdown();
        // Must not hang
        owner.invoke(Box::new(|| {}));
    }
}
