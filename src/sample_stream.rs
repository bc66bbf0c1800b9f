//! Pull-based stream of assembled samples
//!
//! The producer side ([`SampleSender`]) pushes every [`VideoSample`] the
//! assembler emits into a bounded [`SampleRingBuffer`]. When consumers fall
//! behind, the oldest unread sample is evicted, so a live stream never
//! blocks the USB completion path.
//!
//! Consumers ([`SampleReceiver`]) pull samples oldest first, blocking
//! (`recv`), with a deadline (`recv_timeout`), without waiting (`try_recv`),
//! or from async code (`recv_async`).
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use uvc_stream::sample_stream::sample_channel;
//!
//! let (sender, receiver) = sample_channel(8)?;
//!
//! std::thread::spawn(move || {
//!     while let Ok(sample) = receiver.recv_timeout(Duration::from_millis(500)) {
//!         decode(sample);
//!     }
//! });
//!
//! for sample in assembler.process_packet(&packet)? {
//!     sender.send(sample);
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::pin::pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Notify;

use crate::frame_assembler::VideoSample;
use crate::ring_buffer::{RingBufferError, SampleRingBuffer};

/// Errors returned to consumers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecvError {
    /// No sample arrived before the deadline.
    #[error("timed out waiting for a sample")]
    Timeout,

    /// The producer is gone and every retained sample was consumed.
    #[error("sample stream closed")]
    Closed,

    /// The shared buffer lock was poisoned by a panicking thread.
    #[error("sample stream lock poisoned: {0}")]
    LockError(String),
}

/// Stream counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStats {
    /// Samples pushed by the producer
    pub pushed: u64,
    /// Samples taken by consumers
    pub pulled: u64,
    /// Samples evicted unread because the buffer was full
    pub evicted: u64,
}

struct Inner {
    ring: SampleRingBuffer<VideoSample>,
    closed: bool,
}

struct Shared {
    inner: Mutex<Inner>,
    available: Condvar,
    notify: Notify,
    pushed: AtomicU64,
    pulled: AtomicU64,
    evicted: AtomicU64,
}

impl Shared {
    fn lock(&self) -> Result<MutexGuard<'_, Inner>, RecvError> {
        self.inner
            .lock()
            .map_err(|e| RecvError::LockError(e.to_string()))
    }

    fn stats(&self) -> StreamStats {
        StreamStats {
            pushed: self.pushed.load(Ordering::Relaxed),
            pulled: self.pulled.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }

    /// Pop the oldest sample, or report why there is none
    fn take(&self, inner: &mut Inner) -> Option<Result<VideoSample, RecvError>> {
        match inner.ring.pop_oldest() {
            Some(sample) => {
                self.pulled.fetch_add(1, Ordering::Relaxed);
                Some(Ok(sample))
            }
            None if inner.closed => Some(Err(RecvError::Closed)),
            None => None,
        }
    }

    fn wake_all(&self) {
        self.available.notify_all();
        self.notify.notify_waiters();
    }
}

/// Create a connected producer/consumer pair retaining up to `capacity` samples
///
/// # Errors
///
/// Returns [`RingBufferError::ZeroCapacity`] if `capacity` is 0.
pub fn sample_channel(capacity: usize) -> Result<(SampleSender, SampleReceiver), RingBufferError> {
    let shared = Arc::new(Shared {
        inner: Mutex::new(Inner {
            ring: SampleRingBuffer::new(capacity)?,
            closed: false,
        }),
        available: Condvar::new(),
        notify: Notify::new(),
        pushed: AtomicU64::new(0),
        pulled: AtomicU64::new(0),
        evicted: AtomicU64::new(0),
    });
    log::debug!("Sample stream created with capacity {}", capacity);

    Ok((
        SampleSender {
            shared: Arc::clone(&shared),
        },
        SampleReceiver { shared },
    ))
}

/// Producer half; dropping it closes the stream
pub struct SampleSender {
    shared: Arc<Shared>,
}

impl SampleSender {
    /// Push a sample, evicting the oldest unread one if the buffer is full
    pub fn send(&self, sample: VideoSample) {
        {
            let mut inner = match self.shared.lock() {
                Ok(inner) => inner,
                Err(err) => {
                    log::error!("Dropping sample: {}", err);
                    return;
                }
            };
            if let Some(evicted) = inner.ring.push(sample) {
                self.shared.evicted.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "Sample buffer full, evicted unread {} byte sample",
                    evicted.len()
                );
            }
        }
        self.shared.pushed.fetch_add(1, Ordering::Relaxed);
        self.shared.wake_all();
    }

    /// Another consumer attached to this stream
    pub fn subscribe(&self) -> SampleReceiver {
        SampleReceiver {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Stream counters
    pub fn stats(&self) -> StreamStats {
        self.shared.stats()
    }

    /// Close the stream explicitly
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for SampleSender {
    fn drop(&mut self) {
        match self.shared.inner.lock() {
            Ok(mut inner) => inner.closed = true,
            Err(poisoned) => poisoned.into_inner().closed = true,
        }
        log::debug!("Sample stream closed");
        self.shared.wake_all();
    }
}

/// Consumer half; clones share the same queue and compete for samples
#[derive(Clone)]
pub struct SampleReceiver {
    shared: Arc<Shared>,
}

impl SampleReceiver {
    /// Take the oldest sample without waiting
    ///
    /// Returns `Ok(None)` when the stream is open but empty.
    ///
    /// # Errors
    ///
    /// Returns [`RecvError::Closed`] once the producer is gone and the
    /// buffer is drained.
    pub fn try_recv(&self) -> Result<Option<VideoSample>, RecvError> {
        let mut inner = self.shared.lock()?;
        self.shared.take(&mut inner).transpose()
    }

    /// Block until a sample is available
    ///
    /// # Errors
    ///
    /// Returns [`RecvError::Closed`] once the producer is gone and the
    /// buffer is drained.
    pub fn recv(&self) -> Result<VideoSample, RecvError> {
        let mut inner = self.shared.lock()?;
        loop {
            if let Some(result) = self.shared.take(&mut inner) {
                return result;
            }
            inner = self
                .shared
                .available
                .wait(inner)
                .map_err(|e| RecvError::LockError(e.to_string()))?;
        }
    }

    /// Block until a sample is available or `timeout` elapses
    ///
    /// A timeout too large to represent as a deadline waits indefinitely.
    ///
    /// # Errors
    ///
    /// Returns [`RecvError::Timeout`] at the deadline and
    /// [`RecvError::Closed`] once the stream is closed and drained.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<VideoSample, RecvError> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.recv();
        };
        let mut inner = self.shared.lock()?;
        loop {
            if let Some(result) = self.shared.take(&mut inner) {
                return result;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(RecvError::Timeout);
            }
            let (guard, _) = self
                .shared
                .available
                .wait_timeout(inner, remaining)
                .map_err(|e| RecvError::LockError(e.to_string()))?;
            inner = guard;
        }
    }

    /// Wait for a sample from async code
    ///
    /// Wrap in `tokio::time::timeout` to bound the wait.
    ///
    /// # Errors
    ///
    /// Returns [`RecvError::Closed`] once the producer is gone and the
    /// buffer is drained.
    pub async fn recv_async(&self) -> Result<VideoSample, RecvError> {
        loop {
            let mut notified = pin!(self.shared.notify.notified());
            // Register before checking so a send in between is not missed
            notified.as_mut().enable();
            if let Some(sample) = self.try_recv()? {
                return Ok(sample);
            }
            notified.await;
        }
    }

    /// Retained samples, oldest first, without consuming them
    ///
    /// # Errors
    ///
    /// Returns [`RecvError::LockError`] if the buffer lock is poisoned.
    pub fn snapshot(&self) -> Result<Vec<VideoSample>, RecvError> {
        Ok(self.shared.lock()?.ring.to_vec())
    }

    /// Samples waiting to be pulled
    pub fn len(&self) -> usize {
        self.shared.lock().map_or(0, |inner| inner.ring.len())
    }

    /// Whether no samples are waiting
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the producer is gone
    pub fn is_closed(&self) -> bool {
        self.shared.lock().map_or(true, |inner| inner.closed)
    }

    /// Stream counters
    pub fn stats(&self) -> StreamStats {
        self.shared.stats()
    }
}
