//! Handoff buffer between the fetch and analyze pools
//!
//! An unbounded crossbeam channel of fetched bodies. The buffer owns the
//! only sender; `close` drops it, so analyze workers see `Disconnected`
//! once the channel runs dry instead of mistaking a quiet moment for the
//! end of the stream.

use crate::pipeline::ResponseBody;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

const DRAIN_POLL: Duration = Duration::from_millis(5);

/// How a drain wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drain {
    /// Every buffered body was claimed
    Drained,
    /// Bodies remained when the timeout expired
    TimedOut,
    /// Bodies remained but nobody was left to claim them
    Abandoned,
}

#[derive(Debug)]
struct Channel {
    sender: Option<Sender<ResponseBody>>,
    receiver: Receiver<ResponseBody>,
}

impl Channel {
    fn open() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender: Some(sender),
            receiver,
        }
    }
}

/// FIFO of fetched-but-unanalyzed responses
#[derive(Debug)]
pub struct HandoffBuffer {
    channel: Mutex<Channel>,
    soft_limit: Option<usize>,
}

impl Default for HandoffBuffer {
    fn default() -> Self {
        Self::with_soft_limit(None)
    }
}

impl HandoffBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a buffer that warns once its length passes `soft_limit`
    ///
    /// Pushes above the limit are still accepted.
    pub fn with_soft_limit(soft_limit: Option<usize>) -> Self {
        Self {
            channel: Mutex::new(Channel::open()),
            soft_limit,
        }
    }

    // The sender slot is swapped whole, so a poisoned lock is still usable
    fn lock(&self) -> MutexGuard<'_, Channel> {
        self.channel.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a body, or hands it back if the buffer is closed
    pub fn push(&self, body: ResponseBody) -> Result<(), ResponseBody> {
        let channel = self.lock();
        let Some(sender) = &channel.sender else {
            return Err(body);
        };
        sender.send(body).map_err(|e| e.into_inner())?;

        if let Some(limit) = self.soft_limit {
            if sender.len() == limit + 1 {
                tracing::warn!(
                    "Handoff buffer exceeded {} responses; analyzers are falling behind",
                    limit
                );
            }
        }
        Ok(())
    }

    /// A consumer end of the current channel
    ///
    /// `recv_timeout` on it yields `Disconnected` once the buffer is closed
    /// and empty.
    pub fn receiver(&self) -> Receiver<ResponseBody> {
        self.lock().receiver.clone()
    }

    /// Drops the sender, rejecting further pushes
    pub fn close(&self) {
        self.lock().sender = None;
    }

    /// Accepts pushes again after a `close`
    ///
    /// Bodies left over from before the close move to the new channel ahead
    /// of anything pushed later. Receivers taken before the reopen stay on
    /// the old, disconnected channel.
    pub fn reopen(&self) {
        let mut channel = self.lock();
        if channel.sender.is_some() {
            return;
        }

        let fresh = Channel::open();
        let mut carried = 0;
        if let Some(sender) = &fresh.sender {
            for body in channel.receiver.try_iter() {
                // The receiver is held by `fresh`, so this cannot disconnect
                if sender.send(body).is_ok() {
                    carried += 1;
                }
            }
        }
        *channel = fresh;

        if carried > 0 {
            tracing::info!("Reopened handoff buffer with {} responses carried over", carried);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lock().sender.is_none()
    }

    pub fn len(&self) -> usize {
        self.lock().receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().receiver.is_empty()
    }

    /// Blocks until every buffered body has been claimed
    ///
    /// Gives up with `Abandoned` as soon as `consumers_alive` reports that no
    /// consumer remains, and with `TimedOut` once `timeout` expires.
    pub fn wait_drained(
        &self,
        timeout: Option<Duration>,
        consumers_alive: impl Fn() -> bool,
    ) -> Drain {
        let deadline = timeout.map(|t| Instant::now() + t);
        let receiver = self.receiver();

        loop {
            if receiver.is_empty() {
                return Drain::Drained;
            }
            if !consumers_alive() {
                return Drain::Abandoned;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Drain::TimedOut;
            }
            thread::sleep(DRAIN_POLL);
        }
    }
}
