//! Feed client handle
//!
//! `Feed` spawns the connection core on a dedicated thread and exposes the
//! typed event stream over a crossbeam channel, so a consumer can block,
//! poll, or `select!` on it alongside its own timers.

use super::conn::{Control, FeedCore, WAKER};
use super::FeedEvent;

use crossbeam::channel;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use thiserror::Error;

/// Default TCP port of the hub realtime channel.
pub const DEFAULT_FEED_PORT: u16 = 7441;

/// Size of the event channel between the core and the handle.
const EVENT_CHANNEL_SIZE: usize = 256;

/// Connection parameters for a `Feed`.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Hub URL, `tcp://host[:port]` (the scheme may be omitted).
    pub url: String,
    /// Identity endpoint. When unset the session never attempts the
    /// control room and stays at the baseline subscription.
    pub whoami_url: Option<String>,
}

impl FeedConfig {
    pub fn new(url: &str) -> FeedConfig {
        FeedConfig {
            url: url.to_string(),
            whoami_url: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("invalid hub url {0:?}")]
    InvalidUrl(String),
    #[error("hub address resolution failed")]
    Resolve,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("feed terminated")]
    Closed,
}

/// Resolve a hub URL, appending the default port when none was given.
fn find_addr(url: &str) -> Result<SocketAddr, FeedError> {
    let addr = match url.split_once("://") {
        Some(("tcp", rest)) => rest,
        Some(_) => return Err(FeedError::InvalidUrl(url.to_string())),
        None => url,
    };
    // Simpler to try as-is and retry with the port appended than to
    // figure out up front whether one is present.
    if let Ok(mut iter) = addr.to_socket_addrs() {
        if let Some(sa) = iter.next() {
            return Ok(sa);
        }
    }
    let with_port = format!("{}:{}", addr, DEFAULT_FEED_PORT);
    if let Ok(mut iter) = with_port.to_socket_addrs() {
        if let Some(sa) = iter.next() {
            return Ok(sa);
        }
    }
    Err(FeedError::Resolve)
}

/// Live connection to the hub. Dropping the handle shuts the core down.
pub struct Feed {
    events: channel::Receiver<FeedEvent>,
    control: channel::Sender<Control>,
    waker: Arc<mio::Waker>,
}

impl Feed {
    /// Connects to the hub described by `config` and spawns the
    /// connection core on a dedicated thread.
    pub fn connect(config: FeedConfig) -> Result<Feed, FeedError> {
        let addr = find_addr(&config.url)?;
        let (event_tx, event_rx) = channel::bounded(EVENT_CHANNEL_SIZE);
        let (control_tx, control_rx) = channel::bounded(4);
        let poll = mio::Poll::new()?;
        let waker = Arc::new(mio::Waker::new(poll.registry(), WAKER)?);
        let mut core = FeedCore::new(
            addr,
            config.whoami_url,
            poll,
            waker.clone(),
            event_tx,
            control_rx,
        );
        thread::spawn(move || core.run());
        Ok(Feed {
            events: event_rx,
            control: control_tx,
            waker,
        })
    }

    /// The raw event channel, for `crossbeam::channel::select!`.
    pub fn receiver(&self) -> &channel::Receiver<FeedEvent> {
        &self.events
    }

    /// Waits for the next event.
    pub fn next(&self) -> Result<FeedEvent, FeedError> {
        self.events.recv().map_err(|_| FeedError::Closed)
    }

    /// Returns the next event if one is queued.
    pub fn try_next(&self) -> Option<FeedEvent> {
        self.events.try_recv().ok()
    }

    /// Drains every queued event.
    pub fn drain(&self) -> Vec<FeedEvent> {
        self.events.try_iter().collect()
    }

    /// Asks the core to exit. Also runs on drop.
    pub fn shutdown(&self) {
        let _ = self.control.try_send(Control::Shutdown);
        let _ = self.waker.wake();
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        self.shutdown();
    }
}
