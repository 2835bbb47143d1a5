//! Connection core
//!
//! Owns the hub socket on a dedicated thread: an MIO poll loop over the
//! socket plus a waker-backed channel pair bridging in role-lookup results
//! and control messages from the client handle. The link moves through
//! explicit states (connecting, connected, down) and retries forever with
//! a fixed delay; the subscription handshake re-runs on every connect, so
//! elevated subscriptions survive drops.
//!
//! Each established connection bumps an epoch counter. Role lookups run on
//! one-shot threads tagged with the epoch that spawned them, and results
//! from a previous epoch are dropped on arrival.

use super::identity::{self, IdentityError, Role};
use super::message::{ClientMessage, Field, Room, Sample, ServerMessage, Value};
use super::socket::{LineSocket, RecvError, SendError};
use super::FeedEvent;

use crossbeam::channel;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Wakes the poll loop when a control or role message is queued.
pub(super) const WAKER: mio::Token = mio::Token(0);
/// The hub socket.
const SOCKET: mio::Token = mio::Token(1);

/// Delay between reconnection attempts.
const RETRY_DELAY: Duration = Duration::from_secs(1);
/// Give up on a pending connect after this long and retry from scratch.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Control messages from the client handle.
pub(super) enum Control {
    Shutdown,
}

/// Result of a role lookup, tagged with the epoch that requested it.
pub(super) struct RoleLookup {
    epoch: u64,
    result: Result<Role, IdentityError>,
}

enum Link {
    Connecting { sock: LineSocket, deadline: Instant },
    Connected { sock: LineSocket },
    Down { retry_at: Instant },
}

pub(super) struct FeedCore {
    addr: SocketAddr,
    whoami_url: Option<String>,
    poll: mio::Poll,
    waker: Arc<mio::Waker>,
    link: Link,
    epoch: u64,
    events: channel::Sender<FeedEvent>,
    control: channel::Receiver<Control>,
    role_tx: channel::Sender<RoleLookup>,
    role_rx: channel::Receiver<RoleLookup>,
}

impl FeedCore {
    pub(super) fn new(
        addr: SocketAddr,
        whoami_url: Option<String>,
        poll: mio::Poll,
        waker: Arc<mio::Waker>,
        events: channel::Sender<FeedEvent>,
        control: channel::Receiver<Control>,
    ) -> FeedCore {
        let (role_tx, role_rx) = channel::unbounded();
        FeedCore {
            addr,
            whoami_url,
            poll,
            waker,
            link: Link::Down {
                retry_at: Instant::now(),
            },
            epoch: 0,
            events,
            control,
            role_tx,
            role_rx,
        }
    }

    pub(super) fn run(&mut self) {
        use channel::TryRecvError;

        let mut events = mio::Events::with_capacity(16);
        self.start_connect();

        'mainloop: loop {
            let timeout = self.next_timeout();
            if let Err(err) = self.poll.poll(&mut events, timeout) {
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                warn!("feed poll failed: {}", err);
                break;
            }

            for event in events.iter() {
                match event.token() {
                    // Channels are drained below on every pass.
                    WAKER => {}
                    SOCKET => {
                        let writable = event.is_writable();
                        self.handle_socket_event(writable);
                    }
                    token => {
                        debug!("unexpected poll token {:?}", token);
                    }
                }
            }

            loop {
                match self.control.try_recv() {
                    Ok(Control::Shutdown) => break 'mainloop,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => break 'mainloop,
                }
            }

            while let Ok(lookup) = self.role_rx.try_recv() {
                self.handle_role(lookup);
            }

            self.check_timers();
        }
    }

    fn next_timeout(&self) -> Option<Duration> {
        let deadline = match &self.link {
            Link::Connecting { deadline, .. } => *deadline,
            Link::Down { retry_at } => *retry_at,
            Link::Connected { .. } => return None,
        };
        // The extra millisecond avoids polling in a tight loop when the
        // remaining time rounds down to zero.
        Some(deadline.saturating_duration_since(Instant::now()) + Duration::from_millis(1))
    }

    fn check_timers(&mut self) {
        let now = Instant::now();
        match &self.link {
            Link::Down { retry_at } if now >= *retry_at => self.start_connect(),
            Link::Connecting { deadline, .. } if now >= *deadline => {
                debug!("connect to {} timed out", self.addr);
                if let Link::Connecting { sock, .. } = std::mem::replace(
                    &mut self.link,
                    Link::Down {
                        retry_at: now + RETRY_DELAY,
                    },
                ) {
                    self.discard_socket(sock);
                }
            }
            _ => {}
        }
    }

    fn start_connect(&mut self) {
        let now = Instant::now();
        match LineSocket::connect(&self.addr) {
            Ok(mut sock) => {
                // Write interest reports the nonblocking connect result;
                // it gets dropped again once the link is up.
                if let Err(err) = self.poll.registry().register(
                    &mut sock,
                    SOCKET,
                    mio::Interest::READABLE.add(mio::Interest::WRITABLE),
                ) {
                    warn!("socket registration failed: {}", err);
                    self.link = Link::Down {
                        retry_at: now + RETRY_DELAY,
                    };
                    return;
                }
                self.link = Link::Connecting {
                    sock,
                    deadline: now + CONNECT_TIMEOUT,
                };
            }
            Err(err) => {
                debug!("connect to {} failed: {}", self.addr, err);
                self.link = Link::Down {
                    retry_at: now + RETRY_DELAY,
                };
            }
        }
    }

    fn handle_socket_event(&mut self, writable: bool) {
        let placeholder = Link::Down {
            retry_at: Instant::now() + RETRY_DELAY,
        };
        match std::mem::replace(&mut self.link, placeholder) {
            Link::Connecting { sock, deadline } => match sock.ready() {
                Ok(true) => self.finish_connect(sock),
                Ok(false) => {
                    self.link = Link::Connecting { sock, deadline };
                }
                Err(err) => {
                    debug!("connect to {} failed: {}", self.addr, err);
                    self.discard_socket(sock);
                }
            },
            Link::Connected { mut sock } => {
                if writable {
                    match sock.drain() {
                        Ok(()) => {
                            let _ = self.poll.registry().reregister(
                                &mut sock,
                                SOCKET,
                                mio::Interest::READABLE,
                            );
                        }
                        Err(SendError::MustDrain) => {}
                        Err(err) => {
                            debug!("hub link write error: {}", err);
                            self.discard_socket(sock);
                            self.send_event(FeedEvent::Disconnected);
                            return;
                        }
                    }
                }
                loop {
                    match sock.recv() {
                        Ok(msg) => self.dispatch(msg),
                        Err(RecvError::NotReady) => break,
                        Err(RecvError::Protocol(err)) => {
                            // Bad line; skip it, keep the stream.
                            debug!("undecodable hub line: {}", err);
                        }
                        Err(err) => {
                            debug!("hub link lost: {}", err);
                            self.discard_socket(sock);
                            self.send_event(FeedEvent::Disconnected);
                            return;
                        }
                    }
                }
                self.link = Link::Connected { sock };
            }
            // Spurious event for a link already torn down.
            down @ Link::Down { .. } => self.link = down,
        }
    }

    /// Deregisters and drops a dead socket, scheduling the next attempt.
    fn discard_socket(&mut self, mut sock: LineSocket) {
        let _ = self.poll.registry().deregister(&mut sock);
        drop(sock);
        self.link = Link::Down {
            retry_at: Instant::now() + RETRY_DELAY,
        };
    }

    fn finish_connect(&mut self, mut sock: LineSocket) {
        self.epoch += 1;
        let _ = self
            .poll
            .registry()
            .reregister(&mut sock, SOCKET, mio::Interest::READABLE);
        debug!(epoch = self.epoch, "hub connected");
        self.send_event(FeedEvent::Connected);
        // The baseline room is joined on every connect. The role gates
        // only the control room, so the lookup runs in parallel.
        Self::subscribe(&self.poll, &self.events, &mut sock, Room::Patrol);
        if let Some(url) = self.whoami_url.clone() {
            self.spawn_role_lookup(url);
        }
        self.link = Link::Connected { sock };
    }

    fn subscribe(
        poll: &mio::Poll,
        events: &channel::Sender<FeedEvent>,
        sock: &mut LineSocket,
        room: Room,
    ) {
        match sock.send(&ClientMessage::Subscribe { room }) {
            Ok(()) => {}
            Err(SendError::MustDrain) => {
                let _ = poll.registry().reregister(
                    sock,
                    SOCKET,
                    mio::Interest::READABLE.add(mio::Interest::WRITABLE),
                );
            }
            Err(err) => {
                // A dead socket surfaces at the next recv; no teardown here.
                debug!("subscribe {} failed: {}", room.as_str(), err);
                return;
            }
        }
        let _ = events.try_send(FeedEvent::Subscribed(room));
    }

    fn spawn_role_lookup(&self, url: String) {
        let epoch = self.epoch;
        let tx = self.role_tx.clone();
        let waker = self.waker.clone();
        thread::spawn(move || {
            let result = identity::fetch_role(&url);
            if tx.send(RoleLookup { epoch, result }).is_ok() {
                let _ = waker.wake();
            }
        });
    }

    fn handle_role(&mut self, lookup: RoleLookup) {
        if lookup.epoch != self.epoch || !matches!(self.link, Link::Connected { .. }) {
            debug!(epoch = lookup.epoch, "stale role lookup dropped");
            return;
        }
        match lookup.result {
            Ok(role) => {
                debug!(role = role.name(), "role resolved");
                let elevated = role.is_elevated();
                self.send_event(FeedEvent::RoleResolved(role));
                if elevated {
                    if let Link::Connected { sock } = &mut self.link {
                        Self::subscribe(&self.poll, &self.events, sock, Room::Control);
                    }
                }
            }
            Err(err) => {
                // Baseline subscription stays; nothing else to do.
                debug!("role lookup failed: {}", err);
            }
        }
    }

    fn dispatch(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::PatrolData { field, value } => {
                self.dispatch_sample(Room::Patrol, field, value)
            }
            ServerMessage::ControlData { field, value } => {
                self.dispatch_sample(Room::Control, field, value)
            }
            ServerMessage::Alert { message } => match message {
                Some(message) => self.send_event(FeedEvent::Alert(message)),
                None => debug!("alert without message dropped"),
            },
        }
    }

    fn dispatch_sample(&mut self, room: Room, field: Option<Field>, value: Option<Value>) {
        let (field, value) = match (field, value) {
            (Some(field), Some(value)) => (field, value),
            _ => {
                debug!("{} message without field or value dropped", room.as_str());
                return;
            }
        };
        self.send_event(FeedEvent::Telemetry(Sample { room, field, value }));
    }

    fn send_event(&self, event: FeedEvent) {
        use channel::TrySendError;
        match self.events.try_send(event) {
            Ok(()) => {}
            // A stalled consumer loses events rather than stalling the feed.
            Err(TrySendError::Full(event)) => {
                debug!("event channel full, dropping {:?}", event);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}
