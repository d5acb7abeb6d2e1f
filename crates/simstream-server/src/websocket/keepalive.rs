//! Keepalive timer state machine.
//!
//! ```text
//!            open                 ping timer            close timer
//!   (new) ---------> Idle ---------------------> AwaitingPong ----------> Closed
//!                     ^                               |
//!                     +------------ pong -------------+
//! ```
//!
//! Both timers are half the TTL. `Idle` holds only a ping deadline and
//! `AwaitingPong` only a close deadline, so at most one timer of each kind is
//! ever armed. The machine is pure: the connection loop sleeps until
//! [`Keepalive::next_deadline`] and feeds the outcome back in.

use std::time::Duration;

use tokio::time::Instant;

/// Observable keepalive state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveState {
    /// Waiting for the ping timer.
    Idle,
    /// Ping sent; waiting for the pong or the close timer.
    AwaitingPong,
    /// Terminal. No timers are armed.
    Closed,
}

/// What the connection must do after a deadline fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveAction {
    /// Send a ping.
    SendPing,
    /// Close the connection; the peer did not answer in time.
    Close,
}

/// Ping/pong timers for one connection.
#[derive(Debug, Clone)]
pub struct Keepalive {
    half_ttl: Duration,
    state: KeepaliveState,
    ping_at: Option<Instant>,
    close_at: Option<Instant>,
}

impl Keepalive {
    /// Keepalive for `ttl`. No timer is armed until [`open`](Self::open).
    pub fn new(ttl: Duration) -> Self {
        Self {
            half_ttl: ttl / 2,
            state: KeepaliveState::Idle,
            ping_at: None,
            close_at: None,
        }
    }

    /// Half a TTL past `now`. A deadline too far out to represent never fires.
    fn after(&self, now: Instant) -> Option<Instant> {
        now.checked_add(self.half_ttl)
    }

    /// Current state.
    pub fn state(&self) -> KeepaliveState {
        self.state
    }

    /// Pending ping deadline, if armed.
    pub fn ping_deadline(&self) -> Option<Instant> {
        self.ping_at
    }

    /// Pending close deadline, if armed.
    pub fn close_deadline(&self) -> Option<Instant> {
        self.close_at
    }

    /// Earliest armed deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.ping_at, self.close_at) {
            (Some(p), Some(c)) => Some(p.min(c)),
            (p, c) => p.or(c),
        }
    }

    /// Connection opened: arm the ping timer.
    pub fn open(&mut self, now: Instant) {
        if self.state == KeepaliveState::Closed {
            return;
        }
        self.state = KeepaliveState::Idle;
        self.close_at = None;
        self.ping_at = self.after(now);
    }

    /// Advance timers to `now`, returning the action for whichever fired.
    pub fn poll(&mut self, now: Instant) -> Option<KeepaliveAction> {
        if self.state == KeepaliveState::Closed {
            return None;
        }
        if self.close_at.is_some_and(|t| now >= t) {
            self.close();
            return Some(KeepaliveAction::Close);
        }
        if self.ping_at.is_some_and(|t| now >= t) {
            self.ping_at = None;
            self.close_at = self.after(now);
            self.state = KeepaliveState::AwaitingPong;
            return Some(KeepaliveAction::SendPing);
        }
        None
    }

    /// Pong received: cancel any close timer and re-arm the ping timer.
    ///
    /// Unsolicited pongs in `Idle` just push the next ping out.
    pub fn on_pong(&mut self, now: Instant) {
        if self.state == KeepaliveState::Closed {
            return;
        }
        self.close_at = None;
        self.ping_at = self.after(now);
        self.state = KeepaliveState::Idle;
    }

    /// Connection closed for any reason: disarm everything.
    pub fn close(&mut self) {
        self.ping_at = None;
        self.close_at = None;
        self.state = KeepaliveState::Closed;
    }
}
