//! # Connectivity Monitor
//!
//! Tracks whether the device can reach the acceptor and announces the
//! moment it becomes reachable again.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Connectivity Transitions                            │
//! │                                                                         │
//! │              report(true)                report(true)                   │
//! │   Unknown ──────────────► Online ◄─────────────────── Offline          │
//! │      │      (no event)      │   emits BecameOnline        ▲             │
//! │      │                      │                             │             │
//! │      │ report(false)        │ report(false)               │             │
//! │      │ (no event)           │ emits WentOffline           │             │
//! │      └──────────────────────┴─────────────────────────────┘             │
//! │                                                                         │
//! │   online → online and offline → offline emit nothing                   │
//! │   check_now(): if Online, emit BecameOnline as if a transition         │
//! │                just happened (used once at startup)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Observations come from a [`ReachabilityProbe`]; production uses
//! [`TcpProbe`], tests and embedding hosts call [`ConnectivityMonitor::report`]
//! directly. Consumers of the events must be idempotent; there is no
//! debouncing.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::{debug, info};

// =============================================================================
// Types
// =============================================================================

/// Current connectivity belief.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    /// Nothing observed yet.
    Unknown,
    Offline,
    Online,
}

impl Connectivity {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Connectivity::Offline,
            2 => Connectivity::Online,
            _ => Connectivity::Unknown,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Connectivity::Unknown => 0,
            Connectivity::Offline => 1,
            Connectivity::Online => 2,
        }
    }
}

impl std::fmt::Display for Connectivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Connectivity::Unknown => write!(f, "unknown"),
            Connectivity::Offline => write!(f, "offline"),
            Connectivity::Online => write!(f, "online"),
        }
    }
}

/// Discrete transition notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    BecameOnline,
    WentOffline,
}

// =============================================================================
// Monitor
// =============================================================================

/// Shared connectivity state plus a broadcast of transitions.
///
/// Share it behind an `Arc`; all methods take `&self`.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    state: AtomicU8,
    events: broadcast::Sender<ConnectivityEvent>,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityMonitor {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        ConnectivityMonitor {
            state: AtomicU8::new(Connectivity::Unknown.as_u8()),
            events,
        }
    }

    /// Current connectivity.
    pub fn state(&self) -> Connectivity {
        Connectivity::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// `true` only when the last observation was online.
    pub fn is_online(&self) -> bool {
        self.state() == Connectivity::Online
    }

    /// Subscribes to transition events.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.events.subscribe()
    }

    /// Records an observation and emits the transition it causes, if any.
    ///
    /// The state swap is atomic, so concurrent reporters can never emit the
    /// same offline → online transition twice.
    pub fn report(&self, online: bool) -> Option<ConnectivityEvent> {
        let next = if online {
            Connectivity::Online
        } else {
            Connectivity::Offline
        };
        let previous = Connectivity::from_u8(self.state.swap(next.as_u8(), Ordering::SeqCst));

        let event = match (previous, next) {
            (Connectivity::Offline, Connectivity::Online) => Some(ConnectivityEvent::BecameOnline),
            (Connectivity::Online, Connectivity::Offline) => Some(ConnectivityEvent::WentOffline),
            _ => None,
        };

        match event {
            Some(ConnectivityEvent::BecameOnline) => info!("Connectivity restored"),
            Some(ConnectivityEvent::WentOffline) => info!("Connectivity lost"),
            None if previous != next => debug!(state = %next, "Initial connectivity observed"),
            None => {}
        }

        if let Some(e) = event {
            // No subscribers is fine
            let _ = self.events.send(e);
        }

        event
    }

    /// If currently online, emits `BecameOnline` as though the transition
    /// just happened. Returns whether it fired.
    pub fn check_now(&self) -> bool {
        if self.is_online() {
            debug!("Manual connectivity check: online");
            let _ = self.events.send(ConnectivityEvent::BecameOnline);
            true
        } else {
            debug!(state = %self.state(), "Manual connectivity check: not online");
            false
        }
    }
}

// =============================================================================
// Reachability Probes
// =============================================================================

/// A single "can I reach the acceptor right now?" observation.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self) -> bool;
}

/// Opens (and immediately drops) a TCP connection to `host:port`.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    target: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(target: impl Into<String>, timeout: Duration) -> Self {
        TcpProbe {
            target: target.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    async fn probe(&self) -> bool {
        let reachable = matches!(
            tokio::time::timeout(self.timeout, TcpStream::connect(&self.target)).await,
            Ok(Ok(_))
        );
        debug!(target = %self.target, reachable, "Reachability probe");
        reachable
    }
}
