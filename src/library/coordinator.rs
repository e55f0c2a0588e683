//! Exclusive access to the live collection.
//!
//! Two orthogonal primitives:
//! - a ticketed gate (mutex + condvar) that grants exclusive access in
//!   request order and is released when the guard drops
//! - an atomic cancel horizon that a build request raises as soon as it takes
//!   its ticket, without waiting for the gate
//!
//! A populate pass holding a ticket older than the horizon is cancelled; a
//! pass granted after the build never is.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Build,
    Populate,
}

/// A place in line for exclusive access.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a ticket must be redeemed with `acquire` or given back with `abandon`"]
pub struct Ticket {
    number: u64,
    kind: AccessKind,
}

impl Ticket {
    pub fn kind(&self) -> AccessKind {
        self.kind
    }
}

#[derive(Debug, Default)]
struct GateState {
    next_ticket: u64,
    now_serving: u64,
    holder: Option<AccessKind>,
    abandoned: BTreeSet<u64>,
}

impl GateState {
    fn advance(&mut self) {
        self.now_serving += 1;
        while self.abandoned.remove(&self.now_serving) {
            self.now_serving += 1;
        }
    }
}

/// Serializes builds and populate passes over one live collection.
///
/// Shared between the coordinating thread and every pass thread.
#[derive(Debug, Default)]
pub struct Coordinator {
    gate: Mutex<GateState>,
    released: Condvar,
    cancel_horizon: AtomicU64,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a place in line.
    ///
    /// A build ticket raises the cancellation signal right away so an
    /// in-flight or queued populate pass exits at its next item.
    pub fn ticket(&self, kind: AccessKind) -> Ticket {
        let mut gate = self.gate.lock();
        let number = gate.next_ticket;
        gate.next_ticket += 1;

        if kind == AccessKind::Build {
            self.cancel_horizon.fetch_max(number, Ordering::SeqCst);
            if gate.holder == Some(AccessKind::Populate) {
                info!(ticket = number, "Image population has been requested to abort");
            }
        }

        trace!(ticket = number, ?kind, "Issued access ticket");
        Ticket { number, kind }
    }

    /// Block until `ticket` is served, then hold exclusive access.
    pub fn acquire(&self, ticket: Ticket) -> AccessGuard<'_> {
        let mut gate = self.gate.lock();
        while gate.now_serving != ticket.number || gate.holder.is_some() {
            self.released.wait(&mut gate);
        }
        gate.holder = Some(ticket.kind);
        debug!(ticket = ticket.number, kind = ?ticket.kind, "Exclusive access granted");

        AccessGuard {
            coordinator: self,
            ticket,
        }
    }

    /// Take a build ticket and wait for access.
    pub fn acquire_build(&self) -> AccessGuard<'_> {
        let ticket = self.ticket(AccessKind::Build);
        self.acquire(ticket)
    }

    /// Give back a ticket that will never be redeemed.
    pub fn abandon(&self, ticket: Ticket) {
        let mut gate = self.gate.lock();
        if ticket.number == gate.now_serving && gate.holder.is_none() {
            gate.advance();
            self.released.notify_all();
        } else if ticket.number > gate.now_serving {
            gate.abandoned.insert(ticket.number);
        }
        debug!(ticket = ticket.number, "Abandoned access ticket");
    }

    /// Whether a pass holding `ticket` has been asked to stop.
    pub fn is_cancelled(&self, ticket: &Ticket) -> bool {
        ticket.kind == AccessKind::Populate
            && ticket.number < self.cancel_horizon.load(Ordering::SeqCst)
    }

    /// Current holder, if any.
    pub fn holder(&self) -> Option<AccessKind> {
        self.gate.lock().holder
    }

    /// Number of tickets issued but not yet released.
    pub fn outstanding(&self) -> u64 {
        let gate = self.gate.lock();
        gate.next_ticket - gate.now_serving - gate.abandoned.len() as u64
    }

    fn release(&self, ticket: &Ticket) {
        let mut gate = self.gate.lock();
        gate.holder = None;
        gate.advance();
        self.released.notify_all();
        debug!(ticket = ticket.number, kind = ?ticket.kind, "Exclusive access released");
    }
}

/// Exclusive access to the collection; released on drop.
#[derive(Debug)]
pub struct AccessGuard<'a> {
    coordinator: &'a Coordinator,
    ticket: Ticket,
}

impl AccessGuard<'_> {
    pub fn ticket(&self) -> &Ticket {
        &self.ticket
    }

    /// Whether the holder has been asked to stop.
    pub fn is_cancelled(&self) -> bool {
        self.coordinator.is_cancelled(&self.ticket)
    }
}

impl Drop for AccessGuard<'_> {
    fn drop(&mut self) {
        self.coordinator.release(&self.ticket);
    }
}
