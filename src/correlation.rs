//! Correlation table for in-flight requests.
//!
//! Every command occupies a pair of ids: the primary id carried by the
//! real request, and the sentinel id carried by an empty probe sent
//! right after the entry's first response fragment arrives. The peer
//! answers requests in the order received, so the probe's echo cannot
//! overtake any fragment of the real response; seeing the sentinel id
//! come back unambiguously marks end-of-response.
//!
//! The table is mutated from two sides - callers register entries, the
//! read loop dispatches incoming frames - so the session keeps it
//! behind a mutex. Callers never poll: each entry completes through a
//! oneshot channel.

use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::error::{RconError, Result};
use crate::protocol::Packet;

/// Id echoed by servers that reject authentication.
pub const AUTH_DENIED_ID: i32 = -1;

/// What the read loop should do after dispatching one packet.
#[derive(Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// No entry claims this id; the frame is dropped. Out-of-band
    /// keep-alive frames land here and are not protocol errors.
    Ignored,
    /// Fragment appended to a pending entry. When this was the entry's
    /// first fragment, `send_sentinel` holds the id to probe with.
    Fragment { send_sentinel: Option<i32> },
    /// Sentinel echoed; the caller has been handed the full body and
    /// both ids are retired.
    Completed,
}

/// One outstanding command or auth exchange.
struct Entry {
    primary_id: i32,
    sentinel_id: i32,
    /// Fragment bodies in arrival order, append-only until completion.
    fragments: Vec<String>,
    completion: oneshot::Sender<Result<String>>,
}

impl Entry {
    fn complete(self, result: Result<String>) {
        // The caller may have given up (deadline elapsed); that is fine.
        let _ = self.completion.send(result);
    }
}

/// Maps live correlation ids to their pending entries.
#[derive(Default)]
pub struct CorrelationTable {
    /// Both ids of an entry claim it: id -> primary id.
    claims: HashMap<i32, i32>,
    /// Entries keyed by primary id.
    entries: HashMap<i32, Entry>,
    /// Primary id of the pending auth exchange, if any. A reply with
    /// [`AUTH_DENIED_ID`] completes it with `AuthFailed`.
    auth_primary: Option<i32>,
    /// Set by [`fail_all`](Self::fail_all). A torn-down table has no
    /// completion path left, so late registrations must be refused or
    /// their callers would suspend forever.
    closed: bool,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an entry claiming both ids and return its completion handle.
    ///
    /// # Errors
    ///
    /// `ConnectionClosed` once the table has been torn down,
    /// `DuplicateId` if either id is already claimed. The latter cannot
    /// happen under sequential id allocation.
    pub fn register(
        &mut self,
        primary_id: i32,
        sentinel_id: i32,
        is_auth: bool,
    ) -> Result<oneshot::Receiver<Result<String>>> {
        if self.closed {
            return Err(RconError::ConnectionClosed);
        }
        for id in [primary_id, sentinel_id] {
            if self.is_registered(id) {
                return Err(RconError::DuplicateId(id));
            }
        }

        let (tx, rx) = oneshot::channel();
        self.claims.insert(primary_id, primary_id);
        self.claims.insert(sentinel_id, primary_id);
        self.entries.insert(
            primary_id,
            Entry {
                primary_id,
                sentinel_id,
                fragments: Vec::new(),
                completion: tx,
            },
        );
        if is_auth {
            self.auth_primary = Some(primary_id);
        }
        Ok(rx)
    }

    /// Route one decoded frame to its entry.
    pub fn dispatch(&mut self, packet: Packet) -> Dispatch {
        if packet.id == AUTH_DENIED_ID {
            if let Some(primary) = self.auth_primary {
                if let Some(entry) = self.remove(primary) {
                    entry.complete(Err(RconError::AuthFailed));
                    return Dispatch::Completed;
                }
            }
            return Dispatch::Ignored;
        }

        let Some(&primary) = self.claims.get(&packet.id) else {
            return Dispatch::Ignored;
        };

        let sentinel_id = match self.entries.get(&primary) {
            Some(entry) => entry.sentinel_id,
            None => return Dispatch::Ignored,
        };

        if packet.id == sentinel_id {
            if let Some(entry) = self.remove(primary) {
                let body = entry.fragments.concat();
                entry.complete(Ok(body));
                return Dispatch::Completed;
            }
            return Dispatch::Ignored;
        }

        // claims guarantees the entry exists here
        if let Some(entry) = self.entries.get_mut(&primary) {
            let first = entry.fragments.is_empty();
            entry.fragments.push(packet.body);
            return Dispatch::Fragment {
                send_sentinel: first.then_some(sentinel_id),
            };
        }
        Dispatch::Ignored
    }

    /// Drop an entry without completing it. Used when sending the
    /// request failed before any response could arrive, or when the
    /// caller's deadline elapsed.
    pub fn cancel(&mut self, primary_id: i32) {
        self.remove(primary_id);
    }

    /// Fail every pending entry with `ConnectionClosed` and close the
    /// table. Registration attempts racing with the shutdown fail with
    /// `ConnectionClosed` instead of landing in a table nothing
    /// dispatches into anymore.
    pub fn fail_all(&mut self) {
        self.closed = true;
        self.claims.clear();
        self.auth_primary = None;
        for (_, entry) in self.entries.drain() {
            entry.complete(Err(RconError::ConnectionClosed));
        }
    }

    /// Whether any entry claims this id.
    pub fn is_registered(&self, id: i32) -> bool {
        self.claims.contains_key(&id)
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unregister both ids and take the entry out of the table.
    fn remove(&mut self, primary_id: i32) -> Option<Entry> {
        let entry = self.entries.remove(&primary_id)?;
        self.claims.remove(&entry.primary_id);
        self.claims.remove(&entry.sentinel_id);
        if self.auth_primary == Some(primary_id) {
            self.auth_primary = None;
        }
        Some(entry)
    }
}
