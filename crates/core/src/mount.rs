//! Mountpoint: the shared source's registry of attached client endpoints.
//!
//! Exactly one mountpoint exists per shared media source. It owns the
//! ordered list of per-client endpoint attachments and enforces the
//! membership invariants: one entry per client, and an entry exists iff
//! the owning session holds an endpoint handle.
//!
//! Attach and detach drive the engine in a strict order (see
//! [`crate::engine`]); a failure partway through an attach discards the
//! partially created endpoint rather than leaving it orphaned.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::engine::{EndpointId, LinkId, MediaEngine};
use crate::error::{MountError, Result};
use crate::session::Session;

/// One attached client: endpoint, owning session, and the fan-out branch
/// it hangs off. Kept as a single record so removal is one structural
/// delete instead of several index-aligned shifts.
#[derive(Debug, Clone)]
struct Attachment {
    client_uid: u32,
    endpoint: EndpointId,
    link: LinkId,
}

/// Ordered collection of endpoints attached to the shared source.
///
/// Entries keep insertion order; removal shifts later entries down by one
/// so relative order is preserved. `Clone` shares the underlying list.
#[derive(Clone)]
pub struct Mountpoint {
    entries: Arc<RwLock<Vec<Attachment>>>,
}

impl Mountpoint {
    pub fn new() -> Self {
        Mountpoint {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Attach an endpoint for `session` to the shared source.
    ///
    /// Fails with [`MountError::AlreadyAttached`] if the client already
    /// has an entry and [`MountError::SourceNotActive`] if the source is
    /// not producing output. The new endpoint mirrors the source's
    /// playing state rather than being forced live, so a paused source
    /// yields a ready-but-idle endpoint.
    ///
    /// All-or-nothing: an engine failure after endpoint creation tears
    /// the endpoint back down and leaves no entry.
    pub fn attach(&self, session: &Session, engine: &mut dyn MediaEngine) -> Result<EndpointId> {
        let client_uid = session.client_uid;
        if self.find(client_uid).is_some() {
            return Err(MountError::AlreadyAttached(client_uid).into());
        }
        if !engine.query_playing() {
            return Err(MountError::SourceNotActive.into());
        }

        let endpoint = engine.attach_endpoint()?;

        // Mirror the source state, then link. Discard the endpoint if
        // either step fails so the fan-out never sees a half-built branch.
        let live = engine.query_playing();
        let link = engine
            .set_endpoint_live(endpoint, live)
            .and_then(|()| engine.link_endpoint(endpoint));
        let link = match link {
            Ok(link) => link,
            Err(e) => {
                if let Err(cleanup) = engine.detach_endpoint(endpoint) {
                    tracing::warn!(
                        client_uid,
                        error = %cleanup,
                        "failed to discard endpoint after aborted attach"
                    );
                }
                return Err(e.into());
            }
        };

        let mut entries = self.entries.write();
        entries.push(Attachment {
            client_uid,
            endpoint,
            link,
        });
        tracing::debug!(client_uid, attached = entries.len(), "endpoint attached");
        Ok(endpoint)
    }

    /// Detach and tear down the endpoint for `client_uid`.
    ///
    /// The entry is removed from the table regardless of how the engine
    /// teardown goes; a failing engine call must not leave an orphaned
    /// attachment that locks the client out of re-attaching. Later
    /// entries shift down by one position, preserving relative order.
    pub fn detach(&self, client_uid: u32, engine: &mut dyn MediaEngine) -> Result<()> {
        let entry = {
            let mut entries = self.entries.write();
            let pos = entries
                .iter()
                .position(|a| a.client_uid == client_uid)
                .ok_or(MountError::NotAttached(client_uid))?;
            entries.remove(pos)
        };

        // Mirror of attach: unlink from the fan-out, then tear the
        // endpoint down. Best effort from here on.
        let teardown = engine
            .unlink_endpoint(entry.link)
            .and_then(|()| engine.detach_endpoint(entry.endpoint));
        if let Err(e) = &teardown {
            tracing::warn!(client_uid, error = %e, "engine teardown failed during detach");
        }
        tracing::debug!(
            client_uid,
            attached = self.entries.read().len(),
            "endpoint detached"
        );
        teardown?;
        Ok(())
    }

    /// Endpoint handle for an attached client, if any.
    pub fn find(&self, client_uid: u32) -> Option<EndpointId> {
        self.entries
            .read()
            .iter()
            .find(|a| a.client_uid == client_uid)
            .map(|a| a.endpoint)
    }

    /// Attached client uids, in attachment order.
    pub fn attached_uids(&self) -> Vec<u32> {
        self.entries.read().iter().map(|a| a.client_uid).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for Mountpoint {
    fn default() -> Self {
        Self::new()
    }
}
