//! Scoped ownership of registration batches.

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use hookchain_core::{BatchId, HubId};

use crate::registry::Registry;
use crate::source::EventSource;

/// Type-erased access to the registry a batch lives in.
pub(crate) trait BatchRelease {
    fn release_batch(&self, batch: BatchId) -> usize;
}

impl<T: EventSource> BatchRelease for Registry<T> {
    fn release_batch(&self, batch: BatchId) -> usize {
        self.remove_batch(batch)
    }
}

struct HandleInner {
    registry: Weak<dyn BatchRelease>,
    hub: HubId,
    batch: BatchId,
    released: Cell<bool>,
    detached: Cell<bool>,
}

impl HandleInner {
    /// Returns the number of registrations removed, or `None` if the batch
    /// was already released or the hub is gone.
    fn release(&self) -> Option<usize> {
        if self.released.replace(true) {
            return None;
        }
        let registry = self.registry.upgrade()?;
        let removed = registry.release_batch(self.batch);
        tracing::debug!(hub = %self.hub, batch = %self.batch, removed, "registration batch released");
        Some(removed)
    }
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        if !self.detached.get() {
            self.release();
        }
    }
}

/// Owns the registrations created by one batch call.
///
/// Clones share ownership. When the last clone is dropped the batch is
/// removed from its hub; [`release`](RegistrationHandle::release) does the
/// same eagerly and is idempotent. Use [`detach`](RegistrationHandle::detach)
/// to keep the registrations for the rest of the hub's life.
#[derive(Clone)]
#[must_use = "dropping the handle removes its registrations; call `detach` to keep them"]
pub struct RegistrationHandle {
    inner: Rc<HandleInner>,
}

impl RegistrationHandle {
    pub(crate) fn new(registry: Weak<dyn BatchRelease>, hub: HubId, batch: BatchId) -> Self {
        Self {
            inner: Rc::new(HandleInner {
                registry,
                hub,
                batch,
                released: Cell::new(false),
                detached: Cell::new(false),
            }),
        }
    }

    /// Removes every registration of the batch.
    ///
    /// Returns true only for the call that actually released the batch.
    /// Later calls, and calls after the hub is gone, do nothing.
    pub fn release(&self) -> bool {
        self.inner.release().is_some()
    }

    pub(crate) fn release_counted(&self) -> usize {
        self.inner.release().unwrap_or(0)
    }

    /// Gives up ownership without removing the registrations.
    ///
    /// They stay active until removed by callback identity, by
    /// [`EventHub::remove_all_registrations`](crate::EventHub::remove_all_registrations),
    /// or until the hub is dropped.
    pub fn detach(self) {
        self.inner.detached.set(true);
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.get()
    }

    pub fn batch(&self) -> BatchId {
        self.inner.batch
    }

    /// The hub the batch was registered on.
    pub fn hub(&self) -> HubId {
        self.inner.hub
    }
}

impl fmt::Debug for RegistrationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationHandle")
            .field("hub", &self.inner.hub)
            .field("batch", &self.inner.batch)
            .field("released", &self.inner.released.get())
            .finish()
    }
}
