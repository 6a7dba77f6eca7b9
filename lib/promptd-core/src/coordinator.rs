use crate::config::ConfigRef;
use crate::lifecycle::LifecycleController;
use crate::platform::{
    Bounds, EventDispatcher, HostEvent, ProcessTerminator, RequesterNotice, RequesterNotifier,
    SurfaceFactory, SurfaceHandle,
};
use crate::registry::{Dismissal, RegistryError, Removal, SurfaceMeta, SurfaceRegistry};
use crate::request::{resolve_geometry, GeometryError, Request, SurfaceContent};
use crate::surface_key::{SurfaceKey, SurfaceTicket};
use log::{debug, error, info, trace, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(#[from] GeometryError),
    #[error("Surface creation failed: {0}")]
    SurfaceCreationFailed(String),
    #[error("Surface creation timed out after {0:?}")]
    CreationTimedOut(Duration),
    #[error("Request was cancelled before its surface was shown")]
    Cancelled,
    #[error("Host is terminating")]
    HostTerminating,
}

impl From<RegistryError> for FailureReason {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::Sealed => FailureReason::HostTerminating,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created(SurfaceTicket),
    /// The key already has a live surface. Nothing was done.
    Deduplicated,
    Failed(FailureReason),
}

/// Dismissal callback for one surface generation, handed to the [`SurfaceFactory`].
#[derive(Debug, Clone)]
pub struct DismissSignal {
    ticket: SurfaceTicket,
    dispatcher: EventDispatcher,
}

impl DismissSignal {
    pub fn new(ticket: SurfaceTicket, dispatcher: EventDispatcher) -> Self {
        Self { ticket, dispatcher }
    }

    pub fn ticket(&self) -> &SurfaceTicket {
        &self.ticket
    }

    pub fn fire(&self) {
        self.dispatcher
            .send(HostEvent::Dismissed(self.ticket.clone()));
    }
}

pub struct RequestCoordinator {
    config: ConfigRef,
    registry: Arc<SurfaceRegistry>,
    factory: Arc<dyn SurfaceFactory>,
    notifier: Arc<dyn RequesterNotifier>,
    lifecycle: LifecycleController,
    dispatcher: EventDispatcher,
    display: RwLock<Bounds>,
    sequence: AtomicU64,
}

impl RequestCoordinator {
    pub fn new(
        config: ConfigRef,
        factory: Arc<dyn SurfaceFactory>,
        notifier: Arc<dyn RequesterNotifier>,
        terminator: Arc<dyn ProcessTerminator>,
        dispatcher: EventDispatcher,
    ) -> Self {
        let registry = Arc::new(SurfaceRegistry::new());
        let lifecycle =
            LifecycleController::new(registry.clone(), terminator, config.exit_when_idle);
        let display = RwLock::new(config.display.clone());

        Self {
            config,
            registry,
            factory,
            notifier,
            lifecycle,
            dispatcher,
            display,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<SurfaceRegistry> {
        &self.registry
    }

    /// Bounds of the default display as last reported by the host.
    pub fn display(&self) -> Bounds {
        self.display
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Shows a surface for `request` unless its key already has one. Requesters hear
    /// about failures, except a cancellation, which is reported as a dismissal.
    pub async fn handle_request(&self, request: Request) -> Outcome {
        let key = request.key();
        let outcome = self.create_surface(request).await;

        if let Outcome::Failed(reason) = &outcome {
            if *reason != FailureReason::Cancelled {
                self.notifier
                    .notify(&RequesterNotice::failed(&key, reason.to_string()));
            }
        }

        outcome
    }

    async fn create_surface(&self, request: Request) -> Outcome {
        let key = request.key();
        let display = self.display();

        let geometry = match resolve_geometry(request.geometry_hint.as_ref(), &display) {
            Ok(geometry) => geometry,
            Err(e) => {
                warn!("Rejecting request from {key}: {e}");
                return Outcome::Failed(e.into());
            }
        };

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let content =
            SurfaceContent::for_request(&request, sequence, &geometry.bounds, &display, &self.config);

        let reservation = self.registry.try_insert(key.clone(), || SurfaceMeta {
            name: content.name.clone(),
            kind: content.kind,
            bounds: geometry.bounds.clone(),
            follows_display: geometry.follows_display,
        });

        let ticket = match reservation {
            Ok((snapshot, true)) => snapshot.ticket,
            Ok((existing, false)) => {
                debug!(
                    "{key} already has {} ({:?}), ignoring request",
                    existing.meta.name, existing.state
                );
                return Outcome::Deduplicated;
            }
            Err(e) => {
                warn!("Refusing request from {key}: {e}");
                return Outcome::Failed(e.into());
            }
        };

        info!("Creating {} for {ticket}", content.name);
        let timeout = self.config.create_timeout();
        let created =
            tokio::time::timeout(timeout, self.factory.create(&geometry.bounds, &content)).await;

        let handle = match created {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                error!("Failed to create {}: {e}", content.name);
                self.rollback(&ticket);
                return Outcome::Failed(FailureReason::SurfaceCreationFailed(e.to_string()));
            }
            Err(_) => {
                error!("Timed out creating {} after {timeout:?}", content.name);
                self.rollback(&ticket);
                return Outcome::Failed(FailureReason::CreationTimedOut(timeout));
            }
        };

        if !self.registry.mark_shown(&ticket, handle.clone()) {
            debug!("{ticket} was dismissed while pending, discarding {handle}");
            self.destroy(handle).await;
            return Outcome::Failed(FailureReason::Cancelled);
        }

        // Bound only after the handle is stored, so a dismissal always finds something to destroy
        self.factory.bind_dismissal(
            &handle,
            DismissSignal::new(ticket.clone(), self.dispatcher.clone()),
        );
        debug!("Showing {} as {handle}", content.name);

        if geometry.follows_display {
            self.follow_display(&ticket, &handle, geometry.bounds).await;
        }

        Outcome::Created(ticket)
    }

    /// Tears down one surface generation. Repeated or stale dismissals report
    /// `removed: false` and have no effect.
    pub async fn dismiss(&self, ticket: &SurfaceTicket) -> Removal {
        match self.registry.begin_dismissal(ticket) {
            Dismissal::Started(handle) => {
                self.notifier.notify(&RequesterNotice::dismissed(&ticket.key));
                if let Some(handle) = handle {
                    debug!("Destroying {handle} for {ticket}");
                    self.destroy(handle).await;
                }
            }
            Dismissal::InProgress | Dismissal::Stale => {
                trace!("Ignoring dismissal of {ticket}, not live");
                return Removal {
                    removed: false,
                    remaining: self.registry.size(),
                };
            }
        }

        // Only the owner of the teardown gets here
        let removal = self.registry.remove_surface(ticket);
        if removal.removed {
            info!("Dismissed {ticket}, {} remaining", removal.remaining);
            self.lifecycle.on_surface_removed(removal.remaining);
        }

        removal
    }

    /// Requester withdrew. Works for pending surfaces too; the in-flight creation
    /// notices and cleans up after itself.
    pub async fn cancel(&self, key: &SurfaceKey) -> Removal {
        match self.registry.ticket_for(key) {
            Some(ticket) => self.dismiss(&ticket).await,
            None => {
                trace!("Nothing to cancel for {key}");
                Removal {
                    removed: false,
                    remaining: self.registry.size(),
                }
            }
        }
    }

    /// Fold or rotation. Full-display surfaces are resized in place; their registry
    /// entries are left alone.
    pub async fn on_display_changed(&self, display: Bounds) {
        info!(
            "Display changed to {}x{}",
            display.size.width, display.size.height
        );
        *self.display.write().unwrap_or_else(PoisonError::into_inner) = display.clone();

        for (ticket, handle) in self.registry.display_followers() {
            match self.factory.resize(&handle, &display).await {
                Ok(()) => {
                    self.registry.set_bounds(&ticket, display.clone());
                }
                Err(e) => warn!("Could not resize {ticket}: {e}"),
            }
        }
    }

    /// Catches up with display changes that landed while the surface was being created.
    /// Loops because another change may land during the resize itself.
    async fn follow_display(
        &self,
        ticket: &SurfaceTicket,
        handle: &SurfaceHandle,
        mut applied: Bounds,
    ) {
        loop {
            let display = self.display();
            if display == applied {
                return;
            }

            debug!("Display changed while creating {ticket}, resizing {handle}");
            if let Err(e) = self.factory.resize(handle, &display).await {
                warn!("Could not resize {ticket}: {e}");
                return;
            }
            self.registry.set_bounds(ticket, display.clone());
            applied = display;
        }
    }

    /// Destroys every remaining surface and refuses further requests.
    pub async fn teardown(&self) {
        let handles = self.registry.drain();
        if !handles.is_empty() {
            info!("Tearing down {} surface(s)", handles.len());
        }
        for handle in handles {
            self.destroy(handle).await;
        }
    }

    fn rollback(&self, ticket: &SurfaceTicket) {
        // Never reaches the lifecycle: a failed creation must not end the host
        let removal = self.registry.remove_pending(ticket);
        trace!(
            "Rolled back {ticket} (removed: {}, remaining: {})",
            removal.removed,
            removal.remaining
        );
    }

    async fn destroy(&self, handle: SurfaceHandle) {
        if let Err(e) = self.factory.destroy(handle).await {
            error!("Failed to destroy surface: {e}");
        }
    }
}
