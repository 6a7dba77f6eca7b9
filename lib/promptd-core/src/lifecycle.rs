use crate::platform::ProcessTerminator;
use crate::registry::SurfaceRegistry;
use log::{debug, info, trace};
use std::sync::Arc;

/// Ends the host once the last surface is gone.
///
/// A `remaining` of zero is only a hint. The decision is taken by
/// [`SurfaceRegistry::seal_if_empty`], which runs under the same lock as inserts.
/// A request that reserved a key first keeps the host alive, and any request after
/// the seal is refused rather than orphaned.
pub struct LifecycleController {
    registry: Arc<SurfaceRegistry>,
    terminator: Arc<dyn ProcessTerminator>,
    exit_when_idle: bool,
}

impl LifecycleController {
    pub fn new(
        registry: Arc<SurfaceRegistry>,
        terminator: Arc<dyn ProcessTerminator>,
        exit_when_idle: bool,
    ) -> Self {
        Self {
            registry,
            terminator,
            exit_when_idle,
        }
    }

    /// Returns true if this call terminated the host.
    pub fn on_surface_removed(&self, remaining: usize) -> bool {
        if remaining > 0 {
            trace!("{remaining} surface(s) still live");
            return false;
        }

        if !self.exit_when_idle {
            debug!("No surfaces left, staying resident");
            return false;
        }

        if !self.registry.seal_if_empty() {
            debug!("Registry repopulated or already sealed, not terminating");
            return false;
        }

        info!("Last surface removed, terminating host");
        self.terminator.terminate();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::MockTerminator;
    use crate::platform::Bounds;
    use crate::registry::SurfaceMeta;
    use crate::request::SurfaceKind;
    use crate::surface_key::SurfaceKey;

    fn meta() -> SurfaceMeta {
        SurfaceMeta {
            name: "permissionDialog1".to_string(),
            kind: SurfaceKind::Dialog,
            bounds: Bounds::default(),
            follows_display: true,
        }
    }

    fn controller(exit_when_idle: bool) -> (Arc<SurfaceRegistry>, Arc<MockTerminator>, LifecycleController) {
        let registry = Arc::new(SurfaceRegistry::new());
        let terminator = Arc::new(MockTerminator::new());
        let controller =
            LifecycleController::new(registry.clone(), terminator.clone(), exit_when_idle);
        (registry, terminator, controller)
    }

    #[test]
    fn test_nonzero_does_not_terminate() {
        let (_, terminator, controller) = controller(true);
        assert!(!controller.on_surface_removed(2));
        assert_eq!(terminator.count(), 0);
    }

    #[test]
    fn test_zero_terminates_once() {
        let (_, terminator, controller) = controller(true);
        assert!(controller.on_surface_removed(0));
        assert!(!controller.on_surface_removed(0));
        assert_eq!(terminator.count(), 1);
    }

    #[test]
    fn test_stale_zero_with_new_insert_does_not_terminate() {
        let (registry, terminator, controller) = controller(true);
        let key = SurfaceKey::uid(1);

        registry.try_insert(key.clone(), meta).unwrap();
        let removal = registry.remove(&key);
        assert_eq!(removal.remaining, 0);

        // A new request lands between the removal and the zero-check
        registry.try_insert(SurfaceKey::uid(2), meta).unwrap();

        assert!(!controller.on_surface_removed(removal.remaining));
        assert_eq!(terminator.count(), 0);
        assert!(!registry.is_sealed());
    }

    #[test]
    fn test_exit_when_idle_disabled() {
        let (registry, terminator, controller) = controller(false);
        assert!(!controller.on_surface_removed(0));
        assert_eq!(terminator.count(), 0);
        assert!(!registry.is_sealed());
    }
}
