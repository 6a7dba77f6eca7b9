use crate::coordinator::DismissSignal;
use crate::platform::{Bounds, PlatformResult, SurfaceFactory, SurfaceHandle};
use crate::request::SurfaceContent;
use async_trait::async_trait;
use log::{debug, info, trace};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug)]
struct HeadlessSurface {
    name: String,
    bounds: Bounds,
}

/// Surface factory for hosts without a window server. Surfaces exist only as log
/// lines; with an auto-dismiss delay each one closes itself as if the user had
/// answered the prompt.
pub struct HeadlessSurfaceFactory {
    surfaces: Mutex<HashMap<SurfaceHandle, HeadlessSurface>>,
    next_handle: AtomicU64,
    auto_dismiss: Option<Duration>,
}

impl HeadlessSurfaceFactory {
    pub fn new(auto_dismiss: Option<Duration>) -> Self {
        Self {
            surfaces: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(0),
            auto_dismiss,
        }
    }

    fn surfaces(&self) -> MutexGuard<'_, HashMap<SurfaceHandle, HeadlessSurface>> {
        self.surfaces.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SurfaceFactory for HeadlessSurfaceFactory {
    async fn create(
        &self,
        bounds: &Bounds,
        content: &SurfaceContent,
    ) -> PlatformResult<SurfaceHandle> {
        let handle = SurfaceHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
        info!(
            "[{}] {} {:?} page={} at ({}, {}) {}x{} radius={:?}",
            handle,
            content.name,
            content.kind,
            content.page,
            bounds.position.x,
            bounds.position.y,
            bounds.size.width,
            bounds.size.height,
            content.style.corner_radius,
        );
        self.surfaces().insert(
            handle.clone(),
            HeadlessSurface {
                name: content.name.clone(),
                bounds: bounds.clone(),
            },
        );
        Ok(handle)
    }

    async fn destroy(&self, handle: SurfaceHandle) -> PlatformResult<()> {
        let surface = self
            .surfaces()
            .remove(&handle)
            .ok_or_else(|| format!("Unknown surface {handle}"))?;
        info!(
            "[{}] {} destroyed ({}x{})",
            handle, surface.name, surface.bounds.size.width, surface.bounds.size.height
        );
        Ok(())
    }

    fn bind_dismissal(&self, handle: &SurfaceHandle, signal: DismissSignal) {
        let Some(delay) = self.auto_dismiss else {
            trace!("[{handle}] waiting for an explicit cancel");
            return;
        };

        let handle = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!("[{handle}] auto-dismissing {}", signal.ticket());
            signal.fire();
        });
    }

    async fn resize(&self, handle: &SurfaceHandle, bounds: &Bounds) -> PlatformResult<()> {
        let mut surfaces = self.surfaces();
        let surface = surfaces
            .get_mut(handle)
            .ok_or_else(|| format!("Unknown surface {handle}"))?;
        surface.bounds = bounds.clone();
        info!(
            "[{}] {} resized to {}x{}",
            handle, surface.name, bounds.size.width, bounds.size.height
        );
        Ok(())
    }
}
