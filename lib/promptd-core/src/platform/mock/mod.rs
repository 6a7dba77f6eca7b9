//! In-memory platform used by tests. Records every call so assertions can inspect
//! what the coordinator asked for.

use crate::coordinator::DismissSignal;
use crate::platform::{
    Bounds, PlatformResult, ProcessTerminator, RequesterNotice, RequesterNotifier,
    SurfaceFactory, SurfaceHandle,
};
use crate::request::SurfaceContent;
use crate::surface_key::SurfaceTicket;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MockSurface {
    pub bounds: Bounds,
    pub content: SurfaceContent,
    pub signal: Option<DismissSignal>,
}

#[derive(Debug, Default)]
struct MockState {
    live: HashMap<SurfaceHandle, MockSurface>,
    created: Vec<SurfaceContent>,
    destroyed: Vec<SurfaceHandle>,
    resized: Vec<(SurfaceHandle, Bounds)>,
    bound: Vec<SurfaceTicket>,
}

#[derive(Debug, Default)]
pub struct MockSurfaceFactory {
    state: Mutex<MockState>,
    next_handle: AtomicU64,
    failures_left: AtomicUsize,
    create_delay: Option<Duration>,
    destroy_delay: Option<Duration>,
}

impl MockSurfaceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `create` sleeps this long before producing a handle.
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = Some(delay);
        self
    }

    /// Every `destroy` sleeps this long before releasing the surface.
    pub fn with_destroy_delay(mut self, delay: Duration) -> Self {
        self.destroy_delay = Some(delay);
        self
    }

    /// The next `count` calls to `create` fail.
    pub fn fail_next_creations(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create_count(&self) -> usize {
        self.state().created.len()
    }

    pub fn live_count(&self) -> usize {
        self.state().live.len()
    }

    pub fn destroyed(&self) -> Vec<SurfaceHandle> {
        self.state().destroyed.clone()
    }

    pub fn resized(&self) -> Vec<(SurfaceHandle, Bounds)> {
        self.state().resized.clone()
    }

    pub fn bound_signals(&self) -> Vec<SurfaceTicket> {
        self.state().bound.clone()
    }

    /// Simulates the user closing every live surface. Returns how many signals fired.
    pub fn dismiss_all(&self) -> usize {
        let signals: Vec<DismissSignal> = self
            .state()
            .live
            .values()
            .filter_map(|surface| surface.signal.clone())
            .collect();
        for signal in &signals {
            signal.fire();
        }
        signals.len()
    }
}

#[async_trait]
impl SurfaceFactory for MockSurfaceFactory {
    async fn create(
        &self,
        bounds: &Bounds,
        content: &SurfaceContent,
    ) -> PlatformResult<SurfaceHandle> {
        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        state.created.push(content.clone());

        let should_fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(format!("Mock failure creating {}", content.name).into());
        }

        let handle = SurfaceHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
        state.live.insert(
            handle.clone(),
            MockSurface {
                bounds: bounds.clone(),
                content: content.clone(),
                signal: None,
            },
        );
        Ok(handle)
    }

    async fn destroy(&self, handle: SurfaceHandle) -> PlatformResult<()> {
        if let Some(delay) = self.destroy_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        state
            .live
            .remove(&handle)
            .ok_or_else(|| format!("Unknown surface {handle}"))?;
        state.destroyed.push(handle);
        Ok(())
    }

    fn bind_dismissal(&self, handle: &SurfaceHandle, signal: DismissSignal) {
        let mut state = self.state();
        state.bound.push(signal.ticket().clone());
        if let Some(surface) = state.live.get_mut(handle) {
            surface.signal = Some(signal);
        }
    }

    async fn resize(&self, handle: &SurfaceHandle, bounds: &Bounds) -> PlatformResult<()> {
        let mut state = self.state();
        let surface = state
            .live
            .get_mut(handle)
            .ok_or_else(|| format!("Unknown surface {handle}"))?;
        surface.bounds = bounds.clone();
        state.resized.push((handle.clone(), bounds.clone()));
        Ok(())
    }
}

/// Collects notices instead of delivering them.
#[derive(Debug, Default)]
pub struct MockNotifier {
    notices: Mutex<Vec<RequesterNotice>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<RequesterNotice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RequesterNotifier for MockNotifier {
    fn notify(&self, notice: &RequesterNotice) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice.clone());
    }
}

/// Counts terminations instead of exiting.
#[derive(Debug, Default)]
pub struct MockTerminator {
    count: AtomicUsize,
}

impl MockTerminator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl ProcessTerminator for MockTerminator {
    fn terminate(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}
