use crate::coordinator::DismissSignal;
use crate::platform::{Bounds, PlatformResult, RequesterNotice, SurfaceHandle};
use crate::request::SurfaceContent;
use async_trait::async_trait;

/// Creates and tears down the visible prompt surfaces. Implemented by the host platform.
///
/// None of these are called while registry bookkeeping is locked, so implementations
/// are free to block on the window server.
#[async_trait]
pub trait SurfaceFactory: Send + Sync {
    /// Materializes and shows a surface. The returned future may be dropped if creation
    /// takes longer than the configured timeout, so it must not leave a half-built
    /// surface behind when cancelled.
    async fn create(&self, bounds: &Bounds, content: &SurfaceContent)
        -> PlatformResult<SurfaceHandle>;

    /// Releases the platform resource behind `handle`.
    async fn destroy(&self, handle: SurfaceHandle) -> PlatformResult<()>;

    /// Arranges for `signal` to fire when the surface is dismissed by the user or the
    /// requester. Firing more than once is allowed.
    fn bind_dismissal(&self, handle: &SurfaceHandle, signal: DismissSignal);

    async fn resize(&self, handle: &SurfaceHandle, bounds: &Bounds) -> PlatformResult<()>;
}

/// Reports back to requesters. Delivery is best effort and must not block for long;
/// it runs on the dismissal path before the surface is destroyed.
pub trait RequesterNotifier: Send + Sync {
    fn notify(&self, notice: &RequesterNotice);
}

/// Ends the hosting process. Invoked at most once.
pub trait ProcessTerminator: Send + Sync {
    fn terminate(&self);
}
