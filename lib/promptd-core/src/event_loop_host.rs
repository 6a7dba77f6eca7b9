use crate::coordinator::RequestCoordinator;
use crate::platform::{EventBridge, EventDispatcher, HostEvent, ProcessTerminator};
use log::{debug, error, info, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// How long in-flight events may keep running after `Shutdown` before they are aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// Terminates the host by raising the shutdown flag and stopping the event loop.
pub struct HostTerminator {
    shutdown: Arc<AtomicBool>,
    dispatcher: EventDispatcher,
}

impl HostTerminator {
    pub fn new(shutdown: Arc<AtomicBool>, dispatcher: EventDispatcher) -> Self {
        Self {
            shutdown,
            dispatcher,
        }
    }
}

impl ProcessTerminator for HostTerminator {
    fn terminate(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.dispatcher.send(HostEvent::Shutdown);
    }
}

pub struct EventLoopHost {}

impl EventLoopHost {
    /// Runs until a `Shutdown` event arrives or every dispatcher is gone. Requests,
    /// dismissals and cancels run on their own tasks so a slow surface never holds up
    /// unrelated callers. Display changes are applied in arrival order on the loop itself.
    pub async fn run(mut bridge: EventBridge, coordinator: Arc<RequestCoordinator>) {
        trace!("Handling events...");

        let mut tasks = JoinSet::new();

        while let Some(event) = bridge.next_event().await {
            while let Some(result) = tasks.try_join_next() {
                if let Err(e) = result {
                    error!("Event task failed: {e}");
                }
            }

            let coordinator = coordinator.clone();
            match event {
                HostEvent::Shutdown => break,
                HostEvent::Request(request) => {
                    tasks.spawn(async move {
                        let key = request.key();
                        let outcome = coordinator.handle_request(request).await;
                        debug!("Request from {key}: {outcome:?}");
                    });
                }
                HostEvent::Dismissed(ticket) => {
                    tasks.spawn(async move {
                        coordinator.dismiss(&ticket).await;
                    });
                }
                HostEvent::Cancel(key) => {
                    tasks.spawn(async move {
                        coordinator.cancel(&key).await;
                    });
                }
                HostEvent::DisplayChanged(bounds) => {
                    coordinator.on_display_changed(bounds).await;
                }
            }
        }

        info!("Shutting down");
        let finish = async { while tasks.join_next().await.is_some() {} };
        if tokio::time::timeout(SHUTDOWN_GRACE, finish).await.is_err() {
            debug!("Aborting {} unfinished event task(s)", tasks.len());
        }
        tasks.shutdown().await;
        coordinator.teardown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::platform::mock::{MockNotifier, MockSurfaceFactory, MockTerminator};
    use crate::platform::Bounds;
    use crate::request::Request;
    use crate::surface_key::{CallerIdentity, SurfaceKey};

    fn coordinator(
        bridge: &EventBridge,
        factory: Arc<MockSurfaceFactory>,
    ) -> Arc<RequestCoordinator> {
        Arc::new(RequestCoordinator::new(
            Arc::new(Config::default()),
            factory,
            Arc::new(MockNotifier::new()),
            Arc::new(MockTerminator::new()),
            bridge.dispatcher(),
        ))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_display_changes_apply_in_order() {
        for _ in 0..20 {
            let bridge = EventBridge::new();
            let dispatcher = bridge.dispatcher();
            let coordinator = coordinator(&bridge, Arc::new(MockSurfaceFactory::new()));

            dispatcher.send(HostEvent::DisplayChanged(Bounds::new(0, 0, 1111, 1111)));
            dispatcher.send(HostEvent::Cancel(SurfaceKey::uid(1)));
            dispatcher.send(HostEvent::DisplayChanged(Bounds::new(0, 0, 2222, 2222)));
            dispatcher.send(HostEvent::Shutdown);

            EventLoopHost::run(bridge, coordinator.clone()).await;
            assert_eq!(coordinator.display(), Bounds::new(0, 0, 2222, 2222));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shutdown_during_destroy_does_not_leak() {
        let bridge = EventBridge::new();
        let dispatcher = bridge.dispatcher();
        let factory =
            Arc::new(MockSurfaceFactory::new().with_destroy_delay(Duration::from_millis(400)));
        let coordinator = coordinator(&bridge, factory.clone());

        let ticket = match coordinator
            .handle_request(Request::new(CallerIdentity::Uid(1)))
            .await
        {
            crate::Outcome::Created(ticket) => ticket,
            other => panic!("Expected Created, got {:?}", other),
        };

        // The destroy outlives the shutdown grace period and is aborted
        dispatcher.send(HostEvent::Dismissed(ticket));
        dispatcher.send(HostEvent::Shutdown);
        EventLoopHost::run(bridge, coordinator.clone()).await;

        assert_eq!(coordinator.registry().size(), 0);
        assert_eq!(factory.live_count(), 0);
    }
}
