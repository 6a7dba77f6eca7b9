use crate::platform::HostEvent;
use tokio::sync::mpsc;

pub struct EventBridge {
    sender: mpsc::UnboundedSender<HostEvent>,
    receiver: mpsc::UnboundedReceiver<HostEvent>,
    pending_event: Option<HostEvent>,
}

impl EventBridge {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver,
            pending_event: None,
        }
    }

    pub fn dispatcher(&self) -> EventDispatcher {
        EventDispatcher::new(self.sender.clone())
    }

    pub async fn next_event(&mut self) -> Option<HostEvent> {
        if let Some(event) = self.pending_event.take() {
            return Some(event);
        }

        let mut event = self.receiver.recv().await?;

        // A fold or rotation produces a burst of display changes; only the last one matters.
        if matches!(event, HostEvent::DisplayChanged(_)) {
            loop {
                match self.receiver.try_recv() {
                    Ok(HostEvent::DisplayChanged(bounds)) => {
                        event = HostEvent::DisplayChanged(bounds);
                    }
                    Ok(other_event) => {
                        self.pending_event = Some(other_event);
                        break;
                    }
                    Err(_) => break,
                }
            }
        }

        Some(event)
    }
}

impl Default for EventBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: mpsc::UnboundedSender<HostEvent>,
}

impl EventDispatcher {
    pub fn new(sender: mpsc::UnboundedSender<HostEvent>) -> Self {
        Self { sender }
    }

    pub fn send(&self, event: HostEvent) {
        // If send fails, then the host is shutting down.
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Bounds;

    #[tokio::test]
    async fn test_display_changes_are_coalesced() {
        let mut bridge = EventBridge::new();
        let dispatcher = bridge.dispatcher();

        dispatcher.send(HostEvent::DisplayChanged(Bounds::new(0, 0, 100, 100)));
        dispatcher.send(HostEvent::DisplayChanged(Bounds::new(0, 0, 200, 100)));
        dispatcher.send(HostEvent::DisplayChanged(Bounds::new(0, 0, 300, 100)));
        dispatcher.send(HostEvent::Shutdown);

        match bridge.next_event().await {
            Some(HostEvent::DisplayChanged(bounds)) => assert_eq!(bounds.size.width, 300),
            other => panic!("Expected a display change, got {:?}", other),
        }
        assert!(matches!(bridge.next_event().await, Some(HostEvent::Shutdown)));
    }

    #[tokio::test]
    async fn test_other_events_are_not_coalesced() {
        let mut bridge = EventBridge::new();
        let dispatcher = bridge.dispatcher();

        dispatcher.send(HostEvent::Shutdown);
        dispatcher.send(HostEvent::Shutdown);
        drop(dispatcher);

        assert!(matches!(bridge.next_event().await, Some(HostEvent::Shutdown)));
        assert!(matches!(bridge.next_event().await, Some(HostEvent::Shutdown)));
    }
}
