use tokio::sync::broadcast;

/// Published when stream aggregation fails, carrying the originating plan
/// identifier and a human-readable cause.
#[derive(Debug, Clone)]
pub struct PlanException {
    pub plan_id: String,
    pub cause: String,
}

/// Narrow publish/subscribe surface for aggregation-failure notifications.
/// Deliberately smaller than the teacher's general submission/event queue
/// (`protocol::Op`/`protocol::EventMsg`): this crate only ever needs to
/// broadcast one event kind.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: PlanException);
}

/// Default in-memory implementation backed by a broadcast channel. Messages
/// published with no active subscriber are simply dropped, matching
/// `tokio::sync::broadcast`'s normal behavior.
pub struct BroadcastEventBus {
    sender: broadcast::Sender<PlanException>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlanException> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(16)
    }
}

impl EventBus for BroadcastEventBus {
    fn publish(&self, event: PlanException) {
        // No active subscriber is not an error: the event is fire-and-forget
        // telemetry, not a delivery-guaranteed channel.
        let _ = self.sender.send(event);
    }
}
