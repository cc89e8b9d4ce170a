use crate::access::AccessGate;
use crate::delivery::{NoopSender, WebhookSender};
use crate::registry::{DemoRegistry, ImageRegistry};
use crate::runtime::{ContainerRuntime, DemoRuntime};
use dockyard_store::{BlobStore, ConsoleStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: ConsoleStore,
    pub blobs: Arc<dyn BlobStore>,
    pub gate: Arc<AccessGate>,
    pub runtime: Arc<dyn ContainerRuntime>,
    pub images: Arc<dyn ImageRegistry>,
    pub webhooks: Arc<dyn WebhookSender>,
}

impl AppState {
    /// State with the demo runtime, registry and delivery stubs.
    pub fn new(store: ConsoleStore, blobs: Arc<dyn BlobStore>, gate: AccessGate) -> Self {
        Self {
            store,
            blobs,
            gate: Arc::new(gate),
            runtime: Arc::new(DemoRuntime),
            images: Arc::new(DemoRegistry),
            webhooks: Arc::new(NoopSender),
        }
    }
}
