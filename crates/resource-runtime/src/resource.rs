//! Per-resource behaviour.

#[cfg(feature = "server-api")]
use crate::refs::ClientRequest;
use crate::refs::{BaseObjectRef, EventRef};

/// Behaviour attached to one loaded resource.
///
/// Every method has a default so implementations only override what they
/// need. The host decides when and in which order these are called; an
/// implementation must not assume `start` precedes `on_tick` or that `stop`
/// is ever called before the resource is destroyed.
///
/// A base object notification that arrives while another method of the same
/// implementation is still running is queued and delivered right after that
/// method returns.
pub trait ResourceImplementation: Send {
    /// Describe the client-side counterpart of this resource.
    #[cfg(feature = "server-api")]
    fn make_client(&mut self, request: ClientRequest) -> bool {
        let _ = request;
        true
    }

    /// Returns `false` to report a failed start to the host.
    fn start(&mut self) -> bool {
        true
    }

    fn stop(&mut self) -> bool {
        true
    }

    /// Returns whether the event was handled.
    fn on_event(&mut self, event: EventRef) -> bool {
        let _ = event;
        true
    }

    fn on_tick(&mut self) {}

    fn on_create_base_object(&mut self, object: BaseObjectRef) {
        let _ = object;
    }

    fn on_remove_base_object(&mut self, object: BaseObjectRef) {
        let _ = object;
    }
}
