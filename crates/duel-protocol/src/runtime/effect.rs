use crate::message::Message;

use super::ProtocolEvent;

/// Intention produced by the pure logic of `EventProcessor`.
///
/// Every `handle_*` / `tick_*` method returns `Vec<RuntimeEffect>`.
/// The event loop then carries them out via the transport and channels.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEffect {
    /// Broadcast a message on the bus.
    Publish(Message),

    /// Emit a protocol event to the application.
    Emit(ProtocolEvent),
}
