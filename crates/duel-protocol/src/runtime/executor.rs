//! Effect executor, the only place that touches I/O.
//!
//! - Publish -> encode, then transport.publish()
//! - Emit -> event_tx.try_send()

use tokio::sync::mpsc;

use crate::message::Message;

use super::effect::RuntimeEffect;
use super::transport::Transport;
use super::ProtocolEvent;

/// Execute a list of effects using the given transport and event channel.
pub(super) async fn execute_effects<T: Transport>(
    effects: Vec<RuntimeEffect>,
    transport: &T,
    event_tx: &mpsc::Sender<ProtocolEvent>,
) {
    for effect in effects {
        match effect {
            RuntimeEffect::Publish(msg) => publish(transport, &msg, event_tx).await,
            RuntimeEffect::Emit(event) => {
                // Never block the loop on a slow consumer.
                let _ = event_tx.try_send(event);
            }
        }
    }
}

async fn publish<T: Transport>(
    transport: &T,
    msg: &Message,
    event_tx: &mpsc::Sender<ProtocolEvent>,
) {
    let description = match msg.to_bytes() {
        Ok(bytes) => match transport.publish(&bytes).await {
            Ok(()) => return,
            Err(e) => format!("publish {} failed: {e}", msg.kind()),
        },
        Err(e) => format!("encode {} failed: {e}", msg.kind()),
    };
    tracing::warn!("{description}");
    let _ = event_tx.try_send(ProtocolEvent::Error { description });
}
