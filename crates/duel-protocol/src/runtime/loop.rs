/// The protocol runtime event loop.
///
/// A single async task that owns the `EventProcessor` and multiplexes over
/// bus frames, application commands and the two health timers.
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::executor::execute_effects;
use super::processor::EventProcessor;
use super::transport::Transport;
use super::{ProtocolEvent, RuntimeCommand, RuntimeConfig};

/// Main event loop. Owns all protocol state.
pub(super) async fn runtime_loop<T: Transport>(
    mut transport: T,
    mut processor: EventProcessor,
    config: RuntimeConfig,
    mut cmd_rx: mpsc::Receiver<RuntimeCommand>,
    event_tx: mpsc::Sender<ProtocolEvent>,
) {
    let mut alive = tokio::time::interval(config.alive_interval);
    let mut liveness = tokio::time::interval(config.liveness_interval);
    alive.set_missed_tick_behavior(MissedTickBehavior::Delay);
    liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Skip the immediate first tick on both intervals
    alive.tick().await;
    liveness.tick().await;

    let effects = processor.start();
    execute_effects(effects, &transport, &event_tx).await;

    loop {
        let effects = tokio::select! {
            frame = transport.recv() => match frame {
                Some(data) => processor.handle_incoming(&data),
                None => {
                    tracing::info!(peer = %processor.local_id(), "bus closed, runtime stopping");
                    break;
                }
            },

            cmd = cmd_rx.recv() => match cmd {
                Some(RuntimeCommand::Shutdown) | None => {
                    tracing::info!(peer = %processor.local_id(), "runtime shutting down");
                    break;
                }
                Some(cmd) => processor.handle_command(cmd),
            },

            _ = alive.tick() => processor.tick_alive(),

            _ = liveness.tick() => processor.tick_liveness(),
        };

        execute_effects(effects, &transport, &event_tx).await;
    }
}
