use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Broadcast bus abstraction for the runtime.
///
/// Every published frame reaches every subscriber, the publisher included.
/// Delivery may be lossy; the protocol tolerates drops.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Publish raw bytes to all subscribers.
    async fn publish(&self, data: &[u8]) -> Result<(), String>;

    /// Next frame from the bus. `None` once the bus is gone.
    async fn recv(&mut self) -> Option<Vec<u8>>;
}

// ── LocalBus (in-process) ───────────────────────────────────────────

/// In-process broadcast bus backed by a tokio broadcast channel.
#[derive(Clone)]
pub struct LocalBus {
    tx: broadcast::Sender<Vec<u8>>,
}

impl LocalBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe a lossless endpoint. It sees frames published from now on.
    pub fn join(&self) -> BusEndpoint {
        BusEndpoint {
            tx: self.tx.clone(),
            rx: self.tx.subscribe(),
            loss: None,
        }
    }

    /// Subscribe an endpoint that drops each incoming frame with probability `rate`.
    pub fn join_lossy(&self, rate: f64, seed: u64) -> BusEndpoint {
        let mut endpoint = self.join();
        if rate > 0.0 {
            endpoint.loss = Some(Loss {
                rate: rate.min(1.0),
                rng: StdRng::seed_from_u64(seed),
            });
        }
        endpoint
    }

    /// Number of live endpoints.
    pub fn subscribers(&self) -> usize {
        self.tx.receiver_count()
    }
}

struct Loss {
    rate: f64,
    rng: StdRng,
}

/// One peer's attachment to a [`LocalBus`].
pub struct BusEndpoint {
    tx: broadcast::Sender<Vec<u8>>,
    rx: broadcast::Receiver<Vec<u8>>,
    loss: Option<Loss>,
}

#[async_trait::async_trait]
impl Transport for BusEndpoint {
    async fn publish(&self, data: &[u8]) -> Result<(), String> {
        self.tx
            .send(data.to_vec())
            .map(|_| ())
            .map_err(|e| format!("bus publish failed: {e}"))
    }

    async fn recv(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.rx.recv().await {
                Ok(frame) => {
                    if let Some(loss) = self.loss.as_mut() {
                        if loss.rng.random_bool(loss.rate) {
                            tracing::trace!("bus: dropped incoming frame");
                            continue;
                        }
                    }
                    return Some(frame);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("bus: endpoint lagged, {skipped} frames lost");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

// ── MockTransport (tests) ───────────────────────────────────────────
