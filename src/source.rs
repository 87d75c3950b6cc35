//! Frame source abstraction.
//!
//! The ingestion task pulls frames through [`FrameSource`] so the core
//! plugs into a real transceiver driver on the vehicle and into a
//! channel-backed source in the simulator and tests. The channel models
//! the interrupt-to-task handoff: the producer side only enqueues a
//! frame (a wake signal with payload) and never blocks or decodes.

use crate::frame::Frame;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::debug;

/// Bound on frames queued between the receive interrupt and the
/// ingestion task. Deep enough to ride out a scheduling hiccup at full
/// bus load.
pub const FRAME_QUEUE_DEPTH: usize = 64;

/// Deployment-level bus parameters. Physical pins stay with the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    pub bitrate: u32,
    /// Acceptance pass-list of raw identifiers; empty accepts all.
    pub filters: Vec<u32>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            bitrate: 500_000,
            filters: Vec::new(),
        }
    }
}

/// Contract to receive frames from a CAN-compatible controller.
pub trait FrameSource {
    type Error: std::fmt::Debug;

    fn configure(&mut self, config: &BusConfig) -> Result<(), Self::Error>;

    /// Wait up to `wait` for the next frame. `Ok(None)` means the bus
    /// stayed quiet for the whole window.
    fn receive(
        &mut self,
        wait: Duration,
    ) -> impl Future<Output = Result<Option<Frame>, Self::Error>> + Send;
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("frame producer disconnected")]
    Disconnected,
}

/// Create a connected producer/source pair over a bounded queue.
pub fn frame_channel() -> (FrameProducer, ChannelFrameSource) {
    let (tx, rx) = mpsc::channel(FRAME_QUEUE_DEPTH);
    (
        FrameProducer { tx },
        ChannelFrameSource {
            rx,
            filters: Vec::new(),
        },
    )
}

/// The interrupt side of the handoff.
#[derive(Clone)]
pub struct FrameProducer {
    tx: mpsc::Sender<Frame>,
}

impl FrameProducer {
    /// Enqueue-or-drop, never block: a full queue loses the frame, the
    /// same way a saturated controller FIFO would.
    pub fn offer(&self, frame: Frame) -> bool {
        self.tx.try_send(frame).is_ok()
    }
}

/// Bounded-channel frame source used by the simulator and tests.
pub struct ChannelFrameSource {
    rx: mpsc::Receiver<Frame>,
    filters: Vec<u32>,
}

impl FrameSource for ChannelFrameSource {
    type Error = SourceError;

    fn configure(&mut self, config: &BusConfig) -> Result<(), Self::Error> {
        self.filters = config.filters.clone();
        debug!(
            "frame source configured: {} bit/s, {} filter(s)",
            config.bitrate,
            self.filters.len()
        );
        Ok(())
    }

    fn receive(
        &mut self,
        wait: Duration,
    ) -> impl Future<Output = Result<Option<Frame>, Self::Error>> + Send {
        async move {
            match timeout(wait, self.rx.recv()).await {
                Ok(Some(frame)) => {
                    if self.filters.is_empty() || self.filters.contains(&frame.id.raw()) {
                        Ok(Some(frame))
                    } else {
                        // Filtered out at the acceptance stage
                        Ok(None)
                    }
                }
                Ok(None) => Err(SourceError::Disconnected),
                Err(_elapsed) => Ok(None),
            }
        }
    }
}
