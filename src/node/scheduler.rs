// Scheduler - Emits build requests on start and on every recommit tick
use super::handoff::HandoffSender;
use super::interrupt::{CancellationToken, InterruptSignal};
use crate::types::{unix_now, Timestamp};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Shortest allowed recommit interval
pub const MIN_RECOMMIT_INTERVAL: Duration = Duration::from_secs(1);

/// Raise a recommit interval to the allowed minimum
pub fn sanitize_recommit(recommit: Duration) -> Duration {
    if recommit < MIN_RECOMMIT_INTERVAL {
        warn!(
            "Sanitizing recommit interval: provided {:?}, updated {:?}",
            recommit,
            MIN_RECOMMIT_INTERVAL
        );
        return MIN_RECOMMIT_INTERVAL;
    }
    recommit
}

/// Request to build and forward a candidate batch
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub token: CancellationToken,
    pub timestamp: Timestamp,
}

/// Idle until started, then one round per recommit interval while running.
///
/// A new round never signals the token of the previous one: rounds in
/// flight are left to finish.
pub struct RoundScheduler {
    recommit: Duration,
    running: Arc<AtomicBool>,
    start_rx: mpsc::Receiver<()>,
    requests: HandoffSender<BuildRequest>,
    shutdown: broadcast::Receiver<()>,

    /// Timestamp stamped by the last start signal
    timestamp: Timestamp,
}

impl RoundScheduler {
    pub fn new(
        recommit: Duration,
        running: Arc<AtomicBool>,
        start_rx: mpsc::Receiver<()>,
        requests: HandoffSender<BuildRequest>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            recommit: sanitize_recommit(recommit),
            running,
            start_rx,
            requests,
            shutdown,
            timestamp: 0,
        }
    }

    pub async fn run(mut self) {
        let timer = sleep(self.recommit);
        tokio::pin!(timer);
        let mut armed = false;

        loop {
            tokio::select! {
                Some(()) = self.start_rx.recv() => {
                    self.timestamp = unix_now();
                    if !self.emit(InterruptSignal::NewHead).await {
                        break;
                    }
                    timer.as_mut().reset(Instant::now() + self.recommit);
                    armed = true;
                }
                () = &mut timer, if armed => {
                    armed = false;
                    if self.running.load(Ordering::SeqCst) {
                        if !self.emit(InterruptSignal::Resubmit).await {
                            break;
                        }
                        timer.as_mut().reset(Instant::now() + self.recommit);
                        armed = true;
                    }
                }
                _ = self.shutdown.recv() => break,
            }
        }

        info!("Round scheduler stopped");
    }

    /// Hand a fresh request to the builder. `false` once shutting down.
    async fn emit(&mut self, reason: InterruptSignal) -> bool {
        let request = BuildRequest {
            token: CancellationToken::new(),
            timestamp: self.timestamp,
        };
        debug!("New round ({:?}) at {}", reason, request.timestamp);

        tokio::select! {
            sent = self.requests.send(request) => sent.is_ok(),
            _ = self.shutdown.recv() => false,
        }
    }
}
