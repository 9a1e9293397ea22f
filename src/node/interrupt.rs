// Interrupt - Cooperative cancellation of a building round
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Reason a round was asked to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InterruptSignal {
    None = 0,
    /// A new head arrived, the round's parent is stale
    NewHead = 1,
    /// The round is superseded by a resubmission
    Resubmit = 2,
}

impl InterruptSignal {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => InterruptSignal::NewHead,
            2 => InterruptSignal::Resubmit,
            _ => InterruptSignal::None,
        }
    }
}

/// Single-writer tri-state flag, minted fresh for every round and polled
/// once per selection step. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicU8>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self, signal: InterruptSignal) {
        self.0.store(signal as u8, Ordering::SeqCst);
    }

    pub fn load(&self) -> InterruptSignal {
        InterruptSignal::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn is_signaled(&self) -> bool {
        self.load() != InterruptSignal::None
    }
}
