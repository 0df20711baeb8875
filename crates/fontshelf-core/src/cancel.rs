//! Interrupt token shared between the CLI and long-running work.
//!
//! The CLI's `ctrlc` handler calls [`CancellationToken::cancel`]; the scanner
//! checks the token between files and the synth runner polls it while
//! fluidsynth runs. The token also counts requests so a handler can escalate
//! on a repeated interrupt.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Cloneable stop flag. All clones share one request counter.
///
/// ```
/// use fontshelf_core::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handler = token.clone();
///
/// assert_eq!(handler.cancel(), 1);
/// assert!(token.is_cancelled());
/// assert_eq!(handler.cancel(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    requests: Arc<AtomicU32>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask running work to stop. Returns how many stop requests have been
    /// made so far, this one included.
    pub fn cancel(&self) -> u32 {
        self.requests
            .fetch_add(1, Ordering::SeqCst)
            .saturating_add(1)
    }

    pub fn is_cancelled(&self) -> bool {
        self.requests() > 0
    }

    /// Number of stop requests received.
    pub fn requests(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }
}
