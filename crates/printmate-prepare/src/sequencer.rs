// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job supersession via a monotonic counter.
//
// The codec and render libraries offer no cancellation, so in-flight work is
// never interrupted — it is invalidated. Starting a job bumps the shared
// counter and captures the new value as a token; workers compare their token
// to the counter after every suspension point (and between pages inside
// blocking loops) and stop writing shared state the moment a newer job
// exists.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared monotonic job counter.
#[derive(Debug, Clone, Default)]
pub struct JobSequencer {
    counter: Arc<AtomicU64>,
}

impl JobSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new job, superseding every earlier token.
    pub fn begin(&self) -> JobToken {
        let sequence = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        JobToken {
            sequence,
            counter: Arc::clone(&self.counter),
        }
    }

    /// Capture the current job without starting a new one. The returned
    /// token stays current until the next `begin`, which lets ancillary work
    /// (preview rendering) ride along with the job that produced its input.
    pub fn observe(&self) -> JobToken {
        JobToken {
            sequence: self.counter.load(Ordering::SeqCst),
            counter: Arc::clone(&self.counter),
        }
    }
}

/// A captured position in the job sequence.
#[derive(Debug, Clone)]
pub struct JobToken {
    sequence: u64,
    counter: Arc<AtomicU64>,
}

impl JobToken {
    /// Whether this token still identifies the newest job.
    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.sequence
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}
