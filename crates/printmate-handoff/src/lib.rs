// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// printmate-handoff — Hand a prepared artifact from the order process to an
// independently running viewer process.
//
// Primary path: a single-producer/single-consumer mailbox in a shared SQLite
// store, consumed at most once by polling. Secondary path: an in-process
// direct channel for a viewer that is already open when the store fails.
// When neither works the producer renders the preview inline instead —
// functional degradation, never a hard failure.

pub mod channel;
pub mod store;

pub use channel::{
    DirectProducer, DirectViewer, HandoffOutcome, PollOptions, ViewerLauncher, await_payload,
    direct_pair, hand_off,
};
pub use store::PreviewStore;
