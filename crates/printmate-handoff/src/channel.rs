// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The handoff protocol.
//
// Producer: store the payload, launch the viewer parameterised with the
// payload id. Viewer: poll the store until the payload appears or the wait
// times out. When launching is blocked or the store is unusable, the
// producer degrades to rendering inline; when only the store write failed
// but a viewer is already open, the payload travels over a direct channel
// instead (the viewer announces readiness, the producer replies with the
// raw payload).

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use printmate_core::PreviewPayload;
use printmate_core::error::Result;

use crate::store::PreviewStore;

/// Polling cadence for the viewer-side wait.
#[derive(Debug, Clone, Copy)]
pub struct PollOptions {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(250),
            timeout: Duration::from_secs(15),
        }
    }
}

/// Opens the viewer context for a payload id.
///
/// The app implementation spawns the viewer process; tests substitute fakes.
/// An `Err` means the viewer could not be opened at all (the desktop
/// equivalent of a blocked popup).
pub trait ViewerLauncher {
    fn open_viewer(&self, payload_id: &str) -> Result<()>;
}

/// How the artifact reached (or failed to reach) the viewer.
#[derive(Debug, PartialEq, Eq)]
pub enum HandoffOutcome {
    /// Stored and viewer launched; the viewer will poll the store.
    Delivered { payload_id: String },
    /// Store write failed but a viewer was opened; payload was sent over
    /// the direct channel.
    DirectDelivered { payload_id: String },
    /// No viewer could be reached. Render the preview inline instead.
    RenderInline,
}

/// Hand a payload to a viewer context.
///
/// `store` is `None` when the shared store could not be opened at all.
/// `direct` is the producer end of the secondary channel, used only when
/// the store write fails after a viewer was successfully opened.
#[instrument(skip_all, fields(id = %payload.id))]
pub async fn hand_off(
    store: Option<&PreviewStore>,
    launcher: &dyn ViewerLauncher,
    direct: Option<&mut DirectProducer>,
    payload: PreviewPayload,
    options: PollOptions,
) -> HandoffOutcome {
    let payload_id = payload.id.clone();

    let Some(store) = store else {
        warn!("preview store unavailable, rendering inline");
        return HandoffOutcome::RenderInline;
    };

    // Opportunistic hygiene: drop leftovers no viewer ever picked up.
    let ttl = chrono::Duration::from_std(options.timeout)
        .unwrap_or_else(|_| chrono::Duration::seconds(15));
    let _ = store.sweep_expired(ttl);

    match store.put(&payload) {
        Ok(()) => match launcher.open_viewer(&payload_id) {
            Ok(()) => {
                info!(id = %payload_id, "viewer launched, payload awaiting pickup");
                HandoffOutcome::Delivered { payload_id }
            }
            Err(err) => {
                // Blocked viewer: the payload would rot in the store.
                warn!(%err, "viewer launch blocked, rendering inline");
                let _ = store.delete(&payload_id);
                HandoffOutcome::RenderInline
            }
        },
        Err(store_err) => {
            warn!(%store_err, "store write failed, trying direct delivery");
            if launcher.open_viewer(&payload_id).is_err() {
                return HandoffOutcome::RenderInline;
            }
            let Some(direct) = direct else {
                return HandoffOutcome::RenderInline;
            };
            match direct.deliver(payload, options.timeout).await {
                Ok(()) => HandoffOutcome::DirectDelivered { payload_id },
                Err(err) => {
                    warn!(%err, "direct delivery failed, rendering inline");
                    HandoffOutcome::RenderInline
                }
            }
        }
    }
}

/// Viewer-side wait: poll the store for the payload id until it appears or
/// the timeout elapses. Returns `Ok(None)` on timeout — the viewer shows a
/// "go back and reopen the preview" hint, not an error.
#[instrument(skip(store), fields(payload_id))]
pub async fn await_payload(
    store: &mut PreviewStore,
    payload_id: &str,
    options: PollOptions,
) -> Result<Option<PreviewPayload>> {
    let started = std::time::Instant::now();

    loop {
        if let Some(payload) = store.take(payload_id)? {
            debug!(
                waited_ms = started.elapsed().as_millis() as u64,
                "payload picked up"
            );
            return Ok(Some(payload));
        }
        if started.elapsed() >= options.timeout {
            debug!("payload wait timed out");
            return Ok(None);
        }
        tokio::time::sleep(options.interval).await;
    }
}

// ---------------------------------------------------------------------------
// Direct channel (secondary, unreliable path)
// ---------------------------------------------------------------------------

/// Producer end of the direct channel.
pub struct DirectProducer {
    ready_rx: mpsc::Receiver<String>,
    payload_tx: mpsc::Sender<PreviewPayload>,
}

/// Viewer end of the direct channel.
pub struct DirectViewer {
    ready_tx: mpsc::Sender<String>,
    payload_rx: mpsc::Receiver<PreviewPayload>,
}

/// Create a connected producer/viewer pair.
pub fn direct_pair() -> (DirectProducer, DirectViewer) {
    let (ready_tx, ready_rx) = mpsc::channel(1);
    let (payload_tx, payload_rx) = mpsc::channel(1);
    (
        DirectProducer {
            ready_rx,
            payload_tx,
        },
        DirectViewer {
            ready_tx,
            payload_rx,
        },
    )
}

impl DirectProducer {
    /// Wait for the viewer's readiness announcement, then reply with the
    /// payload. Fails if the viewer never announces within `timeout`.
    pub async fn deliver(
        &mut self,
        payload: PreviewPayload,
        timeout: Duration,
    ) -> std::result::Result<(), String> {
        let announced = tokio::time::timeout(timeout, self.ready_rx.recv())
            .await
            .map_err(|_| "viewer never announced readiness".to_string())?
            .ok_or_else(|| "viewer channel closed".to_string())?;
        debug!(channel_id = %announced, "viewer ready, sending payload");

        self.payload_tx
            .send(payload)
            .await
            .map_err(|_| "viewer went away before delivery".to_string())
    }
}

impl DirectViewer {
    /// Announce readiness to the producer.
    pub async fn announce_ready(&self, channel_id: &str) -> std::result::Result<(), String> {
        self.ready_tx
            .send(channel_id.to_string())
            .await
            .map_err(|_| "producer went away".to_string())
    }

    /// Receive the payload after announcing readiness.
    pub async fn recv_payload(&mut self, timeout: Duration) -> Option<PreviewPayload> {
        tokio::time::timeout(timeout, self.payload_rx.recv())
            .await
            .ok()
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printmate_core::PrintmateError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct OpenLauncher {
        opened: AtomicUsize,
    }

    impl OpenLauncher {
        fn new() -> Self {
            Self {
                opened: AtomicUsize::new(0),
            }
        }
    }

    impl ViewerLauncher for OpenLauncher {
        fn open_viewer(&self, _payload_id: &str) -> Result<()> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct BlockedLauncher;

    impl ViewerLauncher for BlockedLauncher {
        fn open_viewer(&self, _payload_id: &str) -> Result<()> {
            Err(PrintmateError::Storage("popup blocked".into()))
        }
    }

    fn payload() -> PreviewPayload {
        PreviewPayload::new("doc.pdf", vec![7; 32])
    }

    fn fast_poll() -> PollOptions {
        PollOptions {
            interval: Duration::from_millis(5),
            timeout: Duration::from_millis(100),
        }
    }

    #[tokio::test]
    async fn happy_path_stores_and_launches() {
        let store = PreviewStore::open_in_memory().expect("open");
        let launcher = OpenLauncher::new();
        let p = payload();
        let id = p.id.clone();

        let outcome = hand_off(Some(&store), &launcher, None, p, fast_poll()).await;
        assert_eq!(outcome, HandoffOutcome::Delivered { payload_id: id.clone() });
        assert_eq!(launcher.opened.load(Ordering::SeqCst), 1);

        // The payload really is waiting in the store.
        let mut store = store;
        assert!(store.take(&id).expect("take").is_some());
    }

    #[tokio::test]
    async fn blocked_viewer_degrades_inline_and_rolls_back() {
        let store = PreviewStore::open_in_memory().expect("open");
        let p = payload();
        let id = p.id.clone();

        let outcome = hand_off(Some(&store), &BlockedLauncher, None, p, fast_poll()).await;
        assert_eq!(outcome, HandoffOutcome::RenderInline);

        // Nothing left to rot in the store.
        let mut store = store;
        assert!(store.take(&id).expect("take").is_none());
    }

    #[tokio::test]
    async fn missing_store_degrades_inline() {
        let launcher = OpenLauncher::new();
        let outcome = hand_off(None, &launcher, None, payload(), fast_poll()).await;
        assert_eq!(outcome, HandoffOutcome::RenderInline);
        // Without a store there is no id to poll, so no viewer is opened.
        assert_eq!(launcher.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn await_payload_picks_up_a_late_write() {
        let mut consumer_store = PreviewStore::open_in_memory().expect("open");
        // In-memory databases are per-connection, so stage the payload
        // through the same connection the consumer polls.
        let p = payload();
        let id = p.id.clone();
        consumer_store.put(&p).expect("put");

        let received = await_payload(&mut consumer_store, &id, fast_poll())
            .await
            .expect("poll")
            .expect("payload present");
        assert_eq!(received.bytes, vec![7; 32]);

        // Consumed exactly once.
        assert!(consumer_store.take(&id).expect("take").is_none());
    }

    #[tokio::test]
    async fn await_payload_times_out_to_none() {
        let mut store = PreviewStore::open_in_memory().expect("open");
        let result = await_payload(&mut store, "never-arrives", fast_poll())
            .await
            .expect("poll");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn direct_channel_delivers_after_ready_announcement() {
        let (mut producer, mut viewer) = direct_pair();
        let p = payload();
        let expected = p.bytes.clone();

        let producer_task = tokio::spawn(async move {
            producer.deliver(p, Duration::from_millis(500)).await
        });

        viewer.announce_ready("channel-1").await.expect("announce");
        let received = viewer
            .recv_payload(Duration::from_millis(500))
            .await
            .expect("payload");
        assert_eq!(received.bytes, expected);

        producer_task.await.expect("join").expect("deliver");
    }

    #[tokio::test]
    async fn direct_delivery_times_out_without_a_viewer() {
        let (mut producer, _viewer) = direct_pair();
        let result = producer
            .deliver(payload(), Duration::from_millis(20))
            .await;
        assert!(result.is_err());
    }
}
