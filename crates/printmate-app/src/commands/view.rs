// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The viewer process: poll the shared store for the payload id, consume it
// once, save the document, and render every page.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use printmate_core::PrepareConfig;
use printmate_core::error::Result;
use printmate_document::PageRenderer;
use printmate_handoff::store::STORE_FILE_NAME;
use printmate_handoff::{PollOptions, PreviewStore, await_payload};
use printmate_prepare::preview::DocumentPreviewSource;
use printmate_prepare::{JobSequencer, PreviewMode, PreviewRenderer};
use tracing::{info, warn};

use crate::data_dir;
use crate::services::DirectorySurface;

pub async fn run(
    payload_id: Option<String>,
    store_path: Option<PathBuf>,
    out: PathBuf,
) -> Result<()> {
    // Opened by hand, with nothing to wait for: all we can do is point the
    // user back at the order screen.
    let Some(payload_id) = payload_id else {
        println!("Open this window using the \"Open Preview\" button on the order screen.");
        return Ok(());
    };

    let config = PrepareConfig::default();
    let store_path = store_path.unwrap_or_else(|| data_dir::data_dir().join(STORE_FILE_NAME));
    let mut store = PreviewStore::open(&store_path)?;

    let options = PollOptions {
        interval: Duration::from_millis(config.poll_interval_ms),
        timeout: Duration::from_millis(config.poll_timeout_ms),
    };

    println!("Waiting for the document from the order screen…");
    let Some(payload) = await_payload(&mut store, &payload_id, options).await? else {
        println!("Still waiting for the document… Go back and click \"Open Preview\" again.");
        return Ok(());
    };

    info!(id = %payload.id, bytes = payload.bytes.len(), "payload received");

    tokio::fs::create_dir_all(&out).await?;
    let document_path = out.join(&payload.filename);
    tokio::fs::write(&document_path, &payload.bytes).await?;
    println!("Saved {}.", document_path.display());

    // Render every page; when no rendering library is installed the saved
    // document is still the full result.
    let renderer = match PageRenderer::new() {
        Ok(renderer) => Arc::new(renderer),
        Err(err) => {
            warn!(%err, "page rendering unavailable in this environment");
            println!("Page rendering unavailable; open the saved file directly.");
            return Ok(());
        }
    };

    let sequencer = JobSequencer::new();
    let token = sequencer.begin();
    let source = Arc::new(DocumentPreviewSource::new(
        renderer,
        Arc::new(payload.bytes),
    ));
    let mut surface = DirectorySurface::new(out.clone());

    PreviewRenderer::new(&config)
        .render(
            source,
            PreviewMode::Full {
                container_width: 900,
            },
            &token,
            &mut surface,
        )
        .await?;

    println!(
        "Rendered {} page image(s) into {}.",
        surface.pages().len(),
        out.display()
    );
    Ok(())
}
