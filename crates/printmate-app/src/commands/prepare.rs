// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The order screen: upload, parameters, materialisation, price estimate,
// and the preview handoff.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use printmate_core::error::Result;
use printmate_core::{
    Binding, ColorMode, Orientation, PrepareConfig, PreviewPayload, SideMode, TransformParameters,
    pricing,
};
use printmate_handoff::store::STORE_FILE_NAME;
use printmate_handoff::{HandoffOutcome, PollOptions, PreviewStore, hand_off};
use printmate_prepare::{PrepareSession, PreviewMode};
use tracing::{info, warn};

use crate::data_dir;
use crate::services::{DirectorySurface, ProcessViewerLauncher};

pub struct PrepareArgs {
    pub file: PathBuf,
    pub pages: String,
    pub orientation: Orientation,
    pub color: ColorMode,
    pub sides: SideMode,
    pub binding: Binding,
    pub copies: u32,
    pub output: PathBuf,
    pub preview: bool,
    pub thumbnails: Option<PathBuf>,
}

pub async fn run(args: PrepareArgs) -> Result<()> {
    let config = PrepareConfig::default();
    let session = Arc::new(PrepareSession::new(config.clone()));

    let bytes = tokio::fs::read(&args.file).await?;
    let filename = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());

    session.set_document(bytes, &filename)?;

    let params = TransformParameters {
        range_expression: args.pages.trim().to_string(),
        orientation: args.orientation,
        color_mode: args.color,
        side_mode: args.sides,
        binding: args.binding,
        copies: args.copies,
    };
    session.set_params(params.clone());

    // The artifact that crosses the upload boundary is always a fresh,
    // non-superseded materialisation.
    let output = session.finalize().await?;

    tokio::fs::write(&args.output, &output.bytes).await?;
    let estimate = pricing::estimate(output.page_count, &params);
    println!(
        "Prepared {} page(s) into {} ({} bytes). Estimated cost: INR {}.",
        output.page_count,
        args.output.display(),
        output.bytes.len(),
        estimate
    );

    if let Some(dir) = &args.thumbnails {
        let mut surface = DirectorySurface::new(dir.clone());
        session
            .render_preview(
                PreviewMode::Strip {
                    max_pages: config.strip_page_limit,
                    viewport_height: config.strip_viewport_height,
                },
                &mut surface,
            )
            .await?;
        println!(
            "{} thumbnail(s) written to {}.",
            surface.pages().len(),
            dir.display()
        );
    }

    if args.preview {
        open_preview(&session, &config, &filename, output.bytes.clone()).await?;
    }

    Ok(())
}

/// Hand the artifact to a viewer process, falling back to inline page
/// rendering when the viewer or the store is unavailable.
async fn open_preview(
    session: &Arc<PrepareSession>,
    config: &PrepareConfig,
    filename: &str,
    bytes: Vec<u8>,
) -> Result<()> {
    let store_path = data_dir::data_dir().join(STORE_FILE_NAME);
    let store = match PreviewStore::open(&store_path) {
        Ok(store) => Some(store),
        Err(err) => {
            warn!(%err, "preview store unavailable");
            None
        }
    };

    let launcher = ProcessViewerLauncher::new(store_path);
    let payload = PreviewPayload::new(filename, bytes);
    let options = PollOptions {
        interval: Duration::from_millis(config.poll_interval_ms),
        timeout: Duration::from_millis(config.poll_timeout_ms),
    };

    let outcome = hand_off(store.as_ref(), &launcher, None, payload, options).await;
    match outcome {
        HandoffOutcome::Delivered { payload_id } => {
            info!(payload_id, "preview handed off");
            println!("Preview opened in a separate window.");
        }
        HandoffOutcome::DirectDelivered { payload_id } => {
            info!(payload_id, "preview delivered directly");
            println!("Preview delivered to the open viewer.");
        }
        HandoffOutcome::RenderInline => {
            let dir = PathBuf::from("preview-inline");
            let mut surface = DirectorySurface::new(dir.clone());
            session
                .render_preview(
                    PreviewMode::Full {
                        container_width: 900,
                    },
                    &mut surface,
                )
                .await?;
            println!(
                "Preview window unavailable; {} page image(s) written to {}.",
                surface.pages().len(),
                dir.display()
            );
        }
    }
    Ok(())
}
