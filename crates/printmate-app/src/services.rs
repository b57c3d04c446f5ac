// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Process-level wiring: launching the viewer process and writing rendered
// preview pages to disk.

use std::path::PathBuf;

use printmate_core::error::Result;
use printmate_handoff::ViewerLauncher;
use printmate_prepare::{PreviewPage, PreviewSurface};
use tracing::{debug, info, warn};

/// Launches the viewer as a separate OS process running `printmate view`.
///
/// Failure to spawn is the desktop equivalent of a blocked popup window: the
/// caller degrades to inline rendering.
pub struct ProcessViewerLauncher {
    store_path: PathBuf,
}

impl ProcessViewerLauncher {
    pub fn new(store_path: PathBuf) -> Self {
        Self { store_path }
    }
}

impl ViewerLauncher for ProcessViewerLauncher {
    fn open_viewer(&self, payload_id: &str) -> Result<()> {
        let exe = std::env::current_exe()?;
        let child = std::process::Command::new(exe)
            .arg("view")
            .arg(payload_id)
            .arg("--store")
            .arg(&self.store_path)
            .spawn()?;

        info!(pid = child.id(), payload_id, "viewer process launched");
        Ok(())
    }
}

/// Preview surface that writes each rendered page as a PNG file.
pub struct DirectorySurface {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl DirectorySurface {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            written: Vec::new(),
        }
    }

    /// Paths of the pages written so far, in render order.
    pub fn pages(&self) -> &[PathBuf] {
        &self.written
    }
}

impl PreviewSurface for DirectorySurface {
    fn clear(&mut self) {
        for path in self.written.drain(..) {
            if let Err(err) = std::fs::remove_file(&path) {
                debug!(path = %path.display(), %err, "stale preview page not removed");
            }
        }
    }

    fn push_page(&mut self, page: PreviewPage) {
        if let Err(err) = std::fs::create_dir_all(&self.dir) {
            warn!(%err, "cannot create preview directory");
            return;
        }
        let path = self.dir.join(format!("page-{:03}.png", page.page_number));
        match page.image.save(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "preview page written");
                self.written.push(path);
            }
            Err(err) => warn!(%err, "preview page not written"),
        }
    }
}
