// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printmate — prepare a document for print-shop ordering.
//
// Entry point. Initialises logging and dispatches the two faces of the tool:
// `prepare` (the order screen) and `view` (the preview window opened in its
// own process, fed through the shared preview store).

mod commands;
mod data_dir;
mod services;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use printmate_core::{Binding, ColorMode, Orientation, SideMode};

#[derive(Parser)]
#[command(name = "printmate", version, about = "Prepare a document for print-shop ordering")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Select pages, rotate, optionally convert to grayscale, and write the
    /// prepared artifact.
    Prepare {
        /// PDF or image file to prepare.
        file: PathBuf,

        /// Page range expression, e.g. "1-3,7". Empty selects all pages.
        #[arg(long, default_value = "")]
        pages: String,

        #[arg(long, value_enum, default_value_t = OrientationArg::Portrait)]
        orientation: OrientationArg,

        #[arg(long, value_enum, default_value_t = ColorArg::Bw)]
        color: ColorArg,

        #[arg(long, value_enum, default_value_t = SidesArg::Single)]
        sides: SidesArg,

        #[arg(long, value_enum, default_value_t = BindingArg::None)]
        binding: BindingArg,

        #[arg(long, default_value_t = 1)]
        copies: u32,

        /// Where to write the prepared document.
        #[arg(long, short, default_value = "prepared.pdf")]
        output: PathBuf,

        /// Open the prepared document in a separate viewer process.
        #[arg(long)]
        preview: bool,

        /// Also write a bounded strip of page thumbnails to this directory.
        #[arg(long)]
        thumbnails: Option<PathBuf>,
    },

    /// Wait for a prepared document from the order screen and render it.
    View {
        /// Payload id handed over by the order screen. Without one, this
        /// window was opened by hand and can only show a hint.
        payload_id: Option<String>,

        /// Path to the shared preview store.
        #[arg(long)]
        store: Option<PathBuf>,

        /// Directory for the received document and its rendered pages.
        #[arg(long, default_value = "preview-out")]
        out: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OrientationArg {
    Portrait,
    Landscape,
}

impl From<OrientationArg> for Orientation {
    fn from(value: OrientationArg) -> Self {
        match value {
            OrientationArg::Portrait => Orientation::Portrait,
            OrientationArg::Landscape => Orientation::Landscape,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ColorArg {
    Color,
    Bw,
}

impl From<ColorArg> for ColorMode {
    fn from(value: ColorArg) -> Self {
        match value {
            ColorArg::Color => ColorMode::Color,
            ColorArg::Bw => ColorMode::Bw,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SidesArg {
    Single,
    Double,
}

impl From<SidesArg> for SideMode {
    fn from(value: SidesArg) -> Self {
        match value {
            SidesArg::Single => SideMode::Single,
            SidesArg::Double => SideMode::Double,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum BindingArg {
    None,
    Soft,
    Spiral,
}

impl From<BindingArg> for Binding {
    fn from(value: BindingArg) -> Self {
        match value {
            BindingArg::None => Binding::None,
            BindingArg::Soft => Binding::Soft,
            BindingArg::Spiral => Binding::Spiral,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Prepare {
            file,
            pages,
            orientation,
            color,
            sides,
            binding,
            copies,
            output,
            preview,
            thumbnails,
        } => {
            commands::prepare::run(commands::prepare::PrepareArgs {
                file,
                pages,
                orientation: orientation.into(),
                color: color.into(),
                sides: sides.into(),
                binding: binding.into(),
                copies,
                output,
                preview,
                thumbnails,
            })
            .await
        }
        Command::View {
            payload_id,
            store,
            out,
        } => commands::view::run(payload_id, store, out).await,
    };

    if let Err(err) = result {
        let remedy = printmate_core::remedy::remedy_for(&err);
        eprintln!("{} {}", remedy.message, remedy.suggestion);
        tracing::error!(%err, "command failed");
        std::process::exit(1);
    }
}
