//! This is the CLI driver for legalizing graph units into their
//! opaque-operation form. For more detail, please see the documentation for
//! the [`opaline_compiler`] crate.

#![warn(clippy::all, clippy::cargo, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)] // Allows for better API naming
#![allow(clippy::multiple_crate_versions)] // Enforced by our dependencies

use clap::Parser;
use itertools::Itertools;
use opaline_compiler::{pass::transform::opaque::LegalizeToOpaque, Legalizer};
use opaline_errors::legalize::Result;
use opaline_ir::GraphUnit;
use tracing::{info, warn};

/// Legalizes every source-dialect node of a unit into an opaque operation,
/// rewriting the unit in place unless an output path is provided.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// The `.unit` file to legalize.
    input: String,

    /// Where to write the legalized unit. Defaults to rewriting the input
    /// file.
    #[arg(short, long)]
    output: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let unit = GraphUnit::read_from_file(&args.input)?;
    info!(unit = %unit.name, nodes = unit.len(), "Loaded unit");

    let result = Legalizer::default().run(unit)?;

    if let Some(data) = result.data.get::<LegalizeToOpaque>() {
        for warning in data.diagnostics.warnings() {
            warn!("{warning}");
        }
        if !data.diagnostics.is_empty() {
            let kinds = data
                .diagnostics
                .warnings()
                .iter()
                .map(|w| format!("{:?}", w.kind))
                .unique()
                .join(", ");
            warn!(
                count = data.diagnostics.len(),
                "Some attributes could not be encoded ({kinds})"
            );
        }
    }

    let output = args.output.unwrap_or(args.input);
    result.unit.write_to_file(&output)?;
    info!(path = %output, "Wrote legalized unit");

    Ok(())
}
