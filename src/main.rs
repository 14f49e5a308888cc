//
// main.rs
// Dti-Lesion-Stats-rs
//
// Binary entry point that hands off execution to the CLI layer.
//

use dti_lesion_stats::cli;

fn main() -> anyhow::Result<()> {
    cli::run()
}
