//! Clean step: drop the disposable temp root and recreate its skeleton.

use crate::diagnostic::{Diagnostics, Stage};
use crate::layout::DirectoryLayout;
use colored::*;

pub fn clean(layout: &DirectoryLayout) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    let existed = layout.temp.exists();

    if let Some(warning) = layout.clean().warning {
        println!("{} {}", "!".yellow(), warning);
        diagnostics.info(Stage::Clean, layout.temp.display().to_string(), warning);
    }
    if let Err(e) = layout.bootstrap() {
        diagnostics.error(
            Stage::Clean,
            layout.temp.display().to_string(),
            format!("{:#}", e),
        );
        return diagnostics;
    }

    if existed {
        println!("{} Removed {}", "✓".green(), layout.temp.display());
    } else {
        println!("{} Nothing to clean", "!".yellow());
    }
    diagnostics
}
