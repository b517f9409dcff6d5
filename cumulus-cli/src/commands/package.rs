// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `cumulus package` command - Build a deployment package locally.
//!
//! Identical source trees always produce the same archive and digest.

use std::path::Path;

use cumulus_core::build_package;

pub async fn execute(source: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(source = %source.display(), "Building package");

    let package = build_package(source).await?;

    println!("✓ Packaged {} ({} bytes)", source.display(), package.len());
    println!();
    println!("Entries ({}):", package.entries().len());
    for entry in package.entries() {
        println!("  - {}", entry);
    }
    println!();
    println!("SHA-256: {}", package.digest());

    if let Some(output) = output {
        tokio::fs::write(output, package.bytes()).await?;
        println!("Written to {}", output.display());
    }

    Ok(())
}
