// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `cumulus deploy` command - Create or update a function from source.

use std::path::Path;

use cumulus_core::FunctionName;

use super::{connect, load_config};

pub async fn execute(
    config_path: Option<&Path>,
    name: &str,
    source: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let name = FunctionName::new(name)?;
    let config = load_config(config_path)?;
    let max_wait = config.deploy.max_wait;

    tracing::info!(function = %name, source = %source.display(), "Deploying function");
    let deployer = connect(config)?;

    match deployer.deploy(&name, source).await {
        Ok(result) => {
            println!("✓ {} {}", result.name, result.outcome);
            println!("  Package: {} ({} bytes)", result.package, result.package_size);
            println!("  SHA-256: {}", result.digest);
            println!(
                "  Ready after {} status checks in {:.1}s",
                result.polls,
                result.elapsed.as_secs_f64()
            );
            Ok(())
        }
        Err(e) if e.is_inconclusive() => {
            eprintln!("✗ {}", e);
            eprintln!(
                "  Gave up after {}s; check the function status before deploying again.",
                max_wait.as_secs()
            );
            std::process::exit(2);
        }
        Err(e) => Err(e.into()),
    }
}
