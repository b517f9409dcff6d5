// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `cumulus delete` command - Remove a deployed function.

use std::path::Path;

use cumulus_core::FunctionName;

use super::{connect, load_config};

pub async fn execute(config_path: Option<&Path>, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let name = FunctionName::new(name)?;
    let deployer = connect(load_config(config_path)?)?;

    deployer.delete(&name).await?;
    println!("✓ {} deleted", name);

    Ok(())
}
