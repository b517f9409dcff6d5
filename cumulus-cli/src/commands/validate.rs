// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `cumulus validate` command - Validate configuration and environment.

use std::path::Path;

use cumulus_core::ConfigLoader;

pub async fn execute(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = ?config_path, "Validating configuration");

    match ConfigLoader::load(config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Service:");
            println!("  Region:           {}", config.client.region);
            println!("  Endpoint:         {}", config.client.endpoint);
            println!("  Storage Endpoint: {}", config.client.storage_endpoint);
            println!(
                "  Request Timeout:  {}s",
                config.client.request_timeout.as_secs()
            );
            println!();
            println!("Deploy:");
            println!("  Store:            {}", config.deploy.store);
            match config.deploy.log_retention {
                Some(retention) => println!("  Log Retention:    {}", retention),
                None => println!("  Log Retention:    service default"),
            }
            println!("  Max Wait:         {}s", config.deploy.max_wait.as_secs());
            println!(
                "  Polling:          {}ms initial, {}ms max, x{}",
                config.deploy.polling.initial_delay().as_millis(),
                config.deploy.polling.maximum_delay().as_millis(),
                config.deploy.polling.scaling()
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
