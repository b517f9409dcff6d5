// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `cumulus invoke` command - Call a deployed function once.

use std::path::Path;

use bytes::Bytes;
use cumulus_core::FunctionName;

use super::{connect, load_config};

/// Validate a JSON event and serialise it for the wire. No event sends an
/// empty payload.
fn event_payload(payload: Option<&str>) -> Result<Bytes, serde_json::Error> {
    match payload {
        Some(text) => {
            let event: serde_json::Value = serde_json::from_str(text)?;
            Ok(Bytes::from(serde_json::to_vec(&event)?))
        }
        None => Ok(Bytes::new()),
    }
}

pub async fn execute(
    config_path: Option<&Path>,
    name: &str,
    payload: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let name = FunctionName::new(name)?;
    let payload = event_payload(payload).map_err(|e| format!("--payload is not valid JSON: {}", e))?;
    let deployer = connect(load_config(config_path)?)?;

    let invocation = deployer.invoke(&name, payload).await?;

    println!("{}", String::from_utf8_lossy(&invocation.response_payload));
    if !invocation.invocation_log.is_empty() {
        println!();
        println!("Log:");
        for line in String::from_utf8_lossy(&invocation.invocation_log).lines() {
            println!("  {}", line);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_payload() {
        assert!(event_payload(None).unwrap().is_empty());
        assert_eq!(
            event_payload(Some(r#"{ "name": "Ada" }"#)).unwrap(),
            Bytes::from_static(br#"{"name":"Ada"}"#)
        );
        assert!(event_payload(Some("{name: Ada}")).is_err());
    }
}
