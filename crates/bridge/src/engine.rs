//! Engine connection and version gate

use contracts::ContractError;
use sim_client::SimClient;
use tracing::{info, instrument};

use crate::error::{BridgeError, Result};

/// Oldest engine version the bridge talks to
pub const MIN_ENGINE_VERSION: &str = "0.18.0";

/// Numeric components of a dotted version ("0.24.0.1" -> [0, 24, 0, 1])
fn components(version: &str) -> Option<Vec<u64>> {
    version
        .trim()
        .trim_start_matches('v')
        .split('.')
        .map(|part| part.parse().ok())
        .collect()
}

/// Compare dotted versions; missing trailing components count as zero
pub fn version_at_least(available: &str, required: &str) -> Option<bool> {
    let mut a = components(available)?;
    let mut r = components(required)?;
    let len = a.len().max(r.len());
    a.resize(len, 0);
    r.resize(len, 0);
    Some(a >= r)
}

/// Refuse engines older than [`MIN_ENGINE_VERSION`]
pub fn check_engine_version(available: &str) -> std::result::Result<(), ContractError> {
    match version_at_least(available, MIN_ENGINE_VERSION) {
        Some(true) => Ok(()),
        _ => Err(ContractError::EngineVersion {
            required: MIN_ENGINE_VERSION.to_string(),
            available: available.to_string(),
        }),
    }
}

/// Open the engine connection and gate on its version
///
/// Every failure here is fatal: the process does not retry.
#[instrument(name = "engine_connect", skip(client))]
pub async fn connect_engine<C: SimClient>(client: &C, host: &str, port: u16) -> Result<String> {
    client
        .connect(host, port)
        .await
        .map_err(|e| BridgeError::engine_fatal(format!("cannot connect to {host}:{port}: {e}")))?;

    let version = client
        .version()
        .await
        .map_err(|e| BridgeError::engine_fatal(format!("cannot read engine version: {e}")))?;
    check_engine_version(&version).map_err(|e| BridgeError::engine_fatal(e.to_string()))?;

    info!(version = %version, "Engine connected");
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_client::{MockConfig, MockSimClient};

    #[test]
    fn compares_dotted_versions() {
        assert_eq!(version_at_least("0.24.0.1", "0.18.0"), Some(true));
        assert_eq!(version_at_least("0.18", "0.18.0"), Some(true));
        assert_eq!(version_at_least("0.17.9", "0.18.0"), Some(false));
        assert_eq!(version_at_least("v1.0", "0.18.0"), Some(true));
        assert_eq!(version_at_least("dev", "0.18.0"), None);
    }

    #[test]
    fn unparsable_version_is_rejected() {
        assert!(check_engine_version("0.18.0").is_ok());
        assert!(matches!(
            check_engine_version("nightly"),
            Err(ContractError::EngineVersion { .. })
        ));
    }

    #[tokio::test]
    async fn old_engine_is_fatal() {
        let client = MockSimClient::with_config(MockConfig {
            version: "0.15.3".into(),
            ..MockConfig::default()
        });
        let err = connect_engine(&client, "localhost", 64256).await.unwrap_err();
        assert!(matches!(err, BridgeError::EngineFatal { .. }));
    }

    #[tokio::test]
    async fn refused_connection_is_fatal() {
        let client = MockSimClient::with_config(MockConfig {
            fail_connect: true,
            ..MockConfig::default()
        });
        let err = connect_engine(&client, "localhost", 64256).await.unwrap_err();
        assert!(matches!(err, BridgeError::EngineFatal { .. }));
        assert_eq!(client.call_count("version"), 0);
    }

    #[tokio::test]
    async fn supported_engine_connects() {
        let client = MockSimClient::new();
        assert_eq!(connect_engine(&client, "localhost", 64256).await.unwrap(), "0.24.0");
        assert!(client.is_connected());
    }
}
