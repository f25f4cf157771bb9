//! Process-wide gateway instance.
//!
//! The gateway is created once and reused by every caller; it is never torn
//! down. Its transport worker runs on the tokio runtime that was current
//! during [`init`], so that runtime must outlive all calls.

use crate::config::{ConfigError, GatewayConfig};
use crate::gateway::Gateway;
use std::sync::OnceLock;

static GATEWAY: OnceLock<Gateway> = OnceLock::new();

/// Create the shared gateway, or return it if it already exists.
///
/// Later calls ignore `config`.
///
/// # Errors
/// Returns `ConfigError` if the first initialization fails; nothing is
/// stored in that case and a later call may retry.
pub fn init(config: &GatewayConfig) -> Result<&'static Gateway, ConfigError> {
    if let Some(gateway) = GATEWAY.get() {
        return Ok(gateway);
    }

    let gateway = Gateway::new(config)?;
    Ok(GATEWAY.get_or_init(|| gateway))
}

/// The shared gateway, if [`init`] has succeeded
#[must_use]
pub fn gateway() -> Option<&'static Gateway> {
    GATEWAY.get()
}
