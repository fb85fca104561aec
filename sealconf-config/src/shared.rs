//! Process-wide pipeline for use before dependency wiring exists.
//!
//! Server applications typically need the settings pipeline while building
//! their configuration, before any injection container is available. This
//! is that one piece of process-wide state, made explicit: a one-time
//! initializer and an accessor with a distinct not-yet-initialized failure.

use crate::error::{ConfigError, ConfigResult};
use sealconf_protect::ProtectionPipeline;
use std::sync::{Arc, OnceLock};

static SHARED_PIPELINE: OnceLock<Arc<dyn ProtectionPipeline>> = OnceLock::new();

/// Installs the process-wide pipeline. Fails if one is already installed.
pub fn init_shared_pipeline(pipeline: Arc<dyn ProtectionPipeline>) -> ConfigResult<()> {
    SHARED_PIPELINE.set(pipeline).map_err(|_| {
        ConfigError::Configuration("shared pipeline already initialized".into())
    })
}

/// Returns the process-wide pipeline installed by [`init_shared_pipeline`].
pub fn shared_pipeline() -> ConfigResult<Arc<dyn ProtectionPipeline>> {
    SHARED_PIPELINE.get().cloned().ok_or_else(|| {
        ConfigError::Configuration(
            "shared pipeline not initialized — call init_shared_pipeline first".into(),
        )
    })
}
