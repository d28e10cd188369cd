use async_trait::async_trait;
use serde::Deserialize;

use crate::filtration::mode::PoolMode;

pub mod file;

/// An operator request to the engine, as written by the presentation layer.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EngineCommand {
    /// Duration by name, e.g. "4H". Checked when applied, not when read.
    ActivateBoost { duration: String },
    CancelBoost,
    SetMode {
        #[serde(default)]
        mode: Option<PoolMode>,
    },
}

#[async_trait]
pub trait CommandSource {
    /// Every command queued since the last call, oldest first.
    async fn take_commands(&self) -> Vec<EngineCommand>;
}
