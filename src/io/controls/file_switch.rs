use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actuation_fail;

use super::pump::PumpControl;
use super::ActuationFailure;

/// Publishes the desired pump state to a JSON file that the switch bridge applies.
pub struct FileSwitch {
    file: PathBuf,
    switch_reference: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct SwitchFileData {
    switch_reference: String,
    on: bool,
    updated_at: DateTime<Utc>,
}

impl FileSwitch {
    pub fn new(file: PathBuf, switch_reference: String) -> Self {
        Self { file, switch_reference }
    }

    fn read(&self) -> Result<Option<SwitchFileData>, ActuationFailure> {
        if !self.file.exists() {
            return Ok(None);
        }
        let s = fs::read_to_string(&self.file)
            .map_err(|e| actuation_fail!(format!("Failed to read {:?}: {}", self.file, e)))?;
        serde_json::from_str(&s)
            .map(Some)
            .map_err(|e| actuation_fail!(format!("Failed to deserialize {:?}: {}", self.file, e)))
    }
}

impl PumpControl for FileSwitch {
    fn try_set_pump(&mut self, on: bool) -> Result<(), ActuationFailure> {
        let data = SwitchFileData {
            switch_reference: self.switch_reference.clone(),
            on,
            updated_at: Utc::now(),
        };
        let s = serde_json::to_string_pretty(&data)
            .map_err(|e| actuation_fail!(format!("Failed to serialize switch state: {}", e)))?;
        // Readers never see a half written file.
        let tmp = self.file.with_extension("json.tmp");
        fs::write(&tmp, s).map_err(|e| actuation_fail!(format!("Failed to write {:?}: {}", tmp, e)))?;
        fs::rename(&tmp, &self.file)
            .map_err(|e| actuation_fail!(format!("Failed to write {:?}: {}", self.file, e)))
    }

    fn try_get_pump(&self) -> Result<bool, ActuationFailure> {
        Ok(self
            .read()?
            .filter(|data| data.switch_reference == self.switch_reference)
            .map(|data| data.on)
            .unwrap_or(false))
    }
}
