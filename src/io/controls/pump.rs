use log::{debug, info, warn};

use super::{to_on_off, ActuationFailure};

/// The actuation boundary: an abstract on/off command channel to the pool pump.
pub trait PumpControl {
    fn try_set_pump(&mut self, on: bool) -> Result<(), ActuationFailure>;

    fn try_get_pump(&self) -> Result<bool, ActuationFailure>;

    /// Switch the pump, doing nothing if it is already in the requested state.
    /// When the current state cannot be read the command is sent anyway.
    fn set_pump(&mut self, on: bool, message: Option<&str>) -> Result<(), ActuationFailure> {
        match self.try_get_pump() {
            Ok(current) if current == on => {
                debug!("Pump already {}, nothing to do", to_on_off(on));
                return Ok(());
            }
            Ok(current) => match message {
                Some(message) => info!("{message}: switching pump {}", to_on_off(on)),
                None => info!("Switching pump from {} to {}", to_on_off(current), to_on_off(on)),
            },
            Err(failure) => warn!(
                "Pump state unknown ({}), switching it {} anyway",
                failure.get_description(),
                to_on_off(on)
            ),
        }
        self.try_set_pump(on)
    }
}
