pub mod commands;
pub mod controls;
pub mod dummy;
pub mod dummy_io_bundle;
pub mod live_data;
pub mod recommendation;

use crate::filtration::events::EventSink;
use crate::io::controls::pump::PumpControl;

/// Everything the engine talks to on the outside during a tick.
pub struct IOBundle {
    pump: Box<dyn PumpControl + Send>,
    events: Box<dyn EventSink + Send>,
}

impl IOBundle {
    pub fn new(pump: impl PumpControl + Send + 'static, events: impl EventSink + Send + 'static) -> IOBundle {
        IOBundle {
            pump: Box::new(pump),
            events: Box::new(events),
        }
    }

    /// Point the engine at a different actuator from the next command on.
    pub fn replace_pump(&mut self, pump: impl PumpControl + Send + 'static) {
        self.pump = Box::new(pump);
    }

    pub fn pump(&mut self) -> &mut dyn PumpControl {
        &mut *self.pump
    }

    pub fn events(&mut self) -> &mut dyn EventSink {
        &mut *self.events
    }
}
