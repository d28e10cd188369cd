use std::sync::mpsc::{self, Receiver};

use crate::filtration::events::FiltrationEvent;

use super::dummy::{read_all, DummyPump, DummyPumpHandle, DummyPumpState};
use super::IOBundle;

pub struct DummyIOBundleHandle {
    pump_handle: DummyPumpHandle,
    events: Receiver<FiltrationEvent>,
}

impl DummyIOBundleHandle {
    pub fn pump(&self) -> &DummyPumpHandle {
        &self.pump_handle
    }

    pub fn pump_state(&self) -> DummyPumpState {
        self.pump_handle.state()
    }

    /// Every event published since the last call.
    pub fn take_events(&self) -> Vec<FiltrationEvent> {
        let mut events = Vec::new();
        read_all(&self.events, |event| events.push(event));
        events
    }
}

pub fn new_dummy_io() -> (IOBundle, DummyIOBundleHandle) {
    let (pump, pump_handle) = DummyPump::create();
    let (event_sender, events) = mpsc::channel();

    let io_bundle = IOBundle::new(pump, event_sender);

    let handle = DummyIOBundleHandle {
        pump_handle,
        events,
    };

    (io_bundle, handle)
}
