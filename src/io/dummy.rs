use std::sync::mpsc;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};

use log::debug;

use crate::actuation_fail;
use crate::io::controls::pump::PumpControl;
use crate::io::controls::ActuationFailure;

pub trait DummyIO {
    type MessageType;
    type Config;

    fn create(config: &Self::Config) -> (Self, Sender<Self::MessageType>) where Self: Sized {
        let (sender, receiver) = mpsc::channel();
        let dummy_obj = Self::new(receiver, config);
        (dummy_obj, sender)
    }

    fn new(receiver: Receiver<Self::MessageType>, config: &Self::Config) -> Self;
}

pub fn read_all<T, F>(receiver: &Receiver<T>, mut on_value: F)
    where F: FnMut(T) {
    loop {
        match receiver.try_recv() {
            Ok(x) => on_value(x),
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => break,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct DummyPumpState {
    on: bool,
    failing: bool,
    /// Every command that was actually applied, in order.
    applied: Vec<bool>,
}

impl DummyPumpState {
    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn get_applied(&self) -> &[bool] {
        &self.applied
    }
}

/// In-memory pump whose state can be inspected and broken from a [DummyPumpHandle].
#[derive(Default)]
pub struct DummyPump {
    state: Arc<Mutex<DummyPumpState>>,
}

#[derive(Clone)]
pub struct DummyPumpHandle {
    state: Arc<Mutex<DummyPumpState>>,
}

impl DummyPump {
    pub fn create() -> (Self, DummyPumpHandle) {
        let pump = Self::default();
        let handle = DummyPumpHandle {
            state: pump.state.clone(),
        };
        (pump, handle)
    }
}

impl DummyPumpHandle {
    pub fn state(&self) -> DummyPumpState {
        self.state.lock().unwrap().clone()
    }

    /// Make every following command fail, as an unreachable actuator would.
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().unwrap().failing = failing;
    }

    /// Flip the switch behind the engine's back, as a person at the pump would.
    pub fn set_manually(&self, on: bool) {
        self.state.lock().unwrap().on = on;
    }
}

impl PumpControl for DummyPump {
    fn try_set_pump(&mut self, on: bool) -> Result<(), ActuationFailure> {
        let mut state = self.state.lock().unwrap();
        if state.failing {
            return Err(actuation_fail!("Dummy pump is unreachable"));
        }
        debug!("Set dummy pump to {}", on);
        state.on = on;
        state.applied.push(on);
        Ok(())
    }

    fn try_get_pump(&self) -> Result<bool, ActuationFailure> {
        let state = self.state.lock().unwrap();
        if state.failing {
            return Err(actuation_fail!("Dummy pump is unreachable"));
        }
        Ok(state.on)
    }
}
