use std::sync::mpsc::Receiver;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::io::dummy::{read_all, DummyIO};

use super::{Recommendation, RecommendationSource};

pub enum ModifyState {
    Set(Recommendation),
    Clear,
}

pub struct Dummy {
    receiver: Mutex<Receiver<ModifyState>>,
    current: Mutex<Option<Recommendation>>,
}

#[async_trait]
impl RecommendationSource for Dummy {
    async fn latest(&self) -> Result<Recommendation, String> {
        self.update_state();
        self.current
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| "No dummy recommendation set".to_owned())
    }
}

impl DummyIO for Dummy {
    type MessageType = ModifyState;
    type Config = ();

    fn new(receiver: Receiver<Self::MessageType>, _config: &Self::Config) -> Self {
        Dummy {
            receiver: Mutex::new(receiver),
            current: Mutex::new(None),
        }
    }
}

impl Dummy {
    fn update_state(&self) {
        let guard = self.receiver.lock().unwrap();
        read_all(&*guard, |message| {
            let mut current = self.current.lock().unwrap();
            match message {
                ModifyState::Set(recommendation) => *current = Some(recommendation),
                ModifyState::Clear => *current = None,
            }
        })
    }
}
