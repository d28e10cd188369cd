use std::fmt::{Display, Formatter};

use backtrace::Backtrace;

pub mod file_switch;
pub mod pump;

/// A command to the pump actuator that did not apply.
/// Never fatal, the engine retries on its next tick.
#[derive(Debug)]
pub struct ActuationFailure {
    description: String,
    trace: Backtrace,
    line_num: u32,
    file_name: String,
}

impl ActuationFailure {
    pub fn new(description: String, trace: Backtrace, line_num: u32, file_name: String) -> Self {
        Self {
            description,
            trace,
            line_num,
            file_name,
        }
    }

    pub fn get_description(&self) -> &str {
        &self.description
    }
}

impl Display for ActuationFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "ActuationFailure occured: '{}'", self.description)?;
        writeln!(f, "At: Line {} in {}", self.line_num, self.file_name)?;
        write!(f, "Trace:{:?}", self.trace)
    }
}

#[macro_export]
macro_rules! actuation_fail {
    ($msg:expr) => {{
        let trace = backtrace::Backtrace::new();
        $crate::io::controls::ActuationFailure::new($msg.to_string(), trace, line!(), file!().to_owned())
    }};
}

pub fn to_on_off(on: bool) -> &'static str {
    match on {
        true => "On",
        false => "Off",
    }
}
