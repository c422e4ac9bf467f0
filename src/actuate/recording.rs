use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex};

use super::Actuator;

/// Shared record of every drive value written to a `RecordingActuator`.
#[derive(Clone, Debug, Default)]
pub struct WriteLog {
    values: Arc<Mutex<Vec<f64>>>,
}

impl WriteLog {
    pub fn values(&self) -> Vec<f64> {
        self.values
            .lock()
            .map(|values| values.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn last(&self) -> Option<f64> {
        self.values().last().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }

    fn push(&self, value: f64) -> Result<()> {
        self.values
            .lock()
            .map_err(|_| anyhow!("write log lock poisoned"))?
            .push(value);
        Ok(())
    }
}

/// Actuator that only records what it was told. Used for dry runs and tests.
pub struct RecordingActuator {
    name: String,
    log: WriteLog,
    fail: bool,
}

impl RecordingActuator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            log: WriteLog::default(),
            fail: false,
        }
    }

    /// Make every write fail, to exercise error paths.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Handle to the write log that stays valid after the actuator is boxed.
    pub fn log(&self) -> WriteLog {
        self.log.clone()
    }
}

impl Actuator for RecordingActuator {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn set_drive(&mut self, value: f64) -> Result<()> {
        if self.fail {
            return Err(anyhow!("{}: simulated write failure", self.name));
        }
        log::debug!("{}: drive {:+.3}", self.name, value);
        self.log.push(value)
    }
}
