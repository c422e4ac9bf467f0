#![cfg(feature = "actuator-rppal")]

use anyhow::{Context, Result};
use rppal::gpio::{Gpio, OutputPin};
use std::time::Duration;

use super::Actuator;
use crate::config::PulseSettings;

/// Hobby servo on a BCM GPIO pin, driven with software PWM.
///
/// A drive value of -1 maps to the minimum pulse width, +1 to the maximum, and 0
/// to the midpoint. Values outside [-1, +1] are clamped.
pub struct GpioServo {
    pin_number: u8,
    pin: OutputPin,
    pulse: PulseSettings,
}

impl GpioServo {
    pub fn open(pin_number: u8, pulse: &PulseSettings) -> Result<Self> {
        let pin = Gpio::new()
            .context("open GPIO controller")?
            .get(pin_number)
            .with_context(|| format!("claim GPIO pin {}", pin_number))?
            .into_output();
        log::info!("GpioServo: claimed BCM pin {}", pin_number);
        Ok(Self {
            pin_number,
            pin,
            pulse: *pulse,
        })
    }

    fn pulse_width(&self, value: f64) -> Duration {
        let value = value.clamp(-1.0, 1.0);
        let min = self.pulse.min.as_secs_f64();
        let max = self.pulse.max.as_secs_f64();
        Duration::from_secs_f64(min + (value + 1.0) / 2.0 * (max - min))
    }
}

impl Actuator for GpioServo {
    fn name(&self) -> String {
        format!("gpio{}", self.pin_number)
    }

    fn set_drive(&mut self, value: f64) -> Result<()> {
        if !(-1.0..=1.0).contains(&value) {
            log::warn!(
                "GpioServo: drive {:+.3} on pin {} clamped to [-1, +1]",
                value,
                self.pin_number
            );
        }
        let width = self.pulse_width(value);
        self.pin
            .set_pwm(self.pulse.period, width)
            .with_context(|| format!("set PWM on GPIO pin {}", self.pin_number))
    }

    fn release(&mut self) {
        if let Err(err) = self.pin.clear_pwm() {
            log::warn!("GpioServo: failed to stop PWM on pin {}: {}", self.pin_number, err);
        }
    }
}
