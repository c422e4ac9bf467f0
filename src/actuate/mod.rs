//! Actuator driver.
//!
//! Two hobby servos steer the item into a bin. Positions are requested as angles
//! (0-180 degrees) and written as a normalized drive value in [-1, +1]. Control is
//! open loop: nothing is read back from the hardware.
//!
//! - `GpioServo`: software PWM on a Raspberry Pi GPIO pin (feature: actuator-rppal)
//! - `RecordingActuator`: in-memory actuator for dry runs and tests

#[cfg(feature = "actuator-rppal")]
pub mod gpio;
pub mod recording;

use anyhow::{Context, Result};

use crate::config::{ActuatorKind, ActuatorSettings};
use crate::sort::DisposalState;

#[cfg(feature = "actuator-rppal")]
pub use gpio::GpioServo;
pub use recording::{RecordingActuator, WriteLog};

/// Angle at the center of the servo range.
pub const CENTER_ANGLE: f64 = 90.0;

/// Map an angle in degrees to a drive value: 0 -> -1.0, 90 -> 0.0, 180 -> +1.0.
///
/// Angles outside 0-180 map outside [-1, +1]; drivers decide what to do with them.
pub fn angle_to_drive(angle: f64) -> f64 {
    (angle - CENTER_ANGLE) / CENTER_ANGLE
}

/// Inverse of `angle_to_drive`.
pub fn drive_to_angle(value: f64) -> f64 {
    CENTER_ANGLE + value * CENTER_ANGLE
}

/// A positionable actuator taking normalized drive values.
pub trait Actuator {
    /// Identifier for logs (pin number, name).
    fn name(&self) -> String;

    /// Write a drive value. Open loop; no acknowledgement.
    fn set_drive(&mut self, value: f64) -> Result<()>;

    /// Stop driving the output. Safe to call more than once.
    fn release(&mut self) {}
}

/// Convert `angle` and write it to `actuator`.
pub fn set_position(actuator: &mut dyn Actuator, angle: f64) -> Result<()> {
    actuator
        .set_drive(angle_to_drive(angle))
        .with_context(|| format!("position {} to {} degrees", actuator.name(), angle))
}

/// Angle presets for each disposal state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnglePresets {
    pub neutral: f64,
    pub bio: f64,
    pub nonbio: f64,
}

impl AnglePresets {
    pub fn angle_for(&self, state: DisposalState) -> f64 {
        match state {
            DisposalState::Neutral => self.neutral,
            DisposalState::Bio => self.bio,
            DisposalState::NonBio => self.nonbio,
        }
    }
}

impl Default for AnglePresets {
    fn default() -> Self {
        Self {
            neutral: 90.0,
            bio: 45.0,
            nonbio: 135.0,
        }
    }
}

/// The sorting gate: two actuators moved together to the preset for a state.
pub struct SorterGate {
    actuators: [Box<dyn Actuator>; 2],
    presets: AnglePresets,
}

impl SorterGate {
    pub fn new(first: Box<dyn Actuator>, second: Box<dyn Actuator>, presets: AnglePresets) -> Self {
        Self {
            actuators: [first, second],
            presets,
        }
    }

    /// Drive both actuators to the angle for `state`. Returns the commanded angle.
    pub fn command(&mut self, state: DisposalState) -> Result<f64> {
        let angle = self.presets.angle_for(state);
        for actuator in self.actuators.iter_mut() {
            set_position(actuator.as_mut(), angle)?;
        }
        Ok(angle)
    }

    /// Drive both actuators to neutral.
    pub fn center(&mut self) -> Result<f64> {
        self.command(DisposalState::Neutral)
    }

    pub fn release(&mut self) {
        for actuator in self.actuators.iter_mut() {
            actuator.release();
        }
    }
}

/// Build the gate described by the settings.
pub fn open_gate(settings: &ActuatorSettings) -> Result<SorterGate> {
    let [first, second] = settings.pins;
    let (a, b): (Box<dyn Actuator>, Box<dyn Actuator>) = match settings.backend {
        ActuatorKind::Recording => (
            Box::new(RecordingActuator::new(format!("servo{}", first))),
            Box::new(RecordingActuator::new(format!("servo{}", second))),
        ),
        ActuatorKind::Gpio => {
            #[cfg(feature = "actuator-rppal")]
            {
                (
                    Box::new(GpioServo::open(first, &settings.pulse)?),
                    Box::new(GpioServo::open(second, &settings.pulse)?),
                )
            }
            #[cfg(not(feature = "actuator-rppal"))]
            {
                return Err(anyhow::anyhow!(
                    "GPIO servos on pins {} and {} require the actuator-rppal feature",
                    first,
                    second
                ));
            }
        }
    };
    Ok(SorterGate::new(a, b, settings.presets))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn angle_mapping_is_exact() {
        assert_eq!(angle_to_drive(0.0), -1.0);
        assert_eq!(angle_to_drive(90.0), 0.0);
        assert_eq!(angle_to_drive(180.0), 1.0);
        assert_eq!(angle_to_drive(45.0), -0.5);
        assert_eq!(angle_to_drive(135.0), 0.5);
    }

    #[test]
    fn presets_round_trip_through_drive_values() {
        for angle in [45.0, 90.0, 135.0] {
            assert_eq!(drive_to_angle(angle_to_drive(angle)), angle);
        }
    }

    #[test]
    fn out_of_range_angles_pass_through() {
        assert_eq!(angle_to_drive(270.0), 2.0);
        assert_eq!(angle_to_drive(-90.0), -2.0);
    }

    #[test]
    fn gate_moves_both_actuators_together() -> Result<()> {
        let first = RecordingActuator::new("a");
        let second = RecordingActuator::new("b");
        let (log_a, log_b) = (first.log(), second.log());
        let mut gate = SorterGate::new(Box::new(first), Box::new(second), AnglePresets::default());

        assert_eq!(gate.center()?, 90.0);
        assert_eq!(gate.command(DisposalState::Bio)?, 45.0);
        assert_eq!(gate.command(DisposalState::NonBio)?, 135.0);

        assert_eq!(log_a.values(), vec![0.0, -0.5, 0.5]);
        assert_eq!(log_b.values(), vec![0.0, -0.5, 0.5]);
        Ok(())
    }

    #[test]
    fn failed_write_reports_actuator_and_angle() {
        let mut broken = RecordingActuator::new("left").failing();
        let err = set_position(&mut broken, 45.0).unwrap_err();
        assert!(format!("{:#}", err).contains("left"));
    }
}
