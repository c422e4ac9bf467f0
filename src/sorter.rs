//! The sorting control loop.
//!
//! One iteration: capture a frame, detect objects, classify and route them,
//! command the gate, lay out the overlay, present it and poll for exit. The gate
//! is commanded every iteration, even when the decision did not change.

use anyhow::{anyhow, Context, Result};
use std::time::Instant;

use crate::actuate::{open_gate, SorterGate};
use crate::config::SorterConfig;
use crate::detect::{open_detector, DetectorBackend};
use crate::display::{annotate, open_display, FpsCounter, OperatorDisplay};
use crate::ingest::{open_source, FrameSource};
use crate::sort::{DisposalState, Router};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    /// Built, nothing connected yet.
    Idle,
    Running,
    Terminated,
}

/// Counters reported when the loop ends.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoopStats {
    pub frames: u64,
    pub state_changes: u64,
    /// Detections dropped because their class id was outside the class table.
    pub skipped_detections: u64,
    pub last_state: DisposalState,
}

pub struct SortingLoop {
    source: Box<dyn FrameSource>,
    detector: Box<dyn DetectorBackend>,
    router: Router,
    gate: SorterGate,
    display: Box<dyn OperatorDisplay>,
    fps: FpsCounter,
    state: LoopState,
    disposal: Option<DisposalState>,
    stats: LoopStats,
}

impl SortingLoop {
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Box<dyn DetectorBackend>,
        router: Router,
        gate: SorterGate,
        display: Box<dyn OperatorDisplay>,
    ) -> Self {
        Self {
            source,
            detector,
            router,
            gate,
            display,
            fps: FpsCounter::new(),
            state: LoopState::Idle,
            disposal: None,
            stats: LoopStats::default(),
        }
    }

    /// Build every component named in `cfg`. Nothing is connected or moved yet.
    pub fn from_config(cfg: &SorterConfig) -> Result<Self> {
        let source = open_source(&cfg.camera)?;
        let detector = open_detector(&cfg.detector)?;
        let router = Router::new(cfg.classes.clone(), cfg.categories.clone())
            .with_tie_break(cfg.sorting.tie_break)
            .with_min_confidence(cfg.sorting.min_confidence);
        let gate = open_gate(&cfg.actuators)?;
        let display = open_display(&cfg.display)?;
        Ok(Self::new(source, detector, router, gate, display))
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Connect the camera, warm up the detector, then center the gate.
    ///
    /// The gate is only touched once the camera and detector are both ready, so
    /// a failed start leaves the actuators where they were.
    pub fn start(&mut self) -> Result<()> {
        if self.state != LoopState::Idle {
            return Err(anyhow!("sorting loop already started"));
        }
        self.source.connect().context("camera connect failed")?;
        self.detector
            .warm_up()
            .with_context(|| format!("detector {} warm-up failed", self.detector.name()))?;
        let angle = self.gate.center().context("centering the gate failed")?;
        log::info!(
            "sorter running: detector={} gate at {} degrees",
            self.detector.name(),
            angle
        );
        self.disposal = Some(DisposalState::Neutral);
        self.state = LoopState::Running;
        Ok(())
    }

    /// Run one iteration. Returns `false` once the operator asked to stop.
    pub fn step(&mut self) -> Result<bool> {
        if self.state != LoopState::Running {
            return Err(anyhow!("sorting loop is not running ({:?})", self.state));
        }
        let fps = self.fps.tick(Instant::now());

        let frame = self.source.next_frame().context("frame capture failed")?;
        let detections = self.detector.detect(&frame).context("detection failed")?;
        let decision = self.router.route(&detections);

        if decision.out_of_range > 0 {
            log::debug!(
                "skipped {} detection(s) with unknown class ids",
                decision.out_of_range
            );
            self.stats.skipped_detections += decision.out_of_range as u64;
        }

        let angle = self.gate.command(decision.state)?;
        if self.disposal != Some(decision.state) {
            log::info!(
                "disposal {} -> {} (gate {} degrees)",
                self.disposal.unwrap_or_default(),
                decision.state,
                angle
            );
            self.disposal = Some(decision.state);
            self.stats.state_changes += 1;
        }
        log::debug!(
            "frame {}: {} detection(s), {} matched, state={}, fps={:.1}, latency={:?}",
            self.stats.frames + 1,
            detections.len(),
            decision.annotations.len(),
            decision.state,
            fps,
            frame.captured_at.elapsed()
        );

        let annotated = annotate(frame, &decision, fps);
        self.display.present(&annotated)?;
        self.stats.frames += 1;
        self.stats.last_state = decision.state;

        if self.display.poll_exit()? {
            self.state = LoopState::Terminated;
            return Ok(false);
        }
        Ok(true)
    }

    /// Start (unless already running), iterate until the operator exits or an
    /// error occurs, then shut down.
    ///
    /// Components are released on every path out.
    pub fn run(mut self) -> Result<LoopStats> {
        let result: Result<()> = (|| {
            if self.state == LoopState::Idle {
                self.start()?;
            }
            while self.step()? {}
            Ok(())
        })();
        self.shutdown();
        result.map(|_| self.stats.clone())
    }

    /// Release the camera, actuators and display. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.source.close();
        self.gate.release();
        self.display.close();
        if self.state != LoopState::Idle {
            let source = self.source.stats();
            log::info!(
                "sorter stopped: {} frames processed, {} captured from {}, {} state change(s)",
                self.stats.frames,
                source.frames_captured,
                source.device,
                self.stats.state_changes
            );
        }
        self.state = LoopState::Terminated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuate::{AnglePresets, RecordingActuator};
    use crate::config::CameraSettings;
    use crate::detect::{BoundingBox, Detection, ScriptedBackend};
    use crate::display::HeadlessDisplay;
    use crate::frame::PixelFormat;
    use crate::ingest::SyntheticSource;
    use std::time::Duration;

    fn build(script: Vec<Vec<Detection>>, frames: u64) -> (SortingLoop, crate::actuate::WriteLog) {
        let source = SyntheticSource::new(CameraSettings {
            device: "stub://test".to_string(),
            width: 64,
            height: 48,
            pixel_format: PixelFormat::Rgb24,
            target_fps: 0,
        });
        let first = RecordingActuator::new("servo17");
        let log = first.log();
        let gate = SorterGate::new(
            Box::new(first),
            Box::new(RecordingActuator::new("servo27")),
            AnglePresets::default(),
        );
        let display = HeadlessDisplay::new(Duration::from_secs(60)).with_frame_limit(frames);
        let sorter = SortingLoop::new(
            Box::new(source),
            Box::new(ScriptedBackend::new(script)),
            Router::default(),
            gate,
            Box::new(display),
        );
        (sorter, log)
    }

    fn banana() -> Detection {
        Detection::new(BoundingBox::new(2, 2, 20, 20), 46, 0.9)
    }

    #[test]
    fn step_requires_start() {
        let (mut sorter, log) = build(vec![], 1);
        assert!(sorter.step().is_err());
        assert!(log.is_empty());
    }

    #[test]
    fn start_centers_then_each_frame_commands_the_gate() -> Result<()> {
        let (mut sorter, log) = build(vec![vec![banana()], vec![]], 4);
        sorter.start()?;
        assert_eq!(log.values(), vec![0.0]);

        assert!(sorter.step()?);
        assert!(sorter.step()?);
        assert!(sorter.step()?);
        assert!(!sorter.step()?);
        assert_eq!(sorter.state(), LoopState::Terminated);

        // Neutral, then bio / neutral / bio / neutral.
        assert_eq!(log.values(), vec![0.0, -0.5, 0.0, -0.5, 0.0]);
        assert_eq!(sorter.stats().frames, 4);
        assert_eq!(sorter.stats().state_changes, 4);
        Ok(())
    }

    #[test]
    fn repeated_state_still_writes() -> Result<()> {
        let (sorter, log) = build(vec![vec![banana()]], 3);
        let stats = sorter.run()?;
        assert_eq!(stats.state_changes, 1);
        assert_eq!(stats.last_state, DisposalState::Bio);
        assert_eq!(log.values(), vec![0.0, -0.5, -0.5, -0.5]);
        Ok(())
    }

    #[test]
    fn run_continues_an_already_started_loop() -> Result<()> {
        let (mut sorter, log) = build(vec![vec![banana()]], 2);
        sorter.start()?;
        let stats = sorter.run()?;
        assert_eq!(stats.frames, 2);
        // Centered once by start, not again by run.
        assert_eq!(log.values(), vec![0.0, -0.5, -0.5]);
        Ok(())
    }

    #[test]
    fn start_twice_is_rejected() -> Result<()> {
        let (mut sorter, _log) = build(vec![], 1);
        sorter.start()?;
        assert!(sorter.start().is_err());
        Ok(())
    }
}
