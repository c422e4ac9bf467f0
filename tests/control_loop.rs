use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex};

use waste_sorter::actuate::{RecordingActuator, WriteLog};
use waste_sorter::config::CameraSettings;
use waste_sorter::detect::ScriptedBackend;
use waste_sorter::ingest::{SourceStats, SyntheticSource};
use waste_sorter::{
    AnglePresets, AnnotatedFrame, BoundingBox, Detection, DetectorBackend, DisposalState, Frame,
    FrameSource, LoopState, OperatorDisplay, PixelFormat, Router, SorterGate, SortingLoop,
};

const BANANA: usize = 46;
const BOTTLE: usize = 39;
const PERSON: usize = 0;

#[derive(Clone, Debug, PartialEq)]
struct Presented {
    state: DisposalState,
    fps: f64,
    annotations: usize,
}

#[derive(Clone, Default)]
struct DisplayLog {
    frames: Arc<Mutex<Vec<Presented>>>,
    closed: Arc<Mutex<bool>>,
}

impl DisplayLog {
    fn frames(&self) -> Vec<Presented> {
        self.frames.lock().unwrap().clone()
    }

    fn closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

/// Stands in for the window: the exit key is "pressed" after `exit_after` frames.
struct ScriptedDisplay {
    log: DisplayLog,
    exit_after: usize,
}

impl OperatorDisplay for ScriptedDisplay {
    fn present(&mut self, frame: &AnnotatedFrame) -> Result<()> {
        self.log.frames.lock().unwrap().push(Presented {
            state: frame.state,
            fps: frame.fps,
            annotations: frame.annotations(),
        });
        Ok(())
    }

    fn poll_exit(&mut self) -> Result<bool> {
        Ok(self.log.frames.lock().unwrap().len() >= self.exit_after)
    }

    fn close(&mut self) {
        *self.log.closed.lock().unwrap() = true;
    }
}

struct UnpluggedCamera;

impl FrameSource for UnpluggedCamera {
    fn connect(&mut self) -> Result<()> {
        Err(anyhow!("/dev/video0: no such device"))
    }

    fn next_frame(&mut self) -> Result<Frame> {
        Err(anyhow!("not connected"))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: 0,
            device: "/dev/video0".to_string(),
        }
    }
}

/// A detector whose model never loads.
struct ColdDetector;

impl DetectorBackend for ColdDetector {
    fn name(&self) -> &'static str {
        "cold"
    }

    fn warm_up(&mut self) -> Result<()> {
        Err(anyhow!("model file missing"))
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        Ok(vec![])
    }
}

fn camera() -> Box<dyn FrameSource> {
    Box::new(SyntheticSource::new(CameraSettings {
        device: "stub://bench".to_string(),
        width: 160,
        height: 120,
        pixel_format: PixelFormat::Rgb24,
        target_fps: 0,
    }))
}

fn detection(class_id: usize, confidence: f32) -> Detection {
    Detection::new(BoundingBox::new(10, 30, 60, 90), class_id, confidence)
}

struct Bench {
    sorter: SortingLoop,
    servos: [WriteLog; 2],
    display: DisplayLog,
}

fn bench(source: Box<dyn FrameSource>, script: Vec<Vec<Detection>>) -> Bench {
    let exit_after = script.len().max(1);
    bench_with(source, Box::new(ScriptedBackend::new(script)), exit_after)
}

fn bench_with(
    source: Box<dyn FrameSource>,
    detector: Box<dyn DetectorBackend>,
    exit_after: usize,
) -> Bench {
    let first = RecordingActuator::new("servo17");
    let second = RecordingActuator::new("servo27");
    let servos = [first.log(), second.log()];
    let gate = SorterGate::new(Box::new(first), Box::new(second), AnglePresets::default());
    let display = DisplayLog::default();
    let sorter = SortingLoop::new(
        source,
        detector,
        Router::default(),
        gate,
        Box::new(ScriptedDisplay {
            log: display.clone(),
            exit_after,
        }),
    );
    Bench {
        sorter,
        servos,
        display,
    }
}

#[test]
fn each_frame_drives_both_servos_to_its_preset() {
    let bench = bench(
        camera(),
        vec![
            vec![],
            vec![detection(BANANA, 0.9), detection(BOTTLE, 0.8)],
            vec![detection(BOTTLE, 0.8), detection(BANANA, 0.9)],
            vec![detection(PERSON, 0.99)],
            vec![detection(80, 0.9)],
        ],
    );
    let stats = bench.sorter.run().expect("run");

    // Start centers (90), then one write per frame: 90, 135, 45, 90, 90.
    let expected = vec![0.0, 0.0, 0.5, -0.5, 0.0, 0.0];
    assert_eq!(bench.servos[0].values(), expected);
    assert_eq!(bench.servos[1].values(), expected);

    let states: Vec<_> = bench.display.frames().iter().map(|f| f.state).collect();
    assert_eq!(
        states,
        vec![
            DisposalState::Neutral,
            DisposalState::NonBio,
            DisposalState::Bio,
            DisposalState::Neutral,
            DisposalState::Neutral,
        ]
    );
    assert_eq!(stats.frames, 5);
    assert_eq!(stats.skipped_detections, 1);
    assert_eq!(stats.last_state, DisposalState::Neutral);
    assert!(bench.display.closed());
}

#[test]
fn only_categorized_detections_are_annotated() {
    let bench = bench(
        camera(),
        vec![vec![
            detection(PERSON, 0.99),
            detection(BANANA, 0.6),
            detection(80, 0.9),
            detection(BOTTLE, 0.7),
        ]],
    );
    bench.sorter.run().expect("run");

    let frames = bench.display.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].annotations, 2);
    assert_eq!(frames[0].state, DisposalState::NonBio);
}

#[test]
fn first_frame_reports_zero_fps() {
    let bench = bench(camera(), vec![vec![], vec![], vec![]]);
    bench.sorter.run().expect("run");

    let frames = bench.display.frames();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].fps, 0.0);
    assert!(frames[1..].iter().all(|f| f.fps >= 0.0));
}

#[test]
fn camera_failure_leaves_servos_untouched() {
    let bench = bench(Box::new(UnpluggedCamera), vec![vec![detection(BANANA, 0.9)]]);
    let err = bench.sorter.run().expect_err("camera must fail");

    assert!(format!("{err:#}").contains("no such device"), "{err:#}");
    assert!(bench.servos[0].is_empty());
    assert!(bench.servos[1].is_empty());
    assert!(bench.display.frames().is_empty());
    assert!(bench.display.closed());
}

#[test]
fn detector_warm_up_failure_leaves_servos_untouched() {
    let bench = bench_with(camera(), Box::new(ColdDetector), 1);
    let err = bench.sorter.run().expect_err("warm-up must fail");

    assert!(format!("{err:#}").contains("model file missing"), "{err:#}");
    assert!(bench.servos[0].is_empty());
    assert!(bench.servos[1].is_empty());
    assert!(bench.display.frames().is_empty());
    assert!(bench.display.closed());
}

#[test]
fn exit_request_stops_after_the_current_frame() {
    let mut bench = bench(camera(), vec![vec![detection(BANANA, 0.9)]]);
    bench.sorter.start().expect("start");
    assert_eq!(bench.sorter.state(), LoopState::Running);

    assert!(!bench.sorter.step().expect("step"));
    assert_eq!(bench.sorter.state(), LoopState::Terminated);
    assert_eq!(bench.servos[0].last(), Some(-0.5));
    assert!(bench.sorter.step().is_err());

    bench.sorter.shutdown();
    bench.sorter.shutdown();
    assert!(bench.display.closed());
}

#[test]
fn actuator_failure_ends_the_loop() {
    let gate = SorterGate::new(
        Box::new(RecordingActuator::new("servo17").failing()),
        Box::new(RecordingActuator::new("servo27")),
        AnglePresets::default(),
    );
    let display = DisplayLog::default();
    let sorter = SortingLoop::new(
        camera(),
        Box::new(ScriptedBackend::new(vec![])),
        Router::default(),
        gate,
        Box::new(ScriptedDisplay {
            log: display.clone(),
            exit_after: 10,
        }),
    );
    let err = sorter.run().expect_err("write failure");
    assert!(format!("{err:#}").contains("servo17"), "{err:#}");
    assert!(display.closed());
}
