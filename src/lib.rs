//! Waste sorter
//!
//! Camera-driven sorting gate. Each frame from the camera is run through an
//! object detector; detected classes are mapped to a disposal category and two
//! servos steer the item into the matching bin.
//!
//! # Module Structure
//!
//! - `frame`: RGB frames handed from the camera to the detector and overlay
//! - `ingest`: Frame sources (V4L2 cameras, synthetic `stub://` source)
//! - `detect`: Detector backends (tract ONNX, scripted) and YOLO post-processing
//! - `sort`: Class table, category lists, per-frame routing to a disposal state
//! - `actuate`: Servo gate (rppal GPIO, recording actuator)
//! - `display`: Overlay layout and operator displays (OpenCV window, headless)
//! - `config`: Configuration file and `SORTER_*` environment overrides
//! - `sorter`: The control loop tying them together
//!
//! # Optional features
//!
//! - `ingest-v4l2`: V4L2 camera capture
//! - `backend-tract`: YOLOv8 ONNX inference through tract
//! - `actuator-rppal`: servo PWM on Raspberry Pi GPIO
//! - `display-opencv`: OpenCV preview window
//!
//! Without them the crate still runs end to end on the synthetic camera, the
//! scripted detector, recording actuators and the headless display.

pub mod actuate;
pub mod config;
pub mod detect;
pub mod display;
pub mod frame;
pub mod ingest;
pub mod sort;
pub mod sorter;

pub use actuate::{Actuator, AnglePresets, SorterGate};
pub use config::SorterConfig;
pub use detect::{BoundingBox, Detection, DetectorBackend};
pub use display::{AnnotatedFrame, OperatorDisplay};
pub use frame::{Frame, PixelFormat};
pub use ingest::FrameSource;
pub use sort::{Category, CategoryLists, ClassTable, DisposalState, Router, TieBreak};
pub use sorter::{LoopState, LoopStats, SortingLoop};
