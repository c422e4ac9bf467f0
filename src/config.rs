use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::actuate::AnglePresets;
use crate::detect::{BoundingBox, Detection};
use crate::frame::PixelFormat;
use crate::sort::{CategoryLists, ClassTable, TieBreak};

const DEFAULT_V4L2_DEVICE: &str = "/dev/video0";
const DEFAULT_STUB_DEVICE: &str = "stub://camera";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_PIXEL_FORMAT: PixelFormat = PixelFormat::Rgb24;
const DEFAULT_TARGET_FPS: u32 = 30;
const DEFAULT_MODEL_PATH: &str = "yolov8n.onnx";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
const DEFAULT_IOU_THRESHOLD: f32 = 0.7;
const DEFAULT_MAX_DETECTIONS: usize = 300;
const DEFAULT_PINS: [u8; 2] = [17, 27];
const DEFAULT_PWM_PERIOD_MS: f64 = 20.0;
const DEFAULT_MIN_PULSE_MS: f64 = 1.0;
const DEFAULT_MAX_PULSE_MS: f64 = 2.0;
const DEFAULT_WINDOW_TITLE: &str = "Waste Sorter";
const DEFAULT_EXIT_KEY: char = 'q';
const DEFAULT_STATUS_INTERVAL_SECS: u64 = 5;

/// Detections replayed by the scripted detector when no script is configured:
/// empty, banana, bottle, then both orders of a mixed frame and an ignored person.
const DEFAULT_SCRIPT: &[&[(&str, f32, [i32; 4])]] = &[
    &[],
    &[("banana", 0.91, [120, 140, 260, 300])],
    &[("bottle", 0.84, [360, 100, 460, 380])],
    &[
        ("banana", 0.77, [80, 160, 220, 320]),
        ("bottle", 0.66, [380, 120, 480, 400]),
    ],
    &[
        ("bottle", 0.71, [380, 120, 480, 400]),
        ("banana", 0.88, [80, 160, 220, 320]),
    ],
    &[("person", 0.95, [200, 40, 440, 470])],
];

#[derive(Debug, Deserialize, Default)]
struct SorterConfigFile {
    camera: Option<CameraConfigFile>,
    detector: Option<DetectorConfigFile>,
    classes: Option<ClassesConfigFile>,
    categories: Option<CategoriesConfigFile>,
    sorting: Option<SortingConfigFile>,
    actuators: Option<ActuatorsConfigFile>,
    display: Option<DisplayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    pixel_format: Option<String>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    input_size: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
    max_detections: Option<usize>,
    script: Option<Vec<Vec<ScriptedDetectionFile>>>,
}

#[derive(Debug, Deserialize)]
struct ScriptedDetectionFile {
    class: Option<String>,
    class_id: Option<usize>,
    confidence: f32,
    bbox: [i32; 4],
}

#[derive(Debug, Deserialize, Default)]
struct ClassesConfigFile {
    names: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct CategoriesConfigFile {
    biodegradable: Option<Vec<String>>,
    nonbiodegradable: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct SortingConfigFile {
    tie_break: Option<String>,
    min_confidence: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct ActuatorsConfigFile {
    backend: Option<String>,
    pins: Option<Vec<u8>>,
    neutral_angle: Option<f64>,
    bio_angle: Option<f64>,
    nonbio_angle: Option<f64>,
    pwm_period_ms: Option<f64>,
    min_pulse_ms: Option<f64>,
    max_pulse_ms: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    mode: Option<String>,
    window_title: Option<String>,
    exit_key: Option<char>,
    status_interval_secs: Option<u64>,
    frame_limit: Option<u64>,
}

/// Complete runtime configuration. Every field has a built-in default matching
/// the reference appliance (640x480 RGB camera, YOLOv8n, servos on BCM 17/27).
///
/// Component defaults follow the enabled features: a build without camera,
/// inference, GPIO or window support falls back to the synthetic camera, the
/// scripted detector, recording actuators and the headless display.
#[derive(Debug, Clone)]
pub struct SorterConfig {
    pub camera: CameraSettings,
    pub detector: DetectorSettings,
    pub classes: ClassTable,
    pub categories: CategoryLists,
    pub sorting: SortingSettings,
    pub actuators: ActuatorSettings,
    pub display: DisplaySettings,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub target_fps: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorKind {
    Tract,
    Scripted,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: DetectorKind,
    pub model_path: PathBuf,
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    /// Per-frame detections for the scripted backend.
    pub script: Vec<Vec<Detection>>,
}

#[derive(Debug, Clone, Copy)]
pub struct SortingSettings {
    pub tie_break: TieBreak,
    pub min_confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorKind {
    Gpio,
    Recording,
}

#[derive(Debug, Clone)]
pub struct ActuatorSettings {
    pub backend: ActuatorKind,
    pub pins: [u8; 2],
    pub presets: AnglePresets,
    pub pulse: PulseSettings,
}

/// Servo PWM timing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseSettings {
    pub period: Duration,
    pub min: Duration,
    pub max: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayKind {
    Window,
    Headless,
}

#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub mode: DisplayKind,
    pub window_title: String,
    pub exit_key: char,
    pub status_interval: Duration,
    pub frame_limit: Option<u64>,
}

impl SorterConfig {
    /// Load from `SORTER_CONFIG` (if set), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SORTER_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Load from an explicit file (JSON, or TOML by extension), then apply
    /// environment overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => SorterConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Swap every hardware component for its in-process stand-in: synthetic
    /// camera, scripted detector, recording actuators, headless display.
    pub fn into_dry_run(mut self) -> Self {
        if !self.camera.device.starts_with("stub://") {
            self.camera.device = DEFAULT_STUB_DEVICE.to_string();
        }
        self.detector.backend = DetectorKind::Scripted;
        self.actuators.backend = ActuatorKind::Recording;
        self.display.mode = DisplayKind::Headless;
        self
    }

    fn from_file(file: SorterConfigFile) -> Result<Self> {
        let camera = file.camera.unwrap_or_default();
        let camera = CameraSettings {
            device: camera
                .device
                .unwrap_or_else(|| default_camera_device().to_string()),
            width: camera.width.unwrap_or(DEFAULT_WIDTH),
            height: camera.height.unwrap_or(DEFAULT_HEIGHT),
            pixel_format: match camera.pixel_format {
                Some(format) => PixelFormat::parse(&format)?,
                None => DEFAULT_PIXEL_FORMAT,
            },
            target_fps: camera.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
        };

        let classes = match file.classes.and_then(|classes| classes.names) {
            Some(names) => ClassTable::new(names)?,
            None => ClassTable::coco(),
        };

        let detector = file.detector.unwrap_or_default();
        let script = match detector.script {
            Some(frames) => frames
                .into_iter()
                .map(|frame| {
                    frame
                        .into_iter()
                        .map(|entry| scripted_detection(entry, &classes))
                        .collect::<Result<Vec<_>>>()
                })
                .collect::<Result<Vec<_>>>()?,
            None => default_script(&classes)?,
        };
        let detector = DetectorSettings {
            backend: match detector.backend {
                Some(backend) => parse_detector_kind(&backend)?,
                None => default_detector_kind(),
            },
            model_path: detector
                .model_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            input_size: detector.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
            confidence_threshold: detector
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            iou_threshold: detector.iou_threshold.unwrap_or(DEFAULT_IOU_THRESHOLD),
            max_detections: detector.max_detections.unwrap_or(DEFAULT_MAX_DETECTIONS),
            script,
        };

        let categories = match file.categories {
            Some(CategoriesConfigFile {
                biodegradable,
                nonbiodegradable,
            }) => {
                let defaults = CategoryLists::default();
                CategoryLists::new(
                    biodegradable.unwrap_or_else(|| owned(defaults.biodegradable())),
                    nonbiodegradable.unwrap_or_else(|| owned(defaults.nonbiodegradable())),
                )?
            }
            None => CategoryLists::default(),
        };

        let sorting = file.sorting.unwrap_or_default();
        let sorting = SortingSettings {
            tie_break: match sorting.tie_break {
                Some(value) => TieBreak::parse(&value)?,
                None => TieBreak::LastMatch,
            },
            min_confidence: sorting.min_confidence.unwrap_or(0.0),
        };

        let actuators = file.actuators.unwrap_or_default();
        let presets = AnglePresets::default();
        let actuators = ActuatorSettings {
            backend: match actuators.backend {
                Some(backend) => parse_actuator_kind(&backend)?,
                None => default_actuator_kind(),
            },
            pins: match actuators.pins {
                Some(pins) => <[u8; 2]>::try_from(pins.as_slice()).map_err(|_| {
                    anyhow!("actuators.pins must list exactly two pins, got {:?}", pins)
                })?,
                None => DEFAULT_PINS,
            },
            presets: AnglePresets {
                neutral: actuators.neutral_angle.unwrap_or(presets.neutral),
                bio: actuators.bio_angle.unwrap_or(presets.bio),
                nonbio: actuators.nonbio_angle.unwrap_or(presets.nonbio),
            },
            pulse: PulseSettings {
                period: millis(actuators.pwm_period_ms.unwrap_or(DEFAULT_PWM_PERIOD_MS))?,
                min: millis(actuators.min_pulse_ms.unwrap_or(DEFAULT_MIN_PULSE_MS))?,
                max: millis(actuators.max_pulse_ms.unwrap_or(DEFAULT_MAX_PULSE_MS))?,
            },
        };

        let display = file.display.unwrap_or_default();
        let display = DisplaySettings {
            mode: match display.mode {
                Some(mode) => parse_display_kind(&mode)?,
                None => default_display_kind(),
            },
            window_title: display
                .window_title
                .unwrap_or_else(|| DEFAULT_WINDOW_TITLE.to_string()),
            exit_key: display.exit_key.unwrap_or(DEFAULT_EXIT_KEY),
            status_interval: Duration::from_secs(
                display
                    .status_interval_secs
                    .unwrap_or(DEFAULT_STATUS_INTERVAL_SECS),
            ),
            frame_limit: display.frame_limit,
        };

        Ok(Self {
            camera,
            detector,
            classes,
            categories,
            sorting,
            actuators,
            display,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("SORTER_CAMERA_DEVICE") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(path) = std::env::var("SORTER_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detector.model_path = PathBuf::from(path);
            }
        }
        if let Ok(backend) = std::env::var("SORTER_DETECTOR_BACKEND") {
            self.detector.backend = parse_detector_kind(&backend)?;
        }
        let biodegradable = std::env::var("SORTER_BIODEGRADABLE")
            .ok()
            .map(|value| split_csv(&value))
            .filter(|names| !names.is_empty());
        let nonbiodegradable = std::env::var("SORTER_NONBIODEGRADABLE")
            .ok()
            .map(|value| split_csv(&value))
            .filter(|names| !names.is_empty());
        if biodegradable.is_some() || nonbiodegradable.is_some() {
            self.categories = CategoryLists::new(
                biodegradable.unwrap_or_else(|| owned(self.categories.biodegradable())),
                nonbiodegradable.unwrap_or_else(|| owned(self.categories.nonbiodegradable())),
            )?;
        }
        if let Ok(tie_break) = std::env::var("SORTER_TIE_BREAK") {
            self.sorting.tie_break = TieBreak::parse(&tie_break)?;
        }
        if let Ok(min_confidence) = std::env::var("SORTER_MIN_CONFIDENCE") {
            self.sorting.min_confidence = min_confidence
                .trim()
                .parse()
                .map_err(|_| anyhow!("SORTER_MIN_CONFIDENCE must be a number between 0 and 1"))?;
        }
        if let Ok(mode) = std::env::var("SORTER_DISPLAY") {
            self.display.mode = parse_display_kind(&mode)?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera resolution must be non-zero"));
        }
        if self.camera.pixel_format == PixelFormat::Nv12
            && (self.camera.width % 2 != 0 || self.camera.height % 2 != 0)
        {
            return Err(anyhow!("NV12 capture needs an even resolution"));
        }

        check_unit("detector.confidence_threshold", self.detector.confidence_threshold)?;
        check_unit("detector.iou_threshold", self.detector.iou_threshold)?;
        check_unit("sorting.min_confidence", self.sorting.min_confidence)?;
        if self.detector.input_size == 0 || self.detector.input_size % 32 != 0 {
            return Err(anyhow!(
                "detector.input_size must be a positive multiple of 32, got {}",
                self.detector.input_size
            ));
        }
        if self.detector.max_detections == 0 {
            return Err(anyhow!("detector.max_detections must be at least 1"));
        }

        let presets = self.actuators.presets;
        for (name, angle) in [
            ("neutral", presets.neutral),
            ("bio", presets.bio),
            ("nonbio", presets.nonbio),
        ] {
            if !(0.0..=180.0).contains(&angle) {
                return Err(anyhow!(
                    "actuators.{}_angle must be within 0-180 degrees, got {}",
                    name,
                    angle
                ));
            }
        }
        if self.actuators.pins[0] == self.actuators.pins[1] {
            return Err(anyhow!("the two actuators must use different pins"));
        }
        let pulse = self.actuators.pulse;
        if pulse.min >= pulse.max || pulse.max > pulse.period {
            return Err(anyhow!(
                "servo pulse range must satisfy min < max <= period (got {:?} / {:?} / {:?})",
                pulse.min,
                pulse.max,
                pulse.period
            ));
        }

        if !self.display.exit_key.is_ascii_graphic() {
            return Err(anyhow!("display.exit_key must be a printable ASCII key"));
        }

        let unreachable = self.categories.unreachable_names(&self.classes);
        if !unreachable.is_empty() {
            log::warn!(
                "category names not in the class table will never match: {}",
                unreachable.join(", ")
            );
        }
        Ok(())
    }
}

fn default_camera_device() -> &'static str {
    if cfg!(feature = "ingest-v4l2") {
        DEFAULT_V4L2_DEVICE
    } else {
        DEFAULT_STUB_DEVICE
    }
}

fn default_detector_kind() -> DetectorKind {
    if cfg!(feature = "backend-tract") {
        DetectorKind::Tract
    } else {
        DetectorKind::Scripted
    }
}

fn default_actuator_kind() -> ActuatorKind {
    if cfg!(feature = "actuator-rppal") {
        ActuatorKind::Gpio
    } else {
        ActuatorKind::Recording
    }
}

fn default_display_kind() -> DisplayKind {
    if cfg!(feature = "display-opencv") {
        DisplayKind::Window
    } else {
        DisplayKind::Headless
    }
}

fn read_config_file(path: &Path) -> Result<SorterConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn scripted_detection(entry: ScriptedDetectionFile, classes: &ClassTable) -> Result<Detection> {
    let class_id = match (entry.class_id, entry.class.as_deref()) {
        (Some(id), _) => id,
        (None, Some(name)) => classes
            .id_of(name)
            .ok_or_else(|| anyhow!("scripted detection names unknown class '{}'", name))?,
        (None, None) => return Err(anyhow!("scripted detection needs class or class_id")),
    };
    let [x1, y1, x2, y2] = entry.bbox;
    Ok(Detection::new(
        BoundingBox::new(x1, y1, x2, y2),
        class_id,
        entry.confidence,
    ))
}

fn default_script(classes: &ClassTable) -> Result<Vec<Vec<Detection>>> {
    DEFAULT_SCRIPT
        .iter()
        .map(|frame| {
            frame
                .iter()
                .filter_map(|(name, confidence, [x1, y1, x2, y2])| {
                    // Custom class tables may not carry these names; skip them.
                    classes.id_of(name).map(|id| {
                        Ok(Detection::new(
                            BoundingBox::new(*x1, *y1, *x2, *y2),
                            id,
                            *confidence,
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect()
}

fn parse_detector_kind(value: &str) -> Result<DetectorKind> {
    match value.trim().to_ascii_lowercase().as_str() {
        "tract" | "onnx" => Ok(DetectorKind::Tract),
        "scripted" | "stub" => Ok(DetectorKind::Scripted),
        other => Err(anyhow!("unknown detector backend '{}'", other)),
    }
}

fn parse_actuator_kind(value: &str) -> Result<ActuatorKind> {
    match value.trim().to_ascii_lowercase().as_str() {
        "gpio" | "rppal" => Ok(ActuatorKind::Gpio),
        "recording" | "stub" => Ok(ActuatorKind::Recording),
        other => Err(anyhow!("unknown actuator backend '{}'", other)),
    }
}

fn parse_display_kind(value: &str) -> Result<DisplayKind> {
    match value.trim().to_ascii_lowercase().as_str() {
        "window" => Ok(DisplayKind::Window),
        "headless" => Ok(DisplayKind::Headless),
        other => Err(anyhow!("unknown display mode '{}'", other)),
    }
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(anyhow!("{} must be within 0-1, got {}", name, value))
    }
}

fn millis(value: f64) -> Result<Duration> {
    if value.is_finite() && value > 0.0 {
        Ok(Duration::from_secs_f64(value / 1000.0))
    } else {
        Err(anyhow!("servo timing must be a positive number of milliseconds"))
    }
}

fn owned<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    names.map(str::to_string).collect()
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_appliance() -> Result<()> {
        let cfg = SorterConfig::from_file(SorterConfigFile::default())?;
        cfg.validate()?;

        assert_eq!(cfg.camera.device, default_camera_device());
        assert_eq!((cfg.camera.width, cfg.camera.height), (640, 480));
        assert_eq!(cfg.camera.pixel_format, PixelFormat::Rgb24);
        assert_eq!(cfg.detector.model_path, PathBuf::from("yolov8n.onnx"));
        assert_eq!(cfg.actuators.pins, [17, 27]);
        assert_eq!(cfg.actuators.presets, AnglePresets::default());
        assert_eq!(cfg.sorting.tie_break, TieBreak::LastMatch);
        assert_eq!(cfg.sorting.min_confidence, 0.0);
        assert_eq!(cfg.display.exit_key, 'q');
        assert_eq!(cfg.classes.len(), 80);
        Ok(())
    }

    #[test]
    fn featureless_build_defaults_to_stand_ins() {
        if cfg!(feature = "ingest-v4l2") {
            assert_eq!(default_camera_device(), "/dev/video0");
        } else {
            assert!(default_camera_device().starts_with("stub://"));
        }
        let expected = if cfg!(feature = "display-opencv") {
            DisplayKind::Window
        } else {
            DisplayKind::Headless
        };
        assert_eq!(default_display_kind(), expected);
    }

    #[test]
    fn default_script_resolves_names() -> Result<()> {
        let script = default_script(&ClassTable::coco())?;
        assert_eq!(script.len(), DEFAULT_SCRIPT.len());
        assert!(script[0].is_empty());
        assert_eq!(script[1][0].class_id, 46);
        assert_eq!(script[2][0].class_id, 39);
        Ok(())
    }

    #[test]
    fn dry_run_swaps_hardware_components() -> Result<()> {
        let cfg = SorterConfig::from_file(SorterConfigFile::default())?.into_dry_run();
        assert!(cfg.camera.device.starts_with("stub://"));
        assert_eq!(cfg.detector.backend, DetectorKind::Scripted);
        assert_eq!(cfg.actuators.backend, ActuatorKind::Recording);
        assert_eq!(cfg.display.mode, DisplayKind::Headless);
        Ok(())
    }

    #[test]
    fn validation_rejects_bad_presets_and_pins() -> Result<()> {
        let mut cfg = SorterConfig::from_file(SorterConfigFile::default())?;
        cfg.actuators.presets.bio = 200.0;
        assert!(cfg.validate().is_err());

        let mut cfg = SorterConfig::from_file(SorterConfigFile::default())?;
        cfg.actuators.pins = [17, 17];
        assert!(cfg.validate().is_err());

        let mut cfg = SorterConfig::from_file(SorterConfigFile::default())?;
        cfg.sorting.min_confidence = 1.5;
        assert!(cfg.validate().is_err());
        Ok(())
    }

    #[test]
    fn script_entries_need_a_class() {
        let entry = ScriptedDetectionFile {
            class: None,
            class_id: None,
            confidence: 0.5,
            bbox: [0, 0, 1, 1],
        };
        assert!(scripted_detection(entry, &ClassTable::coco()).is_err());
    }

    #[test]
    fn split_csv_drops_blanks() {
        assert_eq!(split_csv(" apple, ,banana ,"), vec!["apple", "banana"]);
    }
}
