mod backend;
mod backends;
pub mod postprocess;
mod result;

use anyhow::Result;

pub use backend::DetectorBackend;
pub use backends::ScriptedBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{round_confidence, BoundingBox, Detection};

use crate::config::{DetectorKind, DetectorSettings};

/// Build the detector named in the settings.
pub fn open_detector(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    match settings.backend {
        DetectorKind::Scripted => Ok(Box::new(ScriptedBackend::new(settings.script.clone()))),
        DetectorKind::Tract => {
            #[cfg(feature = "backend-tract")]
            {
                Ok(Box::new(TractBackend::new(&settings.model_path, settings)?))
            }
            #[cfg(not(feature = "backend-tract"))]
            {
                Err(anyhow::anyhow!(
                    "detector backend 'tract' ({}) requires the backend-tract feature",
                    settings.model_path.display()
                ))
            }
        }
    }
}
