//! Classification of detections into disposal categories.
//!
//! - `classes`: class id to name table
//! - `category`: biodegradable / non-biodegradable membership lists
//! - `router`: per-frame reduction to a single disposal state

mod category;
mod classes;
mod router;

pub use category::{Category, CategoryLists, DEFAULT_BIODEGRADABLE, DEFAULT_NONBIODEGRADABLE};
pub use classes::{ClassTable, COCO_CLASSES};
pub use router::{Annotation, DisposalState, FrameDecision, Router, TieBreak};
