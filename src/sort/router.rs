//! Per-frame reduction of detections to one disposal decision.

use anyhow::{anyhow, Result};
use std::fmt;

use super::category::{Category, CategoryLists};
use super::classes::ClassTable;
use crate::detect::{BoundingBox, Detection};

/// What the gate should do for the current frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DisposalState {
    #[default]
    Neutral,
    Bio,
    NonBio,
}

impl From<Category> for DisposalState {
    fn from(category: Category) -> Self {
        match category {
            Category::Biodegradable => DisposalState::Bio,
            Category::NonBiodegradable => DisposalState::NonBio,
        }
    }
}

impl fmt::Display for DisposalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DisposalState::Neutral => "neutral",
            DisposalState::Bio => "bio",
            DisposalState::NonBio => "nonbio",
        })
    }
}

/// How to pick one category when a frame holds items of both.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TieBreak {
    /// The last matching detection in detector order wins.
    #[default]
    LastMatch,
    /// The matching detection with the highest confidence wins; ties go to the later one.
    HighestConfidence,
    /// The category with more matching detections wins; ties go to the last match.
    Majority,
}

impl TieBreak {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "last-match" | "last_match" | "last" => Ok(TieBreak::LastMatch),
            "highest-confidence" | "highest_confidence" | "confidence" => {
                Ok(TieBreak::HighestConfidence)
            }
            "majority" => Ok(TieBreak::Majority),
            other => Err(anyhow!(
                "unknown tie-break '{}' (expected last-match, highest-confidence or majority)",
                other
            )),
        }
    }
}

/// A detection that matched a category, ready for the overlay.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub bbox: BoundingBox,
    pub category: Category,
    pub class_name: String,
    pub confidence: f32,
}

impl Annotation {
    /// Overlay text: category name and confidence.
    pub fn label(&self) -> String {
        format!("{} {}", self.category.label(), self.confidence)
    }
}

/// Result of routing one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameDecision {
    pub state: DisposalState,
    /// Matching detections, in detector order.
    pub annotations: Vec<Annotation>,
    /// Detections whose class id fell outside the class table.
    pub out_of_range: usize,
}

/// Classifier/router: class table lookup, category lists, tie-break policy.
#[derive(Clone, Debug)]
pub struct Router {
    classes: ClassTable,
    lists: CategoryLists,
    tie_break: TieBreak,
    min_confidence: f32,
}

impl Router {
    pub fn new(classes: ClassTable, lists: CategoryLists) -> Self {
        Self {
            classes,
            lists,
            tie_break: TieBreak::LastMatch,
            min_confidence: 0.0,
        }
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Detections scored below this take no part in routing or rendering.
    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Category for a class name; `None` means ignored.
    pub fn classify(&self, name: &str) -> Option<Category> {
        self.lists.classify(name)
    }

    /// Reduce one frame's detections to a disposal decision.
    ///
    /// Pure function of `detections`: nothing carries over between frames.
    pub fn route(&self, detections: &[Detection]) -> FrameDecision {
        let mut decision = FrameDecision::default();

        for detection in detections {
            if detection.confidence < self.min_confidence {
                continue;
            }
            let Some(name) = self.classes.resolve(detection.class_id) else {
                decision.out_of_range += 1;
                continue;
            };
            let Some(category) = self.classify(name) else {
                continue;
            };
            decision.annotations.push(Annotation {
                bbox: detection.bbox,
                category,
                class_name: name.to_string(),
                confidence: detection.confidence,
            });
        }

        decision.state = self
            .pick(&decision.annotations)
            .map(DisposalState::from)
            .unwrap_or_default();
        decision
    }

    fn pick(&self, matched: &[Annotation]) -> Option<Category> {
        let last = matched.last()?.category;
        match self.tie_break {
            TieBreak::LastMatch => Some(last),
            TieBreak::HighestConfidence => matched
                .iter()
                .fold(None::<&Annotation>, |best, next| match best {
                    Some(best) if best.confidence > next.confidence => Some(best),
                    _ => Some(next),
                })
                .map(|best| best.category),
            TieBreak::Majority => {
                let bio = matched
                    .iter()
                    .filter(|a| a.category == Category::Biodegradable)
                    .count();
                let nonbio = matched.len() - bio;
                Some(match bio.cmp(&nonbio) {
                    std::cmp::Ordering::Greater => Category::Biodegradable,
                    std::cmp::Ordering::Less => Category::NonBiodegradable,
                    std::cmp::Ordering::Equal => last,
                })
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(ClassTable::coco(), CategoryLists::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANANA: usize = 46;
    const BOTTLE: usize = 39;
    const PERSON: usize = 0;

    fn det(class_id: usize, confidence: f32) -> Detection {
        Detection::new(BoundingBox::new(10, 10, 50, 50), class_id, confidence)
    }

    #[test]
    fn empty_frame_is_neutral() {
        let decision = Router::default().route(&[]);
        assert_eq!(decision.state, DisposalState::Neutral);
        assert!(decision.annotations.is_empty());
    }

    #[test]
    fn last_match_wins() {
        let router = Router::default();
        assert_eq!(
            router.route(&[det(BANANA, 0.9), det(BOTTLE, 0.4)]).state,
            DisposalState::NonBio
        );
        assert_eq!(
            router.route(&[det(BOTTLE, 0.4), det(BANANA, 0.9)]).state,
            DisposalState::Bio
        );
    }

    #[test]
    fn ignored_classes_leave_state_alone() {
        let router = Router::default();
        let decision = router.route(&[det(BANANA, 0.5), det(PERSON, 0.99)]);
        assert_eq!(decision.state, DisposalState::Bio);
        assert_eq!(decision.annotations.len(), 1);
        assert_eq!(router.route(&[det(PERSON, 0.99)]).state, DisposalState::Neutral);
    }

    #[test]
    fn out_of_range_ids_are_skipped() {
        let router = Router::default();
        let decision = router.route(&[det(BOTTLE, 0.5), det(80, 0.9), det(4000, 0.9)]);
        assert_eq!(decision.state, DisposalState::NonBio);
        assert_eq!(decision.annotations.len(), 1);
        assert_eq!(decision.out_of_range, 2);
    }

    #[test]
    fn annotations_carry_label_text() {
        let decision = Router::default().route(&[det(BANANA, 0.871)]);
        assert_eq!(decision.annotations[0].label(), "biodegradable 0.88");
        assert_eq!(decision.annotations[0].class_name, "banana");
    }

    #[test]
    fn highest_confidence_tie_break() {
        let router = Router::default().with_tie_break(TieBreak::HighestConfidence);
        let frame = [det(BANANA, 0.9), det(BOTTLE, 0.4)];
        assert_eq!(router.route(&frame).state, DisposalState::Bio);
        // Equal scores fall to the later detection.
        let frame = [det(BANANA, 0.5), det(BOTTLE, 0.5)];
        assert_eq!(router.route(&frame).state, DisposalState::NonBio);
    }

    #[test]
    fn majority_tie_break() {
        let router = Router::default().with_tie_break(TieBreak::Majority);
        let frame = [det(BANANA, 0.5), det(BANANA, 0.5), det(BOTTLE, 0.9)];
        assert_eq!(router.route(&frame).state, DisposalState::Bio);
        let frame = [det(BOTTLE, 0.5), det(BANANA, 0.5)];
        assert_eq!(router.route(&frame).state, DisposalState::Bio);
    }

    #[test]
    fn min_confidence_filters_before_routing() {
        let router = Router::default().with_min_confidence(0.5);
        let decision = router.route(&[det(BANANA, 0.9), det(BOTTLE, 0.3)]);
        assert_eq!(decision.state, DisposalState::Bio);
        assert_eq!(decision.annotations.len(), 1);
    }

    #[test]
    fn tie_break_parses_names() -> Result<()> {
        assert_eq!(TieBreak::parse("last-match")?, TieBreak::LastMatch);
        assert_eq!(TieBreak::parse("Highest_Confidence")?, TieBreak::HighestConfidence);
        assert_eq!(TieBreak::parse("majority")?, TieBreak::Majority);
        assert!(TieBreak::parse("vote").is_err());
        Ok(())
    }
}
