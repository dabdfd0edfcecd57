use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::label::Label;

/// One label candidate reported for a region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub identifier: String,
    pub confidence: f32,
}

impl Classification {
    pub fn new(identifier: impl Into<String>, confidence: f32) -> Self {
        Self {
            identifier: identifier.into(),
            confidence,
        }
    }
}

/// Raw model output for one region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Normalized box, origin bottom-left.
    pub bounding_box: Rect,
    /// Region confidence (0..=1).
    pub confidence: f32,
    /// Label candidates in the order the model reported them.
    pub labels: Vec<Classification>,
}

/// A region resolved to a known label, ready to draw.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub label: Label,
    pub confidence: f32,
    pub bounding_box: Rect,
}

impl Detection {
    /// Resolve an observation to its best known label.
    ///
    /// Returns `None` when the observation has no candidates or its best
    /// candidate is not a known `Label`.
    pub fn resolve(observation: &Observation) -> Option<Self> {
        let best = select_label(&observation.labels)?;
        let Some(label) = Label::from_identifier(&best.identifier) else {
            log::debug!("dropping detection with unknown label {:?}", best.identifier);
            return None;
        };
        Some(Self {
            label,
            confidence: observation.confidence,
            bounding_box: observation.bounding_box,
        })
    }
}

/// Highest-confidence candidate. Ties keep the earliest candidate.
pub fn select_label(labels: &[Classification]) -> Option<&Classification> {
    labels.iter().fold(None, |best, candidate| match best {
        Some(b) if b.confidence >= candidate.confidence => Some(b),
        _ => Some(candidate),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(labels: Vec<Classification>) -> Observation {
        Observation {
            bounding_box: Rect::new(0.1, 0.1, 0.2, 0.2),
            confidence: 0.8,
            labels,
        }
    }

    #[test]
    fn highest_confidence_label_wins() {
        let labels = vec![Classification::new("a", 0.9), Classification::new("b", 0.95)];
        assert_eq!(select_label(&labels).map(|c| c.identifier.as_str()), Some("b"));
    }

    #[test]
    fn ties_keep_original_order() {
        let labels = vec![
            Classification::new("first", 0.5),
            Classification::new("second", 0.5),
            Classification::new("low", 0.1),
        ];
        assert_eq!(
            select_label(&labels).map(|c| c.identifier.as_str()),
            Some("first")
        );
    }

    #[test]
    fn no_candidates_selects_nothing() {
        assert!(select_label(&[]).is_none());
        assert!(Detection::resolve(&observation(vec![])).is_none());
    }

    #[test]
    fn resolve_uses_region_confidence() {
        let obs = observation(vec![
            Classification::new("stop_sign", 0.6),
            Classification::new("oneway_sign", 0.4),
        ]);
        let detection = Detection::resolve(&obs).expect("known label");
        assert_eq!(detection.label, Label::StopSign);
        assert_eq!(detection.confidence, 0.8);
        assert_eq!(detection.bounding_box, obs.bounding_box);
    }

    #[test]
    fn unknown_best_label_is_dropped() {
        // A known label further down the list does not rescue the region.
        let obs = observation(vec![
            Classification::new("yield_sign", 0.9),
            Classification::new("stop_sign", 0.3),
        ]);
        assert!(Detection::resolve(&obs).is_none());
    }
}
