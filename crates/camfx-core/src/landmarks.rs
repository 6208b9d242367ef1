//! Facial landmark coordinates produced by an external detector.

use crate::geometry::Vec2;
use serde::{Deserialize, Serialize};

/// Named facial feature a landmark marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkKind {
    LeftEye,
    RightEye,
    NoseTip,
    JawLeft,
    JawRight,
    MouthLeft,
    MouthRight,
}

impl LandmarkKind {
    /// All kinds, in uniform-slot order.
    pub const ALL: [LandmarkKind; 7] = [
        Self::LeftEye,
        Self::RightEye,
        Self::NoseTip,
        Self::JawLeft,
        Self::JawRight,
        Self::MouthLeft,
        Self::MouthRight,
    ];

    /// Slot index in [`FaceLandmarks::points`].
    pub fn slot(self) -> usize {
        self as usize
    }
}

/// Up to seven landmarks normalized to [0, 1] in frame coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub points: [Option<Vec2>; 7],
}

impl FaceLandmarks {
    /// Set a landmark, clamping it into the unit square.
    pub fn with(mut self, kind: LandmarkKind, x: f32, y: f32) -> Self {
        self.points[kind.slot()] = Some(Vec2::new(x.clamp(0.0, 1.0), y.clamp(0.0, 1.0)));
        self
    }

    pub fn get(&self, kind: LandmarkKind) -> Option<Vec2> {
        self.points[kind.slot()]
    }

    /// Number of landmarks present.
    pub fn count(&self) -> usize {
        self.points.iter().filter(|p| p.is_some()).count()
    }

    /// Iterate present landmarks with their kind.
    pub fn iter(&self) -> impl Iterator<Item = (LandmarkKind, Vec2)> + '_ {
        LandmarkKind::ALL
            .iter()
            .filter_map(move |&k| self.get(k).map(|p| (k, p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_and_clamp() {
        let lm = FaceLandmarks::default()
            .with(LandmarkKind::LeftEye, 0.4, 0.4)
            .with(LandmarkKind::NoseTip, 1.5, -0.2);
        assert_eq!(lm.count(), 2);
        assert_eq!(lm.get(LandmarkKind::NoseTip), Some(Vec2::new(1.0, 0.0)));
        assert_eq!(lm.iter().count(), 2);
    }
}
