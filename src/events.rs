use crate::processing::layout::Offset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointerId(pub u64);

/// Raw contact input in frame (logical pixel) coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down { id: PointerId, position: Offset },
    Move { id: PointerId, position: Offset },
    Up { id: PointerId },
    /// The platform dropped every contact (focus loss, touchcancel).
    Cancel,
}

/// Checkpoints an export passes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExportMilestone {
    Located,
    ControlsHidden,
    DependenciesReady,
    Rasterized,
    Encoded,
    Complete,
}

impl ExportMilestone {
    pub fn percent(self) -> u8 {
        match self {
            Self::Located => 15,
            Self::ControlsHidden => 30,
            Self::DependenciesReady => 60,
            Self::Rasterized => 85,
            Self::Encoded => 92,
            Self::Complete => 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportProgress {
    pub milestone: ExportMilestone,
    pub percent: u8,
}

impl From<ExportMilestone> for ExportProgress {
    fn from(milestone: ExportMilestone) -> Self {
        Self {
            milestone,
            percent: milestone.percent(),
        }
    }
}
