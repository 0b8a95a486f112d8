//! DST transition policies for wall-clock values that do not exist.

use serde::{Deserialize, Serialize};

/// Policy for wall-clock values that fall inside a DST gap.
///
/// Ambiguous values (the repeated hour when clocks fall back) always resolve to
/// the earlier instant; the policy only decides what happens to values that never
/// occur on the local clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DstPolicy {
    /// Skip instances that fall in the DST gap (e.g., 2:30 AM during spring forward)
    Skip,
    /// Shift to the first valid instant after the gap
    ShiftForward,
    /// Keep the wall-clock distance from the previous midnight: 2:30 becomes 3:30
    #[default]
    WallClock,
}

impl DstPolicy {
    /// Parses the `dst` parameter value.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().replace('-', "_").as_str() {
            "skip" => Some(Self::Skip),
            "shift" | "shift_forward" => Some(Self::ShiftForward),
            "wall" | "wall_clock" | "wallclock" => Some(Self::WallClock),
            _ => None,
        }
    }
}
