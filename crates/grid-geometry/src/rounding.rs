//! Conversion of continuous bounds to integer grid indices.

use serde::{Deserialize, Serialize};

/// How a continuous `[lower, upper)` range is turned into an inclusive index range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridRoundingMode {
    /// Round both bounds to the nearest integer (halves upward).
    #[default]
    Nearest,
    /// Keep only the cells entirely inside the range.
    Contained,
    /// Keep every cell intersecting the range.
    Enclosing,
}

impl GridRoundingMode {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "contained" | "inside" => Self::Contained,
            "enclosing" | "outside" => Self::Enclosing,
            _ => Self::Nearest,
        }
    }

    /// Get the mode name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Contained => "contained",
            Self::Enclosing => "enclosing",
        }
    }

    /// Inclusive `(low, high)` cell indices for finite bounds `lower <= upper`.
    ///
    /// May return `low > high` with [`GridRoundingMode::Contained`] when no
    /// cell fits in the range.
    pub(crate) fn round(&self, lower: f64, upper: f64) -> (i64, i64) {
        match self {
            Self::Nearest => round_nearest(lower, upper),
            Self::Enclosing => {
                let low = lower.floor() as i64;
                let mut high = upper.ceil() as i64;
                if low != high {
                    high -= 1;
                }
                (low, high)
            }
            Self::Contained => (lower.ceil() as i64, (upper.floor() as i64).saturating_sub(1)),
        }
    }
}

fn round_nearest(lower: f64, upper: f64) -> (i64, i64) {
    let mut low = (lower + 0.5).floor() as i64;
    let mut high = (upper + 0.5).floor() as i64;
    if low != high {
        high -= 1;
    }
    // Rounding noise such as [1.49999 … 2.50001] can add or drop one cell
    // compared to the span. Of the two bounds and the span, only the value
    // farthest from an integer is assumed wrong; if it is the span, keep the bounds.
    let span = upper - lower;
    let expected = (span + 0.5).floor() as i64;
    let Some(delta) = high
        .checked_sub(low)
        .and_then(|d| d.checked_add(1))
        .and_then(|cells| expected.checked_sub(cells))
    else {
        return (low, high);
    };
    if expected >= 1 && delta.abs() == 1 {
        let d_low = (lower - lower.round()).abs();
        let d_high = (upper - upper.round()).abs();
        let d_span = (span - span.round()).abs();
        if d_low > d_span || d_high > d_span {
            if d_low > d_high {
                low = low.saturating_sub(delta);
            } else {
                high = high.saturating_add(delta);
            }
        }
    }
    (low, high)
}

impl std::fmt::Display for GridRoundingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
