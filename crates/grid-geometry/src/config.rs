//! Configuration for grid derivations.

use serde::{Deserialize, Serialize};

use crate::rounding::GridRoundingMode;

/// Defaults applied to every new [`GridDerivation`](crate::GridDerivation).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DerivationConfig {
    /// Rounding mode used until `rounding()` is called on the derivation.
    pub rounding: GridRoundingMode,

    /// Reject resolution vectors longer than the number of grid dimensions
    /// instead of ignoring the extra values.
    pub strict_resolution: bool,
}

impl DerivationConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("GRID_ROUNDING_MODE") {
            config.rounding = GridRoundingMode::from_str(&val);
        }

        if let Ok(val) = std::env::var("GRID_STRICT_RESOLUTION") {
            config.strict_resolution = val.to_lowercase() == "true" || val == "1";
        }

        config
    }
}
