use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Smallest accepted chunk volume budget, in cubic angstroms.
pub const MIN_VOLUME_BUDGET: f32 = 1000.0;

/// Chunking and extraction parameters for surface generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Surface", inline)]
#[serde(default)]
pub struct SurfaceOptions {
    /// Maximum volume (cubic angstroms) of one chunk before it is split.
    #[schemars(title = "Volume Budget", range(min = 1000.0, max = 1000000.0))]
    pub volume_budget: f32,
    /// Margin added to every side of a chunk when gathering neighbor atoms.
    #[schemars(title = "Chunk Padding", range(min = 0.0, max = 12.0), extend("step" = 0.5))]
    pub chunk_padding: f32,
    /// Solvent probe radius used for SAS/SES/MS surfaces. The manager does
    /// not read it; it configures the extractor the caller hands over, as
    /// in `SphereShellExtractor::from_options`.
    #[schemars(title = "Probe Radius", range(min = 0.0, max = 3.0), extend("step" = 0.1))]
    pub probe_radius: f32,
    /// Extract every chunk on the calling thread instead of the pool.
    #[schemars(skip)]
    pub synchronous: bool,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            volume_budget: 64_000.0,
            chunk_padding: 6.0,
            probe_radius: 1.4,
            synchronous: false,
        }
    }
}

impl SurfaceOptions {
    /// Copy with out-of-range values pulled back to usable ones.
    #[must_use]
    pub fn clamped(&self) -> Self {
        let default = Self::default();
        Self {
            volume_budget: if self.volume_budget.is_finite()
                && self.volume_budget > 0.0
            {
                self.volume_budget.max(MIN_VOLUME_BUDGET)
            } else {
                default.volume_budget
            },
            chunk_padding: self.chunk_padding.max(0.0),
            probe_radius: self.probe_radius.max(0.0),
            synchronous: self.synchronous,
        }
    }
}
