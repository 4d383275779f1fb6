use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default scene light, added when a scene graph is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Lighting", inline)]
#[serde(default)]
pub struct LightingOptions {
    /// Direction the key light points from (normalized on use).
    #[schemars(skip)]
    pub direction: [f32; 3],
    /// RGB color of the key light.
    #[schemars(skip)]
    pub color: [f32; 3],
    /// Key light intensity.
    #[schemars(title = "Key Light", range(min = 0.0, max = 3.5), extend("step" = 0.05))]
    pub intensity: f32,
}

impl Default for LightingOptions {
    fn default() -> Self {
        Self {
            direction: [0.2, 0.2, 1.0],
            color: [1.0, 1.0, 1.0],
            intensity: 1.0,
        }
    }
}
