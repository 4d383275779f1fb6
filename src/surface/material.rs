use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::color::PropertyMap;

/// User-facing surface style.
#[derive(
    Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema,
)]
#[serde(default)]
pub struct SurfaceStyle {
    /// Uniform color; disables per-vertex atom colors when set.
    pub color: Option<[f32; 3]>,
    /// Opacity in [0, 1].
    pub opacity: Option<f32>,
    /// Color atoms by a numeric property before meshing.
    pub map: Option<PropertyMap>,
}

/// Render material derived from a [`SurfaceStyle`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Material {
    /// Uniform color, when vertex colors are off.
    pub color: Option<[f32; 3]>,
    /// Whether per-vertex colors drive shading.
    pub vertex_colors: bool,
    /// Opacity in [0, 1].
    pub opacity: f32,
    /// Whether blending is required.
    pub transparent: bool,
    /// Surfaces are open at chunk seams and viewed from inside cavities.
    pub double_sided: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: None,
            vertex_colors: true,
            opacity: 1.0,
            transparent: false,
            double_sided: true,
        }
    }
}

impl Material {
    /// Build the material for a style. The property map affects atom
    /// colors, not the material.
    #[must_use]
    pub fn from_style(style: &SurfaceStyle) -> Self {
        let mut material = Self::default();
        if let Some(color) = style.color {
            material.color = Some(color);
            material.vertex_colors = false;
        }
        if let Some(opacity) = style.opacity {
            material.opacity = opacity.clamp(0.0, 1.0);
            material.transparent = material.opacity < 1.0;
        }
        material
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_style_uses_vertex_colors() {
        let m = Material::from_style(&SurfaceStyle::default());
        assert!(m.vertex_colors);
        assert!(!m.transparent);
        assert!(m.double_sided);
    }

    #[test]
    fn explicit_color_and_opacity() {
        let style = SurfaceStyle {
            color: Some([0.2, 0.4, 0.6]),
            opacity: Some(0.7),
            map: None,
        };
        let m = Material::from_style(&style);
        assert_eq!(m.color, Some([0.2, 0.4, 0.6]));
        assert!(!m.vertex_colors);
        assert!(m.transparent);

        let opaque = Material::from_style(&SurfaceStyle {
            opacity: Some(1.0),
            ..SurfaceStyle::default()
        });
        assert!(!opaque.transparent);
    }

    #[test]
    fn style_parses_from_toml() {
        let style: SurfaceStyle = toml::from_str(
            r#"
opacity = 0.85
[map]
prop = "b"
scheme = { kind = "red_white_blue", range = [0.0, 80.0] }
"#,
        )
        .unwrap();
        assert_eq!(style.opacity, Some(0.85));
        let map = style.map.unwrap();
        assert_eq!(map.prop, "b");
        assert_eq!(map.scheme.range(), Some([0.0, 80.0]));
    }
}
