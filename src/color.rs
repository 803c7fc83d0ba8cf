use std::collections::BTreeMap;
use std::str::FromStr;

use palette::{Hsl, IntoColor, Srgb};

use crate::config::ModelSet;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Srgb<u8>> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            rgb.into_format::<u8>()
        })
        .collect()
}

/// Parse `#rrggbb` (or `rrggbb`).
pub fn parse_hex(s: &str) -> Option<Srgb<u8>> {
    Srgb::<u8>::from_str(s).ok()
}

pub fn to_hex(c: Srgb<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", c.red, c.green, c.blue)
}

// ---------------------------------------------------------------------------
// Color mapping: model set label → colour
// ---------------------------------------------------------------------------

/// Colours for reporting model sets side by side. Configured colours win;
/// the rest are drawn from [`generate_palette`].
#[derive(Debug, Clone)]
pub struct ColorMap {
    mapping: BTreeMap<String, Srgb<u8>>,
    default_color: Srgb<u8>,
}

impl ColorMap {
    pub fn for_model_sets(sets: &[ModelSet]) -> Self {
        let missing = sets
            .iter()
            .filter(|s| s.color.as_deref().and_then(parse_hex).is_none())
            .count();
        let mut generated = generate_palette(missing).into_iter();

        let mapping = sets
            .iter()
            .filter_map(|set| {
                let color = set
                    .color
                    .as_deref()
                    .and_then(parse_hex)
                    .or_else(|| generated.next())?;
                Some((set.label.clone(), color))
            })
            .collect();

        ColorMap {
            mapping,
            default_color: Srgb::new(128, 128, 128),
        }
    }

    /// Look up the colour for a model set.
    pub fn color_for(&self, label: &str) -> Srgb<u8> {
        self.mapping
            .get(label)
            .copied()
            .unwrap_or(self.default_color)
    }

    /// Legend entries (label → hex colour) for the report.
    pub fn legend_entries(&self) -> Vec<(String, String)> {
        self.mapping
            .iter()
            .map(|(label, c)| (label.clone(), to_hex(*c)))
            .collect()
    }
}
