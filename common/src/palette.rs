use serde::{Deserialize, Serialize};

/// One paintable colour as exposed by the host page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// False when the colour still has to be purchased.
    pub available: bool,
    /// Opaque handle used to select this colour on the page.
    pub id: String,
}

/// A palette button as reported by the page shim, before parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Swatch {
    pub id: String,
    /// CSS background, e.g. "rgb(237, 28, 36)" or "ED1C24"
    pub background: String,
    /// Whether the button carries a lock (purchase required).
    #[serde(default)]
    pub locked: bool,
}

/// The ordered colour list for a session. Never empty; the last entry is the
/// transparent "no paint" sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: Vec<PaletteEntry>,
}

impl PaletteEntry {
    pub fn rgb(&self) -> (u8, u8, u8) {
        (self.r, self.g, self.b)
    }

    /// Squared euclidean RGB distance.
    pub fn distance_sq(&self, r: u8, g: u8, b: u8) -> u32 {
        let dr = self.r as i32 - r as i32;
        let dg = self.g as i32 - g as i32;
        let db = self.b as i32 - b as i32;
        (dr * dr + dg * dg + db * db) as u32
    }
}

impl Swatch {
    /// Parse the background into (R, G, B).
    pub fn rgb(&self) -> Option<(u8, u8, u8)> {
        let bg = self.background.trim();
        if let Some(inner) = bg.strip_prefix("rgb(").and_then(|s| s.strip_suffix(')')) {
            let mut parts = inner.split(',').map(|p| p.trim().parse::<u8>());
            let r = parts.next()?.ok()?;
            let g = parts.next()?.ok()?;
            let b = parts.next()?.ok()?;
            if parts.next().is_some() {
                return None;
            }
            return Some((r, g, b));
        }
        let hex = bg.strip_prefix('#').unwrap_or(bg);
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some((r, g, b))
    }
}

impl Palette {
    /// Returns `None` for an empty list.
    pub fn new(entries: Vec<PaletteEntry>) -> Option<Self> {
        if entries.is_empty() {
            return None;
        }
        Some(Self { entries })
    }

    /// Build from page swatches. The last swatch is the transparent sentinel
    /// and is always available; any other swatch with an unparsable
    /// background makes the whole palette unreadable.
    pub fn from_swatches(swatches: &[Swatch]) -> Option<Self> {
        let last = swatches.len().checked_sub(1)?;
        let entries = swatches
            .iter()
            .enumerate()
            .map(|(index, swatch)| {
                if index == last {
                    return Some(PaletteEntry {
                        r: 255,
                        g: 255,
                        b: 255,
                        available: true,
                        id: swatch.id.clone(),
                    });
                }
                let (r, g, b) = swatch.rgb()?;
                Some(PaletteEntry {
                    r,
                    g,
                    b,
                    available: !swatch.locked,
                    id: swatch.id.clone(),
                })
            })
            .collect::<Option<Vec<_>>>()?;
        Self::new(entries)
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PaletteEntry> {
        self.entries.get(index)
    }

    /// Index of the transparent sentinel.
    pub fn transparent_index(&self) -> usize {
        self.entries.len() - 1
    }

    pub fn transparent(&self) -> &PaletteEntry {
        &self.entries[self.transparent_index()]
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn swatch(id: &str, background: &str, locked: bool) -> Swatch {
        Swatch {
            id: id.into(),
            background: background.into(),
            locked,
        }
    }

    #[test]
    fn parses_css_and_hex_backgrounds() {
        assert_eq!(swatch("a", "rgb(237, 28, 36)", false).rgb(), Some((237, 28, 36)));
        assert_eq!(swatch("a", "#FF5733", false).rgb(), Some((255, 87, 51)));
        assert_eq!(swatch("a", "00ff00", false).rgb(), Some((0, 255, 0)));
        assert_eq!(swatch("a", "rgb(1, 2)", false).rgb(), None);
        assert_eq!(swatch("a", "rgb(1, 2, 300)", false).rgb(), None);
        assert_eq!(swatch("a", "transparent", false).rgb(), None);
    }

    #[test]
    fn last_swatch_becomes_available_sentinel() {
        let palette = Palette::from_swatches(&[
            swatch("red", "rgb(255, 0, 0)", false),
            swatch("blue", "rgb(0, 0, 255)", true),
            swatch("none", "", true),
        ])
        .unwrap();
        assert_eq!(palette.len(), 3);
        assert!(!palette.entries()[1].available);
        assert_eq!(palette.transparent().id, "none");
        assert!(palette.transparent().available);
        assert_eq!(palette.position("blue"), Some(1));
    }

    #[test]
    fn unreadable_swatches_reject_palette() {
        assert!(Palette::from_swatches(&[]).is_none());
        assert!(Palette::from_swatches(&[
            swatch("bad", "gradient", false),
            swatch("none", "", false),
        ])
        .is_none());
    }
}
