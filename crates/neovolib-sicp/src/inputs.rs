//! Input source codes and their display labels.
//!
//! Source codes differ between display families, and some firmware reports
//! "extended" codes with extra high bits set. [`InputLabels`] is a lookup
//! table with the common AG Neovo codes preloaded; callers can add or
//! override entries and change (or disable) the mask used to fold an
//! extended code back onto a known one.

use std::collections::BTreeMap;

/// Default mask applied to unknown codes to find a base entry.
pub const DEFAULT_EXTENDED_MASK: u8 = 0x1F;

/// Known source codes: (code, short name, label).
const DEFAULT_INPUTS: &[(u8, &str, &str)] = &[
    (0x01, "video", "Video"),
    (0x02, "svideo", "S-Video"),
    (0x03, "component", "Component"),
    (0x05, "vga", "VGA"),
    (0x06, "hdmi2", "HDMI 2"),
    (0x07, "dp2", "DisplayPort 2"),
    (0x08, "usb2", "USB 2"),
    (0x09, "card-dvi-d", "Card DVI-D"),
    (0x0A, "dp1", "DisplayPort 1"),
    (0x0B, "card-ops", "Card OPS"),
    (0x0C, "usb1", "USB 1"),
    (0x0D, "hdmi", "HDMI"),
    (0x0E, "dvi-d", "DVI-D"),
    (0x0F, "hdmi3", "HDMI 3"),
    (0x10, "browser", "Browser"),
    (0x11, "smartcms", "SmartCMS"),
    (0x12, "dms", "DMS"),
    (0x13, "internal-storage", "Internal storage"),
    (0x16, "media-player", "Media player"),
    (0x17, "pdf-player", "PDF player"),
    (0x18, "custom", "Custom"),
    (0x19, "hdmi4", "HDMI 4"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    name: String,
    label: String,
}

/// Table mapping input source codes to names and labels.
#[derive(Debug, Clone)]
pub struct InputLabels {
    entries: BTreeMap<u8, Entry>,
    extended_mask: Option<u8>,
}

impl Default for InputLabels {
    fn default() -> Self {
        let entries = DEFAULT_INPUTS
            .iter()
            .map(|&(code, name, label)| {
                (
                    code,
                    Entry {
                        name: name.to_string(),
                        label: label.to_string(),
                    },
                )
            })
            .collect();
        InputLabels {
            entries,
            extended_mask: Some(DEFAULT_EXTENDED_MASK),
        }
    }
}

impl InputLabels {
    /// The preloaded table with the default extended-code mask.
    pub fn new() -> Self {
        Self::default()
    }

    /// A table with no entries and no extended-code folding.
    pub fn empty() -> Self {
        InputLabels {
            entries: BTreeMap::new(),
            extended_mask: None,
        }
    }

    /// Set the mask used to fold extended codes, or `None` to disable it.
    pub fn with_extended_mask(mut self, mask: Option<u8>) -> Self {
        self.extended_mask = mask;
        self
    }

    /// Add or replace the entry for `code`.
    pub fn with_entry(mut self, code: u8, name: &str, label: &str) -> Self {
        self.insert(code, name, label);
        self
    }

    /// Add or replace the entry for `code`.
    pub fn insert(&mut self, code: u8, name: &str, label: &str) {
        self.entries.insert(
            code,
            Entry {
                name: name.to_string(),
                label: label.to_string(),
            },
        );
    }

    /// Human-readable label for a reported source code.
    ///
    /// Exact entries win. Otherwise, if the masked code has an entry, the
    /// label notes the extended code; anything else is reported as unknown.
    pub fn label(&self, code: u8) -> String {
        if let Some(entry) = self.entries.get(&code) {
            return entry.label.clone();
        }
        if let Some(mask) = self.extended_mask {
            let base = code & mask;
            if base != code {
                if let Some(entry) = self.entries.get(&base) {
                    return format!("{} (ext 0x{code:02x})", entry.label);
                }
            }
        }
        format!("Unknown (0x{code:02x})")
    }

    /// Look up a source code by short name or label, ignoring case,
    /// spaces, dashes and underscores. Numeric strings (`13`, `0x0D`) are
    /// accepted as raw codes.
    pub fn code_for(&self, name: &str) -> Option<u8> {
        let wanted = normalize(name);
        let by_name = self.entries.iter().find(|(_, entry)| {
            normalize(&entry.name) == wanted || normalize(&entry.label) == wanted
        });
        if let Some((&code, _)) = by_name {
            return Some(code);
        }

        let trimmed = name.trim();
        match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex) => u8::from_str_radix(hex, 16).ok(),
            None => trimmed.parse().ok(),
        }
    }

    /// Iterate over `(code, name, label)` in code order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &str, &str)> {
        self.entries
            .iter()
            .map(|(&code, entry)| (code, entry.name.as_str(), entry.label.as_str()))
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}
