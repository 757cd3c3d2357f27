//! Built-in heart-rate zone presets.

use crate::HrZone;
use once_cell::sync::Lazy;

/// Cached presets - built once and reused
static ZONE_PRESETS: Lazy<Vec<HrZone>> = Lazy::new(build_zone_presets);

fn build_zone_presets() -> Vec<HrZone> {
    vec![
        HrZone::new("Zone 2 (Easy)", 130.0, 150.0, "#4CAF50"),
        HrZone::new("Zone 3 (Tempo)", 150.0, 170.0, "#FF9800"),
        HrZone::new("Zone 4 (Threshold)", 170.0, 185.0, "#F44336"),
    ]
}

/// All zone presets, easiest first
pub fn zone_presets() -> &'static [HrZone] {
    &ZONE_PRESETS
}

/// The zone a fresh configuration targets
pub fn default_zone() -> HrZone {
    ZONE_PRESETS[0].clone()
}

/// Find a preset by name, ignoring case.
///
/// Also accepts the short form "zone 3" / "3".
pub fn find_zone(name: &str) -> Option<&'static HrZone> {
    let wanted = name.trim().to_lowercase();
    ZONE_PRESETS.iter().find(|zone| {
        let full = zone.name.to_lowercase();
        full == wanted
            || full.starts_with(&format!("{} ", wanted))
            || full.starts_with(&format!("zone {} ", wanted))
    })
}
