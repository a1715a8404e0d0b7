//! Region identifiers
//!
//! Regions are always Sotkanet numeric region ids. The healthcare-area code
//! `HVA16` used by older clients is accepted as an alias of `974`.

use serde::Serialize;
use thiserror::Error;

/// Pohjois-Savon hyvinvointialue
pub const DEFAULT_REGION: &str = "974";

/// A known region and the aliases that map onto it
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Region {
    pub code: &'static str,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

pub static REGIONS: [Region; 1] = [Region {
    code: "974",
    name: "Pohjois-Savon hyvinvointialue",
    aliases: &["HVA16", "PSHVA"],
}];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid region '{0}': expected a Sotkanet numeric region id")]
pub struct RegionError(pub String);

pub fn all_regions() -> &'static [Region] {
    &REGIONS
}

/// Maps a region reference onto its canonical numeric id.
///
/// Known aliases are translated, other all-digit codes pass through unchanged.
pub fn normalize_region(input: &str) -> Result<String, RegionError> {
    let trimmed = input.trim();

    if let Some(region) = REGIONS
        .iter()
        .find(|r| r.aliases.iter().any(|alias| alias.eq_ignore_ascii_case(trimmed)))
    {
        return Ok(region.code.to_string());
    }

    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Ok(trimmed.to_string());
    }

    Err(RegionError(input.to_string()))
}
