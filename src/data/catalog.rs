//! Static indicator catalog
//!
//! The dashboard tracks three Sotkanet indicators in each of four subject
//! areas. Each entry carries the upstream id, a display key, its unit, the
//! target value the dashboard compares against and the baseline used when no
//! real data is available.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Subject area of the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    /// Primary care
    Avoterveydenhuolto,
    /// Surgery
    Leikkaustoiminta,
    /// Emergency care
    Paivystys,
    /// Research
    Tutkimus,
}

impl Area {
    pub const ALL: [Area; 4] = [
        Area::Avoterveydenhuolto,
        Area::Leikkaustoiminta,
        Area::Paivystys,
        Area::Tutkimus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Area::Avoterveydenhuolto => "avoterveydenhuolto",
            Area::Leikkaustoiminta => "leikkaustoiminta",
            Area::Paivystys => "paivystys",
            Area::Tutkimus => "tutkimus",
        }
    }

    /// Parses an area name, case-insensitively. Returns `None` for unknown areas.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Area> {
        match s.trim().to_lowercase().as_str() {
            "avoterveydenhuolto" => Some(Area::Avoterveydenhuolto),
            "leikkaustoiminta" => Some(Area::Leikkaustoiminta),
            "paivystys" | "päivystys" => Some(Area::Paivystys),
            "tutkimus" => Some(Area::Tutkimus),
            _ => None,
        }
    }
}

/// Reference data for one tracked indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    /// Sotkanet indicator id
    pub id: u32,
    /// Display key, unique within its area
    pub key: String,
    pub area: Area,
    /// Finnish title shown on the dashboard card
    pub title: String,
    /// Display unit, e.g. `%` or `min`
    pub unit: String,
    /// Goal the dashboard compares the value against
    pub target: f64,
    /// Plausible figure served when the API has nothing
    pub fallback: f64,
}

impl Indicator {
    /// `area.key`, unique across the catalog
    pub fn qualified_key(&self) -> String {
        format!("{}.{}", self.area.as_str(), self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndicatorLookupError {
    #[error("unknown indicator '{0}'")]
    Unknown(String),

    #[error("indicator key '{key}' exists in several areas; use one of: {candidates}")]
    Ambiguous { key: String, candidates: String },
}

/// Immutable set of indicators handed to the resolver at construction
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    indicators: Vec<Indicator>,
}

type Row = (u32, &'static str, Area, &'static str, &'static str, f64, f64);

#[rustfmt::skip]
const BUILTIN: [Row; 12] = [
    (2230, "hoitotakuu", Area::Avoterveydenhuolto, "Hoitotakuun toteutuminen perusterveydenhuollossa", "%", 95.0, 91.0),
    (1820, "kayntimaara", Area::Avoterveydenhuolto, "Avosairaanhoidon käynnit / 1000 asukasta", "käyntiä/1000 as.", 3000.0, 2847.0),
    (4420, "digipalvelut", Area::Avoterveydenhuolto, "Sähköisten palvelujen käyttö", "%", 80.0, 73.0),
    (2150, "jonotusaika", Area::Leikkaustoiminta, "Leikkaustoiminnan jonotusaika", "päivää", 30.0, 42.0),
    (1840, "leikkaukset", Area::Leikkaustoiminta, "Toimenpiteet / 1000 asukasta", "toimenpidettä/1000 as.", 180.0, 156.0),
    (2160, "peruutukset", Area::Leikkaustoiminta, "Peruutettujen leikkausten osuus", "%", 5.0, 8.0),
    (2170, "odotusaika", Area::Paivystys, "Päivystyksen odotusaika", "min", 20.0, 28.0),
    (1782, "kayntimaara", Area::Paivystys, "Päivystyskäynnit / 1000 asukasta", "käyntiä/1000 as.", 800.0, 892.0),
    (2180, "uudelleenkaynnit", Area::Paivystys, "Uudelleenkäynnit 72 tunnin sisällä", "%", 10.0, 12.0),
    (3200, "hankkeet", Area::Tutkimus, "Tutkimushankkeiden määrä", "kpl", 25.0, 23.0),
    (3210, "palaute", Area::Tutkimus, "Opiskelijapalautteen keskiarvo", "ka.", 4.0, 4.2),
    (3220, "julkaisut", Area::Tutkimus, "Tieteelliset julkaisut / vuosi", "kpl", 20.0, 18.0),
];

impl Catalog {
    pub fn new(indicators: Vec<Indicator>) -> Self {
        Self { indicators }
    }

    /// The twelve indicators tracked by the dashboard
    pub fn builtin() -> Self {
        let indicators = BUILTIN
            .iter()
            .map(|&(id, key, area, title, unit, target, fallback)| Indicator {
                id,
                key: key.to_string(),
                area,
                title: title.to_string(),
                unit: unit.to_string(),
                target,
                fallback,
            })
            .collect();
        Self::new(indicators)
    }

    pub fn all(&self) -> &[Indicator] {
        &self.indicators
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }

    pub fn by_id(&self, id: u32) -> Option<&Indicator> {
        self.indicators.iter().find(|i| i.id == id)
    }

    pub fn in_area(&self, area: Area) -> impl Iterator<Item = &Indicator> {
        self.indicators.iter().filter(move |i| i.area == area)
    }

    /// Finds an indicator by bare key, `area.key` or numeric Sotkanet id
    ///
    /// # Arguments
    /// * `reference` - e.g. `hoitotakuu`, `paivystys.kayntimaara` or `2230`
    ///
    /// # Returns
    /// * `Ok(&Indicator)` for exactly one match
    /// * `Err(Ambiguous)` for a bare key that exists in several areas
    /// * `Err(Unknown)` otherwise
    pub fn lookup(&self, reference: &str) -> Result<&Indicator, IndicatorLookupError> {
        let reference = reference.trim();

        if let Ok(id) = reference.parse::<u32>() {
            return self
                .by_id(id)
                .ok_or_else(|| IndicatorLookupError::Unknown(reference.to_string()));
        }

        if let Some((area, key)) = reference.split_once('.') {
            let area = Area::from_str(area)
                .ok_or_else(|| IndicatorLookupError::Unknown(reference.to_string()))?;
            return self
                .in_area(area)
                .find(|i| i.key == key)
                .ok_or_else(|| IndicatorLookupError::Unknown(reference.to_string()));
        }

        let matches: Vec<&Indicator> = self
            .indicators
            .iter()
            .filter(|i| i.key == reference)
            .collect();
        match matches.as_slice() {
            [] => Err(IndicatorLookupError::Unknown(reference.to_string())),
            [only] => Ok(only),
            many => Err(IndicatorLookupError::Ambiguous {
                key: reference.to_string(),
                candidates: many
                    .iter()
                    .map(|i| i.qualified_key())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
