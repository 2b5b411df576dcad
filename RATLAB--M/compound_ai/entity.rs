use std::{convert::Infallible, fmt, str::FromStr};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    error::{EvolutionError, Result},
    stability::{quantum::coherence_time, STABILITY_DIM},
};

/// Compound driving an entity's mutation path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Compound {
    /// `VENOM_SYMBIOTE`
    VenomSymbiote,
    /// `COMPOUND_V`
    CompoundV,
    /// `TITAN_SERUM`
    TitanSerum,
    /// `SUPER_SOLDIER_SERUM`
    SuperSoldierSerum,
    /// `POLYJUICE_POTION`
    PolyjuicePotion,
    /// `LIZARD_SERUM`
    LizardSerum,
    /// `THE_GRASSES`
    TheGrasses,
    /// Any identifier outside the known set.
    Other(String),
}

impl Compound {
    /// Canonical upper-snake identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::VenomSymbiote => "VENOM_SYMBIOTE",
            Self::CompoundV => "COMPOUND_V",
            Self::TitanSerum => "TITAN_SERUM",
            Self::SuperSoldierSerum => "SUPER_SOLDIER_SERUM",
            Self::PolyjuicePotion => "POLYJUICE_POTION",
            Self::LizardSerum => "LIZARD_SERUM",
            Self::TheGrasses => "THE_GRASSES",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Compound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Compound {
    fn from(value: &str) -> Self {
        match value {
            "VENOM_SYMBIOTE" => Self::VenomSymbiote,
            "COMPOUND_V" => Self::CompoundV,
            "TITAN_SERUM" => Self::TitanSerum,
            "SUPER_SOLDIER_SERUM" => Self::SuperSoldierSerum,
            "POLYJUICE_POTION" => Self::PolyjuicePotion,
            "LIZARD_SERUM" => Self::LizardSerum,
            "THE_GRASSES" => Self::TheGrasses,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Compound {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<Compound> for String {
    fn from(value: Compound) -> Self {
        value.as_str().to_string()
    }
}

impl FromStr for Compound {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

/// Read-only view of a game entity handed in by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Compound applied to the entity.
    pub compound: Compound,
    /// Current health (0 and up).
    pub health: f64,
    /// Current size.
    pub size: f64,
    /// Size at creation; must be positive.
    pub initial_size: f64,
    /// Movement speed.
    pub speed: f64,
    /// Whether the entity is currently active.
    pub active: bool,
    /// Whether the entity is mid-transformation.
    #[serde(default)]
    pub is_transformed: bool,
    /// Entity the transformation targets, if any.
    #[serde(default)]
    pub transform_target: Option<String>,
    /// Mutations applied so far, in order.
    #[serde(default)]
    pub mutations: Vec<String>,
    /// Ability name to unlocked flag, in insertion order.
    pub unlocked_abilities: IndexMap<String, bool>,
}

impl EntitySnapshot {
    /// Creates a healthy, unit-sized snapshot with no abilities.
    #[must_use]
    pub fn new(compound: impl Into<Compound>) -> Self {
        Self {
            compound: compound.into(),
            health: 100.0,
            size: 1.0,
            initial_size: 1.0,
            speed: 1.0,
            active: true,
            is_transformed: false,
            transform_target: None,
            mutations: Vec::new(),
            unlocked_abilities: IndexMap::new(),
        }
    }

    /// Sets (or inserts) an ability flag.
    #[must_use]
    pub fn with_ability(mut self, name: impl Into<String>, unlocked: bool) -> Self {
        self.unlocked_abilities.insert(name.into(), unlocked);
        self
    }

    /// Appends a mutation.
    #[must_use]
    pub fn with_mutation(mut self, mutation: impl Into<String>) -> Self {
        self.mutations.push(mutation.into());
        self
    }

    /// Number of mutations applied.
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.mutations.len()
    }

    /// Whether the named ability is present and unlocked.
    #[must_use]
    pub fn is_unlocked(&self, ability: &str) -> bool {
        self.unlocked_abilities.get(ability).copied().unwrap_or(false)
    }

    /// Fraction of listed abilities that are unlocked; zero for an empty map.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn unlocked_fraction(&self) -> f64 {
        if self.unlocked_abilities.is_empty() {
            return 0.0;
        }
        let unlocked = self.unlocked_abilities.values().filter(|flag| **flag).count();
        unlocked as f64 / self.unlocked_abilities.len() as f64
    }

    /// Rejects snapshots the stability and optimizer formulas cannot handle.
    #[allow(clippy::cast_precision_loss)]
    pub fn validate(&self) -> Result<()> {
        if self.compound.as_str().trim().is_empty() {
            return Err(EvolutionError::invalid_entity(
                "compound",
                "identifier is empty",
            ));
        }
        if self.unlocked_abilities.is_empty() {
            return Err(EvolutionError::invalid_entity(
                "unlocked_abilities",
                "ability map has no entries",
            ));
        }
        non_negative("health", self.health)?;
        non_negative("size", self.size)?;
        non_negative("speed", self.speed)?;
        if !self.initial_size.is_finite() || self.initial_size <= 0.0 {
            return Err(EvolutionError::invalid_entity(
                "initial_size",
                format!("must be positive, got {}", self.initial_size),
            ));
        }
        // Stability factors scale coherence by indexes up to the last one.
        let coherence = coherence_time(self.size, self.initial_size, self.speed)
            * (STABILITY_DIM - 1) as f64;
        if !coherence.is_finite() {
            return Err(EvolutionError::invalid_entity(
                "size",
                format!(
                    "coherence time overflows for size {} / initial_size {} at speed {}",
                    self.size, self.initial_size, self.speed
                ),
            ));
        }
        Ok(())
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(EvolutionError::invalid_entity(
            field,
            format!("must be finite and non-negative, got {value}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_round_trips_known_and_custom_names() {
        assert_eq!(Compound::from("TITAN_SERUM"), Compound::TitanSerum);
        assert_eq!(Compound::TitanSerum.to_string(), "TITAN_SERUM");
        let custom = Compound::from("MOON_DUST");
        assert_eq!(custom, Compound::Other("MOON_DUST".into()));
        assert_eq!(custom.as_str(), "MOON_DUST");
    }

    #[test]
    fn snapshot_deserializes_with_defaults() {
        let raw = serde_json::json!({
            "compound": "LIZARD_SERUM",
            "health": 55.0,
            "size": 2.0,
            "initial_size": 1.0,
            "speed": 0.8,
            "active": true,
            "unlocked_abilities": { "regeneration": true, "mimic": false }
        });
        let entity: EntitySnapshot = serde_json::from_value(raw).unwrap();
        assert_eq!(entity.compound, Compound::LizardSerum);
        assert!(entity.mutations.is_empty());
        assert!(entity.is_unlocked("regeneration"));
        assert!(!entity.is_unlocked("mimic"));
        assert!((entity.unlocked_fraction() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn validate_rejects_missing_abilities() {
        let err = EntitySnapshot::new("TITAN_SERUM").validate().unwrap_err();
        assert!(matches!(
            err,
            EvolutionError::InvalidEntity {
                field: "unlocked_abilities",
                ..
            }
        ));
    }

    #[test]
    fn validate_rejects_non_positive_initial_size() {
        let mut entity = EntitySnapshot::new("TITAN_SERUM").with_ability("strength", true);
        entity.initial_size = 0.0;
        let err = entity.validate().unwrap_err();
        assert!(matches!(
            err,
            EvolutionError::InvalidEntity {
                field: "initial_size",
                ..
            }
        ));
    }

    #[test]
    fn validate_rejects_overflowing_growth() {
        let mut entity = EntitySnapshot::new("TITAN_SERUM").with_ability("strength", true);
        entity.size = 1e300;
        entity.initial_size = 1e-10;
        let err = entity.validate().unwrap_err();
        assert!(matches!(
            err,
            EvolutionError::InvalidEntity { field: "size", .. }
        ));
        entity.size = f64::MAX / 200.0;
        entity.initial_size = 1.0;
        assert!(entity.validate().is_err());
        entity.size = 12.0;
        entity.initial_size = 10.0;
        assert!(entity.validate().is_ok());
    }

    #[test]
    fn validate_rejects_nan_health() {
        let mut entity = EntitySnapshot::new("COMPOUND_V").with_ability("speed", false);
        entity.health = f64::NAN;
        assert!(entity.validate().is_err());
        entity.health = 0.0;
        assert!(entity.validate().is_ok());
    }
}
