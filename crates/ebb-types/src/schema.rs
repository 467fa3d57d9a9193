//! Structural validation applied when an entity enters the store.
//!
//! This is the one strict gate in the engine: a malformed entity is rejected
//! with a [`SchemaError`] and nothing is mutated. Everything downstream
//! (ledger accounting, law systems) may assume these rules hold.

use glam::DVec3;

use crate::entity::Entity;
use crate::enums::{Scale, SimulationDetail};

/// A rule the entity schema enforces.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    /// Mass must be finite and strictly positive.
    #[error("mass must be positive and finite, got {mass}")]
    NonPositiveMass {
        /// The rejected mass.
        mass: f64,
    },

    /// Temperature must be finite and strictly positive (Kelvin).
    #[error("temperature must be positive and finite, got {temperature}")]
    NonPositiveTemperature {
        /// The rejected temperature.
        temperature: f64,
    },

    /// A scalar attribute is NaN or infinite.
    #[error("{field} must be finite, got {value}")]
    NonFinite {
        /// Attribute name.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// A vector attribute has a NaN or infinite component.
    #[error("{field} must have finite components")]
    NonFiniteVector {
        /// Attribute name.
        field: &'static str,
    },

    /// Velocity without a position cannot be integrated.
    #[error("velocity requires a position")]
    VelocityWithoutPosition,

    /// A body handle is only meaningful on a massive, placed entity.
    #[error("body handle requires mass and position")]
    BodyWithoutMass,

    /// An entity cannot be its own parent.
    #[error("entity lists itself as its parent")]
    SelfParent,

    /// Element symbols must be non-empty.
    #[error("chemical composition contains an empty element symbol")]
    EmptyElementSymbol,

    /// A stored amount (energy, waste, density, ...) must be finite and non-negative.
    #[error("{field} must be non-negative and finite, got {value}")]
    NegativeAmount {
        /// Attribute name.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// Meme strengths live in `[0, 1]`.
    #[error("meme {meme:?} has strength {strength} outside [0, 1]")]
    MemeStrengthOutOfRange {
        /// Meme name.
        meme: String,
        /// The rejected strength.
        strength: f64,
    },

    /// Population-scale entities must carry population statistics.
    #[error("population-scale entity has no population statistics")]
    PopulationWithoutStats,

    /// Aggregate detail requires an aggregation group.
    #[error("aggregate detail requires an aggregation group")]
    AggregateDetailWithoutGroup,

    /// An aggregate must summarise at least one child.
    #[error("aggregation group lists no children")]
    EmptyAggregate,

    /// An aggregate cannot list itself as a child.
    #[error("aggregate lists itself as a child")]
    SelfReferentialAggregate,

    /// Aggregates live at molecular, material, structural or organismal scale.
    #[error("aggregates cannot live at {scale:?} scale")]
    InvalidAggregateScale {
        /// The rejected scale.
        scale: Scale,
    },
}

fn finite(field: &'static str, value: f64) -> Result<(), SchemaError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SchemaError::NonFinite { field, value })
    }
}

fn finite_vector(field: &'static str, value: DVec3) -> Result<(), SchemaError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SchemaError::NonFiniteVector { field })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), SchemaError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SchemaError::NegativeAmount { field, value })
    }
}

impl Entity {
    /// Check every schema rule, returning the first violation.
    ///
    /// # Errors
    ///
    /// Returns the first [`SchemaError`] found.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.identity.parent_id == Some(self.id) {
            return Err(SchemaError::SelfParent);
        }

        if let Some(physical) = &self.physical {
            if let Some(mass) = physical.mass {
                if !(mass.is_finite() && mass > 0.0) {
                    return Err(SchemaError::NonPositiveMass { mass });
                }
            }
            if let Some(temperature) = physical.temperature {
                if !(temperature.is_finite() && temperature > 0.0) {
                    return Err(SchemaError::NonPositiveTemperature { temperature });
                }
            }
            if let Some(position) = physical.position {
                finite_vector("position", position)?;
            }
            if let Some(velocity) = physical.velocity {
                finite_vector("velocity", velocity)?;
                if physical.position.is_none() {
                    return Err(SchemaError::VelocityWithoutPosition);
                }
            }
            if let Some(charge) = physical.charge {
                finite("charge", charge)?;
            }
            if physical.body.is_some() && !self.is_tracked() {
                return Err(SchemaError::BodyWithoutMass);
            }
        }

        if let Some(chemical) = &self.chemical {
            if chemical.elements.keys().any(String::is_empty) {
                return Err(SchemaError::EmptyElementSymbol);
            }
        }

        if let Some(biological) = &self.biological {
            if let Some(metabolism) = &biological.metabolism {
                non_negative("energy_production", metabolism.energy_production)?;
                non_negative("maintenance_cost", metabolism.maintenance_cost)?;
            }
            if let Some(stores) = biological.energy_stores {
                non_negative("energy_stores", stores)?;
            }
            if let Some(waste) = biological.waste_stores {
                non_negative("waste_stores", waste)?;
            }
            for value in biological.phenotype.values() {
                finite("phenotype", *value)?;
            }
        }

        if let Some(ecological) = &self.ecological {
            if let Some(stats) = &ecological.population {
                non_negative("population count", stats.count)?;
                non_negative("population density", stats.density)?;
                finite("growth_rate", stats.growth_rate)?;
            }
        }
        if self.scale == Scale::Population && !self.is_population() {
            return Err(SchemaError::PopulationWithoutStats);
        }

        if let Some(cultural) = &self.cultural {
            for (meme, strength) in &cultural.memes {
                if !(0.0..=1.0).contains(strength) {
                    return Err(SchemaError::MemeStrengthOutOfRange {
                        meme: meme.clone(),
                        strength: *strength,
                    });
                }
            }
        }

        match &self.aggregation {
            Some(aggregation) => {
                if aggregation.children.is_empty() {
                    return Err(SchemaError::EmptyAggregate);
                }
                if aggregation.children.contains(&self.id) {
                    return Err(SchemaError::SelfReferentialAggregate);
                }
                if !aggregation.scale.can_aggregate_into() {
                    return Err(SchemaError::InvalidAggregateScale {
                        scale: aggregation.scale,
                    });
                }
                non_negative("conserved_mass", aggregation.conserved_mass)?;
                finite("conserved_charge", aggregation.conserved_charge)?;
                finite("conserved_energy", aggregation.conserved_energy)?;
            }
            None => {
                if self.detail == Some(SimulationDetail::Aggregate) {
                    return Err(SchemaError::AggregateDetailWithoutGroup);
                }
            }
        }

        Ok(())
    }
}
