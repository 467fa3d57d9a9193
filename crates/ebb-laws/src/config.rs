//! Per-system configuration.
//!
//! Each law system takes its own section of `ebb-config.yaml`. Every field
//! has a default, so an empty section (or no section at all) yields a
//! working system.

use glam::DVec3;
use serde::Deserialize;

/// What to do with a transformation the ledger finds unbalanced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationPolicy {
    /// Record the violation and commit anyway.
    #[default]
    LogOnly,
    /// Record the violation and leave the store untouched.
    Reject,
}

impl ViolationPolicy {
    /// Whether a transformation with this validity should be applied.
    pub const fn permits(self, valid: bool) -> bool {
        valid || matches!(self, Self::LogOnly)
    }
}

/// Integration scheme for population dynamics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    /// Adaptive Dormand-Prince 5(4).
    #[default]
    Rk45,
    /// Classic fixed-step fourth-order Runge-Kutta.
    Rk4,
}

/// Star, orbit and day cycle driving the ambient temperature.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CosmicConfig {
    /// Luminosity of the host star (W).
    #[serde(default = "default_cosmic_stellar_luminosity")]
    pub stellar_luminosity: f64,

    /// Distance from the star (m).
    #[serde(default = "default_cosmic_orbital_radius")]
    pub orbital_radius: f64,

    /// Fraction of starlight reflected.
    #[serde(default = "default_cosmic_albedo")]
    pub albedo: f64,

    /// Simulated seconds per rotation.
    #[serde(default = "default_cosmic_day_length")]
    pub day_length: f64,

    /// Fractional day/night temperature swing.
    #[serde(default = "default_cosmic_diurnal_amplitude")]
    pub diurnal_amplitude: f64,

    /// Per-tick ambient noise amplitude (K).
    #[serde(default = "default_cosmic_jitter")]
    pub jitter: f64,

    /// Rate at which entity temperatures relax toward ambient (1/s).
    #[serde(default = "default_cosmic_coupling_rate")]
    pub coupling_rate: f64,
}

impl Default for CosmicConfig {
    fn default() -> Self {
        Self {
            stellar_luminosity: default_cosmic_stellar_luminosity(),
            orbital_radius: default_cosmic_orbital_radius(),
            albedo: default_cosmic_albedo(),
            day_length: default_cosmic_day_length(),
            diurnal_amplitude: default_cosmic_diurnal_amplitude(),
            jitter: default_cosmic_jitter(),
            coupling_rate: default_cosmic_coupling_rate(),
        }
    }
}

const fn default_cosmic_stellar_luminosity() -> f64 {
    3.828e26
}

const fn default_cosmic_orbital_radius() -> f64 {
    1.496e11
}

const fn default_cosmic_albedo() -> f64 {
    0.3
}

const fn default_cosmic_day_length() -> f64 {
    600.0
}

const fn default_cosmic_diurnal_amplitude() -> f64 {
    0.05
}

const fn default_cosmic_jitter() -> f64 {
    0.5
}

const fn default_cosmic_coupling_rate() -> f64 {
    0.01
}

/// Heat exchange between entities and with space.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThermodynamicsConfig {
    /// Neighbours within this distance exchange heat.
    #[serde(default = "default_thermodynamics_conduction_radius")]
    pub conduction_radius: f64,

    /// Thermal conductance between neighbours (W/K).
    #[serde(default = "default_thermodynamics_conductivity")]
    pub conductivity: f64,

    /// Black-body emissivity.
    #[serde(default = "default_thermodynamics_emissivity")]
    pub emissivity: f64,

    /// Scale applied to radiated power.
    #[serde(default = "default_thermodynamics_radiative_coupling")]
    pub radiative_coupling: f64,

    /// Density used to derive radiating area from mass.
    #[serde(default = "default_thermodynamics_density")]
    pub density: f64,

    /// Lower temperature clamp (K).
    #[serde(default = "default_thermodynamics_min_temperature")]
    pub min_temperature: f64,

    /// Upper temperature clamp (K).
    #[serde(default = "default_thermodynamics_max_temperature")]
    pub max_temperature: f64,
}

impl Default for ThermodynamicsConfig {
    fn default() -> Self {
        Self {
            conduction_radius: default_thermodynamics_conduction_radius(),
            conductivity: default_thermodynamics_conductivity(),
            emissivity: default_thermodynamics_emissivity(),
            radiative_coupling: default_thermodynamics_radiative_coupling(),
            density: default_thermodynamics_density(),
            min_temperature: default_thermodynamics_min_temperature(),
            max_temperature: default_thermodynamics_max_temperature(),
        }
    }
}

const fn default_thermodynamics_conduction_radius() -> f64 {
    2.0
}

const fn default_thermodynamics_conductivity() -> f64 {
    0.5
}

const fn default_thermodynamics_emissivity() -> f64 {
    0.9
}

const fn default_thermodynamics_radiative_coupling() -> f64 {
    1.0e-3
}

const fn default_thermodynamics_density() -> f64 {
    1.0
}

const fn default_thermodynamics_min_temperature() -> f64 {
    2.7
}

const fn default_thermodynamics_max_temperature() -> f64 {
    10_000.0
}

/// Arrhenius reaction kinetics.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KineticsConfig {
    /// Reactants must be within this distance.
    #[serde(default = "default_kinetics_reaction_radius")]
    pub reaction_radius: f64,

    /// Arrhenius pre-exponential factor (1/s).
    #[serde(default = "default_kinetics_pre_exponential")]
    pub pre_exponential: f64,

    /// Activation energy (J/mol).
    #[serde(default = "default_kinetics_activation_energy")]
    pub activation_energy: f64,

    /// Heat released per kJ/mol of bond energy formed.
    #[serde(default = "default_kinetics_heat_per_bond")]
    pub heat_per_bond: f64,

    /// Largest product a reaction may form.
    #[serde(default = "default_kinetics_max_product_atoms")]
    pub max_product_atoms: u32,

    /// Reactions committed per tick at most.
    #[serde(default = "default_kinetics_max_reactions_per_tick")]
    pub max_reactions_per_tick: usize,
}

impl Default for KineticsConfig {
    fn default() -> Self {
        Self {
            reaction_radius: default_kinetics_reaction_radius(),
            pre_exponential: default_kinetics_pre_exponential(),
            activation_energy: default_kinetics_activation_energy(),
            heat_per_bond: default_kinetics_heat_per_bond(),
            max_product_atoms: default_kinetics_max_product_atoms(),
            max_reactions_per_tick: default_kinetics_max_reactions_per_tick(),
        }
    }
}

const fn default_kinetics_reaction_radius() -> f64 {
    1.5
}

const fn default_kinetics_pre_exponential() -> f64 {
    1.0e6
}

const fn default_kinetics_activation_energy() -> f64 {
    50_000.0
}

const fn default_kinetics_heat_per_bond() -> f64 {
    0.01
}

const fn default_kinetics_max_product_atoms() -> u32 {
    12
}

const fn default_kinetics_max_reactions_per_tick() -> usize {
    32
}

/// Brownian motion of fluid entities.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DiffusionConfig {
    /// Dynamic viscosity of the medium (Pa·s).
    #[serde(default = "default_diffusion_viscosity")]
    pub viscosity: f64,

    /// Density used to derive particle radius from mass.
    #[serde(default = "default_diffusion_density")]
    pub density: f64,

    /// Scale applied to the Stokes-Einstein coefficient.
    #[serde(default = "default_diffusion_coefficient_scale")]
    pub coefficient_scale: f64,
}

impl Default for DiffusionConfig {
    fn default() -> Self {
        Self {
            viscosity: default_diffusion_viscosity(),
            density: default_diffusion_density(),
            coefficient_scale: default_diffusion_coefficient_scale(),
        }
    }
}

const fn default_diffusion_viscosity() -> f64 {
    1.0e-3
}

const fn default_diffusion_density() -> f64 {
    1.0
}

const fn default_diffusion_coefficient_scale() -> f64 {
    1.0e18
}

/// Grouping of molecules into materials and back.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AggregationConfig {
    /// Seconds between aggregation passes.
    #[serde(default = "default_aggregation_interval")]
    pub interval: f64,

    /// Neighbours within this distance of a seed join its group.
    #[serde(default = "default_aggregation_radius")]
    pub radius: f64,

    /// Smallest group that aggregates.
    #[serde(default = "default_aggregation_min_group_size")]
    pub min_group_size: usize,

    /// Largest group that aggregates.
    #[serde(default = "default_aggregation_max_group_size")]
    pub max_group_size: usize,

    /// Aggregates hotter than this split apart (K).
    #[serde(default = "default_aggregation_disaggregation_temperature")]
    pub disaggregation_temperature: f64,

    /// Distance of fragments from the aggregate's centre.
    #[serde(default = "default_aggregation_fragment_spacing")]
    pub fragment_spacing: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            interval: default_aggregation_interval(),
            radius: default_aggregation_radius(),
            min_group_size: default_aggregation_min_group_size(),
            max_group_size: default_aggregation_max_group_size(),
            disaggregation_temperature: default_aggregation_disaggregation_temperature(),
            fragment_spacing: default_aggregation_fragment_spacing(),
        }
    }
}

const fn default_aggregation_interval() -> f64 {
    1.0
}

const fn default_aggregation_radius() -> f64 {
    2.0
}

const fn default_aggregation_min_group_size() -> usize {
    2
}

const fn default_aggregation_max_group_size() -> usize {
    16
}

const fn default_aggregation_disaggregation_temperature() -> f64 {
    2000.0
}

const fn default_aggregation_fragment_spacing() -> f64 {
    0.75
}

/// Periodic ledger cross-check.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ValidationConfig {
    /// Seconds between cross-checks.
    #[serde(default = "default_validation_interval")]
    pub interval: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            interval: default_validation_interval(),
        }
    }
}

const fn default_validation_interval() -> f64 {
    1.0
}

/// Rigid-body bridge and built-in integrator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PhysicsConfig {
    /// Load a backend at all.
    #[serde(default = "default_physics_enabled")]
    pub enabled: bool,

    /// Gravitational acceleration (m/s²).
    #[serde(default = "default_physics_gravity")]
    pub gravity: DVec3,

    /// Height of the ground plane, if any.
    #[serde(default = "default_physics_ground_height")]
    pub ground_height: Option<f64>,

    /// Bounciness of contacts in `[0, 1]`.
    #[serde(default = "default_physics_restitution")]
    pub restitution: f64,

    /// Longest integration substep (s).
    #[serde(default = "default_physics_max_substep")]
    pub max_substep: f64,

    /// Momentum change that gets booked as an impulse.
    #[serde(default = "default_physics_momentum_threshold")]
    pub momentum_threshold: f64,

    /// Density used to derive body radius from mass.
    #[serde(default = "default_physics_density")]
    pub density: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            enabled: default_physics_enabled(),
            gravity: default_physics_gravity(),
            ground_height: default_physics_ground_height(),
            restitution: default_physics_restitution(),
            max_substep: default_physics_max_substep(),
            momentum_threshold: default_physics_momentum_threshold(),
            density: default_physics_density(),
        }
    }
}

const fn default_physics_enabled() -> bool {
    true
}

const fn default_physics_gravity() -> DVec3 {
    DVec3::new(0.0, -9.81, 0.0)
}

const fn default_physics_ground_height() -> Option<f64> {
    Some(0.0)
}

const fn default_physics_restitution() -> f64 {
    0.3
}

const fn default_physics_max_substep() -> f64 {
    1.0 / 60.0
}

const fn default_physics_momentum_threshold() -> f64 {
    0.001
}

const fn default_physics_density() -> f64 {
    1.0
}

/// Energy budgets of living entities.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetabolismConfig {
    /// Temperature of peak efficiency (K).
    #[serde(default = "default_metabolism_optimal_temperature")]
    pub optimal_temperature: f64,

    /// Exponential efficiency loss per kelvin below optimum.
    #[serde(default = "default_metabolism_thermal_sensitivity")]
    pub thermal_sensitivity: f64,

    /// Efficiency of organisms without a temperature.
    #[serde(default = "default_metabolism_default_efficiency")]
    pub default_efficiency: f64,

    /// Mass whose maintenance cost is unscaled.
    #[serde(default = "default_metabolism_reference_mass")]
    pub reference_mass: f64,

    /// Share of produced energy that becomes waste.
    #[serde(default = "default_metabolism_waste_fraction")]
    pub waste_fraction: f64,
}

impl Default for MetabolismConfig {
    fn default() -> Self {
        Self {
            optimal_temperature: default_metabolism_optimal_temperature(),
            thermal_sensitivity: default_metabolism_thermal_sensitivity(),
            default_efficiency: default_metabolism_default_efficiency(),
            reference_mass: default_metabolism_reference_mass(),
            waste_fraction: default_metabolism_waste_fraction(),
        }
    }
}

const fn default_metabolism_optimal_temperature() -> f64 {
    310.0
}

const fn default_metabolism_thermal_sensitivity() -> f64 {
    0.05
}

const fn default_metabolism_default_efficiency() -> f64 {
    0.5
}

const fn default_metabolism_reference_mass() -> f64 {
    70.0
}

const fn default_metabolism_waste_fraction() -> f64 {
    0.1
}

/// Selection and reproduction of organisms.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvolutionConfig {
    /// Seconds between selection passes.
    #[serde(default = "default_evolution_interval")]
    pub interval: f64,

    /// Energy stores needed to reproduce.
    #[serde(default = "default_evolution_reproduction_threshold")]
    pub reproduction_threshold: f64,

    /// Organisms at or below this energy die.
    #[serde(default = "default_evolution_starvation_threshold")]
    pub starvation_threshold: f64,

    /// Per-base point mutation probability.
    #[serde(default = "default_evolution_mutation_rate")]
    pub mutation_rate: f64,

    /// Reproduction stops at this many organisms.
    #[serde(default = "default_evolution_max_organisms")]
    pub max_organisms: usize,

    /// Distance between parent and offspring.
    #[serde(default = "default_evolution_offspring_spacing")]
    pub offspring_spacing: f64,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            interval: default_evolution_interval(),
            reproduction_threshold: default_evolution_reproduction_threshold(),
            starvation_threshold: default_evolution_starvation_threshold(),
            mutation_rate: default_evolution_mutation_rate(),
            max_organisms: default_evolution_max_organisms(),
            offspring_spacing: default_evolution_offspring_spacing(),
        }
    }
}

const fn default_evolution_interval() -> f64 {
    5.0
}

const fn default_evolution_reproduction_threshold() -> f64 {
    150.0
}

const fn default_evolution_starvation_threshold() -> f64 {
    0.0
}

const fn default_evolution_mutation_rate() -> f64 {
    0.01
}

const fn default_evolution_max_organisms() -> usize {
    500
}

const fn default_evolution_offspring_spacing() -> f64 {
    1.0
}

/// Population ODE coefficients and solver settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PopulationConfig {
    /// Intrinsic growth rate of trophic level 1 (1/s).
    #[serde(default = "default_population_producer_growth_rate")]
    pub producer_growth_rate: f64,

    /// Death rate of consumers without prey (1/s).
    #[serde(default = "default_population_consumer_mortality")]
    pub consumer_mortality: f64,

    /// Logistic carrying capacity.
    #[serde(default = "default_population_carrying_capacity")]
    pub carrying_capacity: f64,

    /// Predator-prey encounter rate.
    #[serde(default = "default_population_predation_rate")]
    pub predation_rate: f64,

    /// Share of eaten prey converted into predators.
    #[serde(default = "default_population_conversion_efficiency")]
    pub conversion_efficiency: f64,

    /// Same-level competition coefficient.
    #[serde(default = "default_population_competition_rate")]
    pub competition_rate: f64,

    /// Distant-level cooperation coefficient.
    #[serde(default = "default_population_cooperation_rate")]
    pub cooperation_rate: f64,

    /// Integration scheme.
    #[serde(default = "default_population_solver")]
    pub solver: SolverKind,

    /// Relative tolerance of the adaptive solver.
    #[serde(default = "default_population_rtol")]
    pub rtol: f64,

    /// Absolute tolerance of the adaptive solver.
    #[serde(default = "default_population_atol")]
    pub atol: f64,

    /// Step budget per integration.
    #[serde(default = "default_population_max_steps")]
    pub max_steps: u32,

    /// Fixed steps per tick for the RK4 scheme.
    #[serde(default = "default_population_rk4_steps")]
    pub rk4_steps: u32,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            producer_growth_rate: default_population_producer_growth_rate(),
            consumer_mortality: default_population_consumer_mortality(),
            carrying_capacity: default_population_carrying_capacity(),
            predation_rate: default_population_predation_rate(),
            conversion_efficiency: default_population_conversion_efficiency(),
            competition_rate: default_population_competition_rate(),
            cooperation_rate: default_population_cooperation_rate(),
            solver: default_population_solver(),
            rtol: default_population_rtol(),
            atol: default_population_atol(),
            max_steps: default_population_max_steps(),
            rk4_steps: default_population_rk4_steps(),
        }
    }
}

const fn default_population_producer_growth_rate() -> f64 {
    0.8
}

const fn default_population_consumer_mortality() -> f64 {
    0.1
}

const fn default_population_carrying_capacity() -> f64 {
    1000.0
}

const fn default_population_predation_rate() -> f64 {
    0.001
}

const fn default_population_conversion_efficiency() -> f64 {
    0.1
}

const fn default_population_competition_rate() -> f64 {
    0.0005
}

const fn default_population_cooperation_rate() -> f64 {
    0.0001
}

const fn default_population_solver() -> SolverKind {
    SolverKind::Rk45
}

const fn default_population_rtol() -> f64 {
    1.0e-6
}

const fn default_population_atol() -> f64 {
    1.0e-9
}

const fn default_population_max_steps() -> u32 {
    10_000
}

const fn default_population_rk4_steps() -> u32 {
    16
}

/// Meme transmission between neighbours.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CulturalConfig {
    /// Carriers within this distance exchange memes.
    #[serde(default = "default_cultural_transmission_radius")]
    pub transmission_radius: f64,

    /// Fraction of the strength gap closed per second.
    #[serde(default = "default_cultural_transmission_rate")]
    pub transmission_rate: f64,

    /// Exponential decay of every meme (1/s).
    #[serde(default = "default_cultural_decay_rate")]
    pub decay_rate: f64,

    /// Memes weaker than this are forgotten.
    #[serde(default = "default_cultural_forget_threshold")]
    pub forget_threshold: f64,
}

impl Default for CulturalConfig {
    fn default() -> Self {
        Self {
            transmission_radius: default_cultural_transmission_radius(),
            transmission_rate: default_cultural_transmission_rate(),
            decay_rate: default_cultural_decay_rate(),
            forget_threshold: default_cultural_forget_threshold(),
        }
    }
}

const fn default_cultural_transmission_radius() -> f64 {
    5.0
}

const fn default_cultural_transmission_rate() -> f64 {
    0.2
}

const fn default_cultural_decay_rate() -> f64 {
    0.01
}

const fn default_cultural_forget_threshold() -> f64 {
    0.01
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn policy_permits() {
        assert!(ViolationPolicy::LogOnly.permits(false));
        assert!(ViolationPolicy::Reject.permits(true));
        assert!(!ViolationPolicy::Reject.permits(false));
    }

    #[test]
    fn partial_section_keeps_defaults() {
        let config: KineticsConfig =
            serde_yml::from_str("reaction_radius: 3.0\n").unwrap();
        assert!((config.reaction_radius - 3.0).abs() < f64::EPSILON);
        assert_eq!(config.max_product_atoms, 12);
    }

    #[test]
    fn physics_section_parses_vectors_and_policy_names() {
        let yaml = "gravity: [0.0, -1.62, 0.0]\nground_height: null\n";
        let config: PhysicsConfig = serde_yml::from_str(yaml).unwrap();
        assert!((config.gravity.y + 1.62).abs() < 1e-12);
        assert_eq!(config.ground_height, None);

        let policy: ViolationPolicy = serde_yml::from_str("reject").unwrap();
        assert_eq!(policy, ViolationPolicy::Reject);
        let solver: SolverKind = serde_yml::from_str("rk4").unwrap();
        assert_eq!(solver, SolverKind::Rk4);
    }
}
