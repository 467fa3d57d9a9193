//! Pure physical and biological law kernels.
//!
//! Every function here is stateless and total: given finite inputs it
//! returns a finite output or a documented sentinel (zero). Systems compose
//! these kernels; none of them touch the store.
//!
//! # Constants
//!
//! | Symbol | Value | Unit |
//! |--------|-------|------|
//! | `G` | 6.674e-11 | N·m²/kg² |
//! | `k_e` | 8.988e9 | N·m²/C² |
//! | `k_B` | 1.381e-23 | J/K |
//! | `R` | 8.314 | J/(mol·K) |
//! | `σ` | 5.670e-8 | W/(m²·K⁴) |
//! | `T_cmb` | 2.725 | K |

use std::f64::consts::PI;

use glam::DVec3;

/// Gravitational constant.
pub const GRAVITATIONAL_CONSTANT: f64 = 6.674e-11;

/// Coulomb constant.
pub const COULOMB_CONSTANT: f64 = 8.988e9;

/// Boltzmann constant.
pub const BOLTZMANN: f64 = 1.380_649e-23;

/// Molar gas constant.
pub const GAS_CONSTANT: f64 = 8.314;

/// Stefan-Boltzmann constant.
pub const STEFAN_BOLTZMANN: f64 = 5.670_374e-8;

/// Temperature of the cosmic microwave background.
pub const CMB_TEMPERATURE: f64 = 2.725;

/// Kleiber exponent for basal metabolic rate.
pub const KLEIBER_EXPONENT: f64 = 0.75;

// ---------------------------------------------------------------------------
// Mechanics
// ---------------------------------------------------------------------------

/// Newtonian gravity on `a` due to `b`. Zero for coincident points.
pub fn gravitational_force(mass_a: f64, pos_a: DVec3, mass_b: f64, pos_b: DVec3) -> DVec3 {
    let offset = pos_b - pos_a;
    let distance_sq = offset.length_squared();
    if distance_sq <= f64::EPSILON {
        return DVec3::ZERO;
    }
    offset.normalize() * (GRAVITATIONAL_CONSTANT * mass_a * mass_b / distance_sq)
}

/// Coulomb force on `a` due to `b`. Repulsive for like charges.
pub fn coulomb_force(charge_a: f64, pos_a: DVec3, charge_b: f64, pos_b: DVec3) -> DVec3 {
    let offset = pos_a - pos_b;
    let distance_sq = offset.length_squared();
    if distance_sq <= f64::EPSILON {
        return DVec3::ZERO;
    }
    offset.normalize() * (COULOMB_CONSTANT * charge_a * charge_b / distance_sq)
}

/// `½·m·|v|²`.
pub fn kinetic_energy(mass: f64, velocity: DVec3) -> f64 {
    0.5 * mass * velocity.length_squared()
}

/// `m·v`.
pub fn momentum(mass: f64, velocity: DVec3) -> DVec3 {
    velocity * mass
}

/// Radius of a sphere of `mass` at `density`: `(3m / 4πρ)^(1/3)`.
pub fn sphere_radius(mass: f64, density: f64) -> f64 {
    if mass <= 0.0 || density <= 0.0 {
        return 0.0;
    }
    (3.0 * mass / (4.0 * PI * density)).cbrt()
}

// ---------------------------------------------------------------------------
// Thermodynamics and chemistry
// ---------------------------------------------------------------------------

/// Arrhenius rate constant `A·exp(-Ea / (R·T))`. Zero at or below 0 K.
pub fn arrhenius_rate(pre_exponential: f64, activation_energy: f64, temperature: f64) -> f64 {
    if temperature <= 0.0 {
        return 0.0;
    }
    pre_exponential * (-activation_energy / (GAS_CONSTANT * temperature)).exp()
}

/// Probability that a first-order event with rate `k` fires within `dt`.
/// Zero for non-finite inputs.
pub fn event_probability(rate: f64, dt: f64) -> f64 {
    let p = 1.0 - (-rate * dt).exp();
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}

/// Sensible heat `c·m·T`.
pub fn thermal_energy(specific_heat: f64, mass: f64, temperature: f64) -> f64 {
    specific_heat * mass * temperature
}

/// Net radiated power `σ·ε·A·(T⁴ − T_env⁴)`. Negative when absorbing.
pub fn blackbody_power(emissivity: f64, area: f64, temperature: f64, ambient: f64) -> f64 {
    STEFAN_BOLTZMANN * emissivity * area * (temperature.powi(4) - ambient.powi(4))
}

/// Radiative equilibrium temperature of a rapidly rotating body:
/// `(L·(1−α) / (16·π·σ·d²))^(1/4)`.
pub fn equilibrium_temperature(luminosity: f64, albedo: f64, distance: f64) -> f64 {
    if distance <= 0.0 || luminosity <= 0.0 {
        return CMB_TEMPERATURE;
    }
    let absorbed = luminosity * (1.0 - albedo.clamp(0.0, 1.0));
    (absorbed / (16.0 * PI * STEFAN_BOLTZMANN * distance * distance))
        .powf(0.25)
        .max(CMB_TEMPERATURE)
}

/// Stellar flux at `distance`: `L / (4π·d²)`.
pub fn stellar_flux(luminosity: f64, distance: f64) -> f64 {
    if distance <= 0.0 {
        return 0.0;
    }
    luminosity / (4.0 * PI * distance * distance)
}

/// Fick's first law: flux `−D·∂c/∂x`.
pub fn fick_flux(diffusion_coefficient: f64, concentration_gradient: f64) -> f64 {
    -diffusion_coefficient * concentration_gradient
}

/// Stokes-Einstein diffusion coefficient `k_B·T / (6π·η·r)`.
pub fn stokes_einstein(temperature: f64, viscosity: f64, radius: f64) -> f64 {
    if viscosity <= 0.0 || radius <= 0.0 {
        return 0.0;
    }
    BOLTZMANN * temperature / (6.0 * PI * viscosity * radius)
}

/// Gibbs free energy `ΔH − T·ΔS`. Negative means spontaneous.
pub fn gibbs_free_energy(enthalpy: f64, temperature: f64, entropy: f64) -> f64 {
    enthalpy - temperature * entropy
}

/// Entropy change of a reversible heat transfer `Q / T`.
pub fn entropy_change(heat: f64, temperature: f64) -> f64 {
    if temperature <= 0.0 {
        return 0.0;
    }
    heat / temperature
}

/// Heat absorbed by a phase change `m·L`.
pub fn latent_heat(mass: f64, specific_latent_heat: f64) -> f64 {
    mass * specific_latent_heat
}

// ---------------------------------------------------------------------------
// Biology and ecology
// ---------------------------------------------------------------------------

/// Logistic growth `r·N·(1 − N/K)`. Zero when `K` is not positive.
pub fn logistic_growth(rate: f64, population: f64, capacity: f64) -> f64 {
    if capacity <= 0.0 {
        return 0.0;
    }
    rate * population * (1.0 - population / capacity)
}

/// Lotka-Volterra predator-prey derivatives `(dPrey, dPredator)`.
pub fn lotka_volterra(
    prey: f64,
    predators: f64,
    prey_growth: f64,
    predation: f64,
    conversion: f64,
    predator_death: f64,
) -> (f64, f64) {
    let encounters = predation * prey * predators;
    (
        prey_growth * prey - encounters,
        conversion * encounters - predator_death * predators,
    )
}

/// Kleiber's law: basal metabolic rate `a·M^0.75`.
pub fn kleiber(mass: f64, coefficient: f64) -> f64 {
    if mass <= 0.0 {
        return 0.0;
    }
    coefficient * mass.powf(KLEIBER_EXPONENT)
}

/// Temperature scaling of metabolic efficiency:
/// `min(1, exp(k·(T − T_opt)))`.
pub fn metabolic_efficiency(temperature: f64, optimal: f64, sensitivity: f64) -> f64 {
    (sensitivity * (temperature - optimal)).exp().min(1.0)
}
