//! A small periodic table and the composition-derived properties law
//! systems need: molar mass, specific heat, phase points, bond energies.

use ebb_types::{Chemical, StateOfMatter};

/// One element's reference data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    /// Chemical symbol.
    pub symbol: &'static str,
    /// Standard atomic mass (g/mol).
    pub atomic_mass: f64,
    /// Melting point (K).
    pub melting_point: f64,
    /// Boiling point (K).
    pub boiling_point: f64,
    /// Molar heat capacity (J/(mol·K)).
    pub molar_heat_capacity: f64,
}

const fn element(
    symbol: &'static str,
    atomic_mass: f64,
    melting_point: f64,
    boiling_point: f64,
    molar_heat_capacity: f64,
) -> Element {
    Element {
        symbol,
        atomic_mass,
        melting_point,
        boiling_point,
        molar_heat_capacity,
    }
}

/// Elements known to the engine.
pub const ELEMENTS: &[Element] = &[
    element("H", 1.008, 13.99, 20.27, 28.84),
    element("He", 4.0026, 0.95, 4.22, 20.79),
    element("C", 12.011, 3823.0, 4098.0, 8.52),
    element("N", 14.007, 63.15, 77.36, 29.12),
    element("O", 15.999, 54.36, 90.19, 29.38),
    element("Na", 22.990, 370.94, 1156.1, 28.23),
    element("Mg", 24.305, 923.0, 1363.0, 24.87),
    element("Si", 28.085, 1687.0, 3538.0, 19.79),
    element("P", 30.974, 317.3, 553.7, 23.82),
    element("S", 32.06, 388.36, 717.8, 22.75),
    element("Cl", 35.45, 171.6, 239.11, 33.95),
    element("K", 39.098, 336.7, 1032.0, 29.6),
    element("Ca", 40.078, 1115.0, 1757.0, 25.93),
    element("Fe", 55.845, 1811.0, 3134.0, 25.10),
];

/// Compounds whose phase points differ wildly from their elements',
/// keyed by [`Chemical::formula`].
const COMPOUND_PHASES: &[(&str, f64, f64)] = &[
    ("H2O", 273.15, 373.15),
    ("CO2", 194.7, 194.7),
    ("CH4", 90.7, 111.7),
    ("H3N", 195.4, 239.8),
    ("ClNa", 1074.0, 1686.0),
    ("O2Si", 1986.0, 2503.0),
];

/// Bond dissociation energies (kJ/mol), symbols in ascending order.
const BOND_ENERGIES: &[(&str, &str, f64)] = &[
    ("H", "H", 436.0),
    ("C", "H", 413.0),
    ("H", "O", 463.0),
    ("H", "N", 391.0),
    ("C", "C", 348.0),
    ("C", "O", 358.0),
    ("C", "N", 293.0),
    ("O", "O", 146.0),
    ("N", "N", 163.0),
    ("O", "Si", 452.0),
    ("Fe", "O", 409.0),
    ("Cl", "Na", 412.0),
    ("Cl", "H", 431.0),
    ("H", "S", 363.0),
];

/// Bond energy used for pairs missing from the table (kJ/mol).
pub const DEFAULT_BOND_ENERGY: f64 = 300.0;

/// Above this temperature everything is plasma (K).
pub const PLASMA_THRESHOLD: f64 = 8000.0;

/// Phase points assumed for entities without a composition (water).
pub const DEFAULT_PHASE_POINTS: PhasePoints = PhasePoints {
    melting: 273.15,
    boiling: 373.15,
};

/// Look up an element by symbol.
pub fn lookup(symbol: &str) -> Option<&'static Element> {
    ELEMENTS.iter().find(|e| e.symbol == symbol)
}

/// Molar mass of a composition (g/mol), counting only known elements.
pub fn molar_mass(chemical: &Chemical) -> f64 {
    chemical
        .elements
        .iter()
        .filter_map(|(symbol, count)| lookup(symbol).map(|e| e.atomic_mass * f64::from(*count)))
        .sum()
}

/// Specific heat per unit mass: total molar heat capacity over molar mass.
///
/// `None` when no element of the composition is known.
pub fn specific_heat(chemical: &Chemical) -> Option<f64> {
    let (capacity, mass) = chemical
        .elements
        .iter()
        .filter_map(|(symbol, count)| {
            lookup(symbol).map(|e| {
                let n = f64::from(*count);
                (e.molar_heat_capacity * n, e.atomic_mass * n)
            })
        })
        .fold((0.0, 0.0), |(c, m), (dc, dm)| (c + dc, m + dm));
    (mass > 0.0).then(|| capacity / mass)
}

/// Melting and boiling points of a composition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhasePoints {
    /// Solid to liquid (K).
    pub melting: f64,
    /// Liquid to gas (K).
    pub boiling: f64,
}

impl PhasePoints {
    /// The phase at `temperature`.
    pub fn phase_at(self, temperature: f64) -> StateOfMatter {
        if temperature >= PLASMA_THRESHOLD {
            StateOfMatter::Plasma
        } else if temperature >= self.boiling {
            StateOfMatter::Gas
        } else if temperature >= self.melting {
            StateOfMatter::Liquid
        } else {
            StateOfMatter::Solid
        }
    }
}

/// Phase points from the compound table, else the mass-weighted mean of
/// the known elements, else water.
pub fn phase_points(chemical: Option<&Chemical>) -> PhasePoints {
    let Some(chemical) = chemical else {
        return DEFAULT_PHASE_POINTS;
    };
    let formula = chemical.formula();
    if let Some((_, melting, boiling)) = COMPOUND_PHASES.iter().find(|(f, _, _)| *f == formula) {
        return PhasePoints {
            melting: *melting,
            boiling: *boiling,
        };
    }
    let (melting, boiling, weight) = chemical
        .elements
        .iter()
        .filter_map(|(symbol, count)| {
            lookup(symbol).map(|e| {
                let w = e.atomic_mass * f64::from(*count);
                (e.melting_point * w, e.boiling_point * w, w)
            })
        })
        .fold((0.0, 0.0, 0.0), |(m, b, w), (dm, db, dw)| (m + dm, b + db, w + dw));
    if weight > 0.0 {
        PhasePoints {
            melting: melting / weight,
            boiling: boiling / weight,
        }
    } else {
        DEFAULT_PHASE_POINTS
    }
}

/// Bond dissociation energy between two elements (kJ/mol).
pub fn bond_energy(a: &str, b: &str) -> f64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    BOND_ENERGIES
        .iter()
        .find(|(x, y, _)| *x == lo && *y == hi)
        .map_or(DEFAULT_BOND_ENERGY, |(_, _, e)| *e)
}

/// The most abundant element of a composition; ties go to the
/// alphabetically first symbol.
pub fn primary_element(chemical: &Chemical) -> Option<&str> {
    chemical
        .elements
        .iter()
        .fold(None, |best: Option<(&String, u32)>, (symbol, count)| match best {
            Some((_, best_count)) if best_count >= *count => best,
            _ => Some((symbol, *count)),
        })
        .map(|(symbol, _)| symbol.as_str())
}

/// Canonical bond label, e.g. `"H-O"`.
pub fn bond_label(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}-{b}")
    } else {
        format!("{b}-{a}")
    }
}
