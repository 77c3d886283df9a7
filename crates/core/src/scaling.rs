//! Scaling & Helpers (component 11): redshift-dependent parameter scaling,
//! virial quantities, unit conversion. The core fixes these *conversions*;
//! the astrophysics recipes that consume them are module concerns (spec.md §1).

use crate::config::{CosmologyParams, UnitsParams};

/// Hubble parameter at redshift `z` for a flat/open/closed FLRW cosmology,
/// in units of `H0`.
pub fn hubble_parameter(z: f64, cosmology: &CosmologyParams) -> f64 {
    let omega_k = 1.0 - cosmology.omega - cosmology.omega_lambda;
    let a = 1.0 / (1.0 + z);
    (cosmology.omega / a.powi(3) + omega_k / a.powi(2) + cosmology.omega_lambda).sqrt()
}

/// Virial radius from virial mass and redshift, following the standard
/// spherical-overdensity definition used throughout the SAGE lineage.
pub fn virial_radius(mvir: f64, z: f64, cosmology: &CosmologyParams) -> f64 {
    let hz = hubble_parameter(z, cosmology) * cosmology.hubble * cosmology.hubble_h;
    (cosmology.gravity * mvir / (100.0 * hz * hz)).cbrt()
}

/// Virial velocity, `sqrt(G * Mvir / Rvir)`.
pub fn virial_velocity(mvir: f64, rvir: f64, cosmology: &CosmologyParams) -> f64 {
    if rvir <= 0.0 {
        return 0.0;
    }
    (cosmology.gravity * mvir / rvir).sqrt()
}

/// Converts a physical length in the run's internal units to centimetres.
pub fn length_to_cgs(value_internal: f64, units: &UnitsParams) -> f64 {
    value_internal * units.length_cm
}

/// Converts a mass in the run's internal units to grams.
pub fn mass_to_cgs(value_internal: f64, units: &UnitsParams) -> f64 {
    value_internal * units.mass_g
}

/// Reionization suppression factor applied to infalling baryons (§ supplemented
/// features in SPEC_FULL.md): a redshift- and halo-mass-dependent modifier in
/// `[0, 1]`, following the filtering-mass parametrisation common in the SAGE
/// lineage. The numeric recipe a reionization module actually applies to the
/// cooling flow is still that module's concern; this is the shared helper it
/// calls into, analogous to `virial_radius`/`virial_velocity` above.
pub fn reionization_modifier(z: f64, mvir: f64, filtering_mass: f64) -> f64 {
    if filtering_mass <= 0.0 {
        return 1.0;
    }
    let ratio = filtering_mass / mvir.max(f64::MIN_POSITIVE);
    let suppression = 1.0 / (1.0 + 0.26 * ratio) * (1.0 + z).recip().max(0.0);
    suppression.clamp(0.0, 1.0)
}
