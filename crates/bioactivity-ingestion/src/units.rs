//! KA → Kd conversion.
//!
//! An association constant (KA, M⁻¹) is the reciprocal of the dissociation
//! constant, so Kd (nM) = 1e9 / KA. Only rows reported as `KA` in one of the
//! recognised inverse-molar spellings are converted; everything else gets an
//! empty cell.

/// Activity type that carries an association constant.
pub const ASSOCIATION_CONSTANT_TYPE: &str = "KA";

/// Unit spellings ChEMBL uses for "per molar".
pub const INVERSE_MOLAR_UNITS: [&str; 3] = ["M^-1", "M-1", "1/M"];

const NANOMOLAR_PER_MOLAR: f64 = 1e9;

/// Parses a reported value. Blank, non-numeric and non-finite input yield `None`.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn is_association_constant(activity_type: &str) -> bool {
    activity_type.to_uppercase() == ASSOCIATION_CONSTANT_TYPE
}

pub fn is_inverse_molar(unit: &str) -> bool {
    INVERSE_MOLAR_UNITS.contains(&unit.trim())
}

/// Converts KA (M⁻¹) to Kd in nanomolar, rounded to two decimals.
/// `None` when the reciprocal is not finite (KA of zero).
pub fn ka_to_kd_nm(ka: f64) -> Option<f64> {
    let kd_nm = NANOMOLAR_PER_MOLAR / ka;
    kd_nm.is_finite().then(|| round2(kd_nm))
}

/// Derived Kd (nM) for one activity row, or `None` if the row is not an
/// inverse-molar KA or its value cannot be used.
pub fn derive_kd_nm(activity_type: &str, value: &str, unit: &str) -> Option<f64> {
    if !is_association_constant(activity_type) || !is_inverse_molar(unit) {
        return None;
    }
    parse_numeric(value).and_then(ka_to_kd_nm)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
