/// Fallback radius for elements missing from the table.
const DEFAULT_VDW_RADIUS: f32 = 1.7;

/// Van der Waals radius (angstroms) for an element symbol.
///
/// Matching is case-insensitive; unknown symbols get a carbon-sized radius.
#[must_use]
pub fn vdw_radius(element: &str) -> f32 {
    match element.trim().to_ascii_uppercase().as_str() {
        "H" | "D" => 1.2,
        "C" => 1.7,
        "N" => 1.55,
        "O" => 1.52,
        "F" => 1.47,
        "P" | "S" => 1.8,
        "CL" => 1.75,
        "BR" => 1.85,
        "SE" => 1.9,
        "I" => 1.98,
        "NA" => 2.27,
        "MG" => 1.73,
        "K" => 2.75,
        "CA" => 2.31,
        "FE" | "ZN" | "CU" | "MN" => 1.4,
        _ => DEFAULT_VDW_RADIUS,
    }
}
