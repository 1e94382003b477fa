//! Static dependency ranking of resource types
//!
//! Administrative resources come first, then actors, then clinical and
//! finally financial/provenance resources. The ranking is flat: it cannot
//! express multi-parent dependencies or cycles.

/// Resource types in submission order
pub const DEPENDENCY_ORDER: &[&str] = &[
    "Organization",
    "Location",
    "Practitioner",
    "PractitionerRole",
    "Patient",
    "Device",
    "Medication",
    "Encounter",
    "Condition",
    "Procedure",
    "CareTeam",
    "CarePlan",
    "Immunization",
    "MedicationRequest",
    "MedicationAdministration",
    "Observation",
    "DiagnosticReport",
    "ImagingStudy",
    "DocumentReference",
    "AllergyIntolerance",
    "Claim",
    "ExplanationOfBenefit",
    "SupplyDelivery",
    "Provenance",
];

/// Rank of types missing from [`DEPENDENCY_ORDER`]
pub const UNMAPPED_PRIORITY: u32 = 99;

/// Priority of `resource_type`; lower sorts first
pub fn priority(resource_type: &str) -> u32 {
    DEPENDENCY_ORDER
        .iter()
        .position(|t| *t == resource_type)
        .map_or(UNMAPPED_PRIORITY, |index| index as u32 + 1)
}
