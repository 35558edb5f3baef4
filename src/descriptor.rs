//! Descriptor selection from raw compound payloads.
//!
//! The external source reports an unpredictable subset of property columns
//! per compound, including up to four differently-labeled SMILES variants.
//! Exactly one SMILES string is retained per compound; the other five
//! descriptors pass through as-is when present. Every absent descriptor is
//! recorded as a `descriptor`-stage anomaly so downstream consumers can tell
//! "property not reported" apart from "compound not found".

use crate::models::{AnomalyRecord, AnomalyStage, DescriptorRecord, KIND_MISSING_FIELD};
use crate::pubchem::PropertyRow;

// ---

/// Select one SMILES string from labeled candidates, in strict priority
/// order: the first labeled `Canonical`, else the first labeled `Isomeric`,
/// else the first candidate of any other label.
pub fn select_smiles(candidates: &[(&str, &str)]) -> Option<String> {
    // ---
    for wanted in ["Canonical", "Isomeric"] {
        if let Some((_, value)) = candidates.iter().find(|(label, _)| *label == wanted) {
            return Some((*value).to_string());
        }
    }
    candidates.first().map(|(_, value)| (*value).to_string())
}

/// SMILES variants present in a payload row, in reported column order.
///
/// Newer PUG servers answer the same property request with `SMILES` /
/// `ConnectivitySMILES` columns instead of the classic pair; all four are
/// offered to the selector.
pub fn smiles_candidates(row: &PropertyRow) -> Vec<(&'static str, &str)> {
    // ---
    let mut candidates = Vec::new();
    if let Some(value) = row.canonical_smiles.as_deref() {
        candidates.push(("Canonical", value));
    }
    if let Some(value) = row.isomeric_smiles.as_deref() {
        candidates.push(("Isomeric", value));
    }
    if let Some(value) = row.smiles.as_deref() {
        candidates.push(("SMILES", value));
    }
    if let Some(value) = row.connectivity_smiles.as_deref() {
        candidates.push(("Connectivity", value));
    }
    candidates
}

/// Convert a payload row into the retained descriptor set, recording one
/// anomaly per absent field.
pub fn build_record(cas: &str, row: &PropertyRow) -> (DescriptorRecord, Vec<AnomalyRecord>) {
    // ---
    let record = DescriptorRecord {
        smiles: select_smiles(&smiles_candidates(row)),
        polar_surface_area: row.tpsa,
        molecular_weight: row.molecular_weight,
        log_p: row.x_log_p,
        hydrogen_bond_acceptor: row.h_bond_acceptor_count,
        compound_complexity: row.complexity,
    };

    let absent = [
        ("smiles", record.smiles.is_none()),
        ("polarSurfaceArea", record.polar_surface_area.is_none()),
        ("molecularWeight", record.molecular_weight.is_none()),
        ("logP", record.log_p.is_none()),
        ("hydrogenBondAcceptor", record.hydrogen_bond_acceptor.is_none()),
        ("compoundComplexity", record.compound_complexity.is_none()),
    ];

    let anomalies = absent
        .iter()
        .filter(|(_, missing)| *missing)
        .map(|(field, _)| {
            AnomalyRecord::component(
                cas,
                AnomalyStage::Descriptor,
                KIND_MISSING_FIELD,
                format!("property {field} not reported for CID {}", row.cid),
            )
        })
        .collect();

    (record, anomalies)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn caffeine_row() -> PropertyRow {
        // ---
        PropertyRow {
            cid: 2519,
            canonical_smiles: Some("CN1C=NC2=C1C(=O)N(C(=O)N2C)C".to_string()),
            tpsa: Some(58.4),
            molecular_weight: Some(194.19),
            x_log_p: Some(-0.1),
            h_bond_acceptor_count: Some(6),
            complexity: Some(293.0),
            ..PropertyRow::default()
        }
    }

    #[test]
    fn test_select_smiles_prefers_canonical() {
        // ---
        let candidates = [("Isomeric", "A"), ("Canonical", "B"), ("Other", "C")];
        assert_eq!(select_smiles(&candidates), Some("B".to_string()));
    }

    #[test]
    fn test_select_smiles_falls_back_to_isomeric() {
        // ---
        let candidates = [("Other", "C"), ("Isomeric", "A")];
        assert_eq!(select_smiles(&candidates), Some("A".to_string()));
    }

    #[test]
    fn test_select_smiles_falls_back_to_first_other_label() {
        // ---
        let candidates = [("SMILES", "X"), ("Connectivity", "Y")];
        assert_eq!(select_smiles(&candidates), Some("X".to_string()));

        assert_eq!(select_smiles(&[]), None);
    }

    #[test]
    fn test_exactly_one_smiles_retained() {
        // ---
        let mut row = caffeine_row();
        row.isomeric_smiles = Some("isomeric-variant".to_string());
        row.smiles = Some("plain-variant".to_string());

        let (record, anomalies) = build_record("58-08-2", &row);
        assert_eq!(record.smiles.as_deref(), Some("CN1C=NC2=C1C(=O)N(C(=O)N2C)C"));
        assert!(anomalies.is_empty());
    }

    #[test]
    fn test_full_row_produces_no_anomalies() {
        // ---
        let (record, anomalies) = build_record("58-08-2", &caffeine_row());

        assert_eq!(record.polar_surface_area, Some(58.4));
        assert_eq!(record.molecular_weight, Some(194.19));
        assert_eq!(record.log_p, Some(-0.1));
        assert_eq!(record.hydrogen_bond_acceptor, Some(6));
        assert_eq!(record.compound_complexity, Some(293.0));
        assert!(anomalies.is_empty());
    }

    #[test]
    fn test_missing_field_yields_one_named_anomaly() {
        // ---
        let mut row = caffeine_row();
        row.x_log_p = None;

        let (record, anomalies) = build_record("58-08-2", &row);

        assert!(record.log_p.is_none());
        assert_eq!(record.polar_surface_area, Some(58.4), "other fields unaffected");
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, KIND_MISSING_FIELD);
        assert_eq!(anomalies[0].stage, AnomalyStage::Descriptor);
        assert!(anomalies[0].detail.contains("logP"));
    }

    #[test]
    fn test_empty_row_yields_anomaly_per_field() {
        // ---
        let row = PropertyRow {
            cid: 712,
            ..PropertyRow::default()
        };
        let (record, anomalies) = build_record("50-00-0", &row);

        assert_eq!(record, DescriptorRecord::default());
        assert_eq!(anomalies.len(), 6);
    }
}
