//! Concentration parsing and normalization.
//!
//! Raw concentrations are untrusted caller input. Parsing policy per
//! component, in order:
//! 1. a finite JSON number > 0 is accepted as-is;
//! 2. a string is given one strict numeric parse (decimal or scientific
//!    notation) and accepted if finite and > 0;
//! 3. anything else — malformed string, null, missing, zero, negative,
//!    non-finite — drops the component from the output formula entirely.
//!
//! Dropping is the last resort, applied only when the value's numeric intent
//! cannot be determined. Survivors are rescaled to sum to exactly 100; the
//! last element is pinned to absorb floating-summation drift.

use serde_json::Value;

use crate::models::{
    AnomalyRecord, AnomalyStage, ParsedComponent, RawComponent, KIND_EMPTY_FORMULA,
    KIND_UNPARSABLE,
};

// ---

/// Result of normalizing one formula.
#[derive(Debug)]
pub struct NormalizedFormula {
    // ---
    /// Surviving components, `conc_value` already rescaled to sum to 100.
    pub accepted: Vec<ParsedComponent>,
    /// Components excluded for lacking a usable concentration.
    pub dropped: Vec<ParsedComponent>,
    pub anomalies: Vec<AnomalyRecord>,
}

/// Parse and validate raw concentrations, then rescale survivors to 100.
///
/// If every component is dropped the output is empty and a single
/// formula-level `empty-formula` anomaly is recorded; the request as a whole
/// still succeeds.
pub fn normalize(components: &[RawComponent]) -> NormalizedFormula {
    // ---
    let mut accepted = Vec::with_capacity(components.len());
    let mut dropped = Vec::new();
    let mut anomalies = Vec::new();

    for component in components {
        match parse_conc(component.conc.as_ref()) {
            Some(value) => accepted.push(ParsedComponent {
                cas: component.cas.clone(),
                conc_value: value,
                conc_valid: true,
            }),
            None => {
                let shown = component
                    .conc
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "missing".to_string());
                dropped.push(ParsedComponent::dropped(&component.cas));
                anomalies.push(AnomalyRecord::component(
                    &component.cas,
                    AnomalyStage::Concentration,
                    KIND_UNPARSABLE,
                    format!("raw concentration {shown} is not a positive finite number"),
                ));
            }
        }
    }

    let sum: f64 = accepted.iter().map(|c| c.conc_value).sum();
    if sum > 0.0 {
        for component in accepted.iter_mut() {
            component.conc_value = component.conc_value / sum * 100.0;
        }
        // Pin the last element so the literal sum is exactly 100.
        if let Some((last, head)) = accepted.split_last_mut() {
            let head_sum: f64 = head.iter().map(|c| c.conc_value).sum();
            last.conc_value = 100.0 - head_sum;
        }
    } else {
        anomalies.push(AnomalyRecord::formula(
            KIND_EMPTY_FORMULA,
            format!(
                "no usable concentrations among {} component(s)",
                components.len()
            ),
        ));
    }

    NormalizedFormula {
        accepted,
        dropped,
        anomalies,
    }
}

/// Extract a positive finite concentration from an untrusted value.
fn parse_conc(raw: Option<&Value>) -> Option<f64> {
    // ---
    let parsed = match raw? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (parsed.is_finite() && parsed > 0.0).then_some(parsed)
}
