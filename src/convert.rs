use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Exchange rates keyed `"{from}_{to}" -> positive rate`. Entries are
/// directional; the inverse pair may be absent, stale, or inconsistent, so
/// no associativity is assumed anywhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateTable(pub HashMap<String, f64>);

impl RateTable {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn key(from_id: &str, to_id: &str) -> String {
        format!("{from_id}_{to_id}")
    }

    pub fn set(&mut self, from_id: &str, to_id: &str, rate: f64) {
        self.0.insert(Self::key(from_id, to_id), rate);
    }

    pub fn get(&self, from_id: &str, to_id: &str) -> Option<f64> {
        self.0.get(&Self::key(from_id, to_id)).copied()
    }
}

/// Convert `amount` between currencies using the rate table: identity when
/// the ids match, direct key multiplies, inverse key divides, and a missing
/// pair yields `0.0`, the explicit "no rate defined" sentinel. Never an
/// error; the read side displays zero.
pub fn convert(amount: f64, from_id: &str, to_id: &str, rates: &RateTable) -> f64 {
    if from_id == to_id {
        return amount;
    }

    if let Some(direct) = rates.get(from_id, to_id) {
        return amount * direct;
    }

    if let Some(inverse) = rates.get(to_id, from_id) {
        return amount / inverse;
    }

    0.0
}
