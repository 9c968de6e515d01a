use serde::Deserialize;

use crate::prediction::CarAttributes;

/// Body of `POST /valuation/predict`.
///
/// Only the car description is read. A client-sent predicted value is
/// not part of the contract and is dropped during deserialization.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationRequest {
    pub input_brand: String,
    pub input_model: String,
    pub input_year: i32,
    pub input_condition_score: i32,
    pub input_mileage: i32,
}

impl ValuationRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.input_brand.trim().is_empty() {
            return Err("inputBrand is required".into());
        }
        if self.input_model.trim().is_empty() {
            return Err("inputModel is required".into());
        }
        if self.input_year < 0 {
            return Err("inputYear must not be negative".into());
        }
        if self.input_mileage < 0 {
            return Err("inputMileage must not be negative".into());
        }
        Ok(())
    }

    pub fn into_attributes(self) -> CarAttributes {
        CarAttributes {
            brand: self.input_brand.trim().to_string(),
            model: self.input_model.trim().to_string(),
            year: self.input_year,
            mileage: self.input_mileage,
            condition_score: self.input_condition_score,
        }
    }
}
