//! Price prediction.

use super::encoder;
use crate::inference::ModelHandle;
use crate::models::{AffordabilityBand, PredictionRequest, PredictionResult, YearMonth};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// BTO discount and affordability thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingPolicy {
    /// BTO price = resale × (1 − discount). In `[0, 1)`.
    pub discount_factor: f64,
    /// Highest BTO price in the lower band.
    pub lower_max: f64,
    /// Highest BTO price in the middle band.
    pub middle_max: f64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            discount_factor: 0.20,
            lower_max: 300_000.0,
            middle_max: 600_000.0,
        }
    }
}

impl PricingPolicy {
    /// Checks the policy invariants.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the discount is outside `[0, 1)` or
    /// the thresholds are not positive and increasing.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.discount_factor) {
            return Err(Error::invalid_input(
                "pricing.discount_factor",
                format!("{} is outside [0, 1)", self.discount_factor),
            ));
        }
        if !(self.lower_max > 0.0 && self.lower_max < self.middle_max && self.middle_max.is_finite()) {
            return Err(Error::invalid_input(
                "pricing.affordability",
                format!(
                    "thresholds must satisfy 0 < lower_max < middle_max, got {} and {}",
                    self.lower_max, self.middle_max
                ),
            ));
        }
        Ok(())
    }

    /// Applies the BTO discount to a resale price.
    #[must_use]
    pub fn bto_price(&self, resale_price: f64) -> f64 {
        resale_price * (1.0 - self.discount_factor)
    }

    /// Classifies a BTO price.
    #[must_use]
    pub fn classify(&self, bto_price: f64) -> AffordabilityBand {
        if bto_price <= self.lower_max {
            AffordabilityBand::Lower
        } else if bto_price <= self.middle_max {
            AffordabilityBand::Middle
        } else {
            AffordabilityBand::High
        }
    }
}

/// Turns prediction requests into priced, classified results.
#[derive(Debug, Clone)]
pub struct PredictionService {
    model: Arc<ModelHandle>,
    policy: PricingPolicy,
}

impl PredictionService {
    /// Creates a service over a model handle.
    #[must_use]
    pub const fn new(model: Arc<ModelHandle>, policy: PricingPolicy) -> Self {
        Self { model, policy }
    }

    /// Pricing policy in effect.
    #[must_use]
    pub const fn policy(&self) -> &PricingPolicy {
        &self.policy
    }

    /// Model handle backing the service.
    #[must_use]
    pub const fn model(&self) -> &Arc<ModelHandle> {
        &self.model
    }

    /// Predicts resale and BTO prices for `request` as of `as_of`.
    ///
    /// # Errors
    ///
    /// - [`Error::ModelUnavailable`] without an artifact or on non-finite output
    /// - encoding errors from [`encoder::validate_request`], unchanged
    #[instrument(
        skip(self, request),
        fields(operation = "predict", town = %request.town, flat_type = %request.flat_type)
    )]
    pub fn predict(&self, request: &PredictionRequest, as_of: YearMonth) -> Result<PredictionResult> {
        let start = Instant::now();
        let result = self.predict_inner(request, as_of);

        let (status, model_version) = match &result {
            Ok(r) => ("success", r.model_version.clone()),
            Err(e) => (e.kind(), "none".to_string()),
        };
        metrics::counter!(
            "predictions_total",
            "status" => status,
            "model_version" => model_version
        )
        .increment(1);
        metrics::histogram!("prediction_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        result
    }

    fn predict_inner(&self, request: &PredictionRequest, as_of: YearMonth) -> Result<PredictionResult> {
        let artifact = self.model.current()?;
        let validated = encoder::validate_request(artifact.schema(), request, as_of)?;
        let features = encoder::encode_validated(artifact.slots(), &validated, as_of);
        let raw = artifact.model().predict(features.as_slice());

        if !raw.is_finite() {
            return Err(Error::ModelUnavailable(format!(
                "model {} produced a non-finite value",
                artifact.version()
            )));
        }

        let clamped = raw < 0.0;
        let resale = if clamped {
            tracing::warn!(
                raw,
                model_version = artifact.version(),
                "Negative model output clamped to zero"
            );
            metrics::counter!("prediction_clamped_total").increment(1);
            0.0
        } else {
            raw
        };

        let bto = self.policy.bto_price(resale);
        let band = self.policy.classify(bto);

        Ok(PredictionResult {
            town: validated.town.to_string(),
            flat_type: validated.flat_type.to_string(),
            predicted_resale_price: resale,
            predicted_bto_price: bto,
            affordability_label: band.label().to_string(),
            affordability: band,
            model_version: artifact.version().to_string(),
            clamped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{ArtifactDocument, FeatureSchema, ModelArtifact, RegressionModel};
    use crate::models::{FlatType, Town};
    use std::collections::BTreeMap;
    use test_case::test_case;

    const AS_OF: YearMonth = YearMonth {
        year: 2025,
        month: 6,
    };

    /// price = intercept + per_sqm * floor_area
    fn service(intercept: f64, per_sqm: f64) -> PredictionService {
        let artifact = ModelArtifact::from_document(ArtifactDocument {
            version: "1.2.3".to_string(),
            schema: FeatureSchema {
                features: vec!["floor_area_sqm".to_string()],
                towns: Town::all().to_vec(),
                flat_types: FlatType::all().to_vec(),
            },
            model: RegressionModel::Linear {
                intercept,
                coefficients: vec![per_sqm],
            },
            metadata: BTreeMap::new(),
        })
        .unwrap();
        PredictionService::new(
            Arc::new(ModelHandle::with_artifact(artifact)),
            PricingPolicy::default(),
        )
    }

    fn request(area: f64) -> PredictionRequest {
        PredictionRequest {
            town: " woodlands ".to_string(),
            flat_type: "4 room".to_string(),
            floor_area_sqm: area,
            storey: 5,
            lease_commence_year: 2000,
        }
    }

    #[test]
    fn test_predict_prices_and_classifies() {
        let result = service(0.0, 5_000.0).predict(&request(90.0), AS_OF).unwrap();

        assert!((result.predicted_resale_price - 450_000.0).abs() < 1e-6);
        assert!((result.predicted_bto_price - 360_000.0).abs() < 1e-6);
        assert_eq!(result.affordability, AffordabilityBand::Middle);
        assert_eq!(result.affordability_label, "Middle Income ($7,000-$21,000)");
        assert_eq!(result.town, "WOODLANDS");
        assert_eq!(result.flat_type, "4 ROOM");
        assert_eq!(result.model_version, "1.2.3");
        assert!(!result.clamped);
    }

    #[test]
    fn test_woodlands_reference_quote() {
        let result = service(539_796.53, 0.0).predict(&request(90.0), AS_OF).unwrap();
        assert!((result.predicted_resale_price - 539_796.53).abs() < 1e-6);
        assert!((result.predicted_bto_price - 431_837.224).abs() < 1e-6);
        assert_eq!(result.affordability, AffordabilityBand::Middle);
    }

    #[test]
    fn test_negative_output_is_clamped() {
        let result = service(-1_000_000.0, 1.0).predict(&request(90.0), AS_OF).unwrap();
        assert!(result.clamped);
        assert!(result.predicted_resale_price.abs() < f64::EPSILON);
        assert!(result.predicted_bto_price.abs() < f64::EPSILON);
        assert_eq!(result.affordability, AffordabilityBand::Lower);
    }

    #[test]
    fn test_non_finite_output_is_unavailable() {
        let svc = service(f64::MAX, f64::MAX);
        assert!(matches!(
            svc.predict(&request(300.0), AS_OF),
            Err(Error::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_missing_model_is_unavailable() {
        let svc = PredictionService::new(Arc::new(ModelHandle::new()), PricingPolicy::default());
        assert!(matches!(
            svc.predict(&request(90.0), AS_OF),
            Err(Error::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_encoding_errors_propagate() {
        let mut req = request(90.0);
        req.storey = 0;
        assert!(matches!(
            service(0.0, 1.0).predict(&req, AS_OF),
            Err(Error::OutOfRange { .. })
        ));
    }

    #[test_case(300_000.0, AffordabilityBand::Lower; "lower boundary")]
    #[test_case(300_000.01, AffordabilityBand::Middle; "just above lower")]
    #[test_case(600_000.0, AffordabilityBand::Middle; "middle boundary")]
    #[test_case(600_000.01, AffordabilityBand::High; "just above middle")]
    fn test_classify_boundaries(price: f64, expected: AffordabilityBand) {
        assert_eq!(PricingPolicy::default().classify(price), expected);
    }

    #[test]
    fn test_policy_validation() {
        assert!(PricingPolicy::default().validate().is_ok());
        let bad_discount = PricingPolicy {
            discount_factor: 1.0,
            ..PricingPolicy::default()
        };
        assert!(bad_discount.validate().is_err());
        let inverted = PricingPolicy {
            lower_max: 700_000.0,
            ..PricingPolicy::default()
        };
        assert!(inverted.validate().is_err());
    }
}
