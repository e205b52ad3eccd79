//! Request validation and feature encoding.

use crate::inference::{FeatureSchema, FeatureSlot, ModelArtifact};
use crate::models::{FlatType, PredictionRequest, Town, YearMonth};
use crate::{Error, Result};

/// Largest accepted floor area, in square metres.
pub const MAX_FLOOR_AREA_SQM: f64 = 300.0;
/// Highest accepted storey.
pub const MAX_STOREY: u32 = 50;
/// Earliest accepted lease commencement year.
pub const MIN_LEASE_COMMENCE_YEAR: i32 = 1960;
/// HDB lease tenure in years.
pub const LEASE_TENURE_YEARS: i32 = 99;

/// A request whose fields passed validation against one schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatedRequest {
    /// Parsed town.
    pub town: Town,
    /// Parsed flat type.
    pub flat_type: FlatType,
    /// Floor area, in `(0, 300]`.
    pub floor_area_sqm: f64,
    /// Storey, in `1..=50`.
    pub storey: u32,
    /// Lease commencement, in `1960..=as_of.year`.
    pub lease_commence_year: i32,
}

/// Encoded model input, ordered per the artifact schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(pub Vec<f64>);

impl FeatureVector {
    /// Feature values.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Validates a request against `schema`.
///
/// Checks run in a fixed order: town, flat type, floor area, storey, lease
/// year. The first failure is returned and names its field.
///
/// # Errors
///
/// - [`Error::UnknownCategory`] for a town or flat type outside the schema
/// - [`Error::OutOfRange`] for floor area, storey or a pre-1960 lease
/// - [`Error::InvalidInput`] for a lease year after `as_of`
pub fn validate_request(
    schema: &FeatureSchema,
    request: &PredictionRequest,
    as_of: YearMonth,
) -> Result<ValidatedRequest> {
    let town = Town::parse(&request.town)
        .filter(|town| schema.knows_town(*town))
        .ok_or_else(|| Error::UnknownCategory {
            field: "town".to_string(),
            value: request.town.clone(),
        })?;

    let flat_type = FlatType::parse(&request.flat_type)
        .filter(|flat_type| schema.knows_flat_type(*flat_type))
        .ok_or_else(|| Error::UnknownCategory {
            field: "flat_type".to_string(),
            value: request.flat_type.clone(),
        })?;

    let area = request.floor_area_sqm;
    if !(area.is_finite() && area > 0.0 && area <= MAX_FLOOR_AREA_SQM) {
        return Err(Error::OutOfRange {
            field: "floor_area_sqm".to_string(),
            value: area,
            min: 0.0,
            max: MAX_FLOOR_AREA_SQM,
        });
    }

    if !(1..=MAX_STOREY).contains(&request.storey) {
        return Err(Error::OutOfRange {
            field: "storey".to_string(),
            value: f64::from(request.storey),
            min: 1.0,
            max: f64::from(MAX_STOREY),
        });
    }

    let lease = request.lease_commence_year;
    if lease > as_of.year {
        return Err(Error::invalid_input(
            "lease_commence_year",
            format!("{lease} is after the reference year {}", as_of.year),
        ));
    }
    if lease < MIN_LEASE_COMMENCE_YEAR {
        return Err(Error::OutOfRange {
            field: "lease_commence_year".to_string(),
            value: f64::from(lease),
            min: f64::from(MIN_LEASE_COMMENCE_YEAR),
            max: f64::from(as_of.year),
        });
    }

    Ok(ValidatedRequest {
        town,
        flat_type,
        floor_area_sqm: area,
        storey: request.storey,
        lease_commence_year: lease,
    })
}

/// Validates `request` and encodes it for `artifact`.
///
/// # Errors
///
/// See [`validate_request`].
pub fn encode(
    artifact: &ModelArtifact,
    request: &PredictionRequest,
    as_of: YearMonth,
) -> Result<FeatureVector> {
    let validated = validate_request(artifact.schema(), request, as_of)?;
    Ok(encode_validated(artifact.slots(), &validated, as_of))
}

/// Encodes an already validated request.
#[must_use]
pub fn encode_validated(
    slots: &[FeatureSlot],
    request: &ValidatedRequest,
    as_of: YearMonth,
) -> FeatureVector {
    let flat_age = as_of.year - request.lease_commence_year;
    let remaining = (LEASE_TENURE_YEARS - flat_age).max(0);
    let storey = f64::from(request.storey);
    let one_hot = |hit: bool| if hit { 1.0 } else { 0.0 };

    let values = slots
        .iter()
        .map(|slot| match slot {
            FeatureSlot::FloorArea => request.floor_area_sqm,
            // The published storey band is collapsed to the single storey.
            FeatureSlot::Storey | FeatureSlot::StoreyLow | FeatureSlot::StoreyHigh => storey,
            FeatureSlot::LeaseCommenceYear => f64::from(request.lease_commence_year),
            FeatureSlot::FlatAge => f64::from(flat_age),
            FeatureSlot::RemainingLease => f64::from(remaining),
            FeatureSlot::TxYear => f64::from(as_of.year),
            FeatureSlot::TxMonth => f64::from(as_of.month),
            FeatureSlot::Town(town) => one_hot(*town == request.town),
            FeatureSlot::FlatType(flat_type) => one_hot(*flat_type == request.flat_type),
        })
        .collect();
    FeatureVector(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{ArtifactDocument, RegressionModel};
    use std::collections::BTreeMap;
    use test_case::test_case;

    const AS_OF: YearMonth = YearMonth {
        year: 2025,
        month: 6,
    };

    fn artifact() -> ModelArtifact {
        let features = [
            "floor_area_sqm",
            "storey_low",
            "storey_high",
            "flat_age",
            "remaining_lease_years",
            "tx_year",
            "tx_month",
            "town_BEDOK",
            "town_WOODLANDS",
            "flat_type_4 ROOM",
        ];
        ModelArtifact::from_document(ArtifactDocument {
            version: "1.0.0".to_string(),
            schema: FeatureSchema {
                features: features.iter().map(ToString::to_string).collect(),
                towns: vec![Town::AngMoKio, Town::Bedok, Town::Woodlands],
                flat_types: vec![FlatType::ThreeRoom, FlatType::FourRoom],
            },
            model: RegressionModel::Linear {
                intercept: 0.0,
                coefficients: vec![0.0; features.len()],
            },
            metadata: BTreeMap::new(),
        })
        .unwrap()
    }

    fn request() -> PredictionRequest {
        PredictionRequest {
            town: "woodlands".to_string(),
            flat_type: "4 ROOM".to_string(),
            floor_area_sqm: 90.0,
            storey: 5,
            lease_commence_year: 2000,
        }
    }

    #[test]
    fn test_encode_follows_schema_order() {
        let vector = encode(&artifact(), &request(), AS_OF).unwrap();
        assert_eq!(
            vector.as_slice(),
            &[90.0, 5.0, 5.0, 25.0, 74.0, 2025.0, 6.0, 0.0, 1.0, 1.0]
        );
    }

    #[test_case(1; "ground")]
    #[test_case(37; "high floor")]
    fn test_storey_band_collapses_to_requested_storey(storey: u32) {
        let mut req = request();
        req.storey = storey;
        let vector = encode(&artifact(), &req, AS_OF).unwrap();
        let expected = f64::from(storey);
        assert_eq!(&vector.as_slice()[1..3], &[expected, expected]);
    }

    #[test]
    fn test_baseline_category_is_all_zero() {
        let mut req = request();
        req.town = "ANG MO KIO".to_string();
        req.flat_type = "3 ROOM".to_string();
        let vector = encode(&artifact(), &req, AS_OF).unwrap();
        assert_eq!(&vector.as_slice()[7..], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_remaining_lease_floors_at_zero() {
        let slots = [FeatureSlot::RemainingLease];
        let validated = ValidatedRequest {
            town: Town::Bedok,
            flat_type: FlatType::FourRoom,
            floor_area_sqm: 90.0,
            storey: 3,
            lease_commence_year: 1920,
        };
        let vector = encode_validated(&slots, &validated, AS_OF);
        assert_eq!(vector.as_slice(), &[0.0]);
    }

    #[test_case("ATLANTIS", "4 ROOM", "town"; "unknown town")]
    #[test_case("PUNGGOL", "4 ROOM", "town"; "town outside schema")]
    #[test_case("BEDOK", "PENTHOUSE", "flat_type"; "unknown flat type")]
    #[test_case("BEDOK", "EXECUTIVE", "flat_type"; "flat type outside schema")]
    fn test_unknown_category(town: &str, flat_type: &str, expected_field: &str) {
        let mut req = request();
        req.town = town.to_string();
        req.flat_type = flat_type.to_string();
        match encode(&artifact(), &req, AS_OF) {
            Err(Error::UnknownCategory { field, value }) => {
                assert_eq!(field, expected_field);
                assert!(value == town || value == flat_type);
            },
            other => panic!("expected UnknownCategory, got {other:?}"),
        }
    }

    #[test_case(0.0; "zero")]
    #[test_case(-5.0; "negative")]
    #[test_case(300.5; "too large")]
    #[test_case(f64::NAN; "nan")]
    fn test_floor_area_out_of_range(area: f64) {
        let mut req = request();
        req.floor_area_sqm = area;
        assert!(matches!(
            encode(&artifact(), &req, AS_OF),
            Err(Error::OutOfRange { ref field, .. }) if field == "floor_area_sqm"
        ));
    }

    #[test_case(0; "zero")]
    #[test_case(51; "above fifty")]
    fn test_storey_out_of_range(storey: u32) {
        let mut req = request();
        req.storey = storey;
        assert!(matches!(
            encode(&artifact(), &req, AS_OF),
            Err(Error::OutOfRange { ref field, .. }) if field == "storey"
        ));
    }

    #[test]
    fn test_lease_year_checks() {
        let mut req = request();
        req.lease_commence_year = 2026;
        assert!(matches!(
            encode(&artifact(), &req, AS_OF),
            Err(Error::InvalidInput { ref field, .. }) if field == "lease_commence_year"
        ));

        req.lease_commence_year = 1959;
        assert!(matches!(
            encode(&artifact(), &req, AS_OF),
            Err(Error::OutOfRange { ref field, .. }) if field == "lease_commence_year"
        ));

        req.lease_commence_year = 2025;
        assert!(encode(&artifact(), &req, AS_OF).is_ok());
    }

    #[test]
    fn test_validation_order_reports_town_first() {
        let req = PredictionRequest {
            town: "ATLANTIS".to_string(),
            flat_type: "PENTHOUSE".to_string(),
            floor_area_sqm: -1.0,
            storey: 99,
            lease_commence_year: 3000,
        };
        assert!(matches!(
            encode(&artifact(), &req, AS_OF),
            Err(Error::UnknownCategory { ref field, .. }) if field == "town"
        ));
    }
}
