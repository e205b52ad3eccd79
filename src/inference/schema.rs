//! Feature schema of a model artifact.

use crate::models::{FlatType, Town};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Prefix of town one-hot columns.
pub const TOWN_PREFIX: &str = "town_";
/// Prefix of flat-type one-hot columns.
pub const FLAT_TYPE_PREFIX: &str = "flat_type_";

/// Ordered feature list plus the categories the model was trained on.
///
/// A category listed in `towns`/`flat_types` without a matching one-hot column
/// is the baseline and encodes as all zeros.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    /// Feature names in model input order.
    pub features: Vec<String>,
    /// Towns known to the model.
    pub towns: Vec<Town>,
    /// Flat types known to the model.
    pub flat_types: Vec<FlatType>,
}

/// A resolved schema column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureSlot {
    /// `floor_area_sqm`
    FloorArea,
    /// `storey`
    Storey,
    /// `storey_low`: requests carry one storey, so both band columns
    /// encode that storey. Artifacts trained on the published range bounds
    /// see a band of width zero at prediction time.
    StoreyLow,
    /// `storey_high`: same value as [`Self::StoreyLow`].
    StoreyHigh,
    /// `lease_commence_year`
    LeaseCommenceYear,
    /// `flat_age`: reference year minus lease commencement.
    FlatAge,
    /// `remaining_lease_years`: 99 minus flat age, floored at 0.
    RemainingLease,
    /// `tx_year`
    TxYear,
    /// `tx_month`
    TxMonth,
    /// `town_<TOWN>`
    Town(Town),
    /// `flat_type_<FLAT TYPE>`
    FlatType(FlatType),
}

impl FeatureSlot {
    /// Resolves a column name, or `None` if it is not a supported feature.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let slot = match name {
            "floor_area_sqm" => Self::FloorArea,
            "storey" => Self::Storey,
            "storey_low" => Self::StoreyLow,
            "storey_high" => Self::StoreyHigh,
            "lease_commence_year" => Self::LeaseCommenceYear,
            "flat_age" => Self::FlatAge,
            "remaining_lease_years" => Self::RemainingLease,
            "tx_year" => Self::TxYear,
            "tx_month" => Self::TxMonth,
            other => {
                if let Some(town) = other.strip_prefix(TOWN_PREFIX) {
                    Self::Town(Town::parse(town)?)
                } else if let Some(flat_type) = other.strip_prefix(FLAT_TYPE_PREFIX) {
                    Self::FlatType(FlatType::parse(flat_type)?)
                } else {
                    return None;
                }
            },
        };
        Some(slot)
    }
}

impl FeatureSchema {
    /// Resolves every column to a [`FeatureSlot`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelUnavailable`] if the schema is empty, names an
    /// unsupported feature, repeats a column, or has a one-hot column for a
    /// category it does not list.
    pub fn resolve(&self) -> Result<Vec<FeatureSlot>> {
        if self.features.is_empty() {
            return Err(Error::ModelUnavailable(
                "feature schema is empty".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(self.features.len());
        let mut slots = Vec::with_capacity(self.features.len());
        for name in &self.features {
            if !seen.insert(name.as_str()) {
                return Err(Error::ModelUnavailable(format!(
                    "duplicate feature '{name}'"
                )));
            }
            let slot = FeatureSlot::parse(name).ok_or_else(|| {
                Error::ModelUnavailable(format!("unrecognised feature '{name}'"))
            })?;
            match slot {
                FeatureSlot::Town(town) if !self.towns.contains(&town) => {
                    return Err(Error::ModelUnavailable(format!(
                        "feature '{name}' is not in the town categories"
                    )));
                },
                FeatureSlot::FlatType(flat_type) if !self.flat_types.contains(&flat_type) => {
                    return Err(Error::ModelUnavailable(format!(
                        "feature '{name}' is not in the flat type categories"
                    )));
                },
                _ => {},
            }
            slots.push(slot);
        }
        Ok(slots)
    }

    /// Returns true if the model was trained with `town`.
    #[must_use]
    pub fn knows_town(&self, town: Town) -> bool {
        self.towns.contains(&town)
    }

    /// Returns true if the model was trained with `flat_type`.
    #[must_use]
    pub fn knows_flat_type(&self, flat_type: FlatType) -> bool {
        self.flat_types.contains(&flat_type)
    }
}
