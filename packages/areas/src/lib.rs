#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Areal unit loading and geometry validation.
//!
//! Reads a pre-cleaned `GeoJSON` `FeatureCollection` (one feature per areal
//! unit, e.g. a census output area) into [`AreaCollection`], rejecting
//! malformed polygons up front so that the contiguity builder only ever
//! sees valid boundaries.

pub mod load;
pub mod validate;

use std::collections::BTreeMap;

use geo::MultiPolygon;
use thiserror::Error;

/// Errors that can occur while loading areal units.
#[derive(Debug, Error)]
pub enum AreaError {
    /// Reading the input file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// `GeoJSON` parsing failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// A unit's polygon is empty, degenerate, or self-intersecting.
    #[error("Invalid geometry for unit {id}: {message}")]
    InvalidGeometry {
        /// Identifier of the offending unit.
        id: String,
        /// Description of the defect.
        message: String,
    },

    /// A required numeric property is absent or not numeric.
    #[error("Unit {id} is missing numeric attribute '{field}'")]
    MissingAttribute {
        /// Identifier of the offending unit.
        id: String,
        /// Name of the missing property.
        field: String,
    },

    /// Two features share an identifier.
    #[error("Duplicate unit identifier: {id}")]
    DuplicateId {
        /// The repeated identifier.
        id: String,
    },

    /// A column was requested that no unit carries.
    #[error("Unknown attribute column: {name}")]
    UnknownColumn {
        /// Requested column name.
        name: String,
    },

    /// Data conversion error.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// One areal unit: identifier, boundary, and numeric attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaUnit {
    /// Unique identifier (e.g. an LSOA code).
    pub id: String,
    /// Unit boundary. Single polygons are wrapped as one-member multipolygons.
    pub geometry: MultiPolygon<f64>,
    /// Numeric properties keyed by field name.
    pub attributes: BTreeMap<String, f64>,
}

/// An ordered set of areal units with unique identifiers.
///
/// Order is the input order and defines the row order of every vector and
/// weights structure derived from the collection.
#[derive(Debug, Clone, Default)]
pub struct AreaCollection {
    units: Vec<AreaUnit>,
}

impl AreaCollection {
    /// Builds a collection, validating every geometry and rejecting
    /// duplicate identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`AreaError::DuplicateId`] or [`AreaError::InvalidGeometry`].
    pub fn new(units: Vec<AreaUnit>) -> Result<Self, AreaError> {
        let mut seen = std::collections::BTreeSet::new();
        for unit in &units {
            if !seen.insert(unit.id.as_str()) {
                return Err(AreaError::DuplicateId {
                    id: unit.id.clone(),
                });
            }
            validate::validate_geometry(&unit.id, &unit.geometry)?;
        }

        Ok(Self { units })
    }

    /// Number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the collection holds no units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Units in input order.
    #[must_use]
    pub fn units(&self) -> &[AreaUnit] {
        &self.units
    }

    /// Unit identifiers in input order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.units.iter().map(|u| u.id.clone()).collect()
    }

    /// Unit geometries in input order.
    #[must_use]
    pub fn geometries(&self) -> Vec<&MultiPolygon<f64>> {
        self.units.iter().map(|u| &u.geometry).collect()
    }

    /// Extracts one numeric attribute for every unit, in input order.
    ///
    /// # Errors
    ///
    /// Returns [`AreaError::UnknownColumn`] if no unit carries the field, or
    /// [`AreaError::MissingAttribute`] if only some do.
    pub fn column(&self, name: &str) -> Result<Vec<f64>, AreaError> {
        if !self.units.iter().any(|u| u.attributes.contains_key(name)) {
            return Err(AreaError::UnknownColumn {
                name: name.to_string(),
            });
        }

        self.units
            .iter()
            .map(|u| {
                u.attributes
                    .get(name)
                    .copied()
                    .ok_or_else(|| AreaError::MissingAttribute {
                        id: u.id.clone(),
                        field: name.to_string(),
                    })
            })
            .collect()
    }
}
