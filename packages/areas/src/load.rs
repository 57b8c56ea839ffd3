//! Loads areal units from a `GeoJSON` `FeatureCollection`.
//!
//! Uses the [`DatasetSchema`] to locate each feature's identifier and
//! required numeric properties. Any other numeric property is kept as an
//! extra attribute so it can be explored without a schema change.

use std::collections::BTreeMap;
use std::path::Path;

use crime_stats_area_models::DatasetSchema;
use geo::MultiPolygon;
use geojson::{Feature, GeoJson};

use crate::{AreaCollection, AreaError, AreaUnit};

/// Reads and parses a `GeoJSON` file.
///
/// # Errors
///
/// Returns [`AreaError`] if the file cannot be read or any feature fails
/// to convert or validate.
pub fn load_file(path: &Path, schema: &DatasetSchema) -> Result<AreaCollection, AreaError> {
    log::info!("Loading areal units from {}", path.display());
    let contents = std::fs::read_to_string(path)?;
    parse_feature_collection(&contents, schema)
}

/// Parses a `GeoJSON` `FeatureCollection` string into validated units.
///
/// # Errors
///
/// Returns [`AreaError`] if the document is not a feature collection, a
/// feature has a missing or non-polygonal geometry, an identifier is
/// missing or repeated, or a schema field is absent.
pub fn parse_feature_collection(
    geojson_str: &str,
    schema: &DatasetSchema,
) -> Result<AreaCollection, AreaError> {
    let geojson: GeoJson = geojson_str.parse()?;
    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(AreaError::Conversion {
            message: "expected a GeoJSON FeatureCollection".to_string(),
        });
    };

    let units = collection
        .features
        .iter()
        .enumerate()
        .map(|(index, feature)| feature_to_unit(index, feature, schema))
        .collect::<Result<Vec<_>, _>>()?;

    let areas = AreaCollection::new(units)?;
    log::info!("Loaded {} areal units", areas.len());

    Ok(areas)
}

/// Converts a single feature.
fn feature_to_unit(
    index: usize,
    feature: &Feature,
    schema: &DatasetSchema,
) -> Result<AreaUnit, AreaError> {
    let id = feature_id(feature, &schema.id_field).ok_or_else(|| AreaError::Conversion {
        message: format!(
            "feature {index} has no '{}' property or feature id",
            schema.id_field
        ),
    })?;

    let geometry = feature
        .geometry
        .clone()
        .and_then(geometry_to_multipolygon)
        .ok_or_else(|| AreaError::InvalidGeometry {
            id: id.clone(),
            message: "geometry is missing or not a Polygon/MultiPolygon".to_string(),
        })?;

    let mut attributes = BTreeMap::new();
    if let Some(props) = &feature.properties {
        for (key, value) in props {
            if let Some(number) = numeric_value(value) {
                attributes.insert(key.clone(), number);
            }
        }
    }

    for field in schema.numeric_fields() {
        if !attributes.contains_key(field) {
            return Err(AreaError::MissingAttribute {
                id,
                field: field.to_string(),
            });
        }
    }

    Ok(AreaUnit {
        id,
        geometry,
        attributes,
    })
}

/// Reads the identifier from the named property, falling back to the
/// feature-level `id` member.
fn feature_id(feature: &Feature, id_field: &str) -> Option<String> {
    let from_props = feature
        .properties
        .as_ref()
        .and_then(|props| props.get(id_field))
        .and_then(|value| match value {
            serde_json::Value::String(s) => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty());

    from_props.or_else(|| match &feature.id {
        Some(geojson::feature::Id::String(s)) => Some(s.clone()),
        Some(geojson::feature::Id::Number(n)) => Some(n.to_string()),
        None => None,
    })
}

/// Numeric property value. Numeric strings are accepted since exported
/// attribute tables often stringify columns.
fn numeric_value(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn geometry_to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> DatasetSchema {
        DatasetSchema {
            id_field: "code".to_string(),
            outcome: "burglary_rate".to_string(),
            count_field: None,
            covariates: vec!["imd".to_string()],
        }
    }

    fn square_feature(code: &str, x: f64, rate: &str) -> String {
        format!(
            r#"{{
                "type": "Feature",
                "properties": {{
                    "code": "{code}", "burglary_rate": {rate}, "imd": "12.5", "label": "x"
                }},
                "geometry": {{
                    "type": "Polygon",
                    "coordinates": [[[{x}, 0.0], [{x1}, 0.0], [{x1}, 1.0], [{x}, 1.0], [{x}, 0.0]]]
                }}
            }}"#,
            x1 = x + 1.0
        )
    }

    fn collection(features: &[String]) -> String {
        format!(
            r#"{{ "type": "FeatureCollection", "features": [{}] }}"#,
            features.join(",")
        )
    }

    #[test]
    fn parses_polygons_and_numeric_properties() {
        let doc = collection(&[square_feature("E01", 0.0, "3.5"), square_feature("E02", 1.0, "4")]);
        let areas = parse_feature_collection(&doc, &schema()).unwrap();

        assert_eq!(areas.len(), 2);
        assert_eq!(areas.column("burglary_rate").unwrap(), vec![3.5, 4.0]);
        assert_eq!(areas.column("imd").unwrap(), vec![12.5, 12.5]);
        assert!(!areas.units()[0].attributes.contains_key("label"));
    }

    #[test]
    fn missing_schema_field_fails() {
        let doc = collection(&[square_feature("E01", 0.0, "null")]);
        let err = parse_feature_collection(&doc, &schema()).unwrap_err();
        assert!(matches!(
            err,
            AreaError::MissingAttribute { field, .. } if field == "burglary_rate"
        ));
    }

    #[test]
    fn point_geometry_is_rejected() {
        let doc = collection(&[r#"{
            "type": "Feature",
            "properties": { "code": "P1", "burglary_rate": 1, "imd": 2 },
            "geometry": { "type": "Point", "coordinates": [0.0, 0.0] }
        }"#
        .to_string()]);
        let err = parse_feature_collection(&doc, &schema()).unwrap_err();
        assert!(matches!(err, AreaError::InvalidGeometry { id, .. } if id == "P1"));
    }

    #[test]
    fn bare_geometry_is_not_a_collection() {
        let doc = r#"{ "type": "Point", "coordinates": [0.0, 0.0] }"#;
        assert!(matches!(
            parse_feature_collection(doc, &schema()),
            Err(AreaError::Conversion { .. })
        ));
    }
}
