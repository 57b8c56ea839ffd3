//! Local Moran's I (LISA).
//!
//! `Iᵢ = (zᵢ / m₂) Σⱼ wᵢⱼ zⱼ` with `m₂ = Σz² / n`, and moments under
//! randomisation. Units without neighbours have no defined deviate and
//! are never classified into a cluster.

use std::collections::BTreeMap;

use crime_stats_analytics_models::{
    Alternative, ClusterQuadrant, LocalMoran, LocalMoranResult, QuadrantCount,
};
use crime_stats_spatial::SpatialWeights;

use crate::{AnalyticsError, centre, moran::normal_p_value};

const QUADRANTS: [ClusterQuadrant; 5] = [
    ClusterQuadrant::HighHigh,
    ClusterQuadrant::LowLow,
    ClusterQuadrant::HighLow,
    ClusterQuadrant::LowHigh,
    ClusterQuadrant::NotSignificant,
];

/// Computes local Moran's I for every unit and classifies significant
/// units by the sign of their value and of their spatial lag.
///
/// # Errors
///
/// * [`AnalyticsError::DimensionMismatch`] if `x` does not match the weights
/// * [`AnalyticsError::InsufficientData`] with fewer than three units
/// * [`AnalyticsError::DegenerateVariance`] if `x` is constant
#[allow(clippy::cast_precision_loss)]
pub fn local_moran(
    variable: &str,
    x: &[f64],
    weights: &SpatialWeights,
    significance: f64,
) -> Result<LocalMoranResult, AnalyticsError> {
    if x.len() != weights.len() {
        return Err(AnalyticsError::DimensionMismatch {
            expected: weights.len(),
            actual: x.len(),
        });
    }
    if x.len() < 3 {
        return Err(AnalyticsError::InsufficientData {
            required: 3,
            actual: x.len(),
        });
    }

    let (z, zz) = centre(variable, x)?;
    let n = x.len() as f64;
    let m2 = zz / n;
    let b2 = z.iter().map(|v| v.powi(4)).sum::<f64>() / n / (m2 * m2);
    let lag = weights.lag(&z)?;

    let units: Vec<LocalMoran> = weights
        .ids()
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let statistic = z[i] / m2 * lag[i];
            let wi = weights.row_sum(i);
            let wi2 = weights.row_sum_of_squares(i);
            let expectation = -wi / (n - 1.0);
            let variance = wi2 * (n - b2) / (n - 1.0)
                + (wi * wi - wi2) * (2.0 * b2 - n) / ((n - 1.0) * (n - 2.0))
                - expectation * expectation;

            let (z_score, p_value) = if wi > 0.0 && variance > 0.0 {
                let z_score = (statistic - expectation) / variance.sqrt();
                (
                    Some(z_score),
                    Some(normal_p_value(z_score, Alternative::TwoSided)),
                )
            } else {
                (None, None)
            };

            LocalMoran {
                id: id.clone(),
                statistic,
                expectation,
                variance,
                z_score,
                p_value,
                quadrant: quadrant(z[i], lag[i], p_value, significance),
            }
        })
        .collect();

    let mut counts: BTreeMap<ClusterQuadrant, usize> = BTreeMap::new();
    for unit in &units {
        *counts.entry(unit.quadrant).or_default() += 1;
    }
    let quadrant_counts = QUADRANTS
        .iter()
        .map(|&quadrant| QuadrantCount {
            quadrant,
            count: counts.get(&quadrant).copied().unwrap_or(0),
        })
        .collect();

    log::info!(
        "Local Moran for {variable}: {} of {} units significant at {significance}",
        units
            .iter()
            .filter(|u| u.quadrant != ClusterQuadrant::NotSignificant)
            .count(),
        units.len()
    );

    Ok(LocalMoranResult {
        variable: variable.to_string(),
        significance,
        units,
        quadrant_counts,
    })
}

fn quadrant(value: f64, lag: f64, p_value: Option<f64>, significance: f64) -> ClusterQuadrant {
    match p_value {
        Some(p) if p < significance => match (value > 0.0, lag > 0.0) {
            (true, true) => ClusterQuadrant::HighHigh,
            (false, false) => ClusterQuadrant::LowLow,
            (true, false) => ClusterQuadrant::HighLow,
            (false, true) => ClusterQuadrant::LowHigh,
        },
        _ => ClusterQuadrant::NotSignificant,
    }
}
