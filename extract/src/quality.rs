//! Data-quality checks on structurally valid documents.
//!
//! Nothing here blocks an extraction: the source document may itself be
//! anomalous, and the pipeline reports what it read. Findings travel with the
//! successful result as warnings.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::document::{Condition, FieldDocument, ProductSummary, ProductTotals, Timestamp};
use crate::validation::child_path;

/// Barrels of disagreement tolerated between a printed total and the tank rows.
const VOLUME_TOLERANCE_BBLS: f64 = 0.5;

/// Range outside of which a water specific gravity is unusual.
const SPECIFIC_GRAVITY_RANGE: (f64, f64) = (0.98, 1.05);

/// A data-quality finding on an otherwise valid document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityWarning {
    /// JSON pointer of the field the finding is about.
    pub path: String,
    /// Human-readable explanation.
    pub message: String,
}

impl QualityWarning {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Runs every data-quality check and returns the findings in document order.
#[must_use]
pub fn inspect(document: &FieldDocument) -> Vec<QualityWarning> {
    let mut warnings = Vec::new();
    inspect_condition("/arrival", &document.arrival, &mut warnings);
    inspect_condition("/departure", &document.departure, &mut warnings);
    inspect_movements(document, &mut warnings);
    warnings
}

fn inspect_condition(at: &str, condition: &Condition, warnings: &mut Vec<QualityWarning>) {
    if let Some(gravity) = condition.water_specific_gravity {
        let (low, high) = SPECIFIC_GRAVITY_RANGE;
        if !(low..=high).contains(&gravity) {
            warnings.push(QualityWarning::new(
                format!("{at}/water_specific_gravity"),
                format!("water specific gravity {gravity} is outside the usual {low}..{high} range"),
            ));
        }
    }

    if let Some(timestamps) = &condition.timestamps {
        let mut previous: Option<(&str, Timestamp)> = None;
        for (name, value) in timestamps.events() {
            let Some(value) = value else { continue };
            if let Some((earlier, at_time)) = previous {
                if value < at_time {
                    warnings.push(QualityWarning::new(
                        format!("{at}/timestamps/{name}"),
                        format!("{name} ({value}) is earlier than {earlier} ({at_time})"),
                    ));
                }
            }
            previous = Some((name, value));
        }
    }

    let mut seen = HashSet::new();
    for (index, tank) in condition.tanks.iter().enumerate() {
        let row = format!("{at}/tanks/{index}");
        if !seen.insert(tank.tank_id.as_str()) {
            warnings.push(QualityWarning::new(
                format!("{row}/tank_id"),
                format!("tank '{}' appears more than once", tank.tank_id),
            ));
        }
        for (field, value) in [
            ("gross_bbls", Some(tank.gross_bbls)),
            ("water_bbls", Some(tank.water_bbls)),
            ("net_bbls", tank.net_bbls),
            ("metric_tons", tank.metric_tons),
            ("ullage_ft", Some(tank.ullage_ft)),
        ] {
            if let Some(value) = value.filter(|v| *v < 0.0) {
                warnings.push(QualityWarning::new(
                    format!("{row}/{field}"),
                    format!("{field} is negative ({value})"),
                ));
            }
        }
        if !(0.0..12.0).contains(&tank.ullage_in) {
            warnings.push(QualityWarning::new(
                format!("{row}/ullage_in"),
                format!("ullage inches {} is outside 0..12", tank.ullage_in),
            ));
        }
        if tank.water_bbls > tank.gross_bbls && tank.gross_bbls >= 0.0 {
            warnings.push(QualityWarning::new(
                format!("{row}/water_bbls"),
                format!(
                    "free water {} exceeds gross volume {}",
                    tank.water_bbls, tank.gross_bbls
                ),
            ));
        }
        if tank.net_bbls.is_some_and(|net| net > 0.0) && tank.gross_bbls - tank.water_bbls < 0.0 {
            warnings.push(QualityWarning::new(
                format!("{row}/net_bbls"),
                "net volume is positive while gross minus water is negative",
            ));
        }
    }

    if let Some(printed) = &condition.summary_by_product {
        let from_tanks = condition.tank_totals();
        compare_gross(
            &format!("{at}/summary_by_product"),
            printed,
            &from_tanks,
            "the sum of its tank rows",
            warnings,
        );
    }
}

fn inspect_movements(document: &FieldDocument, warnings: &mut Vec<QualityWarning>) {
    let (Some(moved), Some(arrival), Some(departure)) = (
        &document.products_loaded_discharged,
        &document.arrival.summary_by_product,
        &document.departure.summary_by_product,
    ) else {
        return;
    };

    let mut expected = ProductSummary::new();
    for product in arrival.keys().chain(departure.keys()) {
        let gross = |summary: &ProductSummary| summary.get(product).map_or(0.0, |t| t.gross_bbls);
        expected.insert(
            product.clone(),
            ProductTotals {
                gross_bbls: gross(arrival) - gross(departure),
                net_bbls: None,
                metric_tons: None,
            },
        );
    }
    compare_gross(
        "/products_loaded_discharged",
        moved,
        &expected,
        "arrival minus departure",
        warnings,
    );
}

fn compare_gross(
    at: &str,
    printed: &ProductSummary,
    expected: &ProductSummary,
    basis: &str,
    warnings: &mut Vec<QualityWarning>,
) {
    for (product, totals) in printed {
        let Some(reference) = expected.get(product) else {
            warnings.push(QualityWarning::new(
                child_path(at, product),
                format!("product '{product}' has a total but no matching entry in {basis}"),
            ));
            continue;
        };
        let printed_gross = totals.gross_bbls;
        let expected_gross = reference.gross_bbls;
        if (printed_gross - expected_gross).abs() > VOLUME_TOLERANCE_BBLS {
            warnings.push(QualityWarning::new(
                format!("{}/gross_bbls", child_path(at, product)),
                format!(
                    "gross {printed_gross} for '{product}' differs from {basis} ({expected_gross})"
                ),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BargeInfo, PortInfo, TankReading, Timestamp, Timestamps};

    fn tank(id: &str, gross: f64) -> TankReading {
        TankReading {
            tank_id: id.to_string(),
            product: "MGO".to_string(),
            api: 32.1,
            ullage_ft: 4.0,
            ullage_in: 2.0,
            temperature_f: 70.0,
            water_bbls: 0.0,
            gross_bbls: gross,
            net_bbls: None,
            metric_tons: None,
        }
    }

    fn condition(tanks: Vec<TankReading>) -> Condition {
        Condition {
            water_specific_gravity: None,
            drafts_ft: None,
            timestamps: None,
            tanks,
            summary_by_product: None,
        }
    }

    fn document(arrival: Condition, departure: Condition) -> FieldDocument {
        FieldDocument {
            barge: BargeInfo {
                name: "BARGE A".to_string(),
                voyage_number: None,
                otb_job_number: None,
            },
            port: PortInfo {
                vessel_name: "MV ONE".to_string(),
                port_city: None,
            },
            arrival,
            departure,
            products_loaded_discharged: None,
        }
    }

    fn gross(value: f64) -> ProductTotals {
        ProductTotals {
            gross_bbls: value,
            net_bbls: None,
            metric_tons: None,
        }
    }

    #[test]
    fn test_clean_document_has_no_warnings() {
        let doc = document(condition(vec![tank("1P", 1000.0)]), condition(vec![]));
        assert!(inspect(&doc).is_empty());
    }

    #[test]
    fn test_negative_gross_and_duplicate_tank() {
        let doc = document(
            condition(vec![tank("1P", 1000.0), tank("1P", -3.0)]),
            condition(vec![]),
        );
        let warnings = inspect(&doc);
        let paths: Vec<&str> = warnings.iter().map(|w| w.path.as_str()).collect();
        assert_eq!(paths, vec!["/arrival/tanks/1/tank_id", "/arrival/tanks/1/gross_bbls"]);
    }

    #[test]
    fn test_summary_disagreeing_with_tanks() {
        let mut arrival = condition(vec![tank("1P", 1000.0), tank("2P", 500.0)]);
        arrival.summary_by_product = Some(ProductSummary::from([("MGO".to_string(), gross(1400.0))]));

        let warnings = inspect(&document(arrival, condition(vec![])));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].path, "/arrival/summary_by_product/MGO/gross_bbls");
    }

    #[test]
    fn test_product_names_are_escaped_in_paths() {
        let mut arrival = condition(vec![tank("1P", 1000.0)]);
        arrival.summary_by_product = Some(ProductSummary::from([
            ("MGO".to_string(), gross(1000.0)),
            ("ULSD/B5".to_string(), gross(300.0)),
        ]));

        let warnings = inspect(&document(arrival, condition(vec![])));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].path, "/arrival/summary_by_product/ULSD~1B5");
    }

    #[test]
    fn test_movement_totals_checked_against_snapshots() {
        let mut arrival = condition(vec![tank("1P", 1000.0)]);
        arrival.summary_by_product = Some(ProductSummary::from([("MGO".to_string(), gross(1000.0))]));
        let mut departure = condition(vec![tank("1P", 200.0)]);
        departure.summary_by_product = Some(ProductSummary::from([("MGO".to_string(), gross(200.0))]));

        let mut doc = document(arrival, departure);
        doc.products_loaded_discharged = Some(ProductSummary::from([("MGO".to_string(), gross(800.0))]));
        assert!(inspect(&doc).is_empty());

        doc.products_loaded_discharged = Some(ProductSummary::from([("MGO".to_string(), gross(1200.0))]));
        let warnings = inspect(&doc);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].path, "/products_loaded_discharged/MGO/gross_bbls");
    }

    #[test]
    fn test_out_of_order_events() {
        let mut arrival = condition(vec![tank("1P", 1000.0)]);
        arrival.timestamps = Some(Timestamps {
            hose_on: Timestamp::parse("2024-03-05T10:00:00"),
            hose_off: Timestamp::parse("2024-03-05T09:00:00"),
            ..Timestamps::default()
        });

        let warnings = inspect(&document(arrival, condition(vec![])));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].path, "/arrival/timestamps/hose_off");
    }

    #[test]
    fn test_unusual_gravity_and_inches() {
        let mut bad = tank("1P", 1000.0);
        bad.ullage_in = 14.0;
        let mut arrival = condition(vec![bad]);
        arrival.water_specific_gravity = Some(1.25);

        let warnings = inspect(&document(arrival, condition(vec![])));
        let paths: Vec<&str> = warnings.iter().map(|w| w.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["/arrival/water_specific_gravity", "/arrival/tanks/0/ullage_in"]
        );
    }
}
