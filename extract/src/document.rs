//! Typed model of a barge cargo field document.
//!
//! The derived JSON schema of [`FieldDocument`] is the canonical output
//! constraint sent to the vision model (see [`crate::schema`]). Every struct
//! denies unknown fields so that typed decoding agrees with the closed-world
//! schema.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use schemars::{JsonSchema, Schema, SchemaGenerator, json_schema};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// Aggregate totals keyed by product name.
pub type ProductSummary = BTreeMap<String, ProductTotals>;

/// The full structured record extracted from one document image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FieldDocument {
    /// Identity of the barge the document was written for.
    pub barge: BargeInfo,
    /// Port call the readings belong to.
    pub port: PortInfo,
    /// Readings taken when the barge arrived.
    pub arrival: Condition,
    /// Readings taken when the barge departed.
    pub departure: Condition,
    /// Quantities loaded or discharged per product (arrival minus departure).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products_loaded_discharged: Option<ProductSummary>,
}

/// Barge identity block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct BargeInfo {
    /// Barge name as printed.
    pub name: String,
    /// Voyage number, when shown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voyage_number: Option<String>,
    /// Job number, when shown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otb_job_number: Option<String>,
}

/// Port identity block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PortInfo {
    /// Name of the vessel the barge worked alongside.
    pub vessel_name: String,
    /// Port city, when shown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_city: Option<String>,
}

/// One snapshot of the barge (arrival or departure condition).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Condition {
    /// Specific gravity of the water the barge floats in (1.000 fresh, 1.025 salt).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_specific_gravity: Option<f64>,
    /// Four-point draft reading in feet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drafts_ft: Option<Drafts>,
    /// Operational event times recorded for this snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Timestamps>,
    /// Every tank row in document order.
    pub tanks: Vec<TankReading>,
    /// Totals per product for this snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_by_product: Option<ProductSummary>,
}

impl Condition {
    /// Totals the tank rows of this snapshot per product.
    ///
    /// Net volume and mass are only totalled when every row of the product
    /// carries them; otherwise the total is left absent.
    #[must_use]
    pub fn tank_totals(&self) -> ProductSummary {
        let mut totals: ProductSummary = BTreeMap::new();
        for tank in &self.tanks {
            let entry = totals
                .entry(tank.product.clone())
                .or_insert_with(|| ProductTotals {
                    gross_bbls: 0.0,
                    net_bbls: Some(0.0),
                    metric_tons: Some(0.0),
                });
            entry.gross_bbls += tank.gross_bbls;
            entry.net_bbls = entry.net_bbls.zip(tank.net_bbls).map(|(a, b)| a + b);
            entry.metric_tons = entry.metric_tons.zip(tank.metric_tons).map(|(a, b)| a + b);
        }
        totals
    }
}

/// Draft marks read at the four corners of the barge, in feet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Drafts {
    /// Forward, port side.
    pub fwd_port: f64,
    /// Forward, starboard side.
    pub fwd_stbd: f64,
    /// Aft, port side.
    pub aft_port: f64,
    /// Aft, starboard side.
    pub aft_stbd: f64,
}

impl Drafts {
    /// Mean of the four draft marks.
    #[must_use]
    pub fn mean(&self) -> f64 {
        (self.fwd_port + self.fwd_stbd + self.aft_port + self.aft_stbd) / 4.0
    }
}

/// Named operational events of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Timestamps {
    /// Barge arrived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival: Option<Timestamp>,
    /// All lines fast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_fast: Option<Timestamp>,
    /// Containment boom deployed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boom_on: Option<Timestamp>,
    /// Cargo hose connected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hose_on: Option<Timestamp>,
    /// Commenced loading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comm_ld: Option<Timestamp>,
    /// Completed loading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comp_ld: Option<Timestamp>,
    /// Cargo hose disconnected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hose_off: Option<Timestamp>,
    /// Containment boom recovered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boom_off: Option<Timestamp>,
    /// Barge departed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depart: Option<Timestamp>,
}

impl Timestamps {
    /// Event names in the order they normally happen.
    pub const FIELDS: [&'static str; 9] = [
        "arrival", "all_fast", "boom_on", "hose_on", "comm_ld", "comp_ld", "hose_off", "boom_off",
        "depart",
    ];

    /// Events in [`Self::FIELDS`] order, paired with their names.
    #[must_use]
    pub fn events(&self) -> [(&'static str, Option<Timestamp>); 9] {
        [
            ("arrival", self.arrival),
            ("all_fast", self.all_fast),
            ("boom_on", self.boom_on),
            ("hose_on", self.hose_on),
            ("comm_ld", self.comm_ld),
            ("comp_ld", self.comp_ld),
            ("hose_off", self.hose_off),
            ("boom_off", self.boom_off),
            ("depart", self.depart),
        ]
    }
}

/// One row of a tank table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TankReading {
    /// Tank identifier exactly as printed, e.g. "1P".
    pub tank_id: String,
    /// Product carried in the tank.
    pub product: String,
    /// API gravity.
    pub api: f64,
    /// Ullage, whole feet.
    pub ullage_ft: f64,
    /// Ullage, inches.
    pub ullage_in: f64,
    /// Cargo temperature in degrees Fahrenheit.
    pub temperature_f: f64,
    /// Free water in barrels.
    #[serde(default)]
    pub water_bbls: f64,
    /// Gross observed volume in barrels.
    pub gross_bbls: f64,
    /// Net standard volume in barrels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_bbls: Option<f64>,
    /// Mass in metric tons.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_tons: Option<f64>,
}

/// Aggregate volume and mass of one product.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ProductTotals {
    /// Gross volume in barrels.
    pub gross_bbls: f64,
    /// Net volume in barrels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_bbls: Option<f64>,
    /// Mass in metric tons.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_tons: Option<f64>,
}

/// An absolute point in time read off the document.
///
/// Accepts ISO-8601 date-times with or without seconds, with an extended,
/// basic or `Z` offset, or with no offset at all (taken as UTC). A bare date
/// is midnight UTC. Always serializes as RFC 3339.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<FixedOffset>);

impl Timestamp {
    const OFFSET_FORMATS: [&'static str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f%#z",
        "%Y-%m-%d %H:%M:%S%.f%#z",
        "%Y-%m-%dT%H:%M%#z",
        "%Y-%m-%d %H:%M%#z",
    ];

    const NAIVE_FORMATS: [&'static str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];

    /// Parses an ISO-8601 date-time, returning `None` when it is malformed.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(Self(parsed));
        }

        let zulu = raw
            .strip_suffix('Z')
            .or_else(|| raw.strip_suffix('z'))
            .map(|local| format!("{local}+00:00"));
        let with_offset = zulu.as_deref().unwrap_or(raw);
        if let Some(parsed) = Self::OFFSET_FORMATS
            .iter()
            .find_map(|format| DateTime::parse_from_str(with_offset, format).ok())
        {
            return Some(Self(parsed));
        }

        Self::NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            })
            .map(|naive| Self(naive.and_utc().fixed_offset()))
    }

    /// The instant with the offset it was written with.
    #[must_use]
    pub const fn as_datetime(&self) -> &DateTime<FixedOffset> {
        &self.0
    }

    /// The instant in UTC.
    #[must_use]
    pub fn to_utc(&self) -> DateTime<Utc> {
        self.0.with_timezone(&Utc)
    }
}

impl From<DateTime<FixedOffset>> for Timestamp {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Self(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, false))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| de::Error::custom(format!("'{raw}' is not an ISO-8601 date-time")))
    }
}

impl JsonSchema for Timestamp {
    fn schema_name() -> Cow<'static, str> {
        "Timestamp".into()
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        json_schema!({
            "type": "string",
            "format": "date-time",
            "description": "ISO-8601 date-time, e.g. 2024-03-05T14:30:00"
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tank(id: &str, product: &str, gross: f64, net: Option<f64>) -> TankReading {
        TankReading {
            tank_id: id.to_string(),
            product: product.to_string(),
            api: 32.1,
            ullage_ft: 4.0,
            ullage_in: 2.0,
            temperature_f: 70.0,
            water_bbls: 0.0,
            gross_bbls: gross,
            net_bbls: net,
            metric_tons: None,
        }
    }

    #[test]
    fn test_water_defaults_to_zero() {
        let reading: TankReading = serde_json::from_value(json!({
            "tank_id": "1P", "product": "MGO", "api": 32.1, "ullage_ft": 4.0,
            "ullage_in": 2.0, "temperature_f": 70.0, "gross_bbls": 1000.0
        }))
        .unwrap();
        assert!(reading.water_bbls.abs() < f64::EPSILON);
        assert_eq!(reading.net_bbls, None);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result: Result<PortInfo, _> =
            serde_json::from_value(json!({"vessel_name": "MV ONE", "berth": 4}));
        assert!(result.is_err());
    }

    #[test]
    fn test_timestamp_accepts_offset_and_naive_forms() {
        let with_offset = Timestamp::parse("2024-03-05T14:30:00-05:00").unwrap();
        let naive = Timestamp::parse("2024-03-05T19:30:00").unwrap();
        assert_eq!(with_offset.to_utc(), naive.to_utc());
        assert!(Timestamp::parse("2024-03-05 19:30").is_some());
        assert!(Timestamp::parse("yesterday at noon").is_none());
        assert!(Timestamp::parse("2024-13-40T99:00:00").is_none());
        assert!(Timestamp::parse("2024-03-05T14:30+").is_none());
    }

    #[test]
    fn test_timestamp_minute_precision_and_basic_offsets() {
        let expected = Timestamp::parse("2024-03-05T14:30:00Z").unwrap();
        assert_eq!(Timestamp::parse("2024-03-05T14:30Z"), Some(expected));
        assert_eq!(Timestamp::parse("2024-03-05T09:30-05:00"), Some(expected));
        assert_eq!(Timestamp::parse("2024-03-05T20:00:00+0530"), Some(expected));
        assert_eq!(Timestamp::parse("2024-03-05 14:30:00.000z"), Some(expected));

        let midnight = Timestamp::parse("2024-03-05").unwrap();
        assert_eq!(midnight.to_string(), "2024-03-05T00:00:00+00:00");
    }

    #[test]
    fn test_timestamp_serializes_as_rfc3339() {
        let ts = Timestamp::parse("2024-03-05T14:30:00").unwrap();
        assert_eq!(serde_json::to_value(ts).unwrap(), json!("2024-03-05T14:30:00+00:00"));
    }

    #[test]
    fn test_tank_totals_per_product() {
        let condition = Condition {
            water_specific_gravity: None,
            drafts_ft: None,
            timestamps: None,
            tanks: vec![
                tank("1P", "MGO", 1000.0, Some(990.0)),
                tank("1S", "MGO", 500.0, Some(495.0)),
                tank("2P", "ULSD", 250.0, None),
            ],
            summary_by_product: None,
        };
        let totals = condition.tank_totals();
        assert!((totals["MGO"].gross_bbls - 1500.0).abs() < 1e-9);
        assert_eq!(totals["MGO"].net_bbls, Some(1485.0));
        assert_eq!(totals["ULSD"].net_bbls, None);
    }

    #[test]
    fn test_drafts_mean() {
        let drafts = Drafts { fwd_port: 8.0, fwd_stbd: 8.5, aft_port: 9.0, aft_stbd: 9.5 };
        assert!((drafts.mean() - 8.75).abs() < 1e-9);
    }
}
