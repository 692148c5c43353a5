// Copyright (c) 2026 Space Data Network
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

//! The fixed schema catalogue and per-schema index descriptors.
//!
//! Every published payload carries one of these tags. The index descriptor
//! names the projection fields pulled out at write time; payloads that do
//! not decode as JSON objects index as null unless a projection is required.

use chrono::NaiveDate;

use crate::core::value::{as_number, decode_object, lookup_path};

/// How a schema's payloads are projected into index columns.
#[derive(Clone, Copy, Debug)]
pub struct SchemaDef {
    /// Short ASCII tag.
    pub tag: &'static str,
    /// Human description.
    pub description: &'static str,
    /// Field whose first ten characters give the `YYYY-MM-DD` day cell.
    pub day_field: Option<&'static str>,
    /// Field projected into the numeric index cell.
    pub numeric_field: Option<&'static str>,
    /// Field projected into the entity index cell.
    pub entity_field: Option<&'static str>,
    /// Whether a write without a decodable day cell is rejected.
    pub day_required: bool,
}

/// The catalogue of space-data schemas this node accepts.
pub const CATALOGUE: &[SchemaDef] = &[
    SchemaDef {
        tag: "OMM",
        description: "Orbit mean-elements message",
        day_field: Some("EPOCH"),
        numeric_field: Some("NORAD_CAT_ID"),
        entity_field: Some("OBJECT_ID"),
        day_required: false,
    },
    SchemaDef {
        tag: "OEM",
        description: "Orbit ephemeris message",
        day_field: Some("START_TIME"),
        numeric_field: Some("NORAD_CAT_ID"),
        entity_field: Some("OBJECT_ID"),
        day_required: false,
    },
    SchemaDef {
        tag: "OPM",
        description: "Orbit parameter message",
        day_field: Some("EPOCH"),
        numeric_field: Some("NORAD_CAT_ID"),
        entity_field: Some("OBJECT_ID"),
        day_required: false,
    },
    SchemaDef {
        tag: "CDM",
        description: "Conjunction data message",
        day_field: Some("TCA"),
        numeric_field: Some("SAT1_CATALOG_NUMBER"),
        entity_field: Some("SAT1_OBJECT_DESIGNATOR"),
        day_required: false,
    },
    SchemaDef {
        tag: "CAT",
        description: "Catalogue entity record",
        day_field: None,
        numeric_field: Some("NORAD_CAT_ID"),
        entity_field: Some("OBJECT_ID"),
        day_required: false,
    },
    SchemaDef {
        tag: "EOP",
        description: "Earth orientation parameters",
        day_field: Some("DATE"),
        numeric_field: None,
        entity_field: None,
        day_required: true,
    },
    SchemaDef {
        tag: "EPM",
        description: "Entity profile message",
        day_field: None,
        numeric_field: None,
        entity_field: Some("DN"),
        day_required: false,
    },
    SchemaDef {
        tag: "TDM",
        description: "Tracking data message",
        day_field: Some("START_TIME"),
        numeric_field: None,
        entity_field: Some("PARTICIPANT_1"),
        day_required: false,
    },
];

/// Look a schema tag up in the allow-list.
pub fn lookup(tag: &str) -> Option<&'static SchemaDef> {
    CATALOGUE.iter().find(|def| def.tag == tag)
}

/// All known tags, catalogue order.
pub fn tags() -> impl Iterator<Item = &'static str> {
    CATALOGUE.iter().map(|def| def.tag)
}

/// Index cells extracted from a payload at write time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Projections {
    /// `YYYY-MM-DD` day cell.
    pub day: Option<String>,
    /// Numeric key cell.
    pub numeric_key: Option<i64>,
    /// Entity key cell.
    pub entity_key: Option<String>,
}

/// Why a projection pass failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProjectionError {
    /// A required cell was absent or undecodable.
    MissingRequired,
}

/// Extract projections per the schema's descriptor. Unparseable fields
/// leave cells null; only a missing *required* cell fails the write.
pub fn extract(def: &SchemaDef, payload: &[u8]) -> Result<Projections, ProjectionError> {
    let decoded = decode_object(payload);
    let mut out = Projections::default();

    if let Some(root) = decoded.as_ref() {
        if let Some(field) = def.day_field {
            out.day = lookup_path(root, field)
                .and_then(|v| v.as_str())
                .and_then(parse_day);
        }
        if let Some(field) = def.numeric_field {
            out.numeric_key = lookup_path(root, field)
                .and_then(as_number)
                .map(|n| n as i64);
        }
        if let Some(field) = def.entity_field {
            out.entity_key = lookup_path(root, field)
                .and_then(|v| v.as_str())
                .map(str::to_string);
        }
    }

    if def.day_required && out.day.is_none() {
        return Err(ProjectionError::MissingRequired);
    }
    Ok(out)
}

/// Validate the leading `YYYY-MM-DD` of a timestamp-ish string.
pub fn parse_day(text: &str) -> Option<String> {
    let head = text.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()?;
    Some(head.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_lookup() {
        assert!(lookup("OMM").is_some());
        assert!(lookup("omm").is_none());
        assert!(lookup("BOGUS").is_none());
    }

    #[test]
    fn extracts_all_cells() {
        let payload = br#"{"EPOCH":"2026-07-01T12:00:00Z","NORAD_CAT_ID":25544,"OBJECT_ID":"1998-067A"}"#;
        let p = extract(lookup("OMM").unwrap(), payload).unwrap();
        assert_eq!(p.day.as_deref(), Some("2026-07-01"));
        assert_eq!(p.numeric_key, Some(25544));
        assert_eq!(p.entity_key.as_deref(), Some("1998-067A"));
    }

    #[test]
    fn opaque_payload_indexes_null() {
        let p = extract(lookup("OMM").unwrap(), &[0xff, 0x00, 0x01]).unwrap();
        assert_eq!(p, Projections::default());
    }

    #[test]
    fn required_day_is_enforced() {
        let def = lookup("EOP").unwrap();
        assert_eq!(
            extract(def, br#"{"X_POLE":0.1}"#),
            Err(ProjectionError::MissingRequired)
        );
        let ok = extract(def, br#"{"DATE":"2026-01-02"}"#).unwrap();
        assert_eq!(ok.day.as_deref(), Some("2026-01-02"));
    }

    #[test]
    fn malformed_day_stays_null() {
        let p = extract(lookup("OMM").unwrap(), br#"{"EPOCH":"not-a-date"}"#).unwrap();
        assert_eq!(p.day, None);
    }
}
