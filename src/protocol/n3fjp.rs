//! N3FJP contest logger TCP API.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{
    contact::{ContactAnnotations, ContactRecord},
    types::{Band, ContactId, GeoPoint, ModeCategory},
};

use super::{
    RecordError,
    dialect::{Decoded, Dialect},
    parser::{RawFields, split_records},
    timestamp::parse_timestamp,
};

const TERMINATOR: &[u8] = b"</CMD>";

/// N3FJP `<CMD><LIST>` polling.
#[derive(Debug, Clone)]
pub struct N3fjp {
    /// Ask for every column rather than the default subset.
    pub include_all: bool,
}

impl Default for N3fjp {
    fn default() -> Self {
        Self { include_all: true }
    }
}

impl Dialect for N3fjp {
    fn list_command(&self, count: usize) -> String {
        // The LIST tag must be closed or the logger may answer with nothing.
        let all = if self.include_all { "<INCLUDEALL>" } else { "" };
        format!("<CMD><LIST>{all}<VALUE>{count}</VALUE></LIST></CMD>")
    }

    fn response_complete(&self, buf: &[u8]) -> bool {
        let trimmed = buf.trim_ascii_end();
        trimmed.len() >= TERMINATOR.len()
            && trimmed[trimmed.len() - TERMINATOR.len()..].eq_ignore_ascii_case(TERMINATOR)
    }

    fn decode(&self, text: &str, reference: DateTime<Utc>) -> Decoded {
        let raw = split_records(text);
        let mut sample_fields: Vec<String> = raw
            .first()
            .map(|f| f.keys().cloned().collect())
            .unwrap_or_default();
        sample_fields.sort();

        let mut decoded = Decoded {
            records: Vec::with_capacity(raw.len()),
            malformed: 0,
            sample_fields,
        };
        for fields in &raw {
            match decode_record(fields, reference) {
                Ok(record) => decoded.records.push(record),
                Err(err) => {
                    debug!(error = %err, "discarding malformed record");
                    decoded.malformed += 1;
                }
            }
        }
        decoded
    }
}

fn first<'a>(fields: &'a RawFields, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| fields.get(*k))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}

fn owned(fields: &RawFields, keys: &[&str]) -> Option<String> {
    first(fields, keys).map(str::to_string)
}

fn coordinate(fields: &RawFields, keys: &[&str]) -> Option<f64> {
    first(fields, keys).and_then(|v| v.parse().ok())
}

/// Maps one record's columns onto a [`ContactRecord`].
pub fn decode_record(fields: &RawFields, reference: DateTime<Utc>) -> Result<ContactRecord, RecordError> {
    let callsign = first(fields, &["CALL", "FLDCALL"])
        .ok_or(RecordError::MissingField("CALL"))?
        .to_ascii_uppercase();

    let band = first(fields, &["BAND", "FLDBAND"])
        .and_then(Band::parse_lenient)
        .unwrap_or(Band::Other);
    let mode = first(fields, &["MODE", "FLDMODE"])
        .map_or_else(|| "UNK".to_string(), str::to_ascii_uppercase);
    let category = first(fields, &["MODETEST", "FLDMODETEST"])
        .and_then(ModeCategory::from_mode_test)
        .unwrap_or_else(|| ModeCategory::from_mode(&mode));

    let operator = owned(fields, &["FLDOPERATOR", "OPERATOR"]).unwrap_or_else(|| "UNKNOWN".to_string());
    let station = owned(fields, &["STATION", "FLDSTATION"]).unwrap_or_else(|| format!("Op: {operator}"));

    let date = first(fields, &["DATE", "QSODATE", "FLDQSODATE"]).unwrap_or("");
    let time = first(fields, &["TIMEON", "FLDTIMEON"]).unwrap_or("");
    let timestamp = parse_timestamp(date, time, reference);
    let logged_at = format!("{date} {time}").trim().to_string();

    let id = match first(fields, &["FLDPRIMARYKEY", "PRIMARYKEY"]) {
        Some(key) => ContactId::Key(key.parse().map_err(|_| RecordError::InvalidField {
            field: "PRIMARYKEY",
            value: key.to_string(),
        })?),
        None => ContactId::Composite(format!("{callsign}|{date}|{time}|{band}|{mode}|{station}")),
    };

    let location = match (
        coordinate(fields, &["LAT", "LATITUDE"]),
        coordinate(fields, &["LON", "LONG", "LONGITUDE"]),
    ) {
        (Some(lat), Some(lon)) => GeoPoint::checked(lat, lon),
        _ => None,
    };

    Ok(ContactRecord {
        id,
        callsign,
        band,
        points: category.points(),
        mode,
        category,
        timestamp,
        logged_at,
        operator,
        station,
        annotations: ContactAnnotations {
            state: owned(fields, &["STATE"]),
            section: owned(fields, &["ARRLSECTION", "SECTION"]),
            country: owned(fields, &["COUNTRYWORKED"]),
            continent: owned(fields, &["CONTINENT"]),
            location,
        },
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 29, 0, 0, 0).unwrap()
    }

    fn fields(pairs: &[(&str, &str)]) -> RawFields {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn full_record() {
        let f = fields(&[
            ("FLDPRIMARYKEY", "42"),
            ("CALL", "w1aw"),
            ("BAND", "20"),
            ("MODE", "ssb"),
            ("MODETEST", "PH"),
            ("FLDOPERATOR", "K1OP"),
            ("STATION", "Comm Trailer"),
            ("DATE", "2025/06/28"),
            ("TIMEON", "18:05"),
            ("STATE", "CT"),
            ("ARRLSECTION", "CT"),
            ("COUNTRYWORKED", "USA"),
            ("CONTINENT", "NA"),
            ("LAT", "41.71"),
            ("LON", "-72.72"),
        ]);
        let r = decode_record(&f, reference()).unwrap();
        assert_eq!(r.id, ContactId::Key(42));
        assert_eq!(r.callsign, "W1AW");
        assert_eq!(r.band, Band::B20m);
        assert_eq!(r.mode, "SSB");
        assert_eq!(r.points, 1);
        assert_eq!(r.station, "Comm Trailer");
        assert_eq!(r.timestamp, Some(Utc.with_ymd_and_hms(2025, 6, 28, 18, 5, 0).unwrap()));
        assert_eq!(r.logged_at, "2025/06/28 18:05");
        assert_eq!(r.annotations.section.as_deref(), Some("CT"));
        assert!(r.annotations.location.is_some());
    }

    #[test]
    fn fallbacks() {
        let f = fields(&[("CALL", "K2X"), ("MODE", "CW"), ("LAT", "north")]);
        let r = decode_record(&f, reference()).unwrap();
        assert_eq!(r.operator, "UNKNOWN");
        assert_eq!(r.station, "Op: UNKNOWN");
        assert_eq!(r.band, Band::Other);
        assert_eq!(r.points, 2);
        assert_eq!(r.timestamp, None);
        assert!(r.annotations.location.is_none());
        assert!(matches!(r.id, ContactId::Composite(ref k) if k.starts_with("K2X|")));
    }

    #[test]
    fn invalid_records() {
        assert_eq!(
            decode_record(&fields(&[("BAND", "20")]), reference()),
            Err(RecordError::MissingField("CALL"))
        );
        assert!(matches!(
            decode_record(&fields(&[("CALL", "W1AW"), ("PRIMARYKEY", "x1")]), reference()),
            Err(RecordError::InvalidField { field: "PRIMARYKEY", .. })
        ));
    }

    #[test]
    fn decode_counts_malformed() {
        let text = "<CMD><LISTRESPONSE><CALL>W1AW</CALL><FLDPRIMARYKEY>1</FLDPRIMARYKEY></LISTRESPONSE>\
                    <LISTRESPONSE><BAND>40</BAND></LISTRESPONSE></CMD>";
        let d = N3fjp::default().decode(text, reference());
        assert_eq!(d.records.len(), 1);
        assert_eq!(d.malformed, 1);
        assert_eq!(d.sample_fields, ["CALL", "FLDPRIMARYKEY"]);
    }

    #[test]
    fn framing() {
        let d = N3fjp::default();
        assert_eq!(
            d.list_command(80),
            "<CMD><LIST><INCLUDEALL><VALUE>80</VALUE></LIST></CMD>"
        );
        assert!(d.response_complete(b"<CMD><LISTRESPONSE></LISTRESPONSE></cmd>\r\n"));
        assert!(!d.response_complete(b"<CMD><LISTRESPONSE>"));
    }
}
