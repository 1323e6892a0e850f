use time::format_description::well_known::Rfc3339;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::{AppError, INVALID_TIMESTAMP};

// Offset-less layouts accepted from forms and from stores that drop the zone.
const LOCAL_LAYOUTS: [&[BorrowedFormatItem<'static>]; 5] = [
    format_description!("[year]-[month]-[day]T[hour]:[minute]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
];

const DISPLAY_LONG: &[BorrowedFormatItem<'static>] =
    format_description!("[day]/[month]/[year] [hour]:[minute]");
const DISPLAY_SHORT: &[BorrowedFormatItem<'static>] =
    format_description!("[day]/[month] [hour]:[minute]");

fn parse_local(trimmed: &str, offset: UtcOffset) -> Option<OffsetDateTime> {
    LOCAL_LAYOUTS.iter().find_map(|layout| {
        PrimitiveDateTime::parse(trimmed, layout)
            .ok()
            .map(|pdt| pdt.assume_offset(offset))
    })
}

fn unparseable(field: &str, raw: &str) -> AppError {
    AppError::new(INVALID_TIMESTAMP, format!("Unparseable timestamp for {field}"))
        .with_details(format!("raw={raw}"))
}

/// Parse the creation timestamp entered by a user.
///
/// RFC3339 input keeps its own offset. The form-style layouts (`YYYY-MM-DDTHH:MM` and friends)
/// carry no zone and are read at `offset`, the configured wall-clock offset of the operators.
pub fn parse_created_at(raw: &str, offset: UtcOffset) -> Result<OffsetDateTime, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::missing_field("created_at"));
    }
    if let Ok(dt) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Ok(dt);
    }
    parse_local(trimmed, offset).ok_or_else(|| unparseable("created_at", trimmed))
}

/// Parse a timestamp read back from a store. Values without an offset are taken as UTC.
pub fn parse_stored_timestamp(raw: &str) -> Result<OffsetDateTime, AppError> {
    let trimmed = raw.trim();
    if let Ok(dt) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Ok(dt);
    }
    parse_local(trimmed, UtcOffset::UTC).ok_or_else(|| unparseable("stored value", trimmed))
}

/// Canonical storage form: RFC3339 in UTC.
pub fn to_rfc3339_utc(dt: OffsetDateTime) -> Result<String, AppError> {
    dt.to_offset(UtcOffset::UTC).format(&Rfc3339).map_err(|e| {
        AppError::new(INVALID_TIMESTAMP, "Failed to format timestamp").with_details(e.to_string())
    })
}

/// `DD/MM/YYYY HH:MM` at the given offset, as shown on cards.
pub fn format_display(dt: OffsetDateTime, offset: UtcOffset) -> String {
    dt.to_offset(offset)
        .format(DISPLAY_LONG)
        .unwrap_or_else(|_| "??/??/???? ??:??".to_string())
}

/// `DD/MM HH:MM` at the given offset, as shown in update history.
pub fn format_display_short(dt: OffsetDateTime, offset: UtcOffset) -> String {
    dt.to_offset(offset)
        .format(DISPLAY_SHORT)
        .unwrap_or_else(|_| "??/?? ??:??".to_string())
}

/// Parse `+HH:MM` / `-HH:MM` (or `Z`) into an offset.
pub fn parse_utc_offset(raw: &str) -> Result<UtcOffset, AppError> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.is_empty() {
        return Ok(UtcOffset::UTC);
    }
    UtcOffset::parse(
        trimmed,
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .map_err(|e| {
        AppError::new(INVALID_TIMESTAMP, "Invalid UTC offset")
            .with_details(format!("raw={trimmed}; err={e}"))
    })
}

/// Serde adapter: RFC3339 out, lenient store parsing in.
pub mod wire {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::format_description::well_known::Rfc3339;
    use time::OffsetDateTime;

    pub fn serialize<S: Serializer>(dt: &OffsetDateTime, s: S) -> Result<S::Ok, S::Error> {
        let text = dt.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        s.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<OffsetDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_stored_timestamp(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            dt: &Option<OffsetDateTime>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => super::serialize(dt, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<OffsetDateTime>, D::Error> {
            let raw: Option<String> = Option::deserialize(d)?;
            match raw.as_deref().map(str::trim) {
                None | Some("") => Ok(None),
                Some(s) => super::super::parse_stored_timestamp(s)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};

    #[test]
    fn form_layout_is_read_at_configured_offset() {
        let dt = parse_created_at("2024-01-01T00:00", offset!(-3)).unwrap();
        assert_eq!(dt, datetime!(2024-01-01 03:00 UTC));
    }

    #[test]
    fn rfc3339_keeps_its_own_offset() {
        let dt = parse_created_at("2024-01-01T00:00:00Z", offset!(-3)).unwrap();
        assert_eq!(dt, datetime!(2024-01-01 00:00 UTC));
    }

    #[test]
    fn garbage_is_rejected() {
        let err = parse_created_at("yesterday", UtcOffset::UTC).unwrap_err();
        assert_eq!(err.code, INVALID_TIMESTAMP);
        let err = parse_created_at("   ", UtcOffset::UTC).unwrap_err();
        assert_eq!(err.code, crate::error::MISSING_REQUIRED_FIELD);
    }

    #[test]
    fn stored_values_accept_postgres_shapes() {
        let a = parse_stored_timestamp("2024-01-01T12:00:00+00:00").unwrap();
        let b = parse_stored_timestamp("2024-01-01T12:00:00.000Z").unwrap();
        let c = parse_stored_timestamp("2024-01-01T12:00:00.123456").unwrap();
        assert_eq!(a, b);
        assert_eq!(c.date(), a.date());
    }

    #[test]
    fn display_formats_use_offset() {
        let dt = datetime!(2024-01-02 01:30 UTC);
        assert_eq!(format_display(dt, offset!(-3)), "01/01/2024 22:30");
        assert_eq!(format_display_short(dt, UtcOffset::UTC), "02/01 01:30");
    }

    #[test]
    fn offsets_parse() {
        assert_eq!(parse_utc_offset("-03:00").unwrap(), offset!(-3));
        assert_eq!(parse_utc_offset("Z").unwrap(), UtcOffset::UTC);
        assert!(parse_utc_offset("minus three").is_err());
    }
}
