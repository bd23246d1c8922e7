//! Text field parsing.
//!
//! Converts one textual field (as read from a delimited input file) into the
//! cell bytes a column stores. This is the single place where the accepted
//! date and time spellings are defined.

use crate::{
    codec::decimal,
    error::{ErrorOrigin, InternalError},
    schema::{ColumnSchema, ColumnType},
};
use combdb_primitives::ColumnKind;
use thiserror::Error as ThisError;
use time::{
    Date, PrimitiveDateTime, Time, format_description::BorrowedFormatItem,
    macros::format_description,
};

type Format = &'static [BorrowedFormatItem<'static>];

const CANONICAL_DATE: Format = format_description!("[year]-[month]-[day]");
const CANONICAL_TIME: Format = format_description!("[hour]:[minute]:[second]");
const CANONICAL_DATETIME: Format =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

const DATE_FORMATS: [Format; 4] = [
    CANONICAL_DATE,
    format_description!("[year]/[month]/[day]"),
    format_description!("[year].[month].[day]"),
    format_description!("[year][month][day]"),
];

const TIME_FORMATS: [Format; 2] = [
    CANONICAL_TIME,
    format_description!("[hour][minute][second]"),
];

const DATETIME_FORMATS: [Format; 5] = [
    CANONICAL_DATETIME,
    format_description!("[year]/[month]/[day] [hour]:[minute]:[second]"),
    format_description!("[year].[month].[day] [hour]:[minute]:[second]"),
    format_description!("[year][month][day] [hour][minute][second]"),
    format_description!("[year][month][day][hour][minute][second]"),
];

///
/// ParseError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum ParseError {
    #[error("column '{column}' is not nullable but the field is empty")]
    EmptyNotNullable { column: String },

    #[error("negative value '{text}' for unsigned column '{column}'")]
    NegativeUnsigned { column: String, text: String },

    #[error("cannot parse '{text}' as {kind} for column '{column}'")]
    Malformed {
        column: String,
        kind: ColumnKind,
        text: String,
    },

    #[error("value '{text}' does not fit decimal({precision}, {scale})")]
    DecimalOverflow {
        text: String,
        precision: u8,
        scale: u8,
    },
}

impl From<ParseError> for InternalError {
    fn from(err: ParseError) -> Self {
        Self::domain(ErrorOrigin::Codec, err.to_string())
    }
}

/// Parse one text field into the column's cell bytes.
///
/// An empty field is `NULL` for nullable non-string columns; string and
/// binary columns keep it as an empty value.
pub fn parse_field(text: &str, column: &ColumnSchema) -> Result<Option<Vec<u8>>, ParseError> {
    let kind = column.column_type.kind();
    let textual = matches!(kind, ColumnKind::String | ColumnKind::Binary);

    if text.is_empty() && !textual {
        return if column.nullable {
            Ok(None)
        } else {
            Err(ParseError::EmptyNotNullable {
                column: column.name.clone(),
            })
        };
    }

    let malformed = || ParseError::Malformed {
        column: column.name.clone(),
        kind,
        text: text.to_string(),
    };

    let cell = match column.column_type {
        ColumnType::SignedInt => text
            .trim()
            .parse::<i64>()
            .map_err(|_| malformed())?
            .to_be_bytes()
            .to_vec(),
        ColumnType::UnsignedInt => {
            let trimmed = text.trim();
            if trimmed.starts_with('-') {
                return Err(ParseError::NegativeUnsigned {
                    column: column.name.clone(),
                    text: text.to_string(),
                });
            }
            trimmed
                .parse::<u64>()
                .map_err(|_| malformed())?
                .to_be_bytes()
                .to_vec()
        }
        ColumnType::Double => text
            .trim()
            .parse::<f64>()
            .map_err(|_| malformed())?
            .to_be_bytes()
            .to_vec(),
        ColumnType::Decimal { precision, scale } => {
            let unscaled = parse_decimal(text.trim(), scale)
                .filter(|&v| decimal::encode(v, precision, scale).is_ok())
                .ok_or_else(|| ParseError::DecimalOverflow {
                    text: text.to_string(),
                    precision,
                    scale,
                })?;
            unscaled.to_be_bytes().to_vec()
        }
        ColumnType::String | ColumnType::Binary => text.as_bytes().to_vec(),
        ColumnType::Date => normalize_date(text).ok_or_else(malformed)?.into_bytes(),
        ColumnType::Time => normalize_time(text).ok_or_else(malformed)?.into_bytes(),
        ColumnType::DateTime => normalize_datetime(text).ok_or_else(malformed)?.into_bytes(),
    };

    Ok(Some(cell))
}

/// Return whether `text` is already in the canonical form for a temporal kind.
#[must_use]
pub fn is_canonical(kind: ColumnKind, text: &str) -> bool {
    let width_ok = kind.cell_width() == Some(text.len());

    width_ok
        && match kind {
            ColumnKind::Date => Date::parse(text, CANONICAL_DATE).is_ok(),
            ColumnKind::Time => Time::parse(text, CANONICAL_TIME).is_ok(),
            ColumnKind::DateTime => PrimitiveDateTime::parse(text, CANONICAL_DATETIME).is_ok(),
            _ => false,
        }
}

fn normalize_date(text: &str) -> Option<String> {
    let date = DATE_FORMATS
        .iter()
        .find_map(|format| Date::parse(text, format).ok())?;

    date.format(CANONICAL_DATE).ok()
}

fn normalize_time(text: &str) -> Option<String> {
    let time = TIME_FORMATS
        .iter()
        .find_map(|format| Time::parse(text, format).ok())?;

    time.format(CANONICAL_TIME).ok()
}

fn normalize_datetime(text: &str) -> Option<String> {
    let datetime = DATETIME_FORMATS
        .iter()
        .find_map(|format| PrimitiveDateTime::parse(text, format).ok())?;

    datetime.format(CANONICAL_DATETIME).ok()
}

/// Parse plain decimal text into an unscaled value, truncating toward zero
/// past `scale` fractional digits.
#[must_use]
pub fn parse_decimal(text: &str, scale: u8) -> Option<i128> {
    let (negative, body) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };

    let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut unscaled: i128 = 0;
    for digit in int_part.bytes() {
        unscaled = unscaled
            .checked_mul(10)?
            .checked_add(i128::from(digit - b'0'))?;
    }

    let mut frac_digits = frac_part.bytes();
    for _ in 0..scale {
        let digit = frac_digits.next().map_or(0, |d| d - b'0');
        unscaled = unscaled.checked_mul(10)?.checked_add(i128::from(digit))?;
    }

    Some(if negative { -unscaled } else { unscaled })
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str, column: &ColumnSchema) -> Option<Vec<u8>> {
        parse_field(text, column).expect("field should parse")
    }

    #[test]
    fn integers_become_big_endian_cells() {
        let col = ColumnSchema::new("n", ColumnType::SignedInt);

        assert_eq!(parse("-5", &col), Some((-5i64).to_be_bytes().to_vec()));
    }

    #[test]
    fn negative_unsigned_is_rejected() {
        let col = ColumnSchema::new("n", ColumnType::UnsignedInt);

        assert!(matches!(
            parse_field("-1", &col),
            Err(ParseError::NegativeUnsigned { .. })
        ));
        assert_eq!(parse("42", &col), Some(42u64.to_be_bytes().to_vec()));
    }

    #[test]
    fn empty_fields_follow_nullability() {
        let nullable = ColumnSchema::new("n", ColumnType::Double);
        let required = ColumnSchema::new("n", ColumnType::Double).not_null();
        let text = ColumnSchema::new("s", ColumnType::String)
            .with_max_length(4)
            .not_null();

        assert_eq!(parse("", &nullable), None);
        assert!(matches!(
            parse_field("", &required),
            Err(ParseError::EmptyNotNullable { .. })
        ));
        assert_eq!(parse("", &text), Some(Vec::new()));
    }

    #[test]
    fn date_spellings_normalize() {
        let col = ColumnSchema::new("d", ColumnType::Date);

        for text in ["2013-04-05", "2013/04/05", "2013.04.05", "20130405"] {
            assert_eq!(parse(text, &col), Some(b"2013-04-05".to_vec()), "{text}");
        }
        assert!(parse_field("2013-13-01", &col).is_err());
    }

    #[test]
    fn time_and_datetime_spellings_normalize() {
        let time = ColumnSchema::new("t", ColumnType::Time);
        let datetime = ColumnSchema::new("dt", ColumnType::DateTime);

        assert_eq!(parse("071502", &time), Some(b"07:15:02".to_vec()));
        assert_eq!(
            parse("2013/04/05 07:15:02", &datetime),
            Some(b"2013-04-05 07:15:02".to_vec())
        );
        assert_eq!(
            parse("20130405071502", &datetime),
            Some(b"2013-04-05 07:15:02".to_vec())
        );
    }

    #[test]
    fn decimals_truncate_past_scale() {
        assert_eq!(parse_decimal("12.345", 2), Some(1234));
        assert_eq!(parse_decimal("-0.5", 3), Some(-500));
        assert_eq!(parse_decimal("7", 1), Some(70));
        assert_eq!(parse_decimal("1e5", 0), None);
        assert_eq!(parse_decimal("-", 0), None);
    }

    #[test]
    fn decimal_fields_respect_precision() {
        let col = ColumnSchema::new(
            "price",
            ColumnType::Decimal {
                precision: 5,
                scale: 2,
            },
        );

        assert_eq!(parse("123.456", &col), Some(12_345i128.to_be_bytes().to_vec()));
        assert!(matches!(
            parse_field("1234.5", &col),
            Err(ParseError::DecimalOverflow { .. })
        ));
    }

    #[test]
    fn canonical_check_requires_exact_width() {
        assert!(is_canonical(ColumnKind::Date, "2020-01-31"));
        assert!(!is_canonical(ColumnKind::Date, "20200131"));
        assert!(is_canonical(ColumnKind::Time, "23:59:59"));
        assert!(!is_canonical(ColumnKind::SignedInt, "1"));
    }
}
