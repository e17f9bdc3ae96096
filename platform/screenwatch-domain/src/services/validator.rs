use crate::services::classifier::classify_stock;
use crate::value_objects::bias::MarketBias;
use crate::value_objects::observation::{RawRecord, StockObservation};
use std::fmt;

const MIN_SYMBOL_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    Symbol,
    Price,
    Change,
    Volume,
}

impl RecordField {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordField::Symbol => "symbol",
            RecordField::Price => "price",
            RecordField::Change => "change",
            RecordField::Volume => "volume",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    InvalidSymbol { raw: String },
    Unparseable { field: RecordField, raw: String },
    OutOfRange { field: RecordField, raw: String },
}

impl ValidationError {
    pub fn field(&self) -> RecordField {
        match self {
            ValidationError::InvalidSymbol { .. } => RecordField::Symbol,
            ValidationError::Unparseable { field, .. }
            | ValidationError::OutOfRange { field, .. } => *field,
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            ValidationError::InvalidSymbol { raw }
            | ValidationError::Unparseable { raw, .. }
            | ValidationError::OutOfRange { raw, .. } => raw,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidSymbol { raw } => write!(f, "invalid symbol: {raw:?}"),
            ValidationError::Unparseable { field, raw } => {
                write!(f, "invalid {} value: {raw:?}", field.as_str())
            }
            ValidationError::OutOfRange { field, raw } => {
                write!(f, "{} out of range: {raw:?}", field.as_str())
            }
        }
    }
}

impl std::error::Error for ValidationError {}

pub fn validate(
    source_id: &str,
    symbol: &str,
    raw_price: &str,
    raw_change: &str,
    raw_volume: &str,
) -> Result<StockObservation, ValidationError> {
    let symbol = symbol.trim();
    if symbol.chars().count() < MIN_SYMBOL_LEN {
        return Err(ValidationError::InvalidSymbol {
            raw: symbol.to_string(),
        });
    }

    let price = parse_price(raw_price)?;
    let change_pct = parse_change_pct(raw_change)?;
    let volume = parse_volume(raw_volume)?;

    Ok(StockObservation {
        symbol: symbol.to_string(),
        price,
        change_pct,
        volume,
        trend: classify_stock(change_pct),
        source_id: source_id.to_string(),
        market_bias: MarketBias::Unknown,
    })
}

pub fn validate_record(
    source_id: &str,
    record: &RawRecord,
) -> Result<StockObservation, ValidationError> {
    validate(
        source_id,
        &record.symbol,
        &record.price,
        &record.change,
        &record.volume,
    )
}

pub fn parse_price(raw: &str) -> Result<f64, ValidationError> {
    let price = parse_decimal(RecordField::Price, raw, false)?;
    if price < 0.0 {
        return Err(ValidationError::OutOfRange {
            field: RecordField::Price,
            raw: raw.to_string(),
        });
    }
    Ok(price)
}

pub fn parse_change_pct(raw: &str) -> Result<f64, ValidationError> {
    parse_decimal(RecordField::Change, raw, true)
}

pub fn parse_volume(raw: &str) -> Result<u64, ValidationError> {
    let cleaned = strip_formatting(raw, false);
    let value: i64 = cleaned.parse().map_err(|_| ValidationError::Unparseable {
        field: RecordField::Volume,
        raw: raw.to_string(),
    })?;
    u64::try_from(value).map_err(|_| ValidationError::OutOfRange {
        field: RecordField::Volume,
        raw: raw.to_string(),
    })
}

fn parse_decimal(field: RecordField, raw: &str, percent: bool) -> Result<f64, ValidationError> {
    let cleaned = strip_formatting(raw, percent);
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ValidationError::Unparseable {
            field,
            raw: raw.to_string(),
        }),
    }
}

fn strip_formatting(raw: &str, percent: bool) -> String {
    raw.trim()
        .chars()
        .filter(|c| *c != ',' && !(percent && *c == '%'))
        .collect::<String>()
        .trim()
        .to_string()
}
