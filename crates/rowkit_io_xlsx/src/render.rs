//! Field value formatter.
//!
//! Rules are tried in a fixed order and the first match wins:
//! 1. self-rendering values ([`crate::value::CellExport`]),
//! 2. text,
//! 3. decimals, fixed to `decimal_digits`,
//! 4. `timestamp` fields holding epoch seconds or calendar values,
//! 5. values found in the field's value map,
//! 6. the value's default representation.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::spec::{EnumCellValue, SpecExportSettings, SpecFieldDescriptor};
use crate::value::EnumFieldValue;

/// Largest integer magnitude an Excel number cell holds exactly.
const N_INT_EXACT_MAX: u64 = 1 << 53;
/// Scale cap of `rust_decimal`.
const N_DECIMAL_SCALE_MAX: u32 = 28;

/// Render one field value into a cell value. Never fails.
pub fn render_field_value(
    value: &EnumFieldValue<'_>,
    descriptor: &SpecFieldDescriptor,
    settings: &SpecExportSettings,
) -> EnumCellValue {
    match value {
        EnumFieldValue::None => return EnumCellValue::None,
        EnumFieldValue::Custom(custom) => return EnumCellValue::String(custom.to_cell_string()),
        EnumFieldValue::Text(s) => return EnumCellValue::String(s.to_string()),
        EnumFieldValue::Decimal(d) => {
            return EnumCellValue::String(format_decimal_fixed(d, settings.decimal_digits));
        }
        _ => {}
    }

    if descriptor.if_timestamp
        && let Some(c_text) = render_timestamp(value, settings)
    {
        return EnumCellValue::String(c_text);
    }

    if let Some(dict_map) = &descriptor.value_map
        && let Some(c_key) = derive_value_map_key(value)
        && let Some(c_mapped) = dict_map.get(&c_key)
    {
        return EnumCellValue::String(c_mapped.clone());
    }

    render_default(value)
}

/// Fixed-point decimal text with exactly `digits` fractional digits.
///
/// Rounds half away from zero and never yields a negative zero.
pub fn format_decimal_fixed(value: &Decimal, digits: u32) -> String {
    let n_digits = digits.min(N_DECIMAL_SCALE_MAX);
    let mut rounded = value.round_dp_with_strategy(n_digits, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_zero() {
        rounded.set_sign_positive(true);
    }
    format!("{:.*}", n_digits as usize, rounded)
}

/// Epoch seconds or calendar value, converted to the settings zone and formatted.
pub fn render_timestamp(value: &EnumFieldValue<'_>, settings: &SpecExportSettings) -> Option<String> {
    let instant: DateTime<Utc> = match value {
        EnumFieldValue::Integer(n_secs) => DateTime::from_timestamp(*n_secs, 0)?,
        EnumFieldValue::Unsigned(n_secs) => DateTime::from_timestamp(i64::try_from(*n_secs).ok()?, 0)?,
        EnumFieldValue::DateTime(dt) => dt.with_timezone(&Utc),
        _ => return None,
    };
    settings
        .timezone
        .format_instant(&instant, &settings.datetime_format)
}

fn derive_value_map_key(value: &EnumFieldValue<'_>) -> Option<String> {
    match value {
        EnumFieldValue::Boolean(b) => Some(b.to_string()),
        EnumFieldValue::Integer(n) => Some(n.to_string()),
        EnumFieldValue::Unsigned(n) => Some(n.to_string()),
        EnumFieldValue::Float(n) => Some(n.to_string()),
        _ => None,
    }
}

fn render_default(value: &EnumFieldValue<'_>) -> EnumCellValue {
    match value {
        EnumFieldValue::None => EnumCellValue::None,
        EnumFieldValue::Custom(custom) => EnumCellValue::String(custom.to_cell_string()),
        EnumFieldValue::Text(s) => EnumCellValue::String(s.to_string()),
        EnumFieldValue::Decimal(d) => EnumCellValue::String(d.to_string()),
        EnumFieldValue::Integer(n) => {
            if n.unsigned_abs() <= N_INT_EXACT_MAX {
                EnumCellValue::Number(*n as f64)
            } else {
                EnumCellValue::String(n.to_string())
            }
        }
        EnumFieldValue::Unsigned(n) => {
            if *n <= N_INT_EXACT_MAX {
                EnumCellValue::Number(*n as f64)
            } else {
                EnumCellValue::String(n.to_string())
            }
        }
        EnumFieldValue::Float(n) => {
            if n.is_finite() {
                EnumCellValue::Number(*n)
            } else {
                EnumCellValue::String(n.to_string())
            }
        }
        EnumFieldValue::Boolean(b) => EnumCellValue::Boolean(*b),
        EnumFieldValue::DateTime(dt) => EnumCellValue::String(dt.to_rfc3339()),
        EnumFieldValue::Other(s) => EnumCellValue::String(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::str::FromStr;

    use chrono::{FixedOffset, TimeZone};

    use super::*;
    use crate::spec::{EnumTimezone, SpecExportOptions, SpecExportReport};
    use crate::value::CellExport;

    struct IsDemo(bool);

    impl CellExport for IsDemo {
        fn to_cell_string(&self) -> String {
            if self.0 { "测试帐号" } else { "正式帐号" }.to_string()
        }
    }

    fn derive_settings(decimal_digits: u32) -> SpecExportSettings {
        SpecExportOptions {
            timezone: Some("Asia/Hong_Kong".to_string()),
            decimal_digits,
            ..Default::default()
        }
        .resolve(&mut SpecExportReport::default())
    }

    fn dec(text: &str) -> Decimal {
        Decimal::from_str(text).expect("decimal literal")
    }

    #[test]
    fn test_decimal_keeps_trailing_zeros_and_sign() {
        assert_eq!(format_decimal_fixed(&dec("1000"), 2), "1000.00");
        assert_eq!(format_decimal_fixed(&dec("-5.1"), 2), "-5.10");
        assert_eq!(format_decimal_fixed(&dec("2000.03120"), 2), "2000.03");
        assert_eq!(format_decimal_fixed(&dec("12.5"), 1), "12.5");
        assert_eq!(format_decimal_fixed(&dec("3"), 1), "3.0");
        assert_eq!(format_decimal_fixed(&dec("0.125"), 2), "0.13");
        assert_eq!(format_decimal_fixed(&dec("-0.001"), 2), "0.00");
        assert_eq!(format_decimal_fixed(&dec("7.6"), 0), "8");
    }

    #[test]
    fn test_custom_capability_wins_over_everything() {
        let demo = IsDemo(true);
        let descriptor = SpecFieldDescriptor {
            if_timestamp: true,
            value_map: Some(BTreeMap::from([("true".to_string(), "Y".to_string())])),
            ..Default::default()
        };
        assert_eq!(
            render_field_value(&EnumFieldValue::Custom(&demo), &descriptor, &derive_settings(2)),
            EnumCellValue::String("测试帐号".to_string())
        );
    }

    #[test]
    fn test_text_wins_over_value_map() {
        let descriptor = SpecFieldDescriptor {
            value_map: Some(BTreeMap::from([("a".to_string(), "Alpha".to_string())])),
            ..Default::default()
        };
        assert_eq!(
            render_field_value(&EnumFieldValue::from("a"), &descriptor, &derive_settings(2)),
            EnumCellValue::String("a".to_string())
        );
    }

    #[test]
    fn test_decimal_wins_over_timestamp() {
        let descriptor = SpecFieldDescriptor {
            if_timestamp: true,
            ..Default::default()
        };
        assert_eq!(
            render_field_value(&dec("1700000000").into(), &descriptor, &derive_settings(2)),
            EnumCellValue::String("1700000000.00".to_string())
        );
    }

    #[test]
    fn test_timestamp_integer_and_calendar_value_render_identically() {
        let settings = derive_settings(2);
        let descriptor = SpecFieldDescriptor {
            if_timestamp: true,
            ..Default::default()
        };
        let instant = FixedOffset::west_opt(5 * 3600)
            .expect("offset")
            .with_ymd_and_hms(2024, 3, 1, 10, 30, 0)
            .single()
            .expect("instant");

        let from_int = render_field_value(
            &EnumFieldValue::Integer(instant.timestamp()),
            &descriptor,
            &settings,
        );
        let from_cal = render_field_value(&instant.into(), &descriptor, &settings);
        assert_eq!(from_int, from_cal);
        assert_eq!(from_int, EnumCellValue::String("2024-03-01 23:30:00".to_string()));
    }

    #[test]
    fn test_timestamp_uses_configured_pattern() {
        let settings = SpecExportSettings {
            timezone: EnumTimezone::parse("UTC").expect("utc"),
            datetime_format: "%Y年%m月%d日%H:%M:%S".to_string(),
            ..Default::default()
        };
        let descriptor = SpecFieldDescriptor {
            if_timestamp: true,
            ..Default::default()
        };
        assert_eq!(
            render_field_value(&EnumFieldValue::Unsigned(86_400), &descriptor, &settings),
            EnumCellValue::String("1970年01月02日00:00:00".to_string())
        );
    }

    #[test]
    fn test_timestamp_on_other_types_falls_through() {
        let descriptor = SpecFieldDescriptor {
            if_timestamp: true,
            ..Default::default()
        };
        assert_eq!(
            render_field_value(&EnumFieldValue::Float(1.5), &descriptor, &derive_settings(2)),
            EnumCellValue::Number(1.5)
        );
        assert_eq!(
            render_field_value(&EnumFieldValue::Integer(i64::MAX), &descriptor, &derive_settings(2)),
            EnumCellValue::String(i64::MAX.to_string())
        );
    }

    #[test]
    fn test_value_map_applies_to_booleans_and_numbers() {
        let descriptor = SpecFieldDescriptor {
            value_map: Some(BTreeMap::from([
                ("true".to_string(), "Yes".to_string()),
                ("1".to_string(), "Active".to_string()),
            ])),
            ..Default::default()
        };
        let settings = derive_settings(2);
        assert_eq!(
            render_field_value(&true.into(), &descriptor, &settings),
            EnumCellValue::String("Yes".to_string())
        );
        assert_eq!(
            render_field_value(&false.into(), &descriptor, &settings),
            EnumCellValue::Boolean(false)
        );
        assert_eq!(
            render_field_value(&1i64.into(), &descriptor, &settings),
            EnumCellValue::String("Active".to_string())
        );
        assert_eq!(
            render_field_value(&2i64.into(), &descriptor, &settings),
            EnumCellValue::Number(2.0)
        );
    }

    #[test]
    fn test_default_representation() {
        let descriptor = SpecFieldDescriptor::default();
        let settings = derive_settings(2);
        assert_eq!(
            render_field_value(&EnumFieldValue::None, &descriptor, &settings),
            EnumCellValue::None
        );
        assert_eq!(
            render_field_value(&18i64.into(), &descriptor, &settings),
            EnumCellValue::Number(18.0)
        );
        assert_eq!(
            render_field_value(&f64::NAN.into(), &descriptor, &settings),
            EnumCellValue::String("NaN".to_string())
        );
        assert_eq!(
            render_field_value(&u64::MAX.into(), &descriptor, &settings),
            EnumCellValue::String(u64::MAX.to_string())
        );
        assert_eq!(
            render_field_value(
                &EnumFieldValue::Other("{\"k\":1}".to_string()),
                &descriptor,
                &settings
            ),
            EnumCellValue::String("{\"k\":1}".to_string())
        );
    }
}
