use gmsflags_schema::{FlagType, FlagValue};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

/// `flagType` written into override rows. Play Services only distinguishes
/// types by which value column is set, so overrides always use the plain kind.
pub const OVERRIDE_FLAG_KIND: i64 = 0;

/// Value columns of one `FlagOverrides` row; exactly one is `Some`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ValueColumns {
    pub int_val: Option<i64>,
    pub bool_val: Option<i64>,
    pub float_val: Option<f64>,
    pub string_val: Option<String>,
    pub extension_val: Option<Vec<u8>>,
}

impl From<&FlagValue> for ValueColumns {
    fn from(value: &FlagValue) -> Self {
        let mut cols = ValueColumns::default();
        match value {
            FlagValue::Bool(v) => cols.bool_val = Some(i64::from(*v)),
            FlagValue::Int(v) => cols.int_val = Some(*v),
            FlagValue::Float(v) => cols.float_val = Some(*v),
            FlagValue::String(v) => cols.string_val = Some(v.clone()),
            FlagValue::Extension(v) => cols.extension_val = Some(v.clone()),
        }
        cols
    }
}

/// Decodes a `(name, value)` row selected from the column of `flag_type`.
///
/// Unchecked reads: the device database stores loosely typed values and the
/// query already filters out NULLs.
pub fn decode_named_value(
    row: &SqliteRow,
    flag_type: FlagType,
) -> Result<(String, FlagValue), sqlx::Error> {
    let name: String = row.try_get("name")?;
    let value = match flag_type {
        FlagType::Bool => {
            let raw: i64 = row.try_get_unchecked("value")?;
            FlagValue::Bool(raw != 0)
        }
        FlagType::Int => FlagValue::Int(row.try_get_unchecked("value")?),
        FlagType::Float => FlagValue::Float(row.try_get_unchecked("value")?),
        FlagType::String => FlagValue::String(row.try_get_unchecked("value")?),
        FlagType::Extension => FlagValue::Extension(row.try_get_unchecked("value")?),
    };
    Ok((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bools_are_stored_as_integers() {
        let cols = ValueColumns::from(&FlagValue::Bool(true));
        assert_eq!(
            cols,
            ValueColumns {
                bool_val: Some(1),
                ..Default::default()
            }
        );
    }

    #[test]
    fn only_the_matching_column_is_set() {
        let cols = ValueColumns::from(&FlagValue::String("on".to_string()));
        assert_eq!(cols.string_val.as_deref(), Some("on"));
        assert!(cols.int_val.is_none());
        assert!(cols.bool_val.is_none());
        assert!(cols.float_val.is_none());
        assert!(cols.extension_val.is_none());
    }
}
