//! Arrow value to SQLite value conversion.
//!
//! ```text
//! Int*/UInt*/Boolean      -> INTEGER
//! Float*                  -> REAL
//! Utf8 (scalar)           -> TEXT
//! Utf8 (inferred array)   -> TEXT holding a JSON array, split on ", "
//! List/Struct/Map         -> TEXT holding JSON
//! Binary                  -> BLOB
//! everything else         -> TEXT via arrow's display formatter
//! ```

use arrow::array::{Array, AsArray};
use arrow::datatypes::{
    DataType, Float16Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
    UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow::util::display::array_value_to_string;
use rusqlite::types::Value;
use serde_json::{Map, Number, Value as Json};

use crate::error::Result;
use crate::schema::LIST_SEPARATOR;

/// How a column's values are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Type-directed native conversion.
    Native,
    /// Text split into a JSON array.
    SplitList,
    /// Nested value rendered as JSON text.
    Json,
}

impl Encoding {
    /// Pick an encoding for a column. `split` is the inferred array flag.
    pub fn for_column(data_type: &DataType, split: bool) -> Self {
        match data_type {
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View if split => Self::SplitList,
            DataType::List(_)
            | DataType::LargeList(_)
            | DataType::FixedSizeList(_, _)
            | DataType::Struct(_)
            | DataType::Map(_, _) => Self::Json,
            // Dictionary cells are decoded to text, so only splitting carries over
            DataType::Dictionary(_, value) => match Self::for_column(value, split) {
                Self::SplitList => Self::SplitList,
                _ => Self::Native,
            },
            _ => Self::Native,
        }
    }
}

/// Column affinity used in `CREATE TABLE`.
pub fn sql_type(data_type: &DataType, encoding: Encoding) -> &'static str {
    if encoding != Encoding::Native {
        return "TEXT";
    }
    match data_type {
        DataType::Boolean
        | DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => "INTEGER",
        DataType::Float16 | DataType::Float32 | DataType::Float64 => "REAL",
        DataType::Binary | DataType::LargeBinary | DataType::FixedSizeBinary(_) => "BLOB",
        DataType::Null => "",
        _ => "TEXT",
    }
}

/// Convert a whole column.
pub fn column_values(array: &dyn Array, encoding: Encoding) -> Result<Vec<Value>> {
    (0..array.len())
        .map(|row| cell_value(array, row, encoding))
        .collect()
}

/// Convert one cell.
pub fn cell_value(array: &dyn Array, row: usize, encoding: Encoding) -> Result<Value> {
    match encoding {
        Encoding::SplitList => {
            let text = if array.is_null(row) {
                String::new()
            } else {
                text_at(array, row)?
            };
            Ok(Value::Text(split_list(&text)?))
        }
        Encoding::Json => {
            if array.is_null(row) {
                return Ok(Value::Null);
            }
            Ok(Value::Text(serde_json::to_string(&json_value(array, row)?)?))
        }
        Encoding::Native => native_value(array, row),
    }
}

/// Split upstream's joined list text into JSON array text. Blank input is `[]`.
pub fn split_list(text: &str) -> Result<String> {
    let items: Vec<&str> = if text.trim().is_empty() {
        Vec::new()
    } else {
        text.split(LIST_SEPARATOR).map(str::trim).collect()
    };
    Ok(serde_json::to_string(&items)?)
}

fn native_value(array: &dyn Array, row: usize) -> Result<Value> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }
    if let Some(i) = integer_at(array, row) {
        return Ok(Value::Integer(i));
    }
    if let Some(f) = float_at(array, row) {
        return Ok(Value::Real(f));
    }
    let value = match array.data_type() {
        DataType::Null => Value::Null,
        DataType::UInt64 => Value::Real(array.as_primitive::<UInt64Type>().value(row) as f64),
        DataType::Binary => Value::Blob(array.as_binary::<i32>().value(row).to_vec()),
        DataType::LargeBinary => Value::Blob(array.as_binary::<i64>().value(row).to_vec()),
        DataType::FixedSizeBinary(_) => {
            Value::Blob(array.as_fixed_size_binary().value(row).to_vec())
        }
        _ => Value::Text(text_at(array, row)?),
    };
    Ok(value)
}

/// Integer view of a cell. `UInt64` only when it fits.
fn integer_at(array: &dyn Array, row: usize) -> Option<i64> {
    let v = match array.data_type() {
        DataType::Boolean => i64::from(array.as_boolean().value(row)),
        DataType::Int8 => i64::from(array.as_primitive::<Int8Type>().value(row)),
        DataType::Int16 => i64::from(array.as_primitive::<Int16Type>().value(row)),
        DataType::Int32 => i64::from(array.as_primitive::<Int32Type>().value(row)),
        DataType::Int64 => array.as_primitive::<Int64Type>().value(row),
        DataType::UInt8 => i64::from(array.as_primitive::<UInt8Type>().value(row)),
        DataType::UInt16 => i64::from(array.as_primitive::<UInt16Type>().value(row)),
        DataType::UInt32 => i64::from(array.as_primitive::<UInt32Type>().value(row)),
        DataType::UInt64 => i64::try_from(array.as_primitive::<UInt64Type>().value(row)).ok()?,
        _ => return None,
    };
    Some(v)
}

fn float_at(array: &dyn Array, row: usize) -> Option<f64> {
    let v = match array.data_type() {
        DataType::Float16 => array.as_primitive::<Float16Type>().value(row).to_f64(),
        DataType::Float32 => f64::from(array.as_primitive::<Float32Type>().value(row)),
        DataType::Float64 => array.as_primitive::<Float64Type>().value(row),
        _ => return None,
    };
    Some(v)
}

fn text_at(array: &dyn Array, row: usize) -> Result<String> {
    let text = match array.data_type() {
        DataType::Utf8 => array.as_string::<i32>().value(row).to_string(),
        DataType::LargeUtf8 => array.as_string::<i64>().value(row).to_string(),
        DataType::Utf8View => array.as_string_view().value(row).to_string(),
        _ => array_value_to_string(array, row)?,
    };
    Ok(text)
}

/// JSON rendering of one cell, recursing into nested types.
pub fn json_value(array: &dyn Array, row: usize) -> Result<Json> {
    if array.is_null(row) {
        return Ok(Json::Null);
    }
    if let Some(i) = integer_at(array, row) {
        return Ok(match array.data_type() {
            DataType::Boolean => Json::Bool(i != 0),
            _ => Json::from(i),
        });
    }
    if let Some(f) = float_at(array, row) {
        return Ok(Number::from_f64(f).map_or(Json::Null, Json::Number));
    }

    let value = match array.data_type() {
        DataType::List(_) => json_list(array.as_list::<i32>().value(row).as_ref())?,
        DataType::LargeList(_) => json_list(array.as_list::<i64>().value(row).as_ref())?,
        DataType::FixedSizeList(_, _) => {
            json_list(array.as_fixed_size_list().value(row).as_ref())?
        }
        DataType::Struct(_) => {
            let strukt = array.as_struct();
            let mut object = Map::new();
            for (name, column) in strukt.column_names().into_iter().zip(strukt.columns()) {
                object.insert(name.to_string(), json_value(column.as_ref(), row)?);
            }
            Json::Object(object)
        }
        DataType::Map(_, _) => {
            let entries = array.as_map().value(row);
            let keys = entries.column(0);
            let values = entries.column(1);
            let mut object = Map::new();
            for i in 0..entries.len() {
                object.insert(text_at(keys.as_ref(), i)?, json_value(values.as_ref(), i)?);
            }
            Json::Object(object)
        }
        _ => Json::String(text_at(array, row)?),
    };
    Ok(value)
}

fn json_list(values: &dyn Array) -> Result<Json> {
    (0..values.len())
        .map(|i| json_value(values, i))
        .collect::<Result<Vec<_>>>()
        .map(Json::Array)
}
