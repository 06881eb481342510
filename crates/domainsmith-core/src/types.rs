use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Source-independent field type tag shared by every introspector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalType {
    Integer,
    Float,
    Decimal,
    String,
    Boolean,
    Date,
    Datetime,
    Time,
    BinaryId,
    Map,
    Unknown,
}

impl CanonicalType {
    /// Tag used in rendered artifacts.
    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalType::Integer => "integer",
            CanonicalType::Float => "float",
            CanonicalType::Decimal => "decimal",
            CanonicalType::String => "string",
            CanonicalType::Boolean => "boolean",
            CanonicalType::Date => "date",
            CanonicalType::Datetime => "datetime",
            CanonicalType::Time => "time",
            CanonicalType::BinaryId => "binary_id",
            CanonicalType::Map => "map",
            CanonicalType::Unknown => "unknown",
        }
    }

    /// Whether the type is a plain scalar worth showing in a default selection.
    pub fn is_selectable(self) -> bool {
        !matches!(self, CanonicalType::BinaryId | CanonicalType::Map)
    }
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parsed = match value {
            "integer" => CanonicalType::Integer,
            "float" => CanonicalType::Float,
            "decimal" => CanonicalType::Decimal,
            "string" => CanonicalType::String,
            "boolean" => CanonicalType::Boolean,
            "date" => CanonicalType::Date,
            "datetime" => CanonicalType::Datetime,
            "time" => CanonicalType::Time,
            "binary_id" => CanonicalType::BinaryId,
            "map" => CanonicalType::Map,
            "unknown" => CanonicalType::Unknown,
            other => return Err(format!("unknown canonical type: {other}")),
        };
        Ok(parsed)
    }
}

/// Map a source-system scalar type name to its canonical tag.
///
/// Accepts catalog spellings (`integer`, `character varying(255)`,
/// `timestamp with time zone`, `int4`, ...) as well as object-schema
/// spellings (`id`, `utc_datetime`, `binary_id`, ...). Matching is
/// case-insensitive and never fails: anything unrecognized maps to
/// [`CanonicalType::String`].
pub fn map_type(source_type: &str) -> CanonicalType {
    let lowered = source_type.trim().to_ascii_lowercase();
    let base = lowered
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_start_matches(':');

    match base {
        "integer" | "int" | "int2" | "int4" | "int8" | "smallint" | "bigint" | "serial"
        | "serial2" | "serial4" | "serial8" | "smallserial" | "bigserial" | "id" | "oid" => {
            return CanonicalType::Integer;
        }
        "character varying" | "varchar" | "character" | "char" | "bpchar" | "text"
        | "citext" | "name" | "string" => return CanonicalType::String,
        "boolean" | "bool" => return CanonicalType::Boolean,
        "numeric" | "decimal" | "money" => return CanonicalType::Decimal,
        "real" | "double precision" | "float" | "float4" | "float8" => {
            return CanonicalType::Float;
        }
        "date" => return CanonicalType::Date,
        "uuid" | "binary_id" => return CanonicalType::BinaryId,
        "json" | "jsonb" | "map" | "hstore" => return CanonicalType::Map,
        _ => {}
    }

    // Order matters: "timestamp" and "timetz" both start with "time".
    if base.starts_with("timestamp")
        || base.starts_with("utc_datetime")
        || base.starts_with("naive_datetime")
        || base.starts_with("datetime")
    {
        CanonicalType::Datetime
    } else if base.starts_with("time") {
        CanonicalType::Time
    } else {
        CanonicalType::String
    }
}
