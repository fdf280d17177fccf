//! SQL data type definitions.

use core::fmt;

/// SQL data types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    // Integer types
    /// Small integer (2 bytes).
    Smallint,
    /// Integer (4 bytes).
    Integer,
    /// Big integer (8 bytes).
    Bigint,

    // Floating point
    /// Real (4-byte float).
    Real,
    /// Double precision (8-byte float).
    Double,
    /// Numeric with precision and scale.
    Numeric {
        /// Total number of digits.
        precision: Option<u16>,
        /// Number of digits after decimal point.
        scale: Option<u16>,
    },

    // String types
    /// Variable-length character string.
    Varchar(Option<u32>),
    /// Text (variable length, no limit).
    Text,

    /// Binary large object.
    Blob,

    // Date/time types
    /// Date.
    Date,
    /// Time.
    Time,
    /// Timestamp.
    Timestamp,
    /// Time interval.
    Interval,

    /// Boolean.
    Boolean,
    /// JSON document.
    Json,

    /// Any other backend type, rendered verbatim.
    Custom(String),
}

impl DataType {
    /// Returns the SQL representation of the data type.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Smallint => String::from("SMALLINT"),
            Self::Integer => String::from("INTEGER"),
            Self::Bigint => String::from("BIGINT"),
            Self::Real => String::from("REAL"),
            Self::Double => String::from("DOUBLE PRECISION"),
            Self::Numeric { precision, scale } => match (precision, scale) {
                (Some(p), Some(s)) => format!("NUMERIC({p}, {s})"),
                (Some(p), None) => format!("NUMERIC({p})"),
                _ => String::from("NUMERIC"),
            },
            Self::Varchar(len) => match len {
                Some(n) => format!("VARCHAR({n})"),
                None => String::from("VARCHAR"),
            },
            Self::Text => String::from("TEXT"),
            Self::Blob => String::from("BLOB"),
            Self::Date => String::from("DATE"),
            Self::Time => String::from("TIME"),
            Self::Timestamp => String::from("TIMESTAMP"),
            Self::Interval => String::from("INTERVAL"),
            Self::Boolean => String::from("BOOLEAN"),
            Self::Json => String::from("JSON"),
            Self::Custom(name) => name.clone(),
        }
    }

    /// Parses a type name as written in catalogs and snippets.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// Unknown names become [`DataType::Custom`] with the name upper-cased.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let upper = name.trim().to_ascii_uppercase();
        match upper.as_str() {
            "SMALLINT" => Self::Smallint,
            "INT" | "INTEGER" => Self::Integer,
            "BIGINT" => Self::Bigint,
            "REAL" | "FLOAT" => Self::Real,
            "DOUBLE" | "DOUBLE PRECISION" => Self::Double,
            "NUMERIC" | "DECIMAL" => Self::Numeric {
                precision: None,
                scale: None,
            },
            "VARCHAR" | "STRING" => Self::Varchar(None),
            "TEXT" => Self::Text,
            "BLOB" | "BYTEA" => Self::Blob,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "TIMESTAMP" | "DATETIME" => Self::Timestamp,
            "INTERVAL" => Self::Interval,
            "BOOL" | "BOOLEAN" => Self::Boolean,
            "JSON" | "JSONB" => Self::Json,
            _ => Self::Custom(upper),
        }
    }

    /// Returns true for types holding semi-structured documents.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self, Self::Json)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// A column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Data type.
    pub data_type: DataType,
    /// Whether the column is nullable.
    pub nullable: bool,
    /// Whether this is a primary key.
    pub primary_key: bool,
}

impl ColumnDef {
    /// Creates a new column definition.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            primary_key: false,
        }
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the column as PRIMARY KEY.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }
}
