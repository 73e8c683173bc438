//! Column definitions, type casting and the collection registry.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::{PervasiveError, PervasiveResult};

/// Primary key used when no attribute claims `primary_key`.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// SQL column types of the target dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    NVarChar,
    NText,
    Bit,
    Int,
    Float,
    Date,
    Time,
    DateTime,
    Text,
}

impl SqlType {
    /// Map a declared attribute type onto a column type.
    ///
    /// Unknown or missing types log a warning and fall back to `TEXT`; DDL
    /// generation never fails on a type.
    pub fn cast(declared: Option<&str>) -> Self {
        let lower = declared.map(str::to_ascii_lowercase);
        match lower.as_deref() {
            Some("string") => SqlType::NVarChar,
            Some("text" | "array" | "json") => SqlType::NText,
            Some("boolean") => SqlType::Bit,
            Some("int" | "integer") => SqlType::Int,
            Some("float" | "double") => SqlType::Float,
            Some("date") => SqlType::Date,
            Some("time") => SqlType::Time,
            Some("datetime") => SqlType::DateTime,
            other => {
                tracing::warn!(declared = ?other, "Unregistered type given, falling back to TEXT");
                SqlType::Text
            }
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sql = match self {
            SqlType::NVarChar => "NVARCHAR(255)",
            SqlType::NText => "NTEXT",
            SqlType::Bit => "BIT",
            SqlType::Int => "INT",
            SqlType::Float => "FLOAT",
            SqlType::Date => "DATE",
            SqlType::Time => "TIME",
            SqlType::DateTime => "DATETIME",
            SqlType::Text => "TEXT",
        };
        f.write_str(sql)
    }
}

/// Definition of a single attribute/column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnDef {
    #[serde(rename = "type", alias = "column_type")]
    pub column_type: Option<String>,
    #[serde(alias = "primaryKey")]
    pub primary_key: bool,
    pub unique: bool,
    #[serde(alias = "autoIncrement")]
    pub auto_increment: bool,
    pub indexed: bool,
    pub nullable: bool,
}

impl ColumnDef {
    pub fn new(column_type: impl Into<String>) -> Self {
        Self {
            column_type: Some(column_type.into()),
            ..Self::default()
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn sql_type(&self) -> SqlType {
        SqlType::cast(self.column_type.as_deref())
    }
}

/// Ordered attribute name → definition map.
pub type Definition = IndexMap<String, ColumnDef>;

/// A logical collection mapped onto one physical table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(default)]
    pub identity: String,
    #[serde(default, alias = "tableName")]
    pub table_name: Option<String>,
    #[serde(default, alias = "definition")]
    pub attributes: Definition,
}

impl Collection {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            ..Self::default()
        }
    }

    pub fn table_name(mut self, table: impl Into<String>) -> Self {
        self.table_name = Some(table.into());
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, def: ColumnDef) -> Self {
        self.attributes.insert(name.into(), def);
        self
    }

    /// Physical table name: the explicit table name, else the identity.
    pub fn table(&self) -> &str {
        self.table_name.as_deref().unwrap_or(&self.identity)
    }

    /// The last attribute flagged as primary key, or `id`.
    pub fn primary_key(&self) -> &str {
        self.attributes
            .iter()
            .filter(|(_, def)| def.primary_key)
            .map(|(name, _)| name.as_str())
            .last()
            .unwrap_or(DEFAULT_PRIMARY_KEY)
    }
}

/// Collections registered with an adapter, keyed by identity.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    collections: HashMap<String, Collection>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collection. The first registration of an identity wins.
    pub fn register(&mut self, collection: Collection) {
        self.collections
            .entry(collection.identity.clone())
            .or_insert(collection);
    }

    pub fn get(&self, identity: &str) -> PervasiveResult<&Collection> {
        self.collections
            .get(identity)
            .ok_or_else(|| PervasiveError::UnknownCollection(identity.to_string()))
    }

    /// Table name for an identity, falling back to the identity itself.
    pub fn table_for<'a>(&'a self, identity: &'a str) -> &'a str {
        self.collections
            .get(identity)
            .map(Collection::table)
            .unwrap_or(identity)
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

impl FromIterator<Collection> for Registry {
    fn from_iter<I: IntoIterator<Item = Collection>>(iter: I) -> Self {
        let mut registry = Registry::new();
        for collection in iter {
            registry.register(collection);
        }
        registry
    }
}

/// Marshal DESCRIBE output into attribute definitions.
///
/// Each row carries `ColumnName`, `TypeName` and the boolean flags
/// `AutoIncrement`, `PrimaryKey`, `Unique`, `Indexed`, `Nullable`.
pub fn normalize_schema<'a, I>(rows: I) -> Definition
where
    I: IntoIterator<Item = &'a IndexMap<String, Json>>,
{
    let flag = |row: &IndexMap<String, Json>, key: &str| match row.get(key) {
        Some(Json::Bool(b)) => *b,
        Some(Json::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    };

    rows.into_iter()
        .filter_map(|row| {
            let name = row.get("ColumnName")?.as_str()?.trim_end().to_string();
            let def = ColumnDef {
                column_type: row
                    .get("TypeName")
                    .and_then(Json::as_str)
                    .map(|t| t.trim_end().to_string()),
                primary_key: flag(row, "PrimaryKey"),
                unique: flag(row, "Unique"),
                auto_increment: flag(row, "AutoIncrement"),
                indexed: flag(row, "Indexed"),
                nullable: flag(row, "Nullable"),
            };
            Some((name, def))
        })
        .collect()
}
