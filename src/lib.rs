//! # pervasive-sql
//!
//! Compiles MongoDB-style criteria objects into SQL for the bracket-identifier
//! dialect spoken by Pervasive / SQL Server (`[id]`, `TOP n`, `@@IDENTITY`).
//!
//! ## Quick Example
//!
//! ```
//! use pervasive_sql::prelude::*;
//! use serde_json::json;
//!
//! let sql = build_select_json("users", &json!({
//!     "where": { "name": "Bob", "age": { "greaterThan": 21 } },
//!     "sort": { "name": 1 },
//!     "limit": 10
//! }))
//! .unwrap();
//!
//! assert_eq!(
//!     sql,
//!     "SELECT TOP 10 * FROM users WHERE name='Bob' AND age>21 ORDER BY name ASC "
//! );
//! ```
//!
//! ## Comparators
//!
//! | Key                           | SQL                  |
//! |-------------------------------|----------------------|
//! | `<` / `lessThan`              | `col<val`            |
//! | `<=` / `lessThanOrEqual`      | `col<=val`           |
//! | `>` / `greaterThan`           | `col>val`            |
//! | `>=` / `greaterThanOrEqual`   | `col>=val`           |
//! | `!` / `not`                   | `col<>val`, `IS NOT NULL` |
//! | `like`                        | `col LIKE 'val'`     |
//! | `contains`                    | `col LIKE '%val%'`   |
//! | `startsWith`                  | `col LIKE 'val%'`    |
//! | `endsWith`                    | `col LIKE '%val'`    |

pub mod config;
pub mod criteria;
pub mod engine;
pub mod error;
pub mod format;
pub mod schema;
pub mod transpiler;
pub mod value;

pub mod prelude {
    pub use crate::criteria::*;
    pub use crate::engine::{Adapter, Executor, Row};
    pub use crate::error::*;
    pub use crate::format::{escape_identifier, escape_value};
    pub use crate::schema::{Collection, ColumnDef, Definition, Registry};
    pub use crate::transpiler::{
        ToSql, build_add_column, build_drop_column, build_insert, build_schema, build_select,
        build_select_json, build_update_criteria,
    };
    pub use crate::value::{Value, ValueMap};
}

pub use format::{escape_identifier, escape_value};
pub use transpiler::{
    build_add_column, build_drop_column, build_insert, build_schema, build_select,
    build_update_criteria,
};
