//! Criteria compiler.
//!
//! Turns criteria objects and attribute/value maps into SQL text for the
//! bracket-identifier dialect (`TOP n`, `@@IDENTITY`). Output is built by
//! concatenating clause fragments in a fixed order; every literal goes
//! through [`crate::format`].

use std::convert::Infallible;

use serde_json::Value as Json;

use crate::criteria::{Clause, Comparator, Condition, Criteria, Predicate};
use crate::error::{PervasiveError, PervasiveResult};
use crate::format::{escape_identifier, prepare_value, unquote};
use crate::schema::{ColumnDef, DEFAULT_PRIMARY_KEY, Definition, SqlType};
use crate::value::{Value, ValueMap};

/// Trait for converting predicate nodes to SQL.
pub trait ToSql {
    /// Convert this node to a SQL fragment.
    fn to_sql(&self) -> PervasiveResult<String>;
}

/// Render every item, appending `separator` after each one, then trim the
/// final separator. Empty input yields an empty string.
pub fn try_build<I, T, E, F>(items: I, separator: &str, mut render: F) -> Result<String, E>
where
    I: IntoIterator<Item = T>,
    F: FnMut(T) -> Result<String, E>,
{
    let mut sql = String::new();
    for item in items {
        sql.push_str(&render(item)?);
        sql.push_str(separator);
    }
    if sql.ends_with(separator) {
        sql.truncate(sql.len() - separator.len());
    }
    Ok(sql)
}

/// Infallible [`try_build`].
pub fn build<I, T, F>(items: I, separator: &str, mut render: F) -> String
where
    I: IntoIterator<Item = T>,
    F: FnMut(T) -> String,
{
    match try_build(items, separator, |item| Ok::<_, Infallible>(render(item))) {
        Ok(sql) => sql,
        Err(never) => match never {},
    }
}

/// Generate a SELECT statement.
///
/// Grouping or aggregate requests take the aggregate form, which emits only
/// the column list and `FROM`; `where`, `sort` and `limit` are not applied
/// there.
pub fn build_select(table: &str, criteria: &Criteria) -> PervasiveResult<String> {
    criteria.validate()?;

    if criteria.is_aggregate() {
        if criteria.filter.is_some() || !criteria.sort.is_empty() || criteria.limit.is_some() {
            tracing::warn!(table, "where/sort/limit are ignored by aggregate selects");
        }
        return Ok(aggregate_select(table, criteria));
    }

    let mut sql = String::from("SELECT ");

    // TOP is this dialect's LIMIT; zero means no limit
    if let Some(n) = criteria.limit.filter(|n| *n > 0) {
        sql.push_str(&format!("TOP {} ", n));
    }
    sql.push_str(&format!("* FROM {} ", table));
    sql.push_str(&serialize_options(criteria)?);

    Ok(sql)
}

/// Parse a JSON criteria object and generate its SELECT.
pub fn build_select_json(table: &str, criteria: &Json) -> PervasiveResult<String> {
    build_select(table, &Criteria::from_json(criteria)?)
}

fn aggregate_select(table: &str, criteria: &Criteria) -> String {
    let calculations = [
        ("SUM", &criteria.sum),
        ("AVG", &criteria.average),
        ("MAX", &criteria.max),
        ("MIN", &criteria.min),
    ];

    let columns = criteria.group_by.iter().cloned().chain(
        calculations
            .into_iter()
            .flat_map(|(func, cols)| cols.iter().map(move |c| format!("{func}({c}) AS {c}"))),
    );

    format!("SELECT {} FROM {} ", build(columns, ", ", |col| col), table)
}

/// WHERE, then ORDER BY, each followed by a single space.
fn serialize_options(criteria: &Criteria) -> PervasiveResult<String> {
    let mut sql = String::new();

    if let Some(predicate) = &criteria.filter {
        sql.push_str(&format!("WHERE {} ", predicate.to_sql()?));
    }

    if !criteria.sort.is_empty() {
        let order = build(&criteria.sort, ", ", |(col, dir)| {
            format!("{} {}", col, dir.as_sql())
        });
        sql.push_str(&format!("ORDER BY {} ", order));
    }

    Ok(sql)
}

/// Compile a predicate tree into the body of a WHERE clause.
pub fn build_where(predicate: &Predicate) -> PervasiveResult<String> {
    predicate.to_sql()
}

impl ToSql for Predicate {
    fn to_sql(&self) -> PervasiveResult<String> {
        try_build(&self.clauses, " AND ", Clause::to_sql)
    }
}

impl ToSql for Clause {
    fn to_sql(&self) -> PervasiveResult<String> {
        match self {
            Clause::Or(branches) => {
                let body = try_build(branches, " OR ", Predicate::to_sql)?;
                Ok(format!("( {} )", body))
            }
            Clause::And(branches) => {
                let body = try_build(branches, " AND ", Predicate::to_sql)?;
                Ok(format!("( {} )", body))
            }
            Clause::Like(patterns) => {
                try_build(patterns, " AND ", |(col, pattern)| like_clause(col, pattern))
            }
            Clause::Column { name, condition } => Ok(criterion(name, condition)),
        }
    }
}

/// Top-level `like` entry. `%%%` in the pattern stands for an escaped `%`.
fn like_clause(column: &str, pattern: &Value) -> PervasiveResult<String> {
    if matches!(pattern, Value::Regex(_)) {
        return Err(PervasiveError::RegexNotSupported);
    }
    let pattern = prepare_value(pattern).replace("%%%", "\\%");
    Ok(format!("{} LIKE {}", column, pattern))
}

fn criterion(column: &str, condition: &Condition) -> String {
    match condition {
        Condition::Equals(value) => equality(column, value),
        Condition::In(values) => {
            format!("{} IN ({})", column, build(values, ", ", prepare_value))
        }
        Condition::Compare(comparisons) => build(comparisons, " AND ", |(op, value)| {
            comparison(column, *op, value)
        }),
    }
}

fn equality(column: &str, value: &Value) -> String {
    if value.is_null() {
        format!("{} IS NULL", column)
    } else {
        format!("{}={}", column, prepare_value(value))
    }
}

/// Apply one comparator to a column.
pub fn comparison(column: &str, op: Comparator, value: &Value) -> String {
    let escaped = prepare_value(value);
    // LIKE patterns are re-quoted around the wildcards
    let naked = unquote(&escaped);

    match op {
        Comparator::LessThan => format!("{}<{}", column, escaped),
        Comparator::LessThanOrEqual => format!("{}<={}", column, escaped),
        Comparator::GreaterThan => format!("{}>{}", column, escaped),
        Comparator::GreaterThanOrEqual => format!("{}>={}", column, escaped),
        Comparator::Not if value.is_null() => format!("{} IS NOT NULL", column),
        Comparator::Not => format!("{}<>{}", column, escaped),
        Comparator::Like => format!("{} LIKE '{}'", column, naked),
        Comparator::Contains => format!("{} LIKE '%{}%'", column, naked),
        Comparator::StartsWith => format!("{} LIKE '{}%'", column, naked),
        Comparator::EndsWith => format!("{} LIKE '%{}'", column, naked),
    }
}

/// Comma-joined bare column names, in map order.
pub fn attributes(values: &ValueMap) -> String {
    build(values.keys(), ", ", |col| col.clone())
}

/// Comma-joined formatted literals, in map order.
pub fn values(values: &ValueMap) -> String {
    build(values.values(), ", ", prepare_value)
}

/// Generate an INSERT followed by the identity select that recovers the
/// generated key.
pub fn build_insert(table: &str, data: &ValueMap) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ({}); SELECT @@IDENTITY AS {}",
        table,
        attributes(data),
        values(data),
        escape_identifier(DEFAULT_PRIMARY_KEY)
    )
}

/// Equality list matching a flat value map, for WHERE clauses.
pub fn build_update_criteria(table: &str, data: &ValueMap) -> String {
    let _span = tracing::debug_span!("update_criteria", table).entered();
    build(data, " AND ", |(col, value)| equality(col, value))
}

/// Column definition fragment.
///
/// Integer primary keys become identity columns; any other primary key is
/// forced to a non-null `VARCHAR(255)`.
pub fn column_definition(name: &str, def: &ColumnDef) -> String {
    let sql_type = def.sql_type();

    if def.primary_key {
        if sql_type == SqlType::Int {
            return format!("{} {} IDENTITY(1,1) PRIMARY KEY", name, sql_type);
        }
        return format!("{} VARCHAR(255) NOT NULL PRIMARY KEY", name);
    }

    if def.unique {
        return format!("{} {} UNIQUE", name, sql_type);
    }

    format!("{} {} ", name, sql_type)
}

/// Comma-joined column definitions for a CREATE statement.
pub fn build_schema(table: &str, definition: &Definition) -> String {
    let _span = tracing::debug_span!("schema", table).entered();
    build(definition, ", ", |(name, def)| column_definition(name, def))
}

/// `ALTER TABLE ... ADD <column definition>`.
pub fn build_add_column(table: &str, name: &str, def: &ColumnDef) -> String {
    let _span = tracing::debug_span!("add_column", table).entered();
    format!("ALTER TABLE {} ADD {}", table, column_definition(name, def))
}

/// `ALTER TABLE ... DROP COLUMN <name>`.
pub fn build_drop_column(table: &str, name: &str) -> String {
    format!("ALTER TABLE {} DROP COLUMN {}", table, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::SortOrder;
    use serde_json::json;

    fn select(criteria: Json) -> String {
        build_select_json("T", &criteria).unwrap()
    }

    #[test]
    fn test_build_combinator() {
        let empty: Vec<String> = Vec::new();
        assert_eq!(build(&empty, ", ", |s| s.clone()), "");
        assert_eq!(build(["a"], ", ", |s| s.to_string()), "a");
        assert_eq!(build(["a", "b"], " AND ", |s| s.to_string()), "a AND b");
        // only one trailing separator is trimmed
        assert_eq!(build(["a, ", "b, "], ", ", |s| s.to_string()), "a, , b, ");
    }

    #[test]
    fn test_simple_select() {
        assert_eq!(select(json!({})), "SELECT * FROM T ");
    }

    #[test]
    fn test_select_with_where() {
        assert_eq!(
            select(json!({ "where": { "name": "Bob" } })),
            "SELECT * FROM T WHERE name='Bob' "
        );
    }

    #[test]
    fn test_select_with_limit() {
        assert_eq!(select(json!({ "limit": 10 })), "SELECT TOP 10 * FROM T ");
        assert_eq!(select(json!({ "limit": 0 })), "SELECT * FROM T ");
    }

    #[test]
    fn test_select_with_order() {
        assert_eq!(
            select(json!({ "sort": { "name": 1, "age": -1 } })),
            "SELECT * FROM T ORDER BY name ASC, age DESC "
        );
    }

    #[test]
    fn test_select_complex() {
        let criteria = Criteria::new()
            .filter(Predicate::new().equals("active", true))
            .sort_by("created_at", SortOrder::Desc)
            .limit(10);
        assert_eq!(
            build_select("users", &criteria).unwrap(),
            "SELECT TOP 10 * FROM users WHERE active=1 ORDER BY created_at DESC "
        );
    }

    #[test]
    fn test_aggregate_select() {
        assert_eq!(
            select(json!({ "sum": "amount", "groupBy": "region" })),
            "SELECT region, SUM(amount) AS amount FROM T "
        );
    }

    #[test]
    fn test_aggregate_order_and_ignored_clauses() {
        let sql = select(json!({
            "groupBy": ["region", "year"],
            "min": "low",
            "max": ["high"],
            "average": "mid",
            "sum": ["a", "b"],
            "where": { "region": "north" },
            "sort": { "year": 1 },
            "limit": 3
        }));
        assert_eq!(
            sql,
            "SELECT region, year, SUM(a) AS a, SUM(b) AS b, AVG(mid) AS mid, \
             MAX(high) AS high, MIN(low) AS low FROM T "
        );
    }

    #[test]
    fn test_group_without_calculation() {
        let err = build_select_json("T", &json!({ "groupBy": "x" })).unwrap_err();
        assert!(matches!(err, PervasiveError::GroupWithoutCalculation));
    }

    #[test]
    fn test_empty_group_by_is_absent() {
        for group in [json!(""), json!([]), json!(null)] {
            let sql = build_select_json("T", &json!({ "groupBy": group, "limit": 3 })).unwrap();
            assert_eq!(sql, "SELECT TOP 3 * FROM T ");
        }
        let sql = build_select_json("T", &json!({ "groupBy": "", "sum": "amount" })).unwrap();
        assert_eq!(sql, "SELECT SUM(amount) AS amount FROM T ");
    }

    #[test]
    fn test_comparators() {
        let cases = [
            (json!({ "age": { "<": 21 } }), "age<21"),
            (json!({ "age": { "lessThan": 21 } }), "age<21"),
            (json!({ "age": { "<=": 21 } }), "age<=21"),
            (json!({ "age": { "lessThanOrEqual": 21 } }), "age<=21"),
            (json!({ "age": { ">": 21 } }), "age>21"),
            (json!({ "age": { "greaterThan": 21 } }), "age>21"),
            (json!({ "age": { ">=": 21 } }), "age>=21"),
            (json!({ "age": { "greaterThanOrEqual": 21 } }), "age>=21"),
            (json!({ "age": { "!": 21 } }), "age<>21"),
            (json!({ "age": { "not": 21 } }), "age<>21"),
            (json!({ "age": { "!": null } }), "age IS NOT NULL"),
            (json!({ "age": { "not": null } }), "age IS NOT NULL"),
            (json!({ "name": { "like": "B%b" } }), "name LIKE 'B%b'"),
            (json!({ "name": { "contains": "ob" } }), "name LIKE '%ob%'"),
            (json!({ "name": { "startsWith": "B" } }), "name LIKE 'B%'"),
            (json!({ "name": { "endsWith": "b" } }), "name LIKE '%b'"),
        ];
        for (filter, expected) in cases {
            let predicate = Predicate::from_json(&filter).unwrap();
            assert_eq!(build_where(&predicate).unwrap(), expected);
        }
    }

    #[test]
    fn test_like_keeps_inner_escaping() {
        let predicate = Predicate::from_json(&json!({ "name": { "contains": "O'Br" } })).unwrap();
        assert_eq!(build_where(&predicate).unwrap(), "name LIKE '%O''Br%'");
    }

    #[test]
    fn test_multiple_comparators_are_anded() {
        let predicate =
            Predicate::from_json(&json!({ "age": { "greaterThan": 18, "lessThan": 65 } }))
                .unwrap();
        assert_eq!(build_where(&predicate).unwrap(), "age>18 AND age<65");
    }

    #[test]
    fn test_null_and_in() {
        let predicate =
            Predicate::from_json(&json!({ "deleted": null, "id": [1, "two", null] })).unwrap();
        assert_eq!(
            build_where(&predicate).unwrap(),
            "deleted IS NULL AND id IN (1, 'two', NULL)"
        );
    }

    #[test]
    fn test_or_conditions() {
        let predicate = Predicate::from_json(&json!({ "or": [{ "a": 1 }, { "b": 2 }] })).unwrap();
        assert_eq!(build_where(&predicate).unwrap(), "( a=1 OR b=2 )");
    }

    #[test]
    fn test_nested_and_or() {
        let predicate = Predicate::from_json(&json!({
            "active": true,
            "and": [
                { "or": [{ "role": "admin" }, { "role": "mod" }] },
                { "age": { ">": 18 } }
            ]
        }))
        .unwrap();
        assert_eq!(
            build_where(&predicate).unwrap(),
            "active=1 AND ( ( role='admin' OR role='mod' ) AND age>18 )"
        );
    }

    #[test]
    fn test_top_level_like() {
        let predicate =
            Predicate::from_json(&json!({ "like": { "name": "100%%% sure", "city": "Ber%" } }))
                .unwrap();
        assert_eq!(
            build_where(&predicate).unwrap(),
            "name LIKE '100\\% sure' AND city LIKE 'Ber%'"
        );
    }

    #[test]
    fn test_top_level_like_rejects_regex() {
        let err = build_select_json("T", &json!({ "where": { "like": { "name": { "$regex": "^B" } } } }))
            .unwrap_err();
        assert!(matches!(err, PervasiveError::RegexNotSupported));
    }

    #[test]
    fn test_top_level_not_fails() {
        let err = build_select_json("T", &json!({ "where": { "not": { "a": 1 } } })).unwrap_err();
        assert!(matches!(err, PervasiveError::NotUnsupported));
    }

    #[test]
    fn test_insert() {
        let data: ValueMap = [("name".to_string(), Value::from("Bob")), ("age".to_string(), 30.into())]
            .into_iter()
            .collect();
        assert_eq!(
            build_insert("T", &data),
            "INSERT INTO T (name, age) VALUES ('Bob', 30); SELECT @@IDENTITY AS [id]"
        );
    }

    #[test]
    fn test_update_criteria() {
        let data: ValueMap = [
            ("name".to_string(), Value::from("Bob")),
            ("email".to_string(), Value::Null),
        ]
        .into_iter()
        .collect();
        assert_eq!(build_update_criteria("T", &data), "name='Bob' AND email IS NULL");
    }

    #[test]
    fn test_column_definitions() {
        assert_eq!(
            column_definition("id", &ColumnDef::new("integer").primary_key()),
            "id INT IDENTITY(1,1) PRIMARY KEY"
        );
        assert_eq!(
            column_definition("code", &ColumnDef::new("string").primary_key().unique()),
            "code VARCHAR(255) NOT NULL PRIMARY KEY"
        );
        assert_eq!(
            column_definition("email", &ColumnDef::new("string").unique()),
            "email NVARCHAR(255) UNIQUE"
        );
        assert_eq!(column_definition("age", &ColumnDef::new("int")), "age INT ");
        assert_eq!(column_definition("blob", &ColumnDef::new("binary")), "blob TEXT ");
    }

    #[test]
    fn test_schema_and_alter() {
        let mut def = Definition::new();
        def.insert("id".into(), ColumnDef::new("integer").primary_key());
        def.insert("name".into(), ColumnDef::new("string"));
        def.insert("active".into(), ColumnDef::new("boolean"));
        assert_eq!(
            build_schema("T", &def),
            "id INT IDENTITY(1,1) PRIMARY KEY, name NVARCHAR(255) , active BIT "
        );
        assert_eq!(
            build_add_column("T", "born", &ColumnDef::new("date")),
            "ALTER TABLE T ADD born DATE "
        );
        assert_eq!(build_drop_column("T", "born"), "ALTER TABLE T DROP COLUMN born");
    }
}
