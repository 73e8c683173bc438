//! Typed criteria model.
//!
//! A criteria object arrives as MongoDB-style JSON:
//!
//! ```text
//! { "where": { "name": "Bob", "age": { "greaterThan": 21 } },
//!   "sort": { "name": 1 }, "limit": 10 }
//! ```
//!
//! The shape of every node (equality? IN list? comparator?) is resolved once
//! here, so the compiler never inspects raw JSON.

use serde::Deserialize;
use serde_json::{Map, Value as Json};

use crate::error::{PervasiveError, PervasiveResult};
use crate::value::Value;

/// Input to a SELECT.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Json")]
pub struct Criteria {
    pub filter: Option<Predicate>,
    pub sort: Vec<(String, SortOrder)>,
    pub group_by: Vec<String>,
    pub sum: Vec<String>,
    pub average: Vec<String>,
    pub min: Vec<String>,
    pub max: Vec<String>,
    pub limit: Option<u64>,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Numeric `1` sorts ascending; anything else (including `-1`) descending.
    pub fn from_json(direction: &Json) -> Self {
        if direction.as_f64() == Some(1.0) {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// One attribute map. Sibling clauses are implicitly ANDed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    pub clauses: Vec<Clause>,
}

/// A single key of an attribute map.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// `{ or: [ ... ] }`
    Or(Vec<Predicate>),
    /// `{ and: [ ... ] }`
    And(Vec<Predicate>),
    /// `{ like: { column: pattern, ... } }`
    Like(Vec<(String, Value)>),
    /// `{ column: condition }`
    Column { name: String, condition: Condition },
}

/// Condition on a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `col=val`, or `col IS NULL` for null
    Equals(Value),
    /// `col IN (...)`
    In(Vec<Value>),
    /// One or more comparators, ANDed
    Compare(Vec<(Comparator, Value)>),
}

/// Comparators accepted in a sub-attribute criteria object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Not,
    Like,
    Contains,
    StartsWith,
    EndsWith,
}

/// Both accepted spellings of every comparator key.
const COMPARATOR_KEYS: &[(&str, Comparator)] = &[
    ("<", Comparator::LessThan),
    ("lessThan", Comparator::LessThan),
    ("<=", Comparator::LessThanOrEqual),
    ("lessThanOrEqual", Comparator::LessThanOrEqual),
    (">", Comparator::GreaterThan),
    ("greaterThan", Comparator::GreaterThan),
    (">=", Comparator::GreaterThanOrEqual),
    ("greaterThanOrEqual", Comparator::GreaterThanOrEqual),
    ("!", Comparator::Not),
    ("not", Comparator::Not),
    ("like", Comparator::Like),
    ("contains", Comparator::Contains),
    ("startsWith", Comparator::StartsWith),
    ("endsWith", Comparator::EndsWith),
];

impl Comparator {
    /// Resolve a comparator key. Keys are case-sensitive.
    pub fn from_key(key: &str) -> Option<Self> {
        COMPARATOR_KEYS
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, c)| *c)
    }
}

/// An object is sub-attribute criteria once any key is a comparator.
fn is_sub_criteria(map: &Map<String, Json>) -> bool {
    map.keys().any(|k| Comparator::from_key(k).is_some())
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a criteria object from JSON.
    pub fn from_json(json: &Json) -> PervasiveResult<Self> {
        let obj = json
            .as_object()
            .ok_or_else(|| PervasiveError::invalid("criteria must be an object"))?;

        let mut criteria = Criteria::new();
        if let Some(filter) = obj.get("where").filter(|w| !w.is_null()) {
            let predicate = Predicate::from_json(filter)?;
            if !predicate.clauses.is_empty() {
                criteria.filter = Some(predicate);
            }
        }
        if let Some(sort) = obj.get("sort").filter(|s| !s.is_null()) {
            let sort = sort
                .as_object()
                .ok_or_else(|| PervasiveError::invalid("sort must be an object"))?;
            criteria.sort = sort
                .iter()
                .map(|(col, dir)| (col.clone(), SortOrder::from_json(dir)))
                .collect();
        }
        criteria.group_by = column_list(obj, "groupBy")?;
        criteria.sum = column_list(obj, "sum")?;
        criteria.average = column_list(obj, "average")?;
        criteria.min = column_list(obj, "min")?;
        criteria.max = column_list(obj, "max")?;
        criteria.limit = match obj.get("limit") {
            None | Some(Json::Null) => None,
            Some(limit) => Some(
                limit
                    .as_u64()
                    .ok_or_else(|| PervasiveError::invalid("limit must be a non-negative integer"))?,
            ),
        };

        Ok(criteria)
    }

    /// Set the WHERE predicate.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    /// Append an ORDER BY column.
    pub fn sort_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push((column.into(), order));
        self
    }

    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.group_by.push(column.into());
        self
    }

    pub fn sum(mut self, column: impl Into<String>) -> Self {
        self.sum.push(column.into());
        self
    }

    pub fn average(mut self, column: impl Into<String>) -> Self {
        self.average.push(column.into());
        self
    }

    pub fn min(mut self, column: impl Into<String>) -> Self {
        self.min.push(column.into());
        self
    }

    pub fn max(mut self, column: impl Into<String>) -> Self {
        self.max.push(column.into());
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// True when the select takes the aggregate/grouped form.
    pub fn is_aggregate(&self) -> bool {
        !self.group_by.is_empty() || self.has_calculation()
    }

    /// True when at least one of SUM/AVG/MIN/MAX is requested.
    pub fn has_calculation(&self) -> bool {
        !(self.sum.is_empty()
            && self.average.is_empty()
            && self.min.is_empty()
            && self.max.is_empty())
    }

    /// Reject grouping without an aggregate function.
    pub fn validate(&self) -> PervasiveResult<()> {
        if self.is_aggregate() && !self.has_calculation() {
            return Err(PervasiveError::GroupWithoutCalculation);
        }
        Ok(())
    }
}

impl TryFrom<Json> for Criteria {
    type Error = PervasiveError;

    fn try_from(json: Json) -> PervasiveResult<Self> {
        Criteria::from_json(&json)
    }
}

/// A string or array of strings, normalized into a fresh list. An empty
/// string counts as absent.
fn column_list(obj: &Map<String, Json>, key: &str) -> PervasiveResult<Vec<String>> {
    match obj.get(key) {
        None | Some(Json::Null) => Ok(Vec::new()),
        Some(Json::String(col)) if col.is_empty() => Ok(Vec::new()),
        Some(Json::String(col)) => Ok(vec![col.clone()]),
        Some(Json::Array(cols)) => cols
            .iter()
            .map(|c| {
                c.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| PervasiveError::invalid(format!("{key} expects column names")))
            })
            .collect(),
        Some(_) => Err(PervasiveError::invalid(format!(
            "{key} must be a column name or an array of column names"
        ))),
    }
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an attribute map.
    pub fn from_json(json: &Json) -> PervasiveResult<Self> {
        let map = json
            .as_object()
            .ok_or_else(|| PervasiveError::invalid("where clause must be an object"))?;

        let mut clauses = Vec::with_capacity(map.len());
        for (key, criterion) in map {
            clauses.push(parse_clause(key, criterion)?);
        }
        Ok(Self { clauses })
    }

    pub fn push(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    /// `column = value` (`IS NULL` for null).
    pub fn equals(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(Clause::Column {
            name: column.into(),
            condition: Condition::Equals(value.into()),
        })
    }

    /// `column IN (values...)`.
    pub fn is_in<V: Into<Value>>(
        self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.push(Clause::Column {
            name: column.into(),
            condition: Condition::In(values.into_iter().map(Into::into).collect()),
        })
    }

    /// `column <op> value`.
    pub fn compare(
        self,
        column: impl Into<String>,
        op: Comparator,
        value: impl Into<Value>,
    ) -> Self {
        self.push(Clause::Column {
            name: column.into(),
            condition: Condition::Compare(vec![(op, value.into())]),
        })
    }

    /// Top-level `like` map entry.
    pub fn like(self, column: impl Into<String>, pattern: impl Into<Value>) -> Self {
        self.push(Clause::Like(vec![(column.into(), pattern.into())]))
    }

    pub fn or(self, branches: Vec<Predicate>) -> Self {
        self.push(Clause::Or(branches))
    }

    pub fn and(self, branches: Vec<Predicate>) -> Self {
        self.push(Clause::And(branches))
    }
}

fn parse_clause(key: &str, criterion: &Json) -> PervasiveResult<Clause> {
    let lower = key.to_ascii_lowercase();

    if lower == "or" || lower == "and" {
        let branches = criterion
            .as_array()
            .ok_or_else(|| PervasiveError::invalid(format!("{key} expects an array of criteria")))?
            .iter()
            .map(Predicate::from_json)
            .collect::<PervasiveResult<Vec<_>>>()?;
        return Ok(if lower == "or" {
            Clause::Or(branches)
        } else {
            Clause::And(branches)
        });
    }

    // An array wins over the `like`/`not` keywords, so `{ like: [..] }` is an
    // IN list on a column literally named `like`.
    if let Json::Array(values) = criterion {
        return Ok(Clause::Column {
            name: key.to_string(),
            condition: Condition::In(values.iter().map(Value::from_json).collect()),
        });
    }

    if lower == "like" {
        let patterns = criterion
            .as_object()
            .ok_or_else(|| PervasiveError::invalid("like expects a map of column to pattern"))?
            .iter()
            .map(|(col, pattern)| (col.clone(), Value::from_json(pattern)))
            .collect();
        return Ok(Clause::Like(patterns));
    }

    if lower == "not" {
        return Err(PervasiveError::NotUnsupported);
    }

    Ok(Clause::Column {
        name: key.to_string(),
        condition: parse_condition(criterion)?,
    })
}

fn parse_condition(criterion: &Json) -> PervasiveResult<Condition> {
    let map = match criterion {
        Json::Object(map) if is_sub_criteria(map) => map,
        other => return Ok(Condition::Equals(Value::from_json(other))),
    };

    let mut comparisons = Vec::with_capacity(map.len());
    for (key, operand) in map {
        let op = Comparator::from_key(key)
            .ok_or_else(|| PervasiveError::UnknownComparator(key.clone()))?;
        if operand.as_object().is_some_and(is_sub_criteria) {
            return Err(PervasiveError::invalid(format!(
                "comparator {key} cannot take another comparator as operand"
            )));
        }
        comparisons.push((op, Value::from_json(operand)));
    }
    Ok(Condition::Compare(comparisons))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_equality_and_null() {
        let p = Predicate::from_json(&json!({ "name": "Bob", "deleted": null })).unwrap();
        assert_eq!(p, Predicate::new().equals("name", "Bob").equals("deleted", Value::Null));
    }

    #[test]
    fn test_parse_in_list() {
        let p = Predicate::from_json(&json!({ "id": [1, 2, 3] })).unwrap();
        assert_eq!(p, Predicate::new().is_in("id", [1, 2, 3]));
    }

    #[test]
    fn test_parse_comparator_synonyms() {
        let a = Predicate::from_json(&json!({ "age": { ">": 21 } })).unwrap();
        let b = Predicate::from_json(&json!({ "age": { "greaterThan": 21 } })).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, Predicate::new().compare("age", Comparator::GreaterThan, 21));
    }

    #[test]
    fn test_parse_unknown_comparator() {
        let err = Predicate::from_json(&json!({ "age": { "greaterThan": 1, "between": 5 } }))
            .unwrap_err();
        assert!(matches!(err, PervasiveError::UnknownComparator(k) if k == "between"));
    }

    #[test]
    fn test_plain_object_is_equality() {
        let p = Predicate::from_json(&json!({ "meta": { "color": "red" } })).unwrap();
        assert!(matches!(
            &p.clauses[0],
            Clause::Column { condition: Condition::Equals(Value::Json(_)), .. }
        ));
    }

    #[test]
    fn test_parse_conjunctions_case_insensitive() {
        let p = Predicate::from_json(&json!({ "OR": [{ "a": 1 }, { "b": 2 }] })).unwrap();
        assert_eq!(
            p,
            Predicate::new().or(vec![Predicate::new().equals("a", 1), Predicate::new().equals("b", 2)])
        );

        let err = Predicate::from_json(&json!({ "and": { "a": 1 } })).unwrap_err();
        assert!(err.is_usage());
    }

    #[test]
    fn test_top_level_not_rejected() {
        let err = Predicate::from_json(&json!({ "not": { "a": 1 } })).unwrap_err();
        assert!(matches!(err, PervasiveError::NotUnsupported));
    }

    #[test]
    fn test_array_beats_like_keyword() {
        let p = Predicate::from_json(&json!({ "like": ["x", "y"] })).unwrap();
        assert_eq!(p, Predicate::new().is_in("like", ["x", "y"]));
    }

    #[test]
    fn test_parse_criteria() {
        let criteria: Criteria = serde_json::from_value(json!({
            "where": { "name": "Bob" },
            "sort": { "name": 1, "age": -1 },
            "groupBy": "region",
            "sum": ["amount", "tax"],
            "limit": 5
        }))
        .unwrap();

        assert_eq!(criteria.filter, Some(Predicate::new().equals("name", "Bob")));
        assert_eq!(
            criteria.sort,
            vec![("name".to_string(), SortOrder::Asc), ("age".to_string(), SortOrder::Desc)]
        );
        assert_eq!(criteria.group_by, vec!["region"]);
        assert_eq!(criteria.sum, vec!["amount", "tax"]);
        assert_eq!(criteria.limit, Some(5));
    }

    #[test]
    fn test_parse_does_not_touch_input() {
        let input = json!({ "groupBy": "region", "sum": "amount" });
        let before = input.clone();
        let criteria = Criteria::from_json(&input).unwrap();
        assert_eq!(input, before);
        assert_eq!(criteria.group_by, vec!["region"]);
    }

    #[test]
    fn test_validate_group_without_calculation() {
        let criteria = Criteria::new().group_by("region");
        assert!(matches!(
            criteria.validate(),
            Err(PervasiveError::GroupWithoutCalculation)
        ));
        assert!(Criteria::new().group_by("region").max("amount").validate().is_ok());
        assert!(Criteria::new().validate().is_ok());
    }

    #[test]
    fn test_empty_where_is_absent() {
        let criteria = Criteria::from_json(&json!({ "where": {} })).unwrap();
        assert_eq!(criteria.filter, None);
    }
}
