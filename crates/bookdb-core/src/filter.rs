//! Structured pre-filters for vector search.
//!
//! A filter is a conjunction of predicates over whitelisted scalar fields.
//! It can be parsed from the Mongo-style JSON shape callers already use
//! (`{"year": 2001}`, `{"pages": {"$lt": 121}}`), evaluated in memory, or
//! rendered as an SQL predicate for the store.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterField {
    Year,
    Pages,
}

impl FilterField {
    pub const ALL: [FilterField; 2] = [FilterField::Year, FilterField::Pages];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterField::Year => "year",
            FilterField::Pages => "pages",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    fn from_operator(op: &str) -> Option<Self> {
        Some(match op {
            "$eq" => Comparison::Eq,
            "$ne" => Comparison::Ne,
            "$gt" => Comparison::Gt,
            "$gte" => Comparison::Gte,
            "$lt" => Comparison::Lt,
            "$lte" => Comparison::Lte,
            _ => return None,
        })
    }

    fn sql(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "!=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
        }
    }

    fn holds(&self, left: i64, right: i64) -> bool {
        match self {
            Comparison::Eq => left == right,
            Comparison::Ne => left != right,
            Comparison::Gt => left > right,
            Comparison::Gte => left >= right,
            Comparison::Lt => left < right,
            Comparison::Lte => left <= right,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Compare(Comparison, i64),
    In(Vec<i64>),
    NotIn(Vec<i64>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub field: FilterField,
    pub condition: Condition,
}

impl Predicate {
    fn matches(&self, value: i64) -> bool {
        match &self.condition {
            Condition::Compare(cmp, rhs) => cmp.holds(value, *rhs),
            Condition::In(values) => values.contains(&value),
            Condition::NotIn(values) => !values.contains(&value),
        }
    }

    fn to_sql(&self) -> String {
        let column = self.field.as_str();
        let list = |values: &[i64]| values.iter().map(i64::to_string).collect::<Vec<_>>().join(", ");
        match &self.condition {
            Condition::Compare(cmp, rhs) => format!("{column} {} {rhs}", cmp.sql()),
            // An empty IN list is never true, an empty NOT IN list always is.
            Condition::In(values) if values.is_empty() => "FALSE".to_string(),
            Condition::NotIn(values) if values.is_empty() => "TRUE".to_string(),
            Condition::In(values) => format!("{column} IN ({})", list(values)),
            Condition::NotIn(values) => format!("{column} NOT IN ({})", list(values)),
        }
    }
}

/// Conjunction of predicates; empty means "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VectorFilter {
    predicates: Vec<Predicate>,
}

impl VectorFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn and(mut self, field: FilterField, condition: Condition) -> Self {
        self.predicates.push(Predicate { field, condition });
        self
    }

    pub fn eq(self, field: FilterField, value: i64) -> Self {
        self.and(field, Condition::Compare(Comparison::Eq, value))
    }

    pub fn fields(&self) -> impl Iterator<Item = FilterField> + '_ {
        self.predicates.iter().map(|p| p.field)
    }

    /// Evaluate against a chunk's denormalized scalar fields.
    pub fn matches(&self, year: i64, pages: i64) -> bool {
        self.predicates.iter().all(|p| match p.field {
            FilterField::Year => p.matches(year),
            FilterField::Pages => p.matches(pages),
        })
    }

    /// SQL rendering for the store's `WHERE` clause; `None` when unrestricted.
    pub fn to_sql(&self) -> Option<String> {
        if self.predicates.is_empty() {
            return None;
        }
        Some(self.predicates.iter().map(Predicate::to_sql).collect::<Vec<_>>().join(" AND "))
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        let mut filter = Self::new();
        filter.extend_from_json(value)?;
        Ok(filter)
    }

    fn extend_from_json(&mut self, value: &Value) -> Result<()> {
        let obj = match value {
            Value::Null => return Ok(()),
            Value::Object(obj) => obj,
            other => return Err(Error::InvalidFilter(format!("expected an object, got {other}"))),
        };
        for (key, spec) in obj {
            if key == "$and" {
                let clauses = spec
                    .as_array()
                    .ok_or_else(|| Error::InvalidFilter("$and expects an array".into()))?;
                for clause in clauses {
                    self.extend_from_json(clause)?;
                }
                continue;
            }
            let field = FilterField::parse(key)
                .ok_or_else(|| Error::InvalidFilter(format!("field '{key}' is not filterable")))?;
            match spec {
                Value::Object(ops) => {
                    for (op, operand) in ops {
                        let condition = parse_condition(op, operand)?;
                        self.predicates.push(Predicate { field, condition });
                    }
                }
                scalar => {
                    let value = as_integer(scalar)?;
                    self.predicates.push(Predicate { field, condition: Condition::Compare(Comparison::Eq, value) });
                }
            }
        }
        Ok(())
    }
}

impl FromStr for VectorFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Ok(Self::new());
        }
        let value: Value = serde_json::from_str(s).map_err(|e| Error::InvalidFilter(e.to_string()))?;
        Self::from_json(&value)
    }
}

fn parse_condition(op: &str, operand: &Value) -> Result<Condition> {
    if let Some(cmp) = Comparison::from_operator(op) {
        return Ok(Condition::Compare(cmp, as_integer(operand)?));
    }
    let list = || -> Result<Vec<i64>> {
        operand
            .as_array()
            .ok_or_else(|| Error::InvalidFilter(format!("{op} expects an array")))?
            .iter()
            .map(as_integer)
            .collect()
    };
    match op {
        "$in" => Ok(Condition::In(list()?)),
        "$nin" => Ok(Condition::NotIn(list()?)),
        other => Err(Error::InvalidFilter(format!("unsupported operator '{other}'"))),
    }
}

fn as_integer(value: &Value) -> Result<i64> {
    value
        .as_i64()
        .ok_or_else(|| Error::InvalidFilter(format!("expected an integer, got {value}")))
}
