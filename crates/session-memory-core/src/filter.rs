//! Metadata where-clauses.
//!
//! A [`WhereClause`] is a conjunction of [`Predicate`]s over the declared
//! metadata fields. Every backend evaluates the same clause with
//! [`WhereClause::matches`]; remote backends may additionally push parts of
//! it down to the server, but the local evaluation is authoritative.
//!
//! # Semantics
//!
//! | Field | `Eq` | `Contains` | `Gte` / `Lte` |
//! |-------|------|------------|---------------|
//! | `task`, `outcome`, `timestamp`, `sentiment` | exact | substring | lexicographic |
//! | `files` | any element equals | any element equals | rejected |
//! | `rating` | numeric | rejected | numeric |
//!
//! Records without a rating never satisfy a rating predicate.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{MemoryError, Result};
use crate::models::{MemoryMetadata, SentimentLabel};

/// The metadata fields a clause may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Task,
    Outcome,
    Files,
    Timestamp,
    Rating,
    Sentiment,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Task,
        Field::Outcome,
        Field::Files,
        Field::Timestamp,
        Field::Rating,
        Field::Sentiment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Task => "task",
            Field::Outcome => "outcome",
            Field::Files => "files",
            Field::Timestamp => "timestamp",
            Field::Rating => "rating",
            Field::Sentiment => "sentiment",
        }
    }

    fn is_text(&self) -> bool {
        matches!(
            self,
            Field::Task | Field::Outcome | Field::Timestamp | Field::Sentiment
        )
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        Field::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| MemoryError::InvalidFilter(format!("unknown field '{s}'")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Number(f64),
}

impl FilterValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FilterValue::Text(s) => Some(s),
            FilterValue::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FilterValue::Number(n) => Some(*n),
            FilterValue::Text(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FilterValue::Text(s) => Value::String(s.clone()),
            FilterValue::Number(n) => serde_json::json!(n),
        }
    }

    fn from_json(field: Field, value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(FilterValue::Text(s.clone())),
            Value::Number(n) => n.as_f64().map(FilterValue::Number).ok_or_else(|| {
                MemoryError::InvalidFilter(format!("'{field}' value {n} is not representable"))
            }),
            other => Err(MemoryError::InvalidFilter(format!(
                "'{field}' expects a string or number, got {other}"
            ))),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        FilterValue::Text(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        FilterValue::Text(s)
    }
}

impl From<SentimentLabel> for FilterValue {
    fn from(label: SentimentLabel) -> Self {
        FilterValue::Text(label.as_str().to_string())
    }
}

impl From<u8> for FilterValue {
    fn from(n: u8) -> Self {
        FilterValue::Number(f64::from(n))
    }
}

impl From<f64> for FilterValue {
    fn from(n: f64) -> Self {
        FilterValue::Number(n)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(FilterValue),
    Contains(FilterValue),
    Gte(FilterValue),
    Lte(FilterValue),
}

impl Condition {
    /// Operator name as written in the JSON form (`$eq`, `$contains`, ...).
    pub fn operator(&self) -> &'static str {
        match self {
            Condition::Eq(_) => "$eq",
            Condition::Contains(_) => "$contains",
            Condition::Gte(_) => "$gte",
            Condition::Lte(_) => "$lte",
        }
    }

    pub fn value(&self) -> &FilterValue {
        match self {
            Condition::Eq(v) | Condition::Contains(v) | Condition::Gte(v) | Condition::Lte(v) => v,
        }
    }

    fn from_operator(op: &str, value: FilterValue) -> Result<Self> {
        match op {
            "$eq" => Ok(Condition::Eq(value)),
            "$contains" => Ok(Condition::Contains(value)),
            "$gte" => Ok(Condition::Gte(value)),
            "$lte" => Ok(Condition::Lte(value)),
            _ => Err(MemoryError::InvalidFilter(format!("unknown operator '{op}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: Field,
    pub condition: Condition,
}

impl Predicate {
    fn validate(&self) -> Result<()> {
        let field = self.field;
        let op = self.condition.operator();
        let bad = |why: &str| Err(MemoryError::InvalidFilter(format!("{field} {op}: {why}")));

        match (field, &self.condition) {
            (Field::Rating, Condition::Contains(_)) => bad("rating does not support $contains"),
            (Field::Rating, c) if c.value().as_number().is_none() => bad("rating expects a number"),
            (Field::Files, Condition::Gte(_) | Condition::Lte(_)) => {
                bad("files supports only $eq and $contains")
            }
            (Field::Files, c) if c.value().as_text().is_none() => bad("files expects a string"),
            (f, c) if f.is_text() && c.value().as_text().is_none() => {
                bad("expects a string value")
            }
            (Field::Sentiment, Condition::Eq(FilterValue::Text(s))) => {
                match s.parse::<SentimentLabel>() {
                    Ok(_) => Ok(()),
                    Err(e) => bad(&e),
                }
            }
            _ => Ok(()),
        }
    }

    fn matches(&self, meta: &MemoryMetadata) -> bool {
        match self.field {
            Field::Task => match_text(&meta.task, &self.condition),
            Field::Outcome => match_text(&meta.outcome, &self.condition),
            Field::Timestamp => match_text(&meta.timestamp, &self.condition),
            Field::Sentiment => match_text(meta.sentiment.as_str(), &self.condition),
            Field::Files => match (&self.condition, self.condition.value().as_text()) {
                (Condition::Eq(_) | Condition::Contains(_), Some(want)) => {
                    meta.files.iter().any(|f| f == want)
                }
                _ => false,
            },
            Field::Rating => {
                let (Some(rating), Some(want)) = (meta.rating, self.condition.value().as_number())
                else {
                    return false;
                };
                let rating = f64::from(rating);
                match self.condition {
                    Condition::Eq(_) => rating == want,
                    Condition::Gte(_) => rating >= want,
                    Condition::Lte(_) => rating <= want,
                    Condition::Contains(_) => false,
                }
            }
        }
    }
}

fn match_text(actual: &str, condition: &Condition) -> bool {
    let Some(want) = condition.value().as_text() else {
        return false;
    };
    match condition {
        Condition::Eq(_) => actual == want,
        Condition::Contains(_) => actual.contains(want),
        Condition::Gte(_) => actual >= want,
        Condition::Lte(_) => actual <= want,
    }
}

/// A conjunction of predicates. The empty clause matches everything.
///
/// ```rust
/// use session_memory_core::filter::{Field, WhereClause};
///
/// let clause = WhereClause::new()
///     .eq(Field::Sentiment, "positive")
///     .gte(Field::Rating, 4u8);
/// assert_eq!(clause.predicates().len(), 2);
/// assert!(clause.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    predicates: Vec<Predicate>,
}

impl WhereClause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(self, field: Field, value: impl Into<FilterValue>) -> Self {
        self.and(field, Condition::Eq(value.into()))
    }

    pub fn contains(self, field: Field, value: impl Into<FilterValue>) -> Self {
        self.and(field, Condition::Contains(value.into()))
    }

    pub fn gte(self, field: Field, value: impl Into<FilterValue>) -> Self {
        self.and(field, Condition::Gte(value.into()))
    }

    pub fn lte(self, field: Field, value: impl Into<FilterValue>) -> Self {
        self.and(field, Condition::Lte(value.into()))
    }

    pub fn and(mut self, field: Field, condition: Condition) -> Self {
        self.predicates.push(Predicate { field, condition });
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Reject predicates whose operator or value type does not fit the field.
    pub fn validate(&self) -> Result<()> {
        self.predicates.iter().try_for_each(Predicate::validate)
    }

    pub fn matches(&self, meta: &MemoryMetadata) -> bool {
        self.predicates.iter().all(|p| p.matches(meta))
    }

    /// Parse the JSON form.
    ///
    /// A field maps either to a bare value (shorthand for `$eq`) or to an
    /// object of operators. `$and` takes an array of such objects.
    ///
    /// ```rust
    /// use serde_json::json;
    /// use session_memory_core::filter::WhereClause;
    ///
    /// let clause = WhereClause::from_json(&json!({
    ///     "outcome": {"$contains": "Redis"},
    ///     "rating": {"$gte": 4},
    ///     "sentiment": "positive"
    /// }))
    /// .unwrap();
    /// assert_eq!(clause.predicates().len(), 3);
    ///
    /// assert!(WhereClause::from_json(&json!({"author": "me"})).is_err());
    /// ```
    pub fn from_json(value: &Value) -> Result<Self> {
        let mut clause = WhereClause::new();
        clause.extend_from_json(value)?;
        clause.validate()?;
        Ok(clause)
    }

    fn extend_from_json(&mut self, value: &Value) -> Result<()> {
        let Value::Object(map) = value else {
            return Err(MemoryError::InvalidFilter(format!(
                "where-clause must be an object, got {value}"
            )));
        };

        for (key, spec) in map {
            if key == "$and" {
                let Value::Array(items) = spec else {
                    return Err(MemoryError::InvalidFilter("$and expects an array".into()));
                };
                for item in items {
                    self.extend_from_json(item)?;
                }
                continue;
            }

            let field: Field = key.parse()?;
            match spec {
                Value::Object(ops) => {
                    if ops.is_empty() {
                        return Err(MemoryError::InvalidFilter(format!(
                            "'{field}' has an empty operator object"
                        )));
                    }
                    for (op, raw) in ops {
                        let value = FilterValue::from_json(field, raw)?;
                        let condition = Condition::from_operator(op, value)?;
                        self.predicates.push(Predicate { field, condition });
                    }
                }
                scalar => {
                    let value = FilterValue::from_json(field, scalar)?;
                    self.predicates.push(Predicate {
                        field,
                        condition: Condition::Eq(value),
                    });
                }
            }
        }
        Ok(())
    }
}
