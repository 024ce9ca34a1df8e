use std::cmp::Ordering;
use std::ops::Not;

use crate::entity::{CREATED_AT_COLUMN, Entity, ID_COLUMN};
use crate::error::{RepositoryError, Result};
use crate::value::Value;

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
        }
    }
}

/// A boolean condition over an entity's columns.
///
/// The same predicate renders to SQL for the Postgres context and evaluates
/// directly against entities for the in-memory context. Evaluation follows
/// SQL three-valued logic: `Ok(None)` is *unknown*, and only rows yielding
/// `Some(true)` pass a filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    Like {
        column: String,
        pattern: String,
    },
    IsNull {
        column: String,
        negated: bool,
    },
    In {
        column: String,
        values: Vec<Value>,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// Conjunction of every predicate; an empty input is always true.
    pub fn all(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::And(predicates.into_iter().collect())
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut parts) => {
                parts.push(other);
                Predicate::And(parts)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut parts) => {
                parts.push(other);
                Predicate::Or(parts)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }

    /// Evaluate against an entity.
    ///
    /// Referencing a column the entity does not have, or comparing values of
    /// incompatible types, is an error, mirroring what the database reports.
    pub fn evaluate<T: Entity>(&self, entity: &T) -> Result<Option<bool>> {
        match self {
            Predicate::Compare { column, op, value } => {
                let actual = column_of(entity, column)?;
                if actual.is_null() || value.is_null() {
                    return Ok(None);
                }
                let ordering = actual.sql_cmp(value).ok_or_else(|| {
                    RepositoryError::InvalidQuery(format!(
                        "cannot compare column \"{column}\" ({}) with {}",
                        actual.type_name(),
                        value.type_name()
                    ))
                })?;
                Ok(Some(op.holds(ordering)))
            }
            Predicate::Like { column, pattern } => {
                match column_of(entity, column)? {
                    Value::Null => Ok(None),
                    Value::Text(text) => Ok(Some(like_matches(&text, pattern))),
                    other => Err(RepositoryError::InvalidQuery(format!(
                        "LIKE requires a text column, \"{column}\" is {}",
                        other.type_name()
                    ))),
                }
            }
            Predicate::IsNull { column, negated } => {
                let is_null = column_of(entity, column)?.is_null();
                Ok(Some(is_null != *negated))
            }
            Predicate::In { column, values } => {
                let actual = column_of(entity, column)?;
                if actual.is_null() {
                    return Ok(None);
                }
                let mut unknown = false;
                for candidate in values {
                    if candidate.is_null() {
                        unknown = true;
                        continue;
                    }
                    if actual.sql_cmp(candidate) == Some(Ordering::Equal) {
                        return Ok(Some(true));
                    }
                }
                Ok(if unknown { None } else { Some(false) })
            }
            Predicate::And(parts) => {
                let mut result = Some(true);
                for part in parts {
                    match part.evaluate(entity)? {
                        Some(false) => return Ok(Some(false)),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                Ok(result)
            }
            Predicate::Or(parts) => {
                let mut result = Some(false);
                for part in parts {
                    match part.evaluate(entity)? {
                        Some(true) => return Ok(Some(true)),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                Ok(result)
            }
            Predicate::Not(inner) => Ok(inner.evaluate(entity)?.map(|v| !v)),
        }
    }

    /// `true` only when the predicate definitely holds.
    pub fn matches<T: Entity>(&self, entity: &T) -> Result<bool> {
        Ok(self.evaluate(entity)? == Some(true))
    }
}

impl Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Self::Output {
        match self {
            Predicate::Not(inner) => *inner,
            other => Predicate::Not(Box::new(other)),
        }
    }
}

fn column_of<T: Entity>(entity: &T, column: &str) -> Result<Value> {
    entity.column_value(column).ok_or_else(|| {
        RepositoryError::InvalidQuery(format!(
            "column \"{column}\" does not exist on \"{}\"",
            T::TABLE
        ))
    })
}

/// SQL `LIKE` matching: `%` is any run of characters, `_` exactly one.
fn like_matches(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    // dp[j]: pattern[..i] matches text[..j]
    let mut dp = vec![false; text.len() + 1];
    dp[0] = true;
    for p in &pattern {
        let mut next = vec![false; text.len() + 1];
        match p {
            '%' => {
                let mut seen = false;
                for j in 0..=text.len() {
                    seen |= dp[j];
                    next[j] = seen;
                }
            }
            '_' => {
                for j in 1..=text.len() {
                    next[j] = dp[j - 1];
                }
            }
            literal => {
                for j in 1..=text.len() {
                    next[j] = dp[j - 1] && text[j - 1] == *literal;
                }
            }
        }
        dp = next;
    }
    dp[text.len()]
}

/// Entry point for building predicates against a named column.
///
/// ```
/// use repokit_core::query::Column;
///
/// let adults = Column::new("Age").ge(18).and(Column::new("Name").like("A%"));
/// ```
#[derive(Debug, Clone)]
pub struct Column(String);

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn id() -> Self {
        Self::new(ID_COLUMN)
    }

    pub fn created_at() -> Self {
        Self::new(CREATED_AT_COLUMN)
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    fn compare(self, op: CompareOp, value: impl Into<Value>) -> Predicate {
        Predicate::Compare {
            column: self.0,
            op,
            value: value.into(),
        }
    }

    pub fn eq(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Eq, value)
    }

    pub fn ne(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Ne, value)
    }

    pub fn gt(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Gt, value)
    }

    pub fn ge(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Ge, value)
    }

    pub fn lt(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Lt, value)
    }

    pub fn le(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Le, value)
    }

    pub fn like(self, pattern: impl Into<String>) -> Predicate {
        Predicate::Like {
            column: self.0,
            pattern: pattern.into(),
        }
    }

    pub fn is_null(self) -> Predicate {
        Predicate::IsNull {
            column: self.0,
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Predicate {
        Predicate::IsNull {
            column: self.0,
            negated: true,
        }
    }

    pub fn in_list<V: Into<Value>>(
        self,
        values: impl IntoIterator<Item = V>,
    ) -> Predicate {
        Predicate::In {
            column: self.0,
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_handles_wildcards() {
        assert!(like_matches("Alice", "A%"));
        assert!(like_matches("Alice", "%ic%"));
        assert!(like_matches("Alice", "Al_ce"));
        assert!(!like_matches("Alice", "Al_e"));
        assert!(like_matches("", "%"));
        assert!(!like_matches("Bob", "A%"));
    }

    #[test]
    fn and_or_flatten() {
        let p = Column::new("A").eq(1).and(Column::new("B").eq(2)).and(
            Column::new("C").eq(3),
        );
        match p {
            Predicate::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("unexpected predicate {other:?}"),
        }
    }

    #[test]
    fn double_negation_collapses() {
        let p = Column::new("A").eq(1);
        assert_eq!(!!p.clone(), p);
    }

    #[test]
    fn comparison_operators_hold() {
        assert!(CompareOp::Ge.holds(Ordering::Equal));
        assert!(!CompareOp::Gt.holds(Ordering::Equal));
        assert!(CompareOp::Ne.holds(Ordering::Less));
    }
}
