use chrono::{DateTime, Utc};

/// A value bound to a positional placeholder instead of being spliced into SQL
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Text(String),
    Bool(bool),
    BigInt(i64),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    /// Native query parameters arrive as JSON; non-scalar values are bound as their JSON text
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => SqlValue::Null,
            serde_json::Value::Bool(flag) => SqlValue::Bool(*flag),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(integer) => SqlValue::BigInt(integer),
                None => SqlValue::Text(number.to_string()),
            },
            serde_json::Value::String(text) => SqlValue::Text(text.clone()),
            other => SqlValue::Text(other.to_string()),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::BigInt(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(value)
    }
}

/// Represents different types of SQL conditions
#[derive(Debug, Clone)]
pub enum Condition {
    Simple {
        field: String,
        operator: String,
        value: SqlValue,
    },
    In {
        field: String,
        values: Vec<SqlValue>,
    },
    IsNull {
        field: String,
    },
    IsNotNull {
        field: String,
    },
    /// Subquery whose placeholders are written as `?` and numbered on render
    Exists {
        subquery: String,
        values: Vec<SqlValue>,
    },
}

impl Condition {
    /// Render the condition, appending its bind values to `binds`
    pub fn to_sql(&self, binds: &mut Vec<SqlValue>) -> String {
        match self {
            Condition::Simple {
                field,
                operator,
                value,
            } => format!("{} {} {}", field, operator, placeholder(binds, value.clone())),
            // an empty IN list matches nothing
            Condition::In { values, .. } if values.is_empty() => "1=0".to_string(),
            Condition::In { field, values } => {
                let value_list = values
                    .iter()
                    .map(|value| placeholder(binds, value.clone()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{field} IN ({value_list})")
            }
            Condition::IsNull { field } => format!("{field} IS NULL"),
            Condition::IsNotNull { field } => format!("{field} IS NOT NULL"),
            Condition::Exists { subquery, values } => {
                let mut values = values.iter();
                let mut parts = subquery.split('?');
                let mut numbered = parts.next().unwrap_or_default().to_string();
                for part in parts {
                    match values.next() {
                        Some(value) => numbered.push_str(&placeholder(binds, value.clone())),
                        None => numbered.push('?'),
                    }
                    numbered.push_str(part);
                }
                format!("EXISTS ({numbered})")
            }
        }
    }
}

fn placeholder(binds: &mut Vec<SqlValue>, value: SqlValue) -> String {
    binds.push(value);
    format!("${}", binds.len())
}

/// One condition of a WHERE clause; the builder joins clauses with AND
#[derive(Debug, Clone)]
pub struct WhereClause {
    pub condition: Condition,
}

impl WhereClause {
    fn single(condition: Condition) -> Self {
        Self { condition }
    }

    /// Create a simple WHERE clause with a single condition
    pub fn simple(field: &str, operator: &str, value: impl Into<SqlValue>) -> Self {
        Self::single(Condition::Simple {
            field: field.to_string(),
            operator: operator.to_string(),
            value: value.into(),
        })
    }

    /// Create WHERE IN clause
    pub fn in_condition(field: &str, values: Vec<SqlValue>) -> Self {
        Self::single(Condition::In {
            field: field.to_string(),
            values,
        })
    }

    /// Create WHERE EXISTS clause
    pub fn exists(subquery: &str, values: Vec<SqlValue>) -> Self {
        Self::single(Condition::Exists {
            subquery: subquery.to_string(),
            values,
        })
    }

    pub fn is_null(field: &str) -> Self {
        Self::single(Condition::IsNull {
            field: field.to_string(),
        })
    }

    pub fn is_not_null(field: &str) -> Self {
        Self::single(Condition::IsNotNull {
            field: field.to_string(),
        })
    }

    /// Convert to SQL string, appending bind values in placeholder order
    pub fn to_sql(&self, binds: &mut Vec<SqlValue>) -> String {
        self.condition.to_sql(binds)
    }
}
