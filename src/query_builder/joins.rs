/// A LEFT JOIN; the execution queries only ever outer-join their detail tables
#[derive(Debug, Clone)]
pub struct Join {
    pub table: String,
    pub on_condition: String,
}

impl Join {
    /// Create a LEFT JOIN
    pub fn left(table: &str, on_condition: &str) -> Self {
        Self {
            table: table.to_string(),
            on_condition: on_condition.to_string(),
        }
    }

    /// Convert to SQL string
    pub fn to_sql(&self) -> String {
        format!("LEFT JOIN {} ON {}", self.table, self.on_condition)
    }
}
