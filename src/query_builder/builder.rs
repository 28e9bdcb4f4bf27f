use super::{Join, Pagination, SqlValue, WhereClause};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{Arguments, PgPool};

/// Query builder for the execution tables.
///
/// Every value reaches the database as a bind parameter; the builder only
/// ever splices identifiers and fixed SQL fragments into the text.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    base_table: String,
    select_fields: Vec<String>,
    joins: Vec<Join>,
    where_clauses: Vec<WhereClause>,
    order_by: Vec<String>,
    pagination: Option<Pagination>,
}

impl QueryBuilder {
    /// Create a new query builder for the given table
    pub fn new(table: &str) -> Self {
        Self {
            base_table: table.to_string(),
            select_fields: vec!["*".to_string()],
            joins: Vec::new(),
            where_clauses: Vec::new(),
            order_by: Vec::new(),
            pagination: None,
        }
    }

    /// Set specific fields to select
    pub fn select(mut self, fields: &[&str]) -> Self {
        self.select_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Add a JOIN clause
    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Add a LEFT JOIN
    pub fn left_join(self, table: &str, on_condition: &str) -> Self {
        self.join(Join::left(table, on_condition))
    }

    /// Add a WHERE clause
    pub fn where_clause(mut self, clause: WhereClause) -> Self {
        self.where_clauses.push(clause);
        self
    }

    /// Add a simple WHERE condition
    pub fn where_eq(self, field: &str, value: impl Into<SqlValue>) -> Self {
        self.where_clause(WhereClause::simple(field, "=", value))
    }

    /// Add an equality condition only when a value is given
    pub fn where_eq_opt(self, field: &str, value: Option<&String>) -> Self {
        match value {
            Some(value) => self.where_eq(field, value.as_str()),
            None => self,
        }
    }

    /// Add WHERE IN condition
    pub fn where_in(self, field: &str, values: Vec<SqlValue>) -> Self {
        self.where_clause(WhereClause::in_condition(field, values))
    }

    pub fn where_null(self, field: &str) -> Self {
        self.where_clause(WhereClause::is_null(field))
    }

    pub fn where_not_null(self, field: &str) -> Self {
        self.where_clause(WhereClause::is_not_null(field))
    }

    /// Add WHERE EXISTS subquery, its `?` placeholders bound to `values`
    pub fn where_exists(self, subquery: &str, values: Vec<SqlValue>) -> Self {
        self.where_clause(WhereClause::exists(subquery, values))
    }

    /// Add ORDER BY clause
    pub fn order_by(mut self, field: &str, direction: &str) -> Self {
        self.order_by.push(format!("{} {}", field, direction));
        self
    }

    /// Add ORDER BY ASC
    pub fn order_asc(self, field: &str) -> Self {
        self.order_by(field, "ASC")
    }

    /// Add LIMIT/OFFSET
    pub fn paginate(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    /// Build the complete SQL query string and its bind values
    pub fn build_sql(&self) -> (String, Vec<SqlValue>) {
        let mut binds = Vec::new();
        let mut sql = String::new();

        sql.push_str("SELECT ");
        sql.push_str(&self.select_fields.join(", "));
        sql.push_str(&format!(" FROM {}", self.base_table));

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.to_sql());
        }

        if !self.where_clauses.is_empty() {
            sql.push_str(" WHERE ");
            let where_parts: Vec<String> = self
                .where_clauses
                .iter()
                .map(|clause| clause.to_sql(&mut binds))
                .collect();
            sql.push_str(&where_parts.join(" AND "));
        }

        if !self.order_by.is_empty() {
            sql.push_str(&format!(" ORDER BY {}", self.order_by.join(", ")));
        }

        if let Some(ref pagination) = self.pagination {
            sql.push_str(&pagination.to_sql());
        }

        (sql, binds)
    }

    /// The same query as a row count, ignoring ordering and pagination
    pub fn build_count_sql(&self) -> (String, Vec<SqlValue>) {
        let mut count_builder = self.clone();
        count_builder.select_fields = vec!["COUNT(*)".to_string()];
        count_builder.order_by.clear();
        count_builder.pagination = None;
        count_builder.build_sql()
    }

    /// Execute the query and return all rows
    pub async fn fetch_all<T>(&self, pool: &PgPool) -> Result<Vec<T>, sqlx::Error>
    where
        T: for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin,
    {
        let (sql, binds) = self.build_sql();
        sqlx::query_as_with::<_, T, _>(&sql, arguments(&binds)?)
            .fetch_all(pool)
            .await
    }

    /// Execute count query
    pub async fn count(&self, pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (sql, binds) = self.build_count_sql();
        sqlx::query_scalar_with::<_, i64, _>(&sql, arguments(&binds)?)
            .fetch_one(pool)
            .await
    }
}

/// Encode bind values in placeholder order
pub fn arguments(binds: &[SqlValue]) -> Result<PgArguments, sqlx::Error> {
    let mut arguments = PgArguments::default();
    for value in binds {
        match value {
            SqlValue::Null => arguments.add(Option::<String>::None),
            SqlValue::Text(text) => arguments.add(text.clone()),
            SqlValue::Bool(flag) => arguments.add(*flag),
            SqlValue::BigInt(number) => arguments.add(*number),
            SqlValue::Timestamp(timestamp) => arguments.add(*timestamp),
        }
        .map_err(sqlx::Error::Encode)?;
    }
    Ok(arguments)
}
