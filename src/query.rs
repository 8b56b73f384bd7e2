//! Filter-to-SQL translation.
//!
//! Filters produce [`Predicates`]; the functions here turn them into
//! parameterized statements. Column names only ever come from an entity's
//! static column list, never from request input.
//!
//! Every read adds `deleted_at IS NULL` after the filter predicates, so
//! soft-deleted rows stay invisible.

use crate::error::{Error, Result};
use crate::store::{Column, SqlQuery, SqlValue};

/// Comparison operator of a single predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    /// Substring match; the value is wrapped in `%`.
    Like,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Op {
    pub fn as_sql(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Like => "LIKE",
            Op::Gt => ">",
            Op::Gte => ">=",
            Op::Lt => "<",
            Op::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: &'static str,
    pub op: Op,
    pub value: SqlValue,
}

/// Conjunction of predicates, in the order they were added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicates(Vec<Predicate>);

impl Predicates {
    pub fn new() -> Self {
        Predicates::default()
    }

    /// Add `column <op> value` when `value` is present.
    pub fn cmp<V: Into<SqlValue>>(mut self, column: &'static str, op: Op, value: Option<V>) -> Self {
        if let Some(value) = value {
            let value = match (op, value.into()) {
                (Op::Like, SqlValue::Text(text)) => SqlValue::Text(format!("%{}%", text)),
                (_, other) => other,
            };
            self.0.push(Predicate { column, op, value });
        }
        self
    }

    pub fn eq<V: Into<SqlValue>>(self, column: &'static str, value: Option<V>) -> Self {
        self.cmp(column, Op::Eq, value)
    }

    pub fn like<V: Into<SqlValue>>(self, column: &'static str, value: Option<V>) -> Self {
        self.cmp(column, Op::Like, value)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Predicate> {
        self.0.iter()
    }
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTerm {
    pub column: &'static str,
    pub descending: bool,
}

/// Parse a comma-separated `order_by` list (`col`, `col ASC`, `col DESC`).
///
/// Terms keep their order. Empty tokens are skipped.
///
/// # Errors
/// Returns `Error::BadRequest` for an unknown column or direction.
pub fn parse_order_by(raw: &str, columns: &[Column]) -> Result<Vec<OrderTerm>> {
    let mut terms = Vec::new();
    for token in raw.split(',') {
        let mut parts = token.split_whitespace();
        let Some(name) = parts.next() else {
            continue;
        };

        let column = columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::BadRequest(format!("unknown order_by column: {}", name)))?;

        let descending = match parts.next() {
            None => false,
            Some(dir) if dir.eq_ignore_ascii_case("asc") => false,
            Some(dir) if dir.eq_ignore_ascii_case("desc") => true,
            Some(dir) => {
                return Err(Error::BadRequest(format!(
                    "invalid order_by direction: {}",
                    dir
                )))
            }
        };
        if parts.next().is_some() {
            return Err(Error::BadRequest(format!(
                "invalid order_by term: {}",
                token.trim()
            )));
        }

        terms.push(OrderTerm {
            column: column.name,
            descending,
        });
    }
    Ok(terms)
}

fn column_list(columns: &[Column]) -> String {
    columns
        .iter()
        .map(|c| c.name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// `WHERE` clause for a read, numbering placeholders from `$1`.
fn where_clause(predicates: &Predicates, params: &mut Vec<SqlValue>) -> String {
    let mut parts = Vec::with_capacity(predicates.len() + 1);
    for predicate in predicates.iter() {
        params.push(predicate.value.clone());
        parts.push(format!(
            "{} {} ${}",
            predicate.column,
            predicate.op.as_sql(),
            params.len()
        ));
    }
    parts.push("deleted_at IS NULL".to_string());
    format!("WHERE {}", parts.join(" AND "))
}

/// `SELECT COUNT(*)` over the filtered set. Never limited.
pub fn count(table: &str, predicates: &Predicates) -> SqlQuery {
    let mut params = Vec::new();
    let clause = where_clause(predicates, &mut params);
    SqlQuery::new(format!("SELECT COUNT(*) FROM {} {}", table, clause), params)
}

/// Row fetch for one page. `limit`/`offset` are bound after the filter
/// parameters.
pub fn select_page(
    table: &str,
    columns: &[Column],
    predicates: &Predicates,
    order: &[OrderTerm],
    limit: i64,
    offset: i64,
) -> SqlQuery {
    let mut params = Vec::new();
    let mut sql = format!(
        "SELECT {} FROM {} {}",
        column_list(columns),
        table,
        where_clause(predicates, &mut params)
    );

    if !order.is_empty() {
        let terms: Vec<String> = order
            .iter()
            .map(|t| {
                if t.descending {
                    format!("{} DESC", t.column)
                } else {
                    t.column.to_string()
                }
            })
            .collect();
        sql.push_str(&format!(" ORDER BY {}", terms.join(", ")));
    }

    params.push(SqlValue::Int(limit));
    sql.push_str(&format!(" LIMIT ${}", params.len()));
    params.push(SqlValue::Int(offset));
    sql.push_str(&format!(" OFFSET ${}", params.len()));

    SqlQuery::new(sql, params)
}

/// First matching row.
pub fn select_one(table: &str, columns: &[Column], predicates: &Predicates) -> SqlQuery {
    let mut params = Vec::new();
    let sql = format!(
        "SELECT {} FROM {} {} LIMIT 1",
        column_list(columns),
        table,
        where_clause(predicates, &mut params)
    );
    SqlQuery::new(sql, params)
}

/// `INSERT` of every column except `id`, returning the generated id.
///
/// `values` is aligned with `columns`.
pub fn insert(table: &str, columns: &[Column], values: &[SqlValue]) -> SqlQuery {
    let (names, params): (Vec<&str>, Vec<SqlValue>) = columns
        .iter()
        .zip(values)
        .filter(|(c, _)| c.name != "id")
        .map(|(c, v)| (c.name, v.clone()))
        .unzip();
    let placeholders: Vec<String> = (1..=params.len()).map(|i| format!("${}", i)).collect();
    SqlQuery::new(
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING id",
            table,
            names.join(", "),
            placeholders.join(", ")
        ),
        params,
    )
}

/// `UPDATE` of every column except `id`, keyed by `id`.
pub fn update(table: &str, columns: &[Column], values: &[SqlValue], id: i64) -> SqlQuery {
    let mut params = Vec::new();
    let mut assignments = Vec::new();
    for (column, value) in columns.iter().zip(values) {
        if column.name == "id" {
            continue;
        }
        params.push(value.clone());
        assignments.push(format!("{} = ${}", column.name, params.len()));
    }
    params.push(SqlValue::Int(id));
    SqlQuery::new(
        format!(
            "UPDATE {} SET {} WHERE id = ${}",
            table,
            assignments.join(", "),
            params.len()
        ),
        params,
    )
}

/// Mark a row deleted in one statement.
pub fn soft_delete(
    table: &str,
    id: i64,
    deleted_by: i64,
    deleted_at: chrono::DateTime<chrono::Utc>,
) -> SqlQuery {
    SqlQuery::new(
        format!(
            "UPDATE {} SET deleted_by = $1, deleted_at = $2 WHERE id = $3",
            table
        ),
        vec![
            SqlValue::Int(deleted_by),
            SqlValue::Timestamp(deleted_at),
            SqlValue::Int(id),
        ],
    )
}

/// Physically remove a row.
pub fn hard_delete(table: &str, id: i64) -> SqlQuery {
    SqlQuery::new(
        format!("DELETE FROM {} WHERE id = $1", table),
        vec![SqlValue::Int(id)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ColumnType;
    use chrono::{TimeZone, Utc};

    const COLUMNS: &[Column] = &[
        Column::new("id", ColumnType::Int),
        Column::new("car_name", ColumnType::Text),
        Column::new("day_rate", ColumnType::Float),
    ];

    #[test]
    fn test_predicates_skip_absent_values() {
        let predicates = Predicates::new()
            .eq("id", None::<i64>)
            .like("car_name", Some("sedan"))
            .cmp("day_rate", Op::Gte, Some(10000.0));

        let collected: Vec<_> = predicates.iter().cloned().collect();
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0].value, SqlValue::Text("%sedan%".to_string()));
        assert_eq!(collected[1].op, Op::Gte);
    }

    #[test]
    fn test_count_has_no_limit() {
        let predicates = Predicates::new().cmp("day_rate", Op::Lt, Some(50000.0));
        let query = count("cars", &predicates);

        assert_eq!(
            query.sql,
            "SELECT COUNT(*) FROM cars WHERE day_rate < $1 AND deleted_at IS NULL"
        );
        assert_eq!(query.params, vec![SqlValue::Float(50000.0)]);
    }

    #[test]
    fn test_select_page_binds_limit_and_offset_last() {
        let predicates = Predicates::new().eq("id", Some(3i64));
        let order = parse_order_by("day_rate desc,car_name", COLUMNS).unwrap();
        let query = select_page("cars", COLUMNS, &predicates, &order, 10, 20);

        assert_eq!(
            query.sql,
            "SELECT id, car_name, day_rate FROM cars WHERE id = $1 AND deleted_at IS NULL \
             ORDER BY day_rate DESC, car_name LIMIT $2 OFFSET $3"
        );
        assert_eq!(
            query.params,
            vec![SqlValue::Int(3), SqlValue::Int(10), SqlValue::Int(20)]
        );
    }

    #[test]
    fn test_select_one_without_filter() {
        let query = select_one("cars", COLUMNS, &Predicates::new());
        assert_eq!(
            query.sql,
            "SELECT id, car_name, day_rate FROM cars WHERE deleted_at IS NULL LIMIT 1"
        );
        assert!(query.params.is_empty());
    }

    #[test]
    fn test_parse_order_by_keeps_order_and_skips_empty() {
        let terms = parse_order_by(" car_name ,, id DESC ,", COLUMNS).unwrap();
        assert_eq!(
            terms,
            vec![
                OrderTerm {
                    column: "car_name",
                    descending: false
                },
                OrderTerm {
                    column: "id",
                    descending: true
                },
            ]
        );
    }

    #[test]
    fn test_parse_order_by_rejects_injection() {
        assert!(matches!(
            parse_order_by("id; DROP TABLE cars", COLUMNS),
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            parse_order_by("id sideways", COLUMNS),
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            parse_order_by("id desc nulls", COLUMNS),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn test_insert_skips_id() {
        let values = vec![
            SqlValue::Int(0),
            SqlValue::Text("sedan".to_string()),
            SqlValue::Float(12000.0),
        ];
        let query = insert("cars", COLUMNS, &values);
        assert_eq!(
            query.sql,
            "INSERT INTO cars (car_name, day_rate) VALUES ($1, $2) RETURNING id"
        );
        assert_eq!(query.params.len(), 2);
    }

    #[test]
    fn test_update_keys_by_id() {
        let values = vec![
            SqlValue::Int(1),
            SqlValue::Text("sedan".to_string()),
            SqlValue::Float(12000.0),
        ];
        let query = update("cars", COLUMNS, &values, 1);
        assert_eq!(
            query.sql,
            "UPDATE cars SET car_name = $1, day_rate = $2 WHERE id = $3"
        );
        assert_eq!(query.params.last(), Some(&SqlValue::Int(1)));
    }

    #[test]
    fn test_delete_statements() {
        let at = Utc.with_ymd_and_hms(2022, 2, 22, 2, 0, 0).unwrap();
        let soft = soft_delete("cars", 1, 7, at);
        assert_eq!(
            soft.sql,
            "UPDATE cars SET deleted_by = $1, deleted_at = $2 WHERE id = $3"
        );
        assert_eq!(soft.params[0], SqlValue::Int(7));

        let hard = hard_delete("cars", 1);
        assert_eq!(hard.sql, "DELETE FROM cars WHERE id = $1");
    }
}
