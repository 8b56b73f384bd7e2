//! Domain records, filter descriptors and pagination.

use crate::error::Result;
use crate::query::Predicates;
use crate::store::{Column, Row, SqlValue};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

pub mod car;
pub mod order;

pub use car::{Car, CarFilter, CreateCar, UpdateCar};
pub use order::{CreateOrder, Order, OrderFilter, UpdateOrder};

/// Trait implemented by every record the managers handle.
///
/// # Example
///
/// ```
/// use carrent_core::model::{Car, Entity};
///
/// assert_eq!(Car::entity_name(), "Car");
/// assert_eq!(Car::table(), "cars");
/// ```
pub trait Entity: Send + Sync + Serialize + DeserializeOwned + Clone + Debug + 'static {
    /// Filter descriptor used for lookups of this entity.
    type Filter: Filter;

    /// Name used in cache keys, e.g. `gspCar:...`.
    fn entity_name() -> &'static str;

    /// Backing table.
    fn table() -> &'static str;

    /// Table columns in declaration order, `id` first.
    fn columns() -> &'static [Column];

    fn id(&self) -> i64;

    fn set_id(&mut self, id: i64);

    fn audit(&self) -> &Audit;

    fn audit_mut(&mut self) -> &mut Audit;

    /// Column values, aligned with [`Entity::columns`].
    fn values(&self) -> Vec<SqlValue>;

    /// Decode a row fetched with [`Entity::columns`].
    ///
    /// # Errors
    /// Returns `Error::Database` if a column is missing or has the wrong type.
    fn from_row(row: &Row) -> Result<Self>;

    /// Inverse of [`Entity::from_row`].
    fn to_row(&self) -> Row {
        let mut row = Row::new();
        for (column, value) in Self::columns().iter().zip(self.values()) {
            row.push(column.name, value);
        }
        row
    }
}

/// Optional-field filter translated into a conjunctive `WHERE` clause.
///
/// The JSON encoding (field order, `null` for absent fields) is part of the
/// cache key, so implementors must not reorder or skip fields.
pub trait Filter: Send + Sync + Serialize + DeserializeOwned + Clone + Default + Debug {
    fn predicates(&self) -> Predicates;
}

/// Audit block shared by every record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Audit {
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_by: i64,
    pub updated_at: DateTime<Utc>,
    pub deleted_by: Option<i64>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Audit {
    /// Audit block of a record created by `actor`.
    pub fn created_by(actor: i64) -> Self {
        Audit {
            created_by: actor,
            updated_by: actor,
            ..Audit::default()
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub(crate) fn values(&self) -> [SqlValue; 6] {
        [
            SqlValue::Int(self.created_by),
            SqlValue::Timestamp(self.created_at),
            SqlValue::Int(self.updated_by),
            SqlValue::Timestamp(self.updated_at),
            self.deleted_by.into(),
            self.deleted_at.into(),
        ]
    }

    pub(crate) fn from_row(row: &Row) -> Result<Self> {
        Ok(Audit {
            created_by: row.get_i64("created_by")?,
            created_at: row.get_time("created_at")?,
            updated_by: row.get_i64("updated_by")?,
            updated_at: row.get_time("updated_at")?,
            deleted_by: row.get_opt_i64("deleted_by")?,
            deleted_at: row.get_opt_time("deleted_at")?,
        })
    }
}

/// Filter plus ordering and paging, as received from a list request.
///
/// `limit <= 0` and `page <= 0` are resolved by the manager; the cache key is
/// built from the filter exactly as received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageFilter<F> {
    #[serde(flatten)]
    pub filter: F,
    /// Comma-separated `column [ASC|DESC]` list.
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub page: i64,
}

impl<F: Default> PageFilter<F> {
    pub fn new(filter: F) -> Self {
        PageFilter {
            filter,
            order_by: None,
            limit: 0,
            page: 0,
        }
    }

    pub fn with_order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_page(mut self, page: i64) -> Self {
        self.page = page;
        self
    }
}

/// Page descriptor returned with every list result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: i64,
    /// Rows actually returned.
    #[serde(rename = "current_element")]
    pub current_elements: i64,
    pub total_pages: i64,
    /// Full match count, ignoring limit and offset.
    pub total_elements: i64,
    pub sort_by: String,
}

impl Pagination {
    pub fn new(
        page: i64,
        limit: i64,
        current_elements: i64,
        total_elements: i64,
        sort_by: impl Into<String>,
    ) -> Self {
        Pagination {
            current_page: page,
            current_elements,
            total_pages: total_pages(total_elements, limit),
            total_elements,
            sort_by: sort_by.into(),
        }
    }
}

/// `total / limit + 1` for a non-empty set, `1` otherwise.
///
/// An exact multiple of `limit` yields one trailing empty page; clients
/// depend on this count.
pub fn total_pages(total_elements: i64, limit: i64) -> i64 {
    if total_elements > 0 && limit > 0 {
        total_elements / limit + 1
    } else {
        1
    }
}

/// JSON numbers rendered the way the cache-key consumers expect: integral
/// floats without a fractional part (`12000`, not `12000.0`).
pub(crate) mod number {
    use serde::Serializer;

    // 2^53: beyond this an f64 no longer maps to a unique integer
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_EXACT {
            serializer.serialize_i64(*value as i64)
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn serialize_opt<S: Serializer>(
        value: &Option<f64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serialize(v, serializer),
            None => serializer.serialize_none(),
        }
    }
}
