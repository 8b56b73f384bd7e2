//! `Order` record, filter and payloads.

use super::{number, Audit, Entity, Filter};
use crate::error::{Error, Field, Result};
use crate::query::Predicates;
use crate::store::{Column, ColumnType, Row, SqlValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const COLUMNS: &[Column] = &[
    Column::new("id", ColumnType::Int),
    Column::new("car_id", ColumnType::Int),
    Column::new("order_date", ColumnType::Timestamp),
    Column::new("pickup_date", ColumnType::Timestamp),
    Column::new("dropoff_date", ColumnType::Timestamp),
    Column::new("pickup_location", ColumnType::Text),
    Column::new("pickup_lat", ColumnType::Float),
    Column::new("pickup_long", ColumnType::Float),
    Column::new("dropoff_location", ColumnType::Text),
    Column::new("dropoff_lat", ColumnType::Float),
    Column::new("dropoff_long", ColumnType::Float),
    Column::new("created_by", ColumnType::Int),
    Column::new("created_at", ColumnType::Timestamp),
    Column::new("updated_by", ColumnType::Int),
    Column::new("updated_at", ColumnType::Timestamp),
    Column::new("deleted_by", ColumnType::Int),
    Column::new("deleted_at", ColumnType::Timestamp),
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub car_id: i64,
    pub order_date: DateTime<Utc>,
    pub pickup_date: DateTime<Utc>,
    pub dropoff_date: DateTime<Utc>,
    pub pickup_location: String,
    #[serde(serialize_with = "number::serialize")]
    pub pickup_lat: f64,
    #[serde(serialize_with = "number::serialize")]
    pub pickup_long: f64,
    pub dropoff_location: String,
    #[serde(serialize_with = "number::serialize")]
    pub dropoff_lat: f64,
    #[serde(serialize_with = "number::serialize")]
    pub dropoff_long: f64,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Entity for Order {
    type Filter = OrderFilter;

    fn entity_name() -> &'static str {
        "Order"
    }

    fn table() -> &'static str {
        "orders"
    }

    fn columns() -> &'static [Column] {
        COLUMNS
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }

    fn values(&self) -> Vec<SqlValue> {
        let mut values = vec![
            SqlValue::Int(self.id),
            SqlValue::Int(self.car_id),
            SqlValue::Timestamp(self.order_date),
            SqlValue::Timestamp(self.pickup_date),
            SqlValue::Timestamp(self.dropoff_date),
            SqlValue::Text(self.pickup_location.clone()),
            SqlValue::Float(self.pickup_lat),
            SqlValue::Float(self.pickup_long),
            SqlValue::Text(self.dropoff_location.clone()),
            SqlValue::Float(self.dropoff_lat),
            SqlValue::Float(self.dropoff_long),
        ];
        values.extend(self.audit.values());
        values
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Order {
            id: row.get_i64("id")?,
            car_id: row.get_i64("car_id")?,
            order_date: row.get_time("order_date")?,
            pickup_date: row.get_time("pickup_date")?,
            dropoff_date: row.get_time("dropoff_date")?,
            pickup_location: row.get_string("pickup_location")?,
            pickup_lat: row.get_f64("pickup_lat")?,
            pickup_long: row.get_f64("pickup_long")?,
            dropoff_location: row.get_string("dropoff_location")?,
            dropoff_lat: row.get_f64("dropoff_lat")?,
            dropoff_long: row.get_f64("dropoff_long")?,
            audit: Audit::from_row(row)?,
        })
    }
}

/// Order lookup filter; every field is an equality match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderFilter {
    pub id: Option<i64>,
    pub car_id: Option<i64>,
    pub order_date: Option<DateTime<Utc>>,
    pub pickup_date: Option<DateTime<Utc>>,
    pub dropoff_date: Option<DateTime<Utc>>,
    pub pickup_location: Option<String>,
    #[serde(serialize_with = "number::serialize_opt")]
    pub pickup_lat: Option<f64>,
    #[serde(serialize_with = "number::serialize_opt")]
    pub pickup_long: Option<f64>,
    pub dropoff_location: Option<String>,
    #[serde(serialize_with = "number::serialize_opt")]
    pub dropoff_lat: Option<f64>,
    #[serde(serialize_with = "number::serialize_opt")]
    pub dropoff_long: Option<f64>,
}

impl OrderFilter {
    pub fn by_id(id: i64) -> Self {
        OrderFilter {
            id: Some(id),
            ..OrderFilter::default()
        }
    }
}

impl Filter for OrderFilter {
    fn predicates(&self) -> Predicates {
        Predicates::new()
            .eq("id", self.id)
            .eq("car_id", self.car_id)
            .eq("order_date", self.order_date)
            .eq("pickup_date", self.pickup_date)
            .eq("dropoff_date", self.dropoff_date)
            .eq("pickup_location", self.pickup_location.clone())
            .eq("pickup_lat", self.pickup_lat)
            .eq("pickup_long", self.pickup_long)
            .eq("dropoff_location", self.dropoff_location.clone())
            .eq("dropoff_lat", self.dropoff_lat)
            .eq("dropoff_long", self.dropoff_long)
    }
}

fn required(field: Field) -> Error {
    Error::Invalid {
        field,
        reason: "required".to_string(),
    }
}

fn check_car_id(car_id: i64) -> Result<()> {
    if car_id == 0 {
        return Err(required(Field::CarId));
    }
    Ok(())
}

fn check_location(field: Field, location: &str) -> Result<()> {
    if location.trim().is_empty() {
        return Err(required(field));
    }
    Ok(())
}

fn check_coordinate(field: Field, value: f64) -> Result<()> {
    if value == 0.0 || !value.is_finite() {
        return Err(required(field));
    }
    Ok(())
}

/// Payload for creating an order.
///
/// Dates are optional at the wire level so a missing date is reported with
/// its own field code instead of a generic decode error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateOrder {
    pub car_id: i64,
    pub order_date: Option<DateTime<Utc>>,
    pub pickup_date: Option<DateTime<Utc>>,
    pub dropoff_date: Option<DateTime<Utc>>,
    pub pickup_location: String,
    pub pickup_lat: f64,
    pub pickup_long: f64,
    pub dropoff_location: String,
    pub dropoff_lat: f64,
    pub dropoff_long: f64,
    #[serde(skip)]
    pub created_by: i64,
}

impl CreateOrder {
    /// # Errors
    /// Returns `Error::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        check_car_id(self.car_id)?;
        self.order_date.ok_or_else(|| required(Field::OrderDate))?;
        self.pickup_date.ok_or_else(|| required(Field::PickupDate))?;
        self.dropoff_date
            .ok_or_else(|| required(Field::DropoffDate))?;
        check_location(Field::PickupLocation, &self.pickup_location)?;
        check_coordinate(Field::PickupLat, self.pickup_lat)?;
        check_coordinate(Field::PickupLong, self.pickup_long)?;
        check_location(Field::DropoffLocation, &self.dropoff_location)?;
        check_coordinate(Field::DropoffLat, self.dropoff_lat)?;
        check_coordinate(Field::DropoffLong, self.dropoff_long)
    }

    /// Validate and build the record to insert.
    ///
    /// # Errors
    /// Returns `Error::Invalid` naming the first offending field.
    pub fn into_order(self) -> Result<Order> {
        self.validate()?;
        Ok(Order {
            id: 0,
            car_id: self.car_id,
            order_date: self.order_date.ok_or_else(|| required(Field::OrderDate))?,
            pickup_date: self.pickup_date.ok_or_else(|| required(Field::PickupDate))?,
            dropoff_date: self
                .dropoff_date
                .ok_or_else(|| required(Field::DropoffDate))?,
            pickup_location: self.pickup_location,
            pickup_lat: self.pickup_lat,
            pickup_long: self.pickup_long,
            dropoff_location: self.dropoff_location,
            dropoff_lat: self.dropoff_lat,
            dropoff_long: self.dropoff_long,
            audit: Audit::created_by(self.created_by),
        })
    }
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateOrder {
    pub car_id: Option<i64>,
    pub order_date: Option<DateTime<Utc>>,
    pub pickup_date: Option<DateTime<Utc>>,
    pub dropoff_date: Option<DateTime<Utc>>,
    pub pickup_location: Option<String>,
    pub pickup_lat: Option<f64>,
    pub pickup_long: Option<f64>,
    pub dropoff_location: Option<String>,
    pub dropoff_lat: Option<f64>,
    pub dropoff_long: Option<f64>,
    #[serde(skip)]
    pub updated_by: i64,
}

impl UpdateOrder {
    /// # Errors
    /// Returns `Error::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if let Some(car_id) = self.car_id {
            check_car_id(car_id)?;
        }
        if let Some(location) = &self.pickup_location {
            check_location(Field::PickupLocation, location)?;
        }
        if let Some(location) = &self.dropoff_location {
            check_location(Field::DropoffLocation, location)?;
        }
        let coordinates = [
            (Field::PickupLat, self.pickup_lat),
            (Field::PickupLong, self.pickup_long),
            (Field::DropoffLat, self.dropoff_lat),
            (Field::DropoffLong, self.dropoff_long),
        ];
        for (field, value) in coordinates {
            if let Some(value) = value {
                check_coordinate(field, value)?;
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.car_id.is_none()
            && self.order_date.is_none()
            && self.pickup_date.is_none()
            && self.dropoff_date.is_none()
            && self.pickup_location.is_none()
            && self.pickup_lat.is_none()
            && self.pickup_long.is_none()
            && self.dropoff_location.is_none()
            && self.dropoff_lat.is_none()
            && self.dropoff_long.is_none()
    }

    pub fn apply(&self, order: &mut Order) {
        if let Some(v) = self.car_id {
            order.car_id = v;
        }
        if let Some(v) = self.order_date {
            order.order_date = v;
        }
        if let Some(v) = self.pickup_date {
            order.pickup_date = v;
        }
        if let Some(v) = self.dropoff_date {
            order.dropoff_date = v;
        }
        if let Some(v) = &self.pickup_location {
            order.pickup_location = v.clone();
        }
        if let Some(v) = self.pickup_lat {
            order.pickup_lat = v;
        }
        if let Some(v) = self.pickup_long {
            order.pickup_long = v;
        }
        if let Some(v) = &self.dropoff_location {
            order.dropoff_location = v.clone();
        }
        if let Some(v) = self.dropoff_lat {
            order.dropoff_lat = v;
        }
        if let Some(v) = self.dropoff_long {
            order.dropoff_long = v;
        }
        order.audit.updated_by = self.updated_by;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 5, day, 9, 0, 0).unwrap()
    }

    fn valid_create() -> CreateOrder {
        CreateOrder {
            car_id: 1,
            order_date: Some(at(1)),
            pickup_date: Some(at(2)),
            dropoff_date: Some(at(5)),
            pickup_location: "Bandung".to_string(),
            pickup_lat: -6.9175,
            pickup_long: 107.6191,
            dropoff_location: "Jakarta".to_string(),
            dropoff_lat: -6.2088,
            dropoff_long: 106.8456,
            created_by: 3,
        }
    }

    #[test]
    fn test_create_order_into_order() {
        let order = valid_create().into_order().expect("Payload is valid");
        assert_eq!(order.car_id, 1);
        assert_eq!(order.dropoff_date, at(5));
        assert_eq!(order.audit.created_by, 3);
        assert_eq!(order.audit.updated_by, 3);
    }

    #[test]
    fn test_create_order_missing_fields() {
        let no_car = CreateOrder {
            car_id: 0,
            ..valid_create()
        };
        assert!(matches!(
            no_car.validate(),
            Err(Error::Invalid {
                field: Field::CarId,
                ..
            })
        ));

        let no_pickup = CreateOrder {
            pickup_date: None,
            ..valid_create()
        };
        assert!(matches!(
            no_pickup.into_order(),
            Err(Error::Invalid {
                field: Field::PickupDate,
                ..
            })
        ));

        let no_lat = CreateOrder {
            dropoff_lat: 0.0,
            ..valid_create()
        };
        assert!(matches!(
            no_lat.validate(),
            Err(Error::Invalid {
                field: Field::DropoffLat,
                ..
            })
        ));
    }

    #[test]
    fn test_order_row_round_trip() {
        let mut order = valid_create().into_order().unwrap();
        order.id = 4;
        order.audit.deleted_by = Some(2);
        assert_eq!(Order::from_row(&order.to_row()).unwrap(), order);
    }

    #[test]
    fn test_order_filter_json() {
        let filter = OrderFilter::by_id(4);
        assert_eq!(
            serde_json::to_string(&filter).unwrap(),
            r#"{"id":4,"car_id":null,"order_date":null,"pickup_date":null,"dropoff_date":null,"pickup_location":null,"pickup_lat":null,"pickup_long":null,"dropoff_location":null,"dropoff_lat":null,"dropoff_long":null}"#
        );
    }

    #[test]
    fn test_order_filter_dropoff_long_uses_its_own_column() {
        let filter = OrderFilter {
            pickup_long: Some(107.6),
            dropoff_long: Some(106.8),
            ..OrderFilter::default()
        };
        let predicates: Vec<_> = filter.predicates().iter().cloned().collect();
        assert_eq!(predicates[1].column, "dropoff_long");
        assert_eq!(predicates[1].value, SqlValue::Float(106.8));
    }

    #[test]
    fn test_update_order_apply_and_validate() {
        let mut order = valid_create().into_order().unwrap();
        let patch = UpdateOrder {
            pickup_location: Some("Bogor".to_string()),
            updated_by: 8,
            ..UpdateOrder::default()
        };
        assert!(patch.validate().is_ok());
        assert!(!patch.is_empty());
        patch.apply(&mut order);
        assert_eq!(order.pickup_location, "Bogor");
        assert_eq!(order.audit.updated_by, 8);

        let blank = UpdateOrder {
            dropoff_location: Some("  ".to_string()),
            ..UpdateOrder::default()
        };
        assert!(blank.validate().is_err());
    }
}
