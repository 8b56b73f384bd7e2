//! `Car` record, filter and payloads.

use super::{number, Audit, Entity, Filter};
use crate::error::{Error, Field, Result};
use crate::query::{Op, Predicates};
use crate::store::{Column, ColumnType, Row, SqlValue};
use serde::{Deserialize, Serialize};

const COLUMNS: &[Column] = &[
    Column::new("id", ColumnType::Int),
    Column::new("car_name", ColumnType::Text),
    Column::new("day_rate", ColumnType::Float),
    Column::new("month_rate", ColumnType::Float),
    Column::new("image", ColumnType::Text),
    Column::new("created_by", ColumnType::Int),
    Column::new("created_at", ColumnType::Timestamp),
    Column::new("updated_by", ColumnType::Int),
    Column::new("updated_at", ColumnType::Timestamp),
    Column::new("deleted_by", ColumnType::Int),
    Column::new("deleted_at", ColumnType::Timestamp),
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Car {
    pub id: i64,
    pub car_name: String,
    #[serde(serialize_with = "number::serialize")]
    pub day_rate: f64,
    #[serde(serialize_with = "number::serialize")]
    pub month_rate: f64,
    pub image: String,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Entity for Car {
    type Filter = CarFilter;

    fn entity_name() -> &'static str {
        "Car"
    }

    fn table() -> &'static str {
        "cars"
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
            SqlValue::Text(self.car_name.clone()),
            SqlValue::Float(self.day_rate),
            SqlValue::Float(self.month_rate),
            SqlValue::Text(self.image.clone()),
        ];
        values.extend(self.audit.values());
        values
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Car {
            id: row.get_i64("id")?,
            car_name: row.get_string("car_name")?,
            day_rate: row.get_f64("day_rate")?,
            month_rate: row.get_f64("month_rate")?,
            image: row.get_string("image")?,
            audit: Audit::from_row(row)?,
        })
    }
}

/// Car lookup filter. `car_name` matches as a substring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarFilter {
    pub id: Option<i64>,
    pub car_name: Option<String>,
    #[serde(serialize_with = "number::serialize_opt")]
    pub day_rate: Option<f64>,
    #[serde(serialize_with = "number::serialize_opt")]
    pub day_rate_gt: Option<f64>,
    #[serde(serialize_with = "number::serialize_opt")]
    pub day_rate_gte: Option<f64>,
    #[serde(serialize_with = "number::serialize_opt")]
    pub day_rate_lt: Option<f64>,
    #[serde(serialize_with = "number::serialize_opt")]
    pub day_rate_lte: Option<f64>,
    #[serde(serialize_with = "number::serialize_opt")]
    pub month_rate: Option<f64>,
    #[serde(serialize_with = "number::serialize_opt")]
    pub month_rate_gt: Option<f64>,
    #[serde(serialize_with = "number::serialize_opt")]
    pub month_rate_gte: Option<f64>,
    #[serde(serialize_with = "number::serialize_opt")]
    pub month_rate_lt: Option<f64>,
    #[serde(serialize_with = "number::serialize_opt")]
    pub month_rate_lte: Option<f64>,
    pub image: Option<String>,
}

impl CarFilter {
    pub fn by_id(id: i64) -> Self {
        CarFilter {
            id: Some(id),
            ..CarFilter::default()
        }
    }
}

impl Filter for CarFilter {
    fn predicates(&self) -> Predicates {
        Predicates::new()
            .eq("id", self.id)
            .like("car_name", self.car_name.clone())
            .eq("day_rate", self.day_rate)
            .cmp("day_rate", Op::Gt, self.day_rate_gt)
            .cmp("day_rate", Op::Gte, self.day_rate_gte)
            .cmp("day_rate", Op::Lt, self.day_rate_lt)
            .cmp("day_rate", Op::Lte, self.day_rate_lte)
            .eq("month_rate", self.month_rate)
            .cmp("month_rate", Op::Gt, self.month_rate_gt)
            .cmp("month_rate", Op::Gte, self.month_rate_gte)
            .cmp("month_rate", Op::Lt, self.month_rate_lt)
            .cmp("month_rate", Op::Lte, self.month_rate_lte)
            .eq("image", self.image.clone())
    }
}

const CAR_NAME_LEN: std::ops::RangeInclusive<usize> = 8..=50;
const DAY_RATE: std::ops::RangeInclusive<f64> = 10_000.0..=1_000_000.0;
const MONTH_RATE: std::ops::RangeInclusive<f64> = 250_000.0..=30_000_000.0;
const IMAGE_LEN: std::ops::RangeInclusive<usize> = 10..=256;

fn invalid(field: Field, reason: impl Into<String>) -> Error {
    Error::Invalid {
        field,
        reason: reason.into(),
    }
}

fn check_car_name(name: &str) -> Result<()> {
    if !CAR_NAME_LEN.contains(&name.len()) {
        return Err(invalid(Field::CarName, "length must be between 8 and 50"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ') {
        return Err(invalid(Field::CarName, "only letters, digits and spaces"));
    }
    Ok(())
}

fn check_day_rate(rate: f64) -> Result<()> {
    if !DAY_RATE.contains(&rate) {
        return Err(invalid(Field::DayRate, "must be between 10000 and 1000000"));
    }
    Ok(())
}

fn check_month_rate(rate: f64) -> Result<()> {
    if !MONTH_RATE.contains(&rate) {
        return Err(invalid(
            Field::MonthRate,
            "must be between 250000 and 30000000",
        ));
    }
    Ok(())
}

fn is_url(raw: &str) -> bool {
    let rest = raw
        .strip_prefix("https://")
        .or_else(|| raw.strip_prefix("http://"));
    match rest {
        Some(rest) => {
            let host = rest
                .split(|c| c == '/' || c == '?' || c == '#')
                .next()
                .unwrap_or_default();
            !host.is_empty() && host.contains('.') && !raw.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn check_image(image: &str) -> Result<()> {
    if !IMAGE_LEN.contains(&image.len()) {
        return Err(invalid(Field::Image, "length must be between 10 and 256"));
    }
    if !is_url(image) {
        return Err(invalid(Field::Image, "must be an http(s) url"));
    }
    Ok(())
}

/// Payload for creating a car.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateCar {
    pub car_name: String,
    pub day_rate: f64,
    pub month_rate: f64,
    pub image: String,
    #[serde(skip)]
    pub created_by: i64,
}

impl CreateCar {
    /// # Errors
    /// Returns `Error::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        check_car_name(&self.car_name)?;
        check_day_rate(self.day_rate)?;
        check_month_rate(self.month_rate)?;
        check_image(&self.image)
    }

    pub fn into_car(self) -> Car {
        Car {
            id: 0,
            car_name: self.car_name,
            day_rate: self.day_rate,
            month_rate: self.month_rate,
            image: self.image,
            audit: Audit::created_by(self.created_by),
        }
    }
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateCar {
    pub car_name: Option<String>,
    pub day_rate: Option<f64>,
    pub month_rate: Option<f64>,
    pub image: Option<String>,
    #[serde(skip)]
    pub updated_by: i64,
}

impl UpdateCar {
    /// # Errors
    /// Returns `Error::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.car_name {
            check_car_name(name)?;
        }
        if let Some(rate) = self.day_rate {
            check_day_rate(rate)?;
        }
        if let Some(rate) = self.month_rate {
            check_month_rate(rate)?;
        }
        if let Some(image) = &self.image {
            check_image(image)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.car_name.is_none()
            && self.day_rate.is_none()
            && self.month_rate.is_none()
            && self.image.is_none()
    }

    pub fn apply(&self, car: &mut Car) {
        if let Some(name) = &self.car_name {
            car.car_name = name.clone();
        }
        if let Some(rate) = self.day_rate {
            car.day_rate = rate;
        }
        if let Some(rate) = self.month_rate {
            car.month_rate = rate;
        }
        if let Some(image) = &self.image {
            car.image = image.clone();
        }
        car.audit.updated_by = self.updated_by;
    }
}
