//! Cache key management utilities.
//!
//! Keys have the form `{prefix}{Entity}:{json}` where `json` is the filter
//! exactly as the caller sent it, serialized in field-declaration order with
//! `null` for absent fields:
//!
//! ```text
//! gspCar:{"id":1,"car_name":null,...}       single result
//! gpCar:{"id":null,...,"limit":10,"page":1}  list result
//! gppgCar:{"id":null,...,"limit":10,"page":1} list pagination
//! ```

use crate::error::{Error, Result};
use crate::model::{Entity, PageFilter};
use serde::Serialize;

/// Which cache entry a key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Single,
    List,
    ListPagination,
}

impl KeyKind {
    pub fn prefix(self) -> &'static str {
        match self {
            KeyKind::Single => "gsp",
            KeyKind::List => "gp",
            KeyKind::ListPagination => "gppg",
        }
    }
}

/// Builder for cache keys.
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// Build a key from an already serialized filter.
    pub fn build_with_json(kind: KeyKind, entity: &str, json: &str) -> String {
        format!("{}{}:{}", kind.prefix(), entity, json)
    }

    /// Build a key for `T` from any serializable filter.
    ///
    /// # Errors
    /// Returns `Error::BadRequest` if the filter cannot be serialized.
    pub fn build<T: Entity>(kind: KeyKind, filter: &impl Serialize) -> Result<String> {
        let json = Self::encode(filter)?;
        Ok(Self::build_with_json(kind, T::entity_name(), &json))
    }

    /// Key of a single-record lookup.
    ///
    /// # Errors
    /// Returns `Error::BadRequest` if the filter cannot be serialized.
    pub fn single<T: Entity>(filter: &T::Filter) -> Result<String> {
        Self::build::<T>(KeyKind::Single, filter)
    }

    /// Data and pagination keys of a list lookup, sharing one serialization.
    ///
    /// # Errors
    /// Returns `Error::BadRequest` if the filter cannot be serialized.
    pub fn list_pair<T: Entity>(filter: &PageFilter<T::Filter>) -> Result<(String, String)> {
        let json = Self::encode(filter)?;
        Ok((
            Self::build_with_json(KeyKind::List, T::entity_name(), &json),
            Self::build_with_json(KeyKind::ListPagination, T::entity_name(), &json),
        ))
    }

    /// Split a key into kind, entity name and filter JSON.
    pub fn parse(key: &str) -> Option<(KeyKind, &str, &str)> {
        // "gppg" and "gsp" must be tried before their "gp" prefix
        let (kind, rest) = [KeyKind::ListPagination, KeyKind::Single, KeyKind::List]
            .into_iter()
            .find_map(|kind| key.strip_prefix(kind.prefix()).map(|rest| (kind, rest)))?;
        let (entity, json) = rest.split_once(':')?;
        if entity.is_empty() {
            return None;
        }
        Some((kind, entity, json))
    }

    fn encode(filter: &impl Serialize) -> Result<String> {
        serde_json::to_string(filter)
            .map_err(|e| Error::BadRequest(format!("error marshal param: {}", e)))
    }
}
