//! Table-backed resources served by the record endpoints.
//!
//! Each endpoint is a [`Resource`] value: the route it is mounted on, the
//! table it reads and writes, the column lists are ordered by, and the field
//! schema that turns request bodies into rows. The handler code is shared;
//! only these values differ.

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::store::Record;

pub mod caffeine;
pub mod wellness;

pub use caffeine::CAFFEINE_ENTRIES;
pub use wellness::WELLNESS_CHECKINS;

/// Every resource the service mounts.
pub const RESOURCES: [&Resource; 2] = [&CAFFEINE_ENTRIES, &WELLNESS_CHECKINS];

#[derive(Debug)]
pub struct Resource {
    /// Path segment the endpoint is mounted on.
    pub route: &'static str,
    pub table: &'static str,
    /// Timestamp column listings are sorted on, newest first.
    pub order_by: &'static str,
    pub fields: &'static [Field],
}

#[derive(Debug)]
pub struct Field {
    pub column: &'static str,
    /// Body key the value is read from. `None` for server-assigned columns.
    pub input: Option<&'static str>,
    pub default: Option<FieldDefault>,
    /// Whether PUT may overwrite the column.
    pub updatable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldDefault {
    Integer(i64),
    Text(&'static str),
    /// Request time as an RFC 3339 UTC timestamp with millisecond precision.
    Now,
}

impl FieldDefault {
    fn value(self, now: &str) -> Value {
        match self {
            FieldDefault::Integer(n) => Value::from(n),
            FieldDefault::Text(s) => Value::from(s),
            FieldDefault::Now => Value::from(now),
        }
    }
}

/// Current time in the format written to timestamp columns.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Whether a body value is "empty" for the purpose of falling back to a
/// default: missing, `null`, `false`, zero, NaN or the empty string.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64().map_or(true, |f| f == 0.0 || f.is_nan()),
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => false,
    }
}

impl Resource {
    /// Row to insert for a POST body.
    ///
    /// Defaulted fields fall back when the body value is blank. Other fields
    /// are copied as given, explicit `null` included, and left out when the
    /// body omits them so the column default applies.
    pub fn new_row(&self, user_id: Uuid, body: &Map<String, Value>, now: &str) -> Record {
        let mut row = Record::new();
        row.insert("user_id".into(), Value::from(user_id.to_string()));

        for field in self.fields {
            let given = field.input.and_then(|key| body.get(key));
            let value = match field.default {
                Some(default) if is_blank(given) => Some(default.value(now)),
                _ => given.cloned(),
            };
            if let Some(value) = value {
                row.insert(field.column.into(), value);
            }
        }

        row
    }

    /// Column overwrites for a PUT body. Only updatable fields whose key is
    /// present in the body are included.
    pub fn patch(&self, body: &Map<String, Value>) -> Record {
        self.fields
            .iter()
            .filter(|field| field.updatable)
            .filter_map(|field| {
                let key = field.input?;
                body.get(key).map(|value| (field.column.to_string(), value.clone()))
            })
            .collect()
    }

    /// Record id addressed by a request path: the last segment, unless it is
    /// empty or the route name itself.
    pub fn record_id<'a>(&self, path: &'a str) -> Option<&'a str> {
        path.rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty() && *segment != self.route)
    }
}
