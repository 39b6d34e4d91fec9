//! Allow-list projection of persisted entities into transport-safe shapes.
//!
//! A [`ProjectionShape`] names every field that may leave the service. Fields
//! not listed are never copied, whatever the source entity carries.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::compare::FieldValue;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("projection `{shape}` requires an object source")]
    NotAnObject { shape: &'static str },
    #[error("failed to serialize source for projection `{shape}`: {source}")]
    Serialize {
        shape: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("projected value does not match the requested type: {0}")]
    Decode(#[source] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExposedField {
    pub output: &'static str,
    pub source: &'static str,
}

/// Named output shape listing the exposed fields and where each one is read
/// from on the source entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionShape {
    name: &'static str,
    fields: Vec<ExposedField>,
}

impl ProjectionShape {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
        }
    }

    /// Expose `field` under its own name.
    pub fn expose(self, field: &'static str) -> Self {
        self.expose_as(field, field)
    }

    /// Expose the source field `source` as `output`.
    pub fn expose_as(mut self, output: &'static str, source: &'static str) -> Self {
        self.fields.retain(|existing| existing.output != output);
        self.fields.push(ExposedField { output, source });
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &[ExposedField] {
        &self.fields
    }

    pub fn exposes(&self, output: &str) -> bool {
        self.fields.iter().any(|field| field.output == output)
    }
}

/// Output DTO produced by [`project`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Projected(Map<String, Value>);

impl Projected {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Nest `related` under `field`, replacing anything already there.
    pub fn attach(&mut self, field: &str, related: Projected) {
        self.0.insert(field.to_string(), Value::Object(related.0));
    }

    /// Sortable view of `field`. Strings are read as timestamps only for a
    /// [`ColumnKind::Timestamp`] column; see [`column_kind`].
    pub fn field_value(&self, field: &str, kind: ColumnKind) -> FieldValue<'_> {
        match self.0.get(field) {
            Some(Value::String(text)) => match kind {
                ColumnKind::Timestamp => OffsetDateTime::parse(text, &Rfc3339)
                    .map(FieldValue::Timestamp)
                    .unwrap_or(FieldValue::Text(text)),
                ColumnKind::Text => FieldValue::Text(text),
            },
            Some(Value::Number(number)) => number
                .as_i64()
                .map(FieldValue::Integer)
                .or_else(|| number.as_f64().map(FieldValue::Number))
                .unwrap_or(FieldValue::Other),
            _ => FieldValue::Other,
        }
    }

    /// Decode into a typed DTO.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, ProjectionError> {
        serde_json::from_value(Value::Object(self.0)).map_err(ProjectionError::Decode)
    }
}

/// How the string values of one projected column are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Timestamp,
}

/// Timestamp when every string value of `field` across `rows` is RFC 3339,
/// text otherwise. Decided once per column so a stray date-like value in a
/// text column is still compared as text.
pub fn column_kind(rows: &[Projected], field: &str) -> ColumnKind {
    let mut strings = rows
        .iter()
        .filter_map(|row| row.get(field).and_then(Value::as_str))
        .peekable();

    if strings.peek().is_none() {
        return ColumnKind::Text;
    }
    if strings.all(|text| OffsetDateTime::parse(text, &Rfc3339).is_ok()) {
        ColumnKind::Timestamp
    } else {
        ColumnKind::Text
    }
}

/// Copy the fields exposed by `shape` from `entity`.
pub fn project<E>(entity: &E, shape: &ProjectionShape) -> Result<Projected, ProjectionError>
where
    E: Serialize + ?Sized,
{
    let value = serde_json::to_value(entity).map_err(|source| ProjectionError::Serialize {
        shape: shape.name,
        source,
    })?;
    project_value(&value, shape)
}

/// [`project`] over an already serialized entity.
pub fn project_value(value: &Value, shape: &ProjectionShape) -> Result<Projected, ProjectionError> {
    let Value::Object(source) = value else {
        return Err(ProjectionError::NotAnObject { shape: shape.name });
    };

    let mut output = Map::with_capacity(shape.fields.len());
    for field in &shape.fields {
        if let Some(value) = source.get(field.source) {
            output.insert(field.output.to_string(), value.clone());
        }
    }
    Ok(Projected(output))
}
