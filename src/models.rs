use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{InsightError, InsightResult};

/// Reads an explicit `null` as the type's default, like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One raw sample row: column name to raw value, in column order.
pub type SampleRow = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub mean: Option<f64>,
    #[serde(default)]
    pub median: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnProfile {
    pub name: String,
    #[serde(rename = "type", default)]
    pub data_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub null_percentage: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub unique_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<ColumnStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Distribution>,
}

impl ColumnProfile {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            null_percentage: 0.0,
            unique_count: 0,
            stats: None,
            distribution: None,
        }
    }

    fn type_lower(&self) -> String {
        self.data_type.trim().to_lowercase()
    }

    /// `object`/`string` style declared types.
    pub fn is_string_like(&self) -> bool {
        matches!(self.type_lower().as_str(), "object" | "string" | "str" | "text" | "category")
    }

    pub fn is_numeric_type(&self) -> bool {
        let t = self.type_lower();
        t.contains("int") || t.contains("float") || t.contains("double") || t.contains("decimal")
            || t == "number" || t == "numeric"
    }

    pub fn is_datetime_type(&self) -> bool {
        let t = self.type_lower();
        t.contains("datetime") || t.contains("date") || t == "timestamp"
    }

    pub fn is_boolean_type(&self) -> bool {
        matches!(self.type_lower().as_str(), "bool" | "boolean")
    }

    /// Anything that is not declared as text, a date or a boolean may carry numbers.
    pub fn is_numeric_capable(&self) -> bool {
        self.is_numeric_type()
            || self.stats.is_some()
            || !(self.is_string_like() || self.is_datetime_type() || self.is_boolean_type())
    }

    pub fn is_constant(&self) -> bool {
        self.unique_count == 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetProfile {
    pub row_count: u64,
    #[serde(default)]
    pub column_count: u64,
    pub columns: Vec<ColumnProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

/// Pre-aggregated location entry supplied by the statistics provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoAggregate {
    #[serde(default)]
    pub city: Option<String>,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub users: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoColumns {
    #[serde(default)]
    pub lat: Option<String>,
    #[serde(default)]
    pub lng: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileMetadata {
    #[serde(default)]
    pub datetime_cols: Vec<String>,
    #[serde(default)]
    pub geo_cols: Option<GeoColumns>,
    #[serde(default)]
    pub categorical_cols: Vec<String>,
    #[serde(default)]
    pub numerical_cols: Vec<String>,
}

/// Everything the statistics provider returns for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileDocument {
    #[serde(flatten)]
    pub profile: DatasetProfile,
    #[serde(default)]
    pub sample: Vec<SampleRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<CorrelationMatrix>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geographic: Option<Vec<GeoAggregate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ProfileMetadata>,
}

impl ProfileDocument {
    pub fn new(profile: DatasetProfile) -> Self {
        Self {
            profile,
            sample: Vec::new(),
            correlation: None,
            geographic: None,
            metadata: None,
        }
    }

    /// Parses a provider payload. Accepts a bare document, a `{"details": ...}`
    /// wrapper and a JSON string holding either of those.
    pub fn from_json(raw: &str) -> InsightResult<Self> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> InsightResult<Self> {
        let value = match value {
            Value::String(inner) => serde_json::from_str(&inner)?,
            other => other,
        };

        let mut object = match value {
            Value::Object(object) => object,
            other => {
                return Err(InsightError::InvalidProfile(format!(
                    "Expected a JSON object, got {}",
                    other
                )))
            }
        };

        if let Some(message) = object.get("error") {
            let message = match message {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Err(InsightError::Provider(message));
        }

        if let Some(Value::Object(inner)) = object.remove("details") {
            object = inner;
        }

        if !object.contains_key("rowCount") || !object.contains_key("columns") {
            tracing::error!("Invalid dataset stats format: missing rowCount or columns");
            return Err(InsightError::InvalidProfile(
                "Profile is missing rowCount or columns".to_string(),
            ));
        }

        Ok(serde_json::from_value(Value::Object(object))?)
    }

    pub fn metadata(&self) -> Option<&ProfileMetadata> {
        self.metadata.as_ref()
    }

    pub fn geo_columns(&self) -> Option<&GeoColumns> {
        self.metadata.as_ref().and_then(|m| m.geo_cols.as_ref())
    }

    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.profile.columns.iter().find(|c| c.name == name)
    }
}
