use serde::{Deserialize, Serialize};

use super::embedding::{EmbeddingError, check_embedding};

/// Dimensionality of every name/city embedding (all-MiniLM-L6-v2).
pub const EMBEDDING_DIM: usize = 384;

/// Catalog-wide unique airport identifier.
pub type AirportId = i64;

/// One immutable catalog record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub airport_id: AirportId,
    pub name: String,
    pub city: String,
    pub country: String,
    /// Three-letter IATA code, absent for many small fields.
    #[serde(default)]
    pub iata: Option<String>,
    /// Four-letter ICAO code.
    #[serde(default)]
    pub icao: Option<String>,
    /// IANA timezone name, e.g. `America/New_York`.
    pub timezone: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub airport_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Absent until the record has been indexed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_embedding: Option<Vec<f32>>,
}

/// A record that breaks catalog invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidAirport {
    #[error("airport {airport_id}: required field `{field}` is empty")]
    MissingField {
        airport_id: AirportId,
        field: &'static str,
    },

    #[error("airport {airport_id}: {field} code '{code}' must be {expected} characters")]
    CodeLength {
        airport_id: AirportId,
        field: &'static str,
        code: String,
        expected: usize,
    },

    #[error("airport {airport_id}: {field}: {source}")]
    Embedding {
        airport_id: AirportId,
        field: &'static str,
        source: EmbeddingError,
    },
}

impl Airport {
    /// Build an un-indexed record with no optional fields.
    #[must_use]
    pub fn new(
        airport_id: AirportId,
        name: impl Into<String>,
        city: impl Into<String>,
        country: impl Into<String>,
        timezone: impl Into<String>,
    ) -> Self {
        Self {
            airport_id,
            name: name.into(),
            city: city.into(),
            country: country.into(),
            iata: None,
            icao: None,
            timezone: timezone.into(),
            airport_type: None,
            source: None,
            name_embedding: None,
            city_embedding: None,
        }
    }

    #[must_use]
    pub fn with_codes(mut self, iata: Option<&str>, icao: Option<&str>) -> Self {
        self.iata = normalize_code(iata);
        self.icao = normalize_code(icao);
        self
    }

    #[must_use]
    pub fn with_embeddings(mut self, name: Vec<f32>, city: Vec<f32>) -> Self {
        self.name_embedding = Some(name);
        self.city_embedding = Some(city);
        self
    }

    /// Check the invariants every stored record must satisfy.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), InvalidAirport> {
        for (field, value) in [
            ("name", &self.name),
            ("city", &self.city),
            ("country", &self.country),
            ("timezone", &self.timezone),
        ] {
            if value.trim().is_empty() {
                return Err(InvalidAirport::MissingField {
                    airport_id: self.airport_id,
                    field,
                });
            }
        }

        for (field, code, expected) in [("iata", &self.iata, 3), ("icao", &self.icao, 4)] {
            if let Some(code) = code
                && code.chars().count() != expected
            {
                return Err(InvalidAirport::CodeLength {
                    airport_id: self.airport_id,
                    field,
                    code: code.clone(),
                    expected,
                });
            }
        }

        for (field, embedding) in [
            ("name_embedding", &self.name_embedding),
            ("city_embedding", &self.city_embedding),
        ] {
            if let Some(embedding) = embedding {
                check_embedding(embedding).map_err(|source| InvalidAirport::Embedding {
                    airport_id: self.airport_id,
                    field,
                    source,
                })?;
            }
        }

        Ok(())
    }
}

/// Canonicalize an optional IATA/ICAO code.
///
/// Source data marks absent codes with `\N`; those, empty strings and
/// whitespace all become `None`. Codes are upper-cased.
#[must_use]
pub fn normalize_code(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() || trimmed == "\\N" {
        return None;
    }
    Some(trimmed.to_ascii_uppercase())
}
