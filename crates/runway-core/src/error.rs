use std::fmt;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    CatalogNotFound,
    ConfigParseError,
    ModelNotFound,
    InvalidRecord,
    InvalidLimit,
    InvalidSearchSettings,
    CatalogQueryFailed,
    CorruptCatalog,
    EmbeddingFailed,
    VectorIndexMissing,
    SearchTimeout,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::CatalogNotFound => "E1001",
            Self::ConfigParseError => "E1002",
            Self::ModelNotFound => "E1003",
            Self::InvalidRecord => "E2001",
            Self::InvalidLimit => "E2002",
            Self::InvalidSearchSettings => "E2003",
            Self::CatalogQueryFailed => "E3001",
            Self::CorruptCatalog => "E3002",
            Self::EmbeddingFailed => "E4001",
            Self::VectorIndexMissing => "E4002",
            Self::SearchTimeout => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::CatalogNotFound => "Airport catalog not found",
            Self::ConfigParseError => "Config file parse error",
            Self::ModelNotFound => "Embedding model not found",
            Self::InvalidRecord => "Invalid airport record",
            Self::InvalidLimit => "Invalid result limit",
            Self::InvalidSearchSettings => "Invalid search settings",
            Self::CatalogQueryFailed => "Catalog query failed",
            Self::CorruptCatalog => "Catalog record violates invariants",
            Self::EmbeddingFailed => "Query embedding failed",
            Self::VectorIndexMissing => "Catalog has no embeddings",
            Self::SearchTimeout => "Search timed out",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::CatalogNotFound => {
                Some("Run `runway import --file airports.jsonl` to create the catalog.")
            }
            Self::ConfigParseError => Some("Fix syntax in .runway/config.toml and retry."),
            Self::ModelNotFound => Some(
                "Place model.onnx and tokenizer.json under the configured model_dir, or set `embedder = \"hash\"`.",
            ),
            Self::InvalidRecord => Some("Check required fields and IATA (3) / ICAO (4) code lengths."),
            Self::InvalidLimit => Some("Pass a positive integer; invalid values fall back to 5."),
            Self::InvalidSearchSettings => {
                Some("Use a positive timeout_ms and overfetch_factor in [search].")
            }
            Self::CatalogQueryFailed => Some("Retry. If persistent, re-import the catalog."),
            Self::CorruptCatalog => Some("Re-import the affected airports and run `runway index`."),
            Self::EmbeddingFailed => Some("Verify the embedding model loads and yields 384 values."),
            Self::VectorIndexMissing => Some("Run `runway index` to embed the catalog."),
            Self::SearchTimeout => Some("Raise [search].timeout_ms or retry the query."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;
    use std::collections::HashSet;

    const ALL: [ErrorCode; 12] = [
        ErrorCode::CatalogNotFound,
        ErrorCode::ConfigParseError,
        ErrorCode::ModelNotFound,
        ErrorCode::InvalidRecord,
        ErrorCode::InvalidLimit,
        ErrorCode::InvalidSearchSettings,
        ErrorCode::CatalogQueryFailed,
        ErrorCode::CorruptCatalog,
        ErrorCode::EmbeddingFailed,
        ErrorCode::VectorIndexMissing,
        ErrorCode::SearchTimeout,
        ErrorCode::InternalUnexpected,
    ];

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        for code in ALL {
            let code = code.code();
            assert_eq!(code.len(), 5);
            assert!(code.starts_with('E'));
            assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
        }
    }
}
