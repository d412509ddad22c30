//! Database products this layer knows how to address by name.

/// Recognized database products, parsed from the product string reported by
/// the connection metadata.
///
/// The enum drives product-specific behavior such as generated-column-name
/// capitalization; unrecognized products get passthrough behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseProduct {
    PostgreSql,
    MySql,
    Sqlite,
    H2,
    Oracle,
    Other,
}

impl DatabaseProduct {
    #[must_use]
    pub fn from_product_name(name: &str) -> Self {
        match name {
            n if n.eq_ignore_ascii_case("PostgreSQL") => DatabaseProduct::PostgreSql,
            n if n.eq_ignore_ascii_case("MySQL") => DatabaseProduct::MySql,
            n if n.eq_ignore_ascii_case("SQLite") => DatabaseProduct::Sqlite,
            n if n.eq_ignore_ascii_case("H2") => DatabaseProduct::H2,
            n if n.eq_ignore_ascii_case("Oracle") => DatabaseProduct::Oracle,
            _ => DatabaseProduct::Other,
        }
    }

    /// Translate a logical auto-generated column name into the form this
    /// product reports it as.
    ///
    /// PostgreSQL folds unquoted identifiers to lower case, so the requested
    /// generated column must be asked for in lower case; every other product
    /// keeps the caller's spelling.
    #[must_use]
    pub fn generated_column_name(self, logical: &str) -> String {
        match self {
            DatabaseProduct::PostgreSql => logical.to_lowercase(),
            _ => logical.to_owned(),
        }
    }
}
