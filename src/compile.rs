//! The named-placeholder statement compiler.
//!
//! Templates use `:name;` placeholders. Compilation rewrites them into
//! driver-native positional markers and records which 1-based positions each
//! name occupies, so the binder can later resolve names back to positions.
//! Placeholders are located by a plain left-to-right scan; the template must
//! not contain stray `:` characters outside placeholders.

use std::collections::HashMap;

use crate::error::SqlTemplateError;

/// Per-name repetition counts for expanding one placeholder occurrence into
/// several positional markers (the `IN (...)` list case).
pub type Repetition = HashMap<String, usize>;

const PLACEHOLDER_START: char = ':';
const PLACEHOLDER_END: char = ';';

/// A statement template compiled down to positional placeholders.
///
/// Immutable once built; each execution surface operation compiles its own
/// instance and releases it with the statement it prepared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledSql {
    sql: String,
    positions: HashMap<String, Vec<usize>>,
    parameter_count: usize,
}

impl CompiledSql {
    /// Compile `template`, replacing each `:name;` placeholder with a `?`
    /// marker. A name with an entry in `repetition` expands every occurrence
    /// into that many comma-separated markers; names without an entry occupy
    /// exactly one position per occurrence. All positions a name occupies,
    /// across all of its occurrences, are recorded under that one name.
    ///
    /// # Errors
    /// Returns [`SqlTemplateError::Compile`] when a placeholder has no
    /// terminating `;` before the template ends.
    pub fn compile(template: &str, repetition: &Repetition) -> Result<Self, SqlTemplateError> {
        let mut sql = String::with_capacity(template.len());
        let mut positions: HashMap<String, Vec<usize>> = HashMap::new();
        let mut next_position = 1usize;
        let mut rest = template;

        while let Some(start) = rest.find(PLACEHOLDER_START) {
            let Some(len) = rest[start + 1..].find(PLACEHOLDER_END) else {
                return Err(SqlTemplateError::Compile {
                    sql: template.to_owned(),
                });
            };
            let name = &rest[start + 1..start + 1 + len];
            let count = repetition.get(name).copied().unwrap_or(1).max(1);

            sql.push_str(&rest[..start]);
            for i in 0..count {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push('?');
            }

            let entry = positions.entry(name.to_owned()).or_default();
            entry.extend(next_position..next_position + count);
            next_position += count;
            rest = &rest[start + 1 + len + 1..];
        }
        sql.push_str(rest);

        Ok(CompiledSql {
            sql,
            positions,
            parameter_count: next_position - 1,
        })
    }

    /// The positional SQL to hand to the driver.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The 1-based positions `name` occupies, in occurrence order; empty when
    /// the statement has no placeholder with that name.
    #[must_use]
    pub fn positions(&self, name: &str) -> &[usize] {
        self.positions.get(name).map_or(&[], Vec::as_slice)
    }

    /// Total number of positional markers in the compiled SQL.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    /// Distinct placeholder names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.positions.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_placeholder_maps_to_first_position() {
        let compiled =
            CompiledSql::compile("SELECT * FROM t WHERE a = :a;", &Repetition::new()).unwrap();
        assert_eq!(compiled.sql(), "SELECT * FROM t WHERE a = ?");
        assert_eq!(compiled.positions("a"), &[1]);
        assert_eq!(compiled.parameter_count(), 1);
    }

    #[test]
    fn repeated_name_records_all_positions_under_one_entry() {
        let compiled = CompiledSql::compile(
            "SELECT * FROM t WHERE a = :x; OR b = :x; OR c = :y;",
            &Repetition::new(),
        )
        .unwrap();
        assert_eq!(compiled.sql(), "SELECT * FROM t WHERE a = ? OR b = ? OR c = ?");
        assert_eq!(compiled.positions("x"), &[1, 2]);
        assert_eq!(compiled.positions("y"), &[3]);
        assert_eq!(compiled.names().count(), 2);
    }

    #[test]
    fn repetition_expands_into_comma_separated_markers() {
        let mut repetition = Repetition::new();
        repetition.insert("ids".to_owned(), 3);
        let compiled =
            CompiledSql::compile("DELETE FROM t WHERE id IN (:ids;)", &repetition).unwrap();
        assert_eq!(compiled.sql(), "DELETE FROM t WHERE id IN (?, ?, ?)");
        assert_eq!(compiled.positions("ids"), &[1, 2, 3]);
        assert_eq!(compiled.parameter_count(), 3);
    }

    #[test]
    fn positions_after_an_expanded_name_stay_correct() {
        let mut repetition = Repetition::new();
        repetition.insert("ids".to_owned(), 2);
        let compiled = CompiledSql::compile(
            "SELECT * FROM t WHERE id IN (:ids;) AND name = :name;",
            &repetition,
        )
        .unwrap();
        assert_eq!(compiled.positions("ids"), &[1, 2]);
        assert_eq!(compiled.positions("name"), &[3]);
    }

    #[test]
    fn position_count_defaults_to_one_per_distinct_name() {
        let compiled = CompiledSql::compile(
            "INSERT INTO t (a, b) VALUES (:a;, :b;)",
            &Repetition::new(),
        )
        .unwrap();
        for name in ["a", "b"] {
            assert_eq!(compiled.positions(name).len(), 1);
        }
    }

    #[test]
    fn unterminated_placeholder_is_a_compile_error() {
        let err =
            CompiledSql::compile("SELECT * FROM t WHERE a = :a", &Repetition::new()).unwrap_err();
        assert!(matches!(err, SqlTemplateError::Compile { .. }));
    }

    #[test]
    fn template_without_placeholders_passes_through() {
        let compiled = CompiledSql::compile("SELECT 1", &Repetition::new()).unwrap();
        assert_eq!(compiled.sql(), "SELECT 1");
        assert_eq!(compiled.parameter_count(), 0);
        assert!(compiled.positions("anything").is_empty());
    }
}
