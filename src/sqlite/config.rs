/// Options for opening a `SQLite` database.
///
/// Use [`SqliteOptions::in_memory`] for a shared in-memory database; plain
/// `:memory:` gives every connection its own private database, which defeats
/// a datasource that opens a connection per operation.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    path: String,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        SqliteOptions { path: path.into() }
    }

    /// A named in-memory database shared by every connection the datasource
    /// opens, alive as long as the datasource is.
    #[must_use]
    pub fn in_memory(name: &str) -> Self {
        SqliteOptions {
            path: format!("file:{name}?mode=memory&cache=shared"),
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn is_memory(&self) -> bool {
        self.path == ":memory:" || self.path.contains("mode=memory")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_builds_a_shared_cache_uri() {
        let options = SqliteOptions::in_memory("unit");
        assert_eq!(options.path(), "file:unit?mode=memory&cache=shared");
        assert!(options.is_memory());
    }

    #[test]
    fn file_paths_are_not_memory() {
        assert!(!SqliteOptions::new("/tmp/some.db").is_memory());
    }
}
