use std::env;

/// Read a single environment variable.
///
/// Config loaders take `&impl ReadEnv` so tests can hand them an
/// [`InMemoryEnv`](super::InMemoryEnv) instead of mutating the process
/// environment.
pub trait ReadEnv {
    fn var(&self, key: &str) -> Result<String, env::VarError>;

    /// Like [`var`](Self::var), but treats a blank value as unset.
    fn non_empty_var(&self, key: &str) -> Option<String> {
        self.var(key)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}
