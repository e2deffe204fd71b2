use std::fmt;

/// A point-in-time read of an engine's internal state.
///
/// The benchmark treats the snapshot as opaque text: it is only printed to the console once per
/// epoch. Each engine decides which fields it reports.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricsSnapshot {
    engine: &'static str,
    fields: Vec<(&'static str, String)>,
}

impl MetricsSnapshot {
    /// Creates an empty snapshot for the named engine.
    pub fn new(engine: &'static str) -> Self {
        Self {
            engine,
            fields: Vec::new(),
        }
    }

    /// Appends a named field.
    pub fn field(mut self, name: &'static str, value: impl fmt::Display) -> Self {
        self.fields.push((name, value.to_string()));
        self
    }

    /// Returns the rendered value of a field, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .fields
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0);

        writeln!(f, "engine: {}", self.engine)?;
        for (name, value) in &self.fields {
            writeln!(f, "  {name:<width$}  {value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_aligned_fields() {
        let snapshot = MetricsSnapshot::new("test")
            .field("segments", 4)
            .field("disk", "1.0 MiB");

        assert_eq!(
            snapshot.to_string(),
            "engine: test\n  segments  4\n  disk      1.0 MiB\n"
        );
        assert_eq!(snapshot.get("segments"), Some("4"));
        assert_eq!(snapshot.get("missing"), None);
    }
}
