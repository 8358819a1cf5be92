// Interactive session state: the loaded dataset, the resolver, and an
// append-only log of what was asked.

use chrono::{DateTime, Local};
use uuid::Uuid;

use gridask_engine::Dataset;
use gridask_io::SourceInfo;
use gridask_query::{Outcome, Query, Resolver};

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub query: String,
    /// One-line outcome summary, e.g. "ok [pattern_matched] table 5x3"
    pub summary: String,
    pub success: bool,
    pub timestamp: DateTime<Local>,
}

/// Queries asked in this session, oldest first. Entries are never edited.
#[derive(Debug, Default)]
pub struct QueryLog {
    entries: Vec<LogEntry>,
}

impl QueryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, query: &str, outcome: &Outcome) {
        self.entries.push(LogEntry {
            query: query.to_string(),
            summary: outcome.summary(),
            success: outcome.is_success(),
            timestamp: Local::now(),
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// `:history` listing, one numbered line per entry.
    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            return "(no queries yet)".to_string();
        }
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| {
                format!("{:>3}  {}  {}\n     {}", i + 1, e.timestamp.format("%H:%M:%S"), e.query, e.summary)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub struct Session {
    id: Uuid,
    dataset: Dataset,
    source: SourceInfo,
    resolver: Resolver,
    log: QueryLog,
}

impl Session {
    pub fn new(dataset: Dataset, source: SourceInfo, resolver: Resolver) -> Self {
        let id = Uuid::new_v4();
        log::debug!("session {} opened on {} ({})", id, source.file_name, source.fingerprint);
        Self { id, dataset, source, resolver, log: QueryLog::new() }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn source(&self) -> &SourceInfo {
        &self.source
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn log(&self) -> &QueryLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut QueryLog {
        &mut self.log
    }

    /// Resolve one question and remember it.
    pub fn ask(&mut self, text: &str) -> Outcome {
        let query = Query::new(text);
        let outcome = self.resolver.resolve_query(&self.dataset, &query);
        self.log.record(query.raw(), &outcome);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridask_engine::Value;
    use gridask_query::ResolverConfig;

    fn session() -> Session {
        let ds = Dataset::from_columns(vec![("x", vec![Value::Int(1), Value::Int(2)])]).unwrap();
        let source = SourceInfo {
            file_name: "x.csv".into(),
            encoding: "utf-8".into(),
            fingerprint: "abc".into(),
            bytes: 6,
        };
        Session::new(ds, source, Resolver::pattern_only(ResolverConfig::default()))
    }

    #[test]
    fn test_log_appends_in_order() {
        let mut s = session();
        s.ask("how many rows");
        s.ask("something the rules do not know");
        let entries = s.log().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].query, "how many rows");
        assert!(entries[0].success);
        assert!(!entries[1].success);
        assert!(entries[1].summary.contains("backend_unavailable"));
    }

    #[test]
    fn test_dataset_is_the_loaded_one() {
        let s = session();
        assert_eq!(s.dataset().column_names(), vec!["x"]);
        assert_eq!(s.dataset().n_rows(), 2);
        assert_eq!(s.source().file_name, "x.csv");
    }

    #[test]
    fn test_clear_and_render() {
        let mut s = session();
        assert_eq!(s.log().render(), "(no queries yet)");
        s.ask("list columns");
        assert!(s.log().render().contains("  1  "));
        s.log_mut().clear();
        assert!(s.log().is_empty());
    }
}
