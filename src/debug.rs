use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// JSONL event log for pagination runs. One line per event, plus named
/// counters that are drained into a summary line on request.
#[derive(Clone)]
pub(crate) struct DebugLogger {
    inner: Arc<Mutex<DebugState>>,
}

struct DebugState {
    writer: BufWriter<File>,
    counters: HashMap<String, u64>,
}

impl DebugLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(DebugState {
                writer: BufWriter::new(file),
                counters: HashMap::new(),
            })),
        })
    }

    pub fn log_event(&self, kind: &str, fields: &[(&str, String)]) {
        if let Ok(mut state) = self.inner.lock() {
            let mut json = format!("{{\"type\":\"{}\"", json_escape(kind));
            for (key, value) in fields {
                json.push_str(&format!(
                    ",\"{}\":\"{}\"",
                    json_escape(key),
                    json_escape(value)
                ));
            }
            json.push('}');
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn increment(&self, key: &str, amount: u64) {
        if let Ok(mut state) = self.inner.lock() {
            let entry = state.counters.entry(key.to_string()).or_insert(0);
            *entry = entry.saturating_add(amount);
        }
    }

    pub fn emit_summary(&self, context: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let mut counters: Vec<(String, u64)> = state.counters.drain().collect();
            counters.sort_by(|a, b| a.0.cmp(&b.0));
            let mut counts = String::from("{");
            for (idx, (key, value)) in counters.iter().enumerate() {
                if idx > 0 {
                    counts.push(',');
                }
                counts.push_str(&format!("\"{}\":{}", json_escape(key), value));
            }
            counts.push('}');
            let json = format!(
                "{{\"type\":\"paginate.summary\",\"context\":\"{}\",\"counts\":{}}}",
                json_escape(context),
                counts
            );
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

fn json_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_log_path(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!(
            "multicol_{tag}_{}_{}.jsonl",
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn events_and_summary_are_written_as_json_lines() {
        let path = temp_log_path("debug");
        let logger = DebugLogger::new(&path).expect("create log");
        logger.log_event("page.built", &[("index", "0".to_string())]);
        logger.increment("nodes.placed", 3);
        logger.increment("nodes.placed", 2);
        logger.emit_summary("paginate");
        logger.flush();

        let contents = std::fs::read_to_string(&path).expect("read log");
        let _ = std::fs::remove_file(&path);
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"type\":\"page.built\""));
        assert!(lines[0].contains("\"index\":\"0\""));
        assert!(lines[1].contains("\"nodes.placed\":5"));
    }

    #[test]
    fn escape_handles_quotes_and_newlines() {
        assert_eq!(json_escape("a\"b\nc"), "a\\\"b\\nc");
    }
}
