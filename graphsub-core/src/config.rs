use std::collections::HashMap;
use std::time::Duration;

use tracing::warn;

const RELATIONSHIP_KEYS: [&str; 3] = ["relationship", "createdRelationship", "deletedRelationship"];

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Payloads buffered per subscription before the dispatcher gives up on it
    pub queue_capacity: usize,
    /// Close a subscription whose queue overflows instead of dropping the
    /// payload and keeping it open
    pub close_on_overflow: bool,
    /// Key used for the relationship object when a CONNECTED/DISCONNECTED
    /// subscription selects nothing
    pub default_relationship_key: String,
    /// How long shutdown waits for queued payloads to be delivered before it
    /// abandons stalled subscribers
    pub shutdown_grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_map(&HashMap::new())
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let mut values = HashMap::new();
        for (key, default) in Self::tracked_keys() {
            let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
            values.insert(key.to_string(), value);
        }
        Self::from_map(&values)
    }

    pub fn from_map(values: &HashMap<String, String>) -> Self {
        fn parse_bool(key: &str, input: Option<&String>, default: bool) -> bool {
            match input.map(|value| value.trim().to_ascii_lowercase()) {
                None => default,
                Some(value) if matches!(value.as_str(), "1" | "true" | "yes" | "on") => true,
                Some(value) if matches!(value.as_str(), "0" | "false" | "no" | "off") => false,
                Some(value) => {
                    warn!("Ignoring {}={:?}: expected a boolean, using {}", key, value, default);
                    default
                }
            }
        }

        fn parse_positive(key: &str, input: Option<&String>, default: u64) -> u64 {
            match input.map(|value| value.trim().parse::<u64>()) {
                None => default,
                Some(Ok(value)) if value > 0 => value,
                Some(_) => {
                    warn!(
                        "Ignoring {}={:?}: expected a positive integer, using {}",
                        key,
                        input.map(String::as_str).unwrap_or_default(),
                        default
                    );
                    default
                }
            }
        }

        let queue_capacity =
            parse_positive("GRAPHSUB_QUEUE_CAPACITY", values.get("GRAPHSUB_QUEUE_CAPACITY"), 256)
                as usize;
        let close_on_overflow = parse_bool(
            "GRAPHSUB_CLOSE_ON_OVERFLOW",
            values.get("GRAPHSUB_CLOSE_ON_OVERFLOW"),
            true,
        );
        let default_relationship_key = match values.get("GRAPHSUB_RELATIONSHIP_KEY") {
            None => "relationship",
            Some(value) if RELATIONSHIP_KEYS.contains(&value.trim()) => value.trim(),
            Some(value) => {
                warn!(
                    "Ignoring GRAPHSUB_RELATIONSHIP_KEY={:?}: expected one of {}, using relationship",
                    value,
                    RELATIONSHIP_KEYS.join(", ")
                );
                "relationship"
            }
        }
        .to_string();
        let shutdown_grace = Duration::from_millis(parse_positive(
            "GRAPHSUB_SHUTDOWN_GRACE_MS",
            values.get("GRAPHSUB_SHUTDOWN_GRACE_MS"),
            1000,
        ));

        Self {
            queue_capacity,
            close_on_overflow,
            default_relationship_key,
            shutdown_grace,
        }
    }

    fn tracked_keys() -> Vec<(&'static str, &'static str)> {
        vec![
            ("GRAPHSUB_QUEUE_CAPACITY", "256"),
            ("GRAPHSUB_CLOSE_ON_OVERFLOW", "true"),
            ("GRAPHSUB_RELATIONSHIP_KEY", "relationship"),
            ("GRAPHSUB_SHUTDOWN_GRACE_MS", "1000"),
        ]
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_close_on_overflow(mut self, close: bool) -> Self {
        self.close_on_overflow = close;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn logged_while(f: impl FnOnce()) -> String {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .without_time()
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = log.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    fn map(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.queue_capacity, 256);
        assert!(config.close_on_overflow);
        assert_eq!(config.default_relationship_key, "relationship");
        assert_eq!(config.shutdown_grace, Duration::from_secs(1));
    }

    #[test]
    fn test_from_map_reads_overrides() {
        let config = EngineConfig::from_map(&map(&[
            ("GRAPHSUB_QUEUE_CAPACITY", "8"),
            ("GRAPHSUB_CLOSE_ON_OVERFLOW", "off"),
            ("GRAPHSUB_RELATIONSHIP_KEY", "createdRelationship"),
            ("GRAPHSUB_SHUTDOWN_GRACE_MS", "250"),
        ]));
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.shutdown_grace, Duration::from_millis(250));
        assert!(!config.close_on_overflow);
        assert_eq!(config.default_relationship_key, "createdRelationship");
    }

    #[test]
    fn test_from_map_ignores_bad_values() {
        let config = EngineConfig::from_map(&map(&[
            ("GRAPHSUB_QUEUE_CAPACITY", "0"),
            ("GRAPHSUB_CLOSE_ON_OVERFLOW", "maybe"),
            ("GRAPHSUB_RELATIONSHIP_KEY", "edges"),
            ("GRAPHSUB_SHUTDOWN_GRACE_MS", "soon"),
        ]));
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_bad_values_are_logged() {
        let output = logged_while(|| {
            EngineConfig::from_map(&map(&[
                ("GRAPHSUB_QUEUE_CAPACITY", "lots"),
                ("GRAPHSUB_CLOSE_ON_OVERFLOW", "maybe"),
                ("GRAPHSUB_RELATIONSHIP_KEY", "edges"),
            ]));
        });
        assert!(output.contains("WARN"));
        assert!(output.contains("GRAPHSUB_QUEUE_CAPACITY=\"lots\""));
        assert!(output.contains("GRAPHSUB_CLOSE_ON_OVERFLOW=\"maybe\""));
        assert!(output.contains("GRAPHSUB_RELATIONSHIP_KEY=\"edges\""));

        let output = logged_while(|| {
            EngineConfig::from_map(&map(&[
                ("GRAPHSUB_QUEUE_CAPACITY", "8"),
                ("GRAPHSUB_CLOSE_ON_OVERFLOW", "no"),
            ]));
        });
        assert!(output.is_empty(), "unexpected warnings: {}", output);
    }
}
