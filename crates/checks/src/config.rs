//! Check declarations and their identity.
//!
//! A resource annotation holds a JSON array of check declarations. Each
//! declaration is merged with the process defaults, decoded into a
//! [`CheckConfig`], validated, tokenized and hashed. The hash is the check's
//! identity inside its resource's check set: any change to the effective
//! declaration yields a different check.

use crate::check::Check;
use crate::error::CheckError;
use crate::plugin::CheckPluginRegistry;
use crate::resource::ResourceKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Fully resolved check declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Check name, reported to the monitoring system
    pub name: String,

    /// Command line; the first token is the check id
    pub command: String,

    /// Interval between executions in seconds
    pub interval: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handlers: Option<Vec<String>>,

    /// Reporting source; defaults to the check source of the owning resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Explicit deregistration override for the owning check source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deregister: Option<bool>,

    /// Check id (first token of `command`)
    #[serde(skip)]
    pub id: String,

    /// Content hash of the resolved declaration
    #[serde(skip)]
    pub hash: u64,

    /// Tokenized command
    #[serde(skip)]
    pub argv: Vec<String>,

    /// Declaration fields that are not part of the known set
    #[serde(skip)]
    pub extra_fields: Map<String, Value>,
}

impl CheckConfig {
    /// Minimal config for a check id, used for documentation placeholders
    pub fn placeholder(id: &str) -> Self {
        Self {
            name: id.to_string(),
            command: id.to_string(),
            interval: 1,
            id: id.to_string(),
            argv: vec![id.to_string()],
            ..Default::default()
        }
    }

    /// Interval as a duration (never zero)
    pub fn interval_duration(&self) -> Duration {
        Duration::from_secs(self.interval.max(1).unsigned_abs())
    }

    /// Reporting source, or an empty string when unset
    pub fn source_name(&self) -> &str {
        self.source.as_deref().unwrap_or("")
    }

    /// Arguments after the check id
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or(&[])
    }

    fn content_hash(&self) -> Result<u64, CheckError> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.insert("id".to_string(), Value::String(self.id.clone()));
            map.insert(
                "argv".to_string(),
                Value::Array(self.argv.iter().cloned().map(Value::String).collect()),
            );
            map.insert("extra_fields".to_string(), Value::Object(self.extra_fields.clone()));
        }

        let mut canonical = String::new();
        write_canonical(&value, &mut canonical)?;

        let digest = Sha256::digest(canonical.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        Ok(u64::from_be_bytes(bytes))
    }
}

/// Known declaration fields plus everything else, collected verbatim
#[derive(Deserialize)]
struct Declaration {
    #[serde(default)]
    name: String,
    #[serde(default)]
    command: String,
    #[serde(default)]
    interval: Option<Number>,
    #[serde(default)]
    handler: Option<String>,
    #[serde(default)]
    handlers: Option<Vec<String>>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    deregister: Option<bool>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Interval in whole seconds; `60` and `60.0` are the same interval
fn whole_seconds(interval: Option<&Number>) -> Result<i64, CheckError> {
    let Some(number) = interval else {
        return Ok(0);
    };
    if let Some(secs) = number.as_i64() {
        return Ok(secs);
    }
    match number.as_f64() {
        Some(secs) if secs.fract() == 0.0 && secs >= i64::MIN as f64 && secs < i64::MAX as f64 => {
            Ok(secs as i64)
        }
        _ => Err(CheckError::invalid_field("interval", "must be a whole number of seconds")),
    }
}

/// Writes JSON with object keys in sorted order so that equal values
/// always render identically.
///
/// Keys are sorted here rather than relying on `Map` ordering, which turns
/// into insertion order once serde_json's `preserve_order` feature is
/// enabled anywhere in the dependency graph.
fn write_canonical(value: &Value, out: &mut String) -> Result<(), CheckError> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(&map[key], out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        // scalars have a single rendering
        other => out.push_str(&other.to_string()),
    }
    Ok(())
}

/// Turns annotation payloads into check instances.
///
/// Holds the plugin registry and the operator defaults so neither has to
/// live in global state.
pub struct CheckParser {
    plugins: Arc<CheckPluginRegistry>,
    defaults: Map<String, Value>,
}

impl CheckParser {
    /// Creates a parser without defaults
    pub fn new(plugins: Arc<CheckPluginRegistry>) -> Self {
        Self {
            plugins,
            defaults: Map::new(),
        }
    }

    /// Sets the fields merged into every declaration that does not set them
    pub fn with_defaults(mut self, defaults: Map<String, Value>) -> Self {
        self.defaults = defaults;
        self
    }

    /// Parses an annotation payload (a JSON array of declarations).
    ///
    /// Returns every check that parsed plus one error per rejected
    /// declaration. A payload that is not a JSON array yields no checks and
    /// a single error.
    pub fn parse(
        &self,
        json: &str,
        check_source: &str,
        kind: ResourceKind,
    ) -> (Vec<Box<dyn Check>>, Vec<CheckError>) {
        if json.trim().is_empty() {
            return (Vec::new(), Vec::new());
        }

        match serde_json::from_str::<Vec<Value>>(json) {
            Ok(items) => self.parse_items(items, check_source, kind),
            Err(e) => (Vec::new(), vec![CheckError::InvalidJson(e)]),
        }
    }

    /// Parses already decoded declarations, each one independently
    pub fn parse_items(
        &self,
        items: Vec<Value>,
        check_source: &str,
        kind: ResourceKind,
    ) -> (Vec<Box<dyn Check>>, Vec<CheckError>) {
        let mut checks = Vec::new();
        let mut errors = Vec::new();

        for item in items {
            let result = match item {
                Value::Object(map) => self
                    .parse_config(map, check_source)
                    .and_then(|config| self.plugins.build(config, kind)),
                other => Err(CheckError::InvalidJson(serde::de::Error::custom(format!(
                    "check declaration must be an object, got {}",
                    other
                )))),
            };
            match result {
                Ok(check) => checks.push(check),
                Err(e) => errors.push(e),
            }
        }

        (checks, errors)
    }

    /// Resolves one declaration into a validated, hashed config
    pub fn parse_config(
        &self,
        mut item: Map<String, Value>,
        check_source: &str,
    ) -> Result<CheckConfig, CheckError> {
        // shallow merge: declared keys always win
        for (key, value) in &self.defaults {
            if !item.contains_key(key) {
                item.insert(key.clone(), value.clone());
            }
        }

        let name_hint = item
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let decl: Declaration = serde_json::from_value(Value::Object(item))
            .map_err(|source| CheckError::Decode { name: name_hint, source })?;

        let mut config = CheckConfig {
            name: decl.name.trim().to_string(),
            command: decl.command,
            interval: whole_seconds(decl.interval.as_ref())?,
            handler: decl.handler,
            handlers: decl.handlers,
            source: Some(decl.source.unwrap_or_else(|| check_source.to_string())),
            deregister: decl.deregister,
            extra_fields: decl.extra,
            ..Default::default()
        };

        if config.name.is_empty() {
            return Err(CheckError::invalid_field("name", "must not be empty"));
        }
        if config.command.is_empty() {
            return Err(CheckError::invalid_field("command", "must not be empty"));
        }
        if config.interval <= 0 {
            return Err(CheckError::invalid_field("interval", "must be non-empty and > 0"));
        }

        let argv = shell_words::split(&config.command).map_err(|e| CheckError::Command {
            name: config.name.clone(),
            reason: e.to_string(),
        })?;
        let Some(id) = argv.first() else {
            return Err(CheckError::Command {
                name: config.name.clone(),
                reason: "must not be empty".to_string(),
            });
        };
        config.id = id.clone();
        config.argv = argv;

        // keep last: the hash covers the fully processed config
        config.hash = config.content_hash()?;
        debug!("{} {}: parsed check {:016x}", check_source, config.name, config.hash);

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parser() -> CheckParser {
        CheckParser::new(Arc::new(CheckPluginRegistry::new()))
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_parse_config_minimal() {
        let config = parser()
            .parse_config(
                object(json!({"name": " minimal ", "command": "test_check", "interval": 1})),
                "testSource",
            )
            .unwrap();
        assert_eq!(config.name, "minimal");
        assert_eq!(config.id, "test_check");
        assert_eq!(config.argv, vec!["test_check"]);
        assert_eq!(config.source.as_deref(), Some("testSource"));
        assert!(config.extra_fields.is_empty());
        assert_ne!(config.hash, 0);
    }

    #[test]
    fn test_parse_config_argv_quoting() {
        let config = parser()
            .parse_config(
                object(json!({"name": "n", "command": "foo -a 1 --bar \"2 3\"", "interval": 1})),
                "src",
            )
            .unwrap();
        assert_eq!(config.id, "foo");
        assert_eq!(config.argv, vec!["foo", "-a", "1", "--bar", "2 3"]);
        assert_eq!(config.args(), ["-a", "1", "--bar", "2 3"]);
    }

    #[test]
    fn test_parse_config_unbalanced_quote() {
        let err = parser()
            .parse_config(
                object(json!({"name": "n", "command": "foo \"bar", "interval": 1})),
                "src",
            )
            .unwrap_err();
        assert!(matches!(err, CheckError::Command { .. }));
    }

    #[test]
    fn test_parse_config_whitespace_command() {
        let err = parser()
            .parse_config(object(json!({"name": "n", "command": "   ", "interval": 1})), "src")
            .unwrap_err();
        assert!(matches!(err, CheckError::Command { .. }));
    }

    #[test]
    fn test_parse_config_required_fields() {
        let cases = [
            json!({"command": "test_check", "interval": 1}),
            json!({"name": "   ", "command": "test_check", "interval": 1}),
            json!({"name": "n", "interval": 1}),
            json!({"name": "n", "command": "test_check"}),
            json!({"name": "n", "command": "test_check", "interval": 0}),
            json!({"name": "n", "command": "test_check", "interval": -5}),
            json!({"name": "n", "command": "test_check", "interval": 1.5}),
            json!({"name": "n", "command": "test_check", "interval": -60.0}),
        ];
        for case in cases {
            let err = parser().parse_config(object(case.clone()), "src");
            assert!(
                matches!(err, Err(CheckError::InvalidField { .. })),
                "expected invalid field for {}",
                case
            );
        }
    }

    #[test]
    fn test_write_canonical() {
        let mut out = String::new();
        write_canonical(&json!({"b": 1.5, "a": [true, null, "x\"y"], "c": {"z": -1, "y": {}}}), &mut out).unwrap();
        assert_eq!(out, r#"{"a":[true,null,"x\"y"],"b":1.5,"c":{"y":{},"z":-1}}"#);
    }

    #[test]
    fn test_parse_config_float_interval() {
        let whole = parser()
            .parse_config(object(json!({"name": "n", "command": "test_check", "interval": 60})), "src")
            .unwrap();
        let float = parser()
            .parse_config(object(json!({"name": "n", "command": "test_check", "interval": 60.0})), "src")
            .unwrap();
        assert_eq!(float.interval, 60);
        assert_eq!(float.hash, whole.hash);

        let err = parser()
            .parse_config(object(json!({"name": "n", "command": "test_check", "interval": 0.5})), "src")
            .unwrap_err();
        assert!(matches!(err, CheckError::InvalidField { field: "interval", .. }));
    }

    #[test]
    fn test_parse_config_wrong_type() {
        let err = parser()
            .parse_config(
                object(json!({"name": "n", "command": "test_check", "interval": "soon"})),
                "src",
            )
            .unwrap_err();
        assert!(matches!(err, CheckError::Decode { name, .. } if name == "n"));
    }

    #[test]
    fn test_defaults_do_not_override_declaration() {
        let parser = parser().with_defaults(object(json!({"interval": 123, "foo": "bar"})));
        let config = parser
            .parse_config(object(json!({"name": "n", "command": "test_check", "interval": 1})), "src")
            .unwrap();
        assert_eq!(config.interval, 1);
        assert_eq!(config.extra_fields.get("foo"), Some(&json!("bar")));

        let config = parser
            .parse_config(object(json!({"name": "n", "command": "test_check"})), "src")
            .unwrap();
        assert_eq!(config.interval, 123);
    }

    #[test]
    fn test_declared_source_overrides_check_source() {
        let config = parser()
            .parse_config(
                object(json!({"name": "n", "command": "c", "interval": 1, "source": "elsewhere"})),
                "src",
            )
            .unwrap();
        assert_eq!(config.source_name(), "elsewhere");
    }

    #[test]
    fn test_hash_is_stable() {
        let decl = json!({"name": "n", "command": "c -x 1", "interval": 10, "a": {"z": 1, "b": [1, 2]}, "m": "x"});
        let first = parser().parse_config(object(decl.clone()), "src").unwrap();
        let second = parser().parse_config(object(decl), "src").unwrap();
        assert_eq!(first.hash, second.hash);

        // same content, different key order
        let reordered: Value =
            serde_json::from_str(r#"{"m":"x","a":{"b":[1,2],"z":1},"interval":10,"command":"c -x 1","name":"n"}"#)
                .unwrap();
        let third = parser().parse_config(object(reordered), "src").unwrap();
        assert_eq!(first.hash, third.hash);
    }

    #[test]
    fn test_hash_changes_with_any_field() {
        let base = json!({"name": "n", "command": "c -x 1", "interval": 10, "foo": "bar"});
        let hash = parser().parse_config(object(base), "src").unwrap().hash;

        let variants = [
            json!({"name": "n2", "command": "c -x 1", "interval": 10, "foo": "bar"}),
            json!({"name": "n", "command": "c -x 2", "interval": 10, "foo": "bar"}),
            json!({"name": "n", "command": "c -x 1", "interval": 11, "foo": "bar"}),
            json!({"name": "n", "command": "c -x 1", "interval": 10, "foo": "baz"}),
            json!({"name": "n", "command": "c -x 1", "interval": 10, "foo": "bar", "deregister": false}),
        ];
        for variant in variants {
            let other = parser().parse_config(object(variant.clone()), "src").unwrap().hash;
            assert_ne!(hash, other, "hash should change for {}", variant);
        }

        let other_source = parser()
            .parse_config(object(json!({"name": "n", "command": "c -x 1", "interval": 10, "foo": "bar"})), "src2")
            .unwrap()
            .hash;
        assert_ne!(hash, other_source);
    }

    #[test]
    fn test_defaults_participate_in_hash() {
        let decl = json!({"name": "n", "command": "c", "interval": 1});
        let plain = parser().parse_config(object(decl.clone()), "src").unwrap().hash;
        let with_default = parser()
            .with_defaults(object(json!({"handler": "pager"})))
            .parse_config(object(decl), "src")
            .unwrap();
        assert_eq!(with_default.handler.as_deref(), Some("pager"));
        assert_ne!(plain, with_default.hash);
    }

    #[test]
    fn test_interval_duration() {
        let mut config = CheckConfig::placeholder("x");
        config.interval = 30;
        assert_eq!(config.interval_duration(), Duration::from_secs(30));
    }
}
