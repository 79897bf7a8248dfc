//! Integration tests for check declaration parsing
//!
//! Uses a trivial `test_check` type registered for deployments only.

use checks::{
    docs, Check, CheckConfig, CheckError, CheckParser, CheckPluginRegistry, CheckResult, CheckUsage,
    Resource, ResourceKind,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

const MINIMAL: &str = r#"[{
    "name": "minimal",
    "command": "test_check",
    "interval": 1
}]"#;

const MULTIPLE: &str = r#"[
    {"name": "minimal", "command": "test_check", "interval": 1},
    {"name": "minimal2", "command": "test_check", "interval": 1}
]"#;

const PARTIAL_VALID: &str = r#"[
    {"name": "minimal", "command": "test_check", "interval": 1},
    {"derp": "100%"}
]"#;

const ARBITRARY_FIELDS: &str = r#"[{
    "name": "minimal",
    "command": "test_check",
    "interval": 1,
    "foo": "bar"
}]"#;

const ARGV: &str = r#"[{
    "name": "minimal",
    "command": "test_check -a 1 --bar \"2 3\"",
    "interval": 1
}]"#;

const GARBAGE: &str = r#"["broken"#;

#[derive(Debug)]
struct TestCheck {
    config: CheckConfig,
}

impl TestCheck {
    fn boxed(config: CheckConfig) -> Result<Box<dyn Check>, CheckError> {
        Ok(Box::new(Self { config }))
    }

    fn static_usage() -> CheckUsage {
        CheckUsage {
            description: "description".to_string(),
            flags: "flags".to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Check for TestCheck {
    fn config(&self) -> &CheckConfig {
        &self.config
    }

    fn update(&mut self, _resource: Arc<Resource>) {}

    async fn execute(&mut self) -> Result<CheckResult, CheckError> {
        Ok(CheckResult::new(self.config.clone()))
    }

    fn usage(&self) -> CheckUsage {
        Self::static_usage()
    }
}

fn registry() -> CheckPluginRegistry {
    let mut registry = CheckPluginRegistry::new();
    registry
        .register("test_check", TestCheck::boxed, TestCheck::static_usage, &[ResourceKind::Deployment])
        .unwrap();
    registry
}

fn parser() -> CheckParser {
    CheckParser::new(Arc::new(registry()))
}

fn parse(json: &str) -> (Vec<Box<dyn Check>>, Vec<CheckError>) {
    parser().parse(json, "testSource", ResourceKind::Deployment)
}

#[test]
fn test_new_check() {
    let config = CheckConfig {
        name: "test_name".to_string(),
        command: "test_check".to_string(),
        interval: 1,
        id: "test_check".to_string(),
        ..Default::default()
    };
    let check = registry().build(config, ResourceKind::Deployment).unwrap();
    assert_eq!(check.config().name, "test_name");
}

#[test]
fn test_new_check_filtered_by_kind() {
    let config = CheckConfig {
        name: "test_name".to_string(),
        command: "test_check".to_string(),
        interval: 1,
        id: "test_check".to_string(),
        ..Default::default()
    };
    let err = registry().build(config, ResourceKind::Pod).unwrap_err();
    assert!(matches!(err, CheckError::IncompatibleResource { .. }));
}

#[test]
fn test_register_check_twice() {
    let mut registry = registry();
    let err = registry
        .register("test_check", TestCheck::boxed, TestCheck::static_usage, &[ResourceKind::Pod])
        .unwrap_err();
    assert!(matches!(err, CheckError::AlreadyRegistered(id) if id == "test_check"));

    // the first registration is untouched
    let parser = CheckParser::new(Arc::new(registry));
    assert!(parser.parse(MINIMAL, "src", ResourceKind::Pod).0.is_empty());
    assert_eq!(parser.parse(MINIMAL, "src", ResourceKind::Deployment).0.len(), 1);
}

#[test]
fn test_parse_minimal() {
    let (checks, errors) = parse(MINIMAL);
    assert!(errors.is_empty());
    assert_eq!(checks.len(), 1);

    let config = checks[0].config();
    assert_eq!(config.name, "minimal");
    assert_eq!(config.command, "test_check");
    assert_eq!(config.interval, 1);
    assert_eq!(config.source.as_deref(), Some("testSource"));
    assert_eq!(config.id, "test_check");
    assert_eq!(config.argv, vec!["test_check"]);
    assert!(checks[0].hash() > 0);
}

#[test]
fn test_parse_with_defaults() {
    let mut defaults = Map::new();
    defaults.insert("interval".to_string(), json!(123));
    defaults.insert("foo".to_string(), json!("bar"));
    let parser = parser().with_defaults(defaults);

    let (checks, errors) = parser.parse(MINIMAL, "testSource", ResourceKind::Deployment);
    assert!(errors.is_empty());
    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0].config().interval, 1, "declaration overrides defaults");
    assert_eq!(checks[0].config().extra_fields.get("foo"), Some(&json!("bar")));
}

#[test]
fn test_parse_required_fields() {
    let cases = [
        r#"[{"command": "test_check", "interval": 1}]"#,
        r#"[{"name": "minimal", "interval": 1}]"#,
        r#"[{"name": "minimal", "command": "test_check"}]"#,
        r#"[{"name": "minimal", "command": "test_check", "interval": 0}]"#,
    ];
    for case in cases {
        let (checks, errors) = parse(case);
        assert!(checks.is_empty(), "{}", case);
        assert_eq!(errors.len(), 1, "{}", case);
    }
}

#[test]
fn test_parse_partial_valid() {
    let (checks, errors) = parse(PARTIAL_VALID);
    assert_eq!(checks.len(), 1);
    assert_eq!(errors.len(), 1);
}

#[test]
fn test_parse_arbitrary_fields() {
    let (checks, errors) = parse(ARBITRARY_FIELDS);
    assert!(errors.is_empty());
    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0].config().extra_fields.get("foo"), Some(&Value::from("bar")));
}

#[test]
fn test_parse_multiple() {
    let (checks, errors) = parse(MULTIPLE);
    assert!(errors.is_empty());
    assert_eq!(checks.len(), 2);
    assert_ne!(checks[0].hash(), checks[1].hash());
}

#[test]
fn test_parse_garbage() {
    let (checks, errors) = parse(GARBAGE);
    assert!(checks.is_empty());
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], CheckError::InvalidJson(_)));
}

#[test]
fn test_parse_not_an_array() {
    let (checks, errors) = parse(r#"{"name": "minimal", "command": "test_check", "interval": 1}"#);
    assert!(checks.is_empty());
    assert_eq!(errors.len(), 1);
}

#[test]
fn test_parse_empty_payload() {
    let (checks, errors) = parse("  ");
    assert!(checks.is_empty());
    assert!(errors.is_empty());

    let (checks, errors) = parse("[]");
    assert!(checks.is_empty());
    assert!(errors.is_empty());
}

#[test]
fn test_parse_argv() {
    let (checks, errors) = parse(ARGV);
    assert!(errors.is_empty());
    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0].config().argv, vec!["test_check", "-a", "1", "--bar", "2 3"]);
}

#[test]
fn test_parse_unknown_check() {
    let (checks, errors) = parse(r#"[{"name": "n", "command": "nope --x", "interval": 1}]"#);
    assert!(checks.is_empty());
    assert!(matches!(&errors[0], CheckError::UnknownCheck(id) if id == "nope"));
}

#[test]
fn test_parse_same_declaration_same_hash() {
    let (first, _) = parse(MINIMAL);
    let (second, _) = parse(MINIMAL);
    assert_eq!(first[0].hash(), second[0].hash());
}

#[test]
fn test_builtin_checks_from_annotation() {
    let parser = CheckParser::new(Arc::new(CheckPluginRegistry::with_builtin_checks()));
    let json = r#"[
        {"name": "deploy", "command": "deployment_status -w 0.8 -c 0.6", "interval": 60},
        {"name": "bad", "command": "deployment_status -w 3", "interval": 60},
        {"name": "probe", "command": "http -u http://:::POD_IP:::/health", "interval": 60}
    ]"#;
    let (checks, errors) = parser.parse(json, "web.deployment.default", ResourceKind::Deployment);

    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0].config().name, "deploy");
    // one rejected flag, one check not compatible with deployments
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().any(|e| matches!(e, CheckError::InvalidArgs { .. })));
    assert!(errors.iter().any(|e| matches!(e, CheckError::IncompatibleResource { .. })));
}

#[test]
fn test_docs_complete_and_valid() {
    let registry = CheckPluginRegistry::with_builtin_checks();
    let docs = registry.docs();
    assert_eq!(docs.len(), registry.ids().len());
    for doc in &docs {
        assert!(!doc.usage.description.is_empty(), "{} has no description", doc.id);
        assert!(!doc.usage.flags.is_empty(), "{} has no flags", doc.id);
        assert!(!doc.resources.is_empty(), "{} has no resources", doc.id);
    }

    let text = docs::render_text(&registry);
    let md = docs::render_markdown(&registry);
    for id in registry.ids() {
        assert!(text.contains(&id));
        assert!(md.contains(&format!("### `{}`", id)));
    }
}
