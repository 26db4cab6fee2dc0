//! 校验引擎集成测试
//!
//! 覆盖规则解析、逐字段执行、唯一性查询、校验闸门与强制模式的完整流程。

use serde_json::{Value, json};
use std::cell::Cell;
use std::sync::{Arc, Mutex};
use validation_engine::{
    AttributeSet, CollaboratorError, LifecyclePhase, Predicate, PredicateContext, RuleBook,
    RuleMap, RuleResolver, TemplateMessages, UniquenessLookup, Validatable, ValidationEngine,
    ValidationError, resolve,
};

/// 内存唯一性查询：(列, 值) -> 记录标识
#[derive(Default)]
struct InMemoryLookup {
    records: Vec<(String, Value, String)>,
    calls: Mutex<Vec<(String, Option<String>)>>,
}

impl InMemoryLookup {
    fn with_record(mut self, column: &str, value: Value, id: &str) -> Self {
        self.records.push((column.to_string(), value, id.to_string()));
        self
    }

    fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl UniquenessLookup for InMemoryLookup {
    fn exists(
        &self,
        field: &str,
        value: &Value,
        excluding: Option<&str>,
    ) -> Result<bool, CollaboratorError> {
        self.calls
            .lock()
            .unwrap()
            .push((field.to_string(), excluding.map(str::to_string)));

        Ok(self.records.iter().any(|(column, stored, id)| {
            column == field && stored == value && Some(id.as_str()) != excluding
        }))
    }
}

struct FailingLookup;

impl UniquenessLookup for FailingLookup {
    fn exists(
        &self,
        _field: &str,
        _value: &Value,
        _excluding: Option<&str>,
    ) -> Result<bool, CollaboratorError> {
        Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "lookup timed out").into())
    }
}

/// 要求数值为偶数
struct Even;

impl Predicate for Even {
    fn check(
        &self,
        value: Option<&Value>,
        _params: &[String],
        _ctx: &PredicateContext<'_>,
    ) -> Result<bool, CollaboratorError> {
        Ok(value.and_then(Value::as_i64).is_some_and(|n| n % 2 == 0))
    }
}

fn user_rules() -> RuleMap {
    RuleMap::new()
        .with("email", ["required", "format:email"])
        .with("age", ["required", "range:0-150"])
}

// ==================== 结论属性 ====================

#[test]
fn test_all_rules_pass_gives_valid_verdict() {
    let engine = ValidationEngine::new();
    let spec = resolve(&user_rules(), None, LifecyclePhase::Creating, None).unwrap();
    let attrs = AttributeSet::new()
        .with("email", "a@example.com")
        .with("age", 30);

    let verdict = engine.validate(&attrs, &spec).unwrap();

    assert!(verdict.is_valid());
    assert!(verdict.errors().is_empty());
}

#[test]
fn test_first_failure_gives_exactly_one_message() {
    let engine = ValidationEngine::new();
    let rules = RuleMap::new().with("email", ["required", "format:email", "max_length:5"]);
    let spec = resolve(&rules, None, LifecyclePhase::Creating, None).unwrap();

    let verdict = engine.validate(&AttributeSet::new(), &spec).unwrap();

    assert_eq!(verdict.messages("email").len(), 1);
    assert_eq!(verdict.first("email"), Some("required"));
}

#[test]
fn test_reference_example_from_json() {
    let engine = ValidationEngine::new();
    let rules = RuleMap::from_json(
        r#"{"email": ["required", "format:email"], "age": "required|range:0-150"}"#,
    )
    .unwrap();
    let spec = resolve(&rules, None, LifecyclePhase::Creating, None).unwrap();
    let attrs = AttributeSet::from_json(r#"{"email": "", "age": 200}"#).unwrap();

    let verdict = engine.validate(&attrs, &spec).unwrap();

    assert_eq!(
        serde_json::to_value(&verdict).unwrap(),
        json!({
            "valid": false,
            "errors": {"email": ["required"], "age": ["range:0-150"]}
        })
    );
}

// ==================== 阶段覆盖层与自排除 ====================

#[test]
fn test_update_overlay_replaces_field_rules() {
    let engine = ValidationEngine::new();
    let base = RuleMap::new().with("nickname", ["required", "length:3-10"]);
    let overlay = RuleMap::new().with("nickname", ["length:3-10"]);
    let attrs = AttributeSet::new();

    let creating = resolve(&base, None, LifecyclePhase::Creating, None).unwrap();
    assert!(!engine.validate(&attrs, &creating).unwrap().is_valid());

    let updating = resolve(&base, Some(&overlay), LifecyclePhase::Updating, Some("1")).unwrap();
    assert!(engine.validate(&attrs, &updating).unwrap().is_valid());
}

#[test]
fn test_unique_excludes_current_record() {
    let lookup = Arc::new(
        InMemoryLookup::default().with_record("email", json!("a@example.com"), "42"),
    );
    let engine = ValidationEngine::new().with_lookup(lookup.clone());
    let rules = RuleMap::new().with("email", ["required", "unique:email,{id}"]);
    let attrs = AttributeSet::new().with("email", "a@example.com");

    let own = resolve(&rules, None, LifecyclePhase::Updating, Some("42")).unwrap();
    assert!(engine.validate(&attrs, &own).unwrap().is_valid());

    let other = resolve(&rules, None, LifecyclePhase::Updating, Some("7")).unwrap();
    let verdict = engine.validate(&attrs, &other).unwrap();
    assert_eq!(verdict.first("email"), Some("unique:email,7"));

    assert_eq!(
        lookup.calls(),
        vec![
            ("email".to_string(), Some("42".to_string())),
            ("email".to_string(), Some("7".to_string())),
        ]
    );
}

#[test]
fn test_identifier_reaches_lookup_verbatim() {
    let lookup = Arc::new(
        InMemoryLookup::default()
            .with_record("email", json!("a@example.com"), "acme,inc")
            .with_record("handle", json!("neo"), " 42 "),
    );
    let engine = ValidationEngine::new().with_lookup(lookup.clone());
    let rules = RuleMap::new()
        .with("email", ["required", "unique:email,{id}"])
        .with("handle", ["unique:handle,{id}"]);
    let attrs = AttributeSet::new()
        .with("email", "a@example.com")
        .with("handle", "neo");

    let spec = resolve(&rules, None, LifecyclePhase::Updating, Some("acme,inc")).unwrap();
    let verdict = engine.validate(&attrs, &spec).unwrap();
    assert!(!verdict.has_error("email"));
    assert_eq!(verdict.first("handle"), Some("unique:handle,acme,inc"));

    let spec = resolve(&rules, None, LifecyclePhase::Updating, Some(" 42 ")).unwrap();
    let verdict = engine.validate(&attrs, &spec).unwrap();
    assert!(verdict.has_error("email"));
    assert!(!verdict.has_error("handle"));

    assert_eq!(
        lookup.calls(),
        vec![
            ("email".to_string(), Some("acme,inc".to_string())),
            ("handle".to_string(), Some("acme,inc".to_string())),
            ("email".to_string(), Some(" 42 ".to_string())),
            ("handle".to_string(), Some(" 42 ".to_string())),
        ]
    );
}

#[test]
fn test_missing_identifier_drops_only_that_rule() {
    let lookup = Arc::new(InMemoryLookup::default());
    let engine = ValidationEngine::new().with_lookup(lookup.clone());
    let rules = RuleMap::new().with("email", ["required", "unique:email,{id}", "format:email"]);

    let spec = resolve(&rules, None, LifecyclePhase::Updating, None).unwrap();
    assert_eq!(spec.skipped().len(), 1);

    let verdict = engine
        .validate(&AttributeSet::new().with("email", "not-an-email"), &spec)
        .unwrap();
    assert_eq!(verdict.first("email"), Some("format:email"));
    assert!(lookup.calls().is_empty());
}

#[test]
fn test_creating_keeps_unique_without_exclusion() {
    let lookup = Arc::new(
        InMemoryLookup::default().with_record("email", json!("taken@example.com"), "1"),
    );
    let engine = ValidationEngine::new().with_lookup(lookup.clone());
    let rules = RuleMap::new().with("email", ["unique:email,{id}"]);

    let spec = resolve(&rules, None, LifecyclePhase::Creating, None).unwrap();
    let verdict = engine
        .validate(&AttributeSet::new().with("email", "taken@example.com"), &spec)
        .unwrap();

    assert_eq!(verdict.first("email"), Some("unique:email"));
    assert_eq!(lookup.calls(), vec![("email".to_string(), None)]);
}

#[test]
fn test_auto_exclude_self_on_update() {
    let lookup = Arc::new(InMemoryLookup::default().with_record("handle", json!("neo"), "5"));
    let engine = ValidationEngine::new()
        .with_lookup(lookup)
        .with_resolver(RuleResolver::new().with_auto_exclude_self(true));
    let book = RuleBook::new(RuleMap::new().with("handle", ["unique"]));

    let spec = engine.resolve(&book, LifecyclePhase::Updating, Some("5")).unwrap();
    assert!(engine
        .validate(&AttributeSet::new().with("handle", "neo"), &spec)
        .unwrap()
        .is_valid());
}

// ==================== 校验闸门 ====================

#[test]
fn test_gate_blocks_invalid_and_runs_valid_once() {
    let engine = ValidationEngine::new();
    let spec = resolve(&user_rules(), None, LifecyclePhase::Creating, None).unwrap();
    let calls = Cell::new(0);

    let err = engine
        .validate_and_run(&AttributeSet::new().with("age", 200), &spec, || {
            calls.set(calls.get() + 1)
        })
        .unwrap_err();
    assert_eq!(calls.get(), 0);
    let verdict = err.into_verdict().unwrap();
    assert_eq!(verdict.failed_fields().count(), 2);

    let id = engine
        .validate_and_run(
            &AttributeSet::new()
                .with("email", "a@example.com")
                .with("age", 20),
            &spec,
            || {
                calls.set(calls.get() + 1);
                101
            },
        )
        .unwrap();
    assert_eq!(id, 101);
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_force_mode_runs_once_and_reports_true_verdict() {
    let engine = ValidationEngine::new();
    let spec = resolve(&user_rules(), None, LifecyclePhase::Creating, None).unwrap();
    let calls = Cell::new(0);

    let (_, verdict) = engine
        .force_run(&AttributeSet::new().with("email", "bad"), &spec, || {
            calls.set(calls.get() + 1)
        })
        .unwrap();

    assert_eq!(calls.get(), 1);
    assert_eq!(verdict.first("email"), Some("format:email"));
    assert_eq!(verdict.first("age"), Some("required"));
}

#[test]
fn test_lookup_error_propagates_unchanged() {
    let engine = ValidationEngine::new().with_lookup(Arc::new(FailingLookup));
    let spec = resolve(
        &RuleMap::new().with("email", ["unique"]),
        None,
        LifecyclePhase::Creating,
        None,
    )
    .unwrap();
    let calls = Cell::new(0);

    let err = engine
        .validate_and_run(&AttributeSet::new().with("email", "x@y.z"), &spec, || {
            calls.set(calls.get() + 1)
        })
        .unwrap_err();

    assert_eq!(calls.get(), 0);
    match err {
        ValidationError::Collaborator { source, .. } => {
            let io = source.downcast_ref::<std::io::Error>().unwrap();
            assert_eq!(io.kind(), std::io::ErrorKind::TimedOut);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// ==================== 扩展点 ====================

#[test]
fn test_custom_predicate_and_template_messages() {
    let messages = TemplateMessages::with_defaults()
        .with_attribute_name("seats", "座位数")
        .with_custom("even", "{{attribute}} 必须是偶数");
    let engine = ValidationEngine::new()
        .with_messages(Arc::new(messages))
        .register_predicate("even", Arc::new(Even));
    let rules = RuleMap::new()
        .with("seats", ["required", "integer", "even"])
        .with("title", ["required"]);
    let spec = resolve(&rules, None, LifecyclePhase::Creating, None).unwrap();

    let verdict = engine
        .validate(&AttributeSet::new().with("seats", 3), &spec)
        .unwrap();

    assert_eq!(verdict.first("seats"), Some("座位数 必须是偶数"));
    assert_eq!(verdict.first("title"), Some("title 不能为空"));
}

#[test]
fn test_cross_field_rules() {
    let engine = ValidationEngine::new();
    let rules = RuleMap::new()
        .with("password", ["required", "confirmed", "different:username"])
        .with("ends_at", ["after:2024-01-01"]);
    let spec = resolve(&rules, None, LifecyclePhase::Creating, None).unwrap();

    let attrs = AttributeSet::from_value(json!({
        "username": "alice",
        "password": "alice",
        "password_confirmation": "alice",
        "ends_at": "2023-12-31"
    }))
    .unwrap();

    let verdict = engine.validate(&attrs, &spec).unwrap();
    assert_eq!(verdict.first("password"), Some("different:username"));
    assert_eq!(verdict.first("ends_at"), Some("after:2024-01-01"));
}

// ==================== 实体闸门 ====================

struct Article {
    id: Option<String>,
    attributes: AttributeSet,
    book: RuleBook,
}

impl Validatable for Article {
    fn rule_book(&self) -> &RuleBook {
        &self.book
    }

    fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    fn identifier(&self) -> Option<String> {
        self.id.clone()
    }
}

fn article_book() -> RuleBook {
    RuleBook::from_json(
        r#"{
            "rules": {
                "slug": "required|alpha_dash|unique:articles_slug,{id}",
                "title": ["required", "length:1-120"]
            },
            "rules_for_update": {
                "title": ["length:1-120"]
            },
            "custom_messages": {
                "slug.unique": "{{attribute}} 已存在"
            }
        }"#,
    )
    .unwrap()
}

#[test]
fn test_entity_lifecycle() {
    let lookup = Arc::new(
        InMemoryLookup::default().with_record("articles_slug", json!("hello-world"), "a1"),
    );
    let engine = ValidationEngine::new().with_lookup(lookup);

    let draft = Article {
        id: None,
        attributes: AttributeSet::new().with("slug", "hello-world").with("title", "Hi"),
        book: article_book(),
    };
    let rejected = engine.save_or_reject(draft, |attrs| attrs).unwrap_err();
    assert_eq!(rejected.verdict().unwrap().first("slug"), Some("slug 已存在"));

    let existing = Article {
        id: Some("a1".to_string()),
        attributes: AttributeSet::new().with("slug", "hello-world"),
        book: article_book(),
    };
    let saved = engine.save(&existing, |attrs| attrs.len()).unwrap();
    assert_eq!(saved, 1);
}
