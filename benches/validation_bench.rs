//! 校验引擎性能基准测试
//!
//! 测试覆盖：
//! - 规则解析（含覆盖层合并与占位符替换）
//! - 单实体校验（通过 / 未通过）
//! - 不同字段数量下的校验性能曲线
//! - 模板消息渲染开销

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;
use validation_engine::{
    AttributeSet, LifecyclePhase, RuleBook, RuleMap, TemplateMessages, ValidationEngine, resolve,
};

/// 用户注册规则
fn create_user_book() -> RuleBook {
    RuleBook::new(
        RuleMap::new()
            .with("username", ["required", "alpha_dash", "length:3-20"])
            .with("email", ["required", "format:email"])
            .with("age", ["required", "integer", "range:0-150"])
            .with("website", ["url", "max_length:200"])
            .with("role", ["required", "in:admin,editor,viewer"])
            .with("password", ["required", "length:8-64", "confirmed"]),
    )
    .with_update_rules(RuleMap::new().with("password", ["length:8-64", "confirmed"]))
}

fn create_valid_attributes() -> AttributeSet {
    AttributeSet::from_value(json!({
        "username": "alice_01",
        "email": "alice@example.com",
        "age": 30,
        "website": "https://example.com",
        "role": "editor",
        "password": "correct-horse-battery",
        "password_confirmation": "correct-horse-battery"
    }))
    .unwrap_or_default()
}

fn create_invalid_attributes() -> AttributeSet {
    AttributeSet::from_value(json!({
        "username": "a",
        "email": "",
        "age": 200,
        "website": "not a url",
        "role": "owner",
        "password": "short"
    }))
    .unwrap_or_default()
}

/// 每个字段三条规则
fn create_wide_rules(field_count: usize) -> RuleMap {
    (0..field_count).fold(RuleMap::new(), |rules, i| {
        rules.with(format!("field_{}", i), ["required", "string", "length:1-64"])
    })
}

fn create_wide_attributes(field_count: usize) -> AttributeSet {
    (0..field_count)
        .map(|i| (format!("field_{}", i), format!("value_{}", i)))
        .collect()
}

// ============================================================================

/// 规则解析基准
fn bench_resolve(c: &mut Criterion) {
    let book = create_user_book();

    let mut group = c.benchmark_group("resolve");
    group.bench_function("creating", |b| {
        b.iter(|| black_box(book.resolve(black_box(LifecyclePhase::Creating), None)))
    });
    group.bench_function("updating", |b| {
        b.iter(|| black_box(book.resolve(black_box(LifecyclePhase::Updating), Some("42"))))
    });
    group.finish();
}

/// 单实体校验基准
fn bench_validate(c: &mut Criterion) {
    let engine = ValidationEngine::new();
    let Ok(spec) = create_user_book().resolve(LifecyclePhase::Creating, None) else {
        return;
    };
    let valid = create_valid_attributes();
    let invalid = create_invalid_attributes();

    let mut group = c.benchmark_group("validate");
    group.bench_function("passing", |b| {
        b.iter(|| black_box(engine.validate(black_box(&valid), &spec)))
    });
    group.bench_function("failing", |b| {
        b.iter(|| black_box(engine.validate(black_box(&invalid), &spec)))
    });
    group.finish();
}

/// 不同字段数量的校验基准
fn bench_field_count(c: &mut Criterion) {
    let engine = ValidationEngine::new();
    let mut group = c.benchmark_group("field_count");

    for field_count in [5, 20, 50, 100].iter() {
        let Ok(spec) = resolve(
            &create_wide_rules(*field_count),
            None,
            LifecyclePhase::Creating,
            None,
        ) else {
            continue;
        };
        let attrs = create_wide_attributes(*field_count);

        group.throughput(Throughput::Elements(*field_count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(field_count),
            field_count,
            |b, _| b.iter(|| black_box(engine.validate(black_box(&attrs), &spec))),
        );
    }

    group.finish();
}

/// 模板消息与规则字面量消息对比
fn bench_messages(c: &mut Criterion) {
    let raw = ValidationEngine::new();
    let template = ValidationEngine::new().with_messages(Arc::new(
        TemplateMessages::with_defaults()
            .with_attribute_name("username", "用户名")
            .with_attribute_name("age", "年龄"),
    ));
    let Ok(spec) = create_user_book().resolve(LifecyclePhase::Creating, None) else {
        return;
    };
    let invalid = create_invalid_attributes();

    let mut group = c.benchmark_group("messages");
    group.bench_function("raw", |b| {
        b.iter(|| black_box(raw.validate(black_box(&invalid), &spec)))
    });
    group.bench_function("template", |b| {
        b.iter(|| black_box(template.validate(black_box(&invalid), &spec)))
    });
    group.finish();
}

// 配置 criterion
criterion_group!(
    benches,
    bench_resolve,
    bench_validate,
    bench_field_count,
    bench_messages,
);

criterion_main!(benches);
