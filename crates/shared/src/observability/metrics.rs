//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集。
//! 校验库不负责暴露 HTTP 端点，宿主应用通过 [`MetricsHandle::render`] 获取文本快照。

use anyhow::Result;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源句柄
#[derive(Clone)]
pub struct MetricsHandle {
    handle: PrometheusHandle,
}

impl MetricsHandle {
    /// 渲染 Prometheus 文本格式
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// 安装 Prometheus recorder 并注册指标描述
pub fn init() -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    // 保存到全局，供其他地方获取指标快照
    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics();

    Ok(MetricsHandle { handle })
}

/// 注册校验相关指标的描述
fn register_common_metrics() {
    metrics::describe_counter!("validations_total", "Total number of validation passes");
    metrics::describe_histogram!(
        "validation_duration_seconds",
        "Validation pass duration in seconds"
    );
    metrics::describe_counter!(
        "validation_failed_fields_total",
        "Fields reported as failing across all validation passes"
    );
    metrics::describe_counter!(
        "validation_rules_skipped_total",
        "Rules dropped during resolution because a reference could not be resolved"
    );
    metrics::describe_counter!(
        "validation_gate_total",
        "Side effects run or blocked by the validation gate"
    );
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// 记录一次校验
#[inline]
pub fn record_validation(valid: bool, failed_fields: usize, duration_secs: f64) {
    metrics::counter!(
        "validations_total",
        "outcome" => if valid { "passed" } else { "failed" }
    )
    .increment(1);

    metrics::histogram!("validation_duration_seconds").record(duration_secs);

    if failed_fields > 0 {
        metrics::counter!("validation_failed_fields_total").increment(failed_fields as u64);
    }
}

/// 记录被跳过的规则
#[inline]
pub fn record_rule_skipped(field: &str) {
    metrics::counter!(
        "validation_rules_skipped_total",
        "field" => field.to_string()
    )
    .increment(1);
}

/// 记录闸门决策（ran / blocked / forced）
#[inline]
pub fn record_gate(decision: &'static str) {
    metrics::counter!("validation_gate_total", "decision" => decision).increment(1);
}
