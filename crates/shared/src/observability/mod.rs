//! 统一可观测性模块
//!
//! 提供 logging 与 metrics 的统一初始化。校验引擎本身只通过 `tracing` 宏和
//! `metrics` 宏发出事件，由宿主应用决定是否安装订阅者与指标 recorder。

pub mod metrics;
pub mod tracing;

use ::tracing::info;
use anyhow::Result;

use crate::config::ObservabilityConfig;

/// 可观测性资源守卫
///
/// 持有指标 recorder 的句柄，供宿主应用渲染 Prometheus 文本。
pub struct ObservabilityGuard {
    metrics_handle: Option<metrics::MetricsHandle>,
}

impl ObservabilityGuard {
    /// 创建一个空的 Guard（用于测试或禁用可观测性时）
    pub fn empty() -> Self {
        Self {
            metrics_handle: None,
        }
    }

    /// 渲染当前指标快照
    pub fn render_metrics(&self) -> Option<String> {
        self.metrics_handle.as_ref().map(|h| h.render())
    }
}

/// 统一初始化可观测性
///
/// 初始化顺序：
/// 1. Tracing（日志）
/// 2. Metrics（Prometheus recorder，可选）
///
/// # Example
///
/// ```ignore
/// use fervent_shared::{AppConfig, observability};
///
/// fn main() -> anyhow::Result<()> {
///     let config = AppConfig::load()?;
///     let _guard = observability::init(&config.observability)?;
///
///     // 应用逻辑...
///
///     Ok(())
/// }
/// ```
pub fn init(config: &ObservabilityConfig) -> Result<ObservabilityGuard> {
    tracing::init(config)?;

    let metrics_handle = if config.metrics_enabled {
        Some(metrics::init()?)
    } else {
        None
    };

    info!(
        log_level = %config.log_level,
        log_format = %config.log_format,
        metrics_enabled = config.metrics_enabled,
        "Observability initialized"
    );

    Ok(ObservabilityGuard { metrics_handle })
}
