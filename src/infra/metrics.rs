//! Prometheus 指标：签发量、刷新量、拒绝原因、丢失的刷新、过期记录清理数
//!
//! 通过 `init()` 安装全局 Recorder，通过 HTTP GET `/metrics` 暴露抓取端点。

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::OnceLock;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// 指标名称
const COUNTER_PAIRS_ISSUED: &str = "tokenpair_pairs_issued_total";
const COUNTER_ROTATIONS: &str = "tokenpair_rotations_total";
const COUNTER_REFRESH_REJECTED: &str = "tokenpair_refresh_rejected_total";
const COUNTER_ROTATIONS_LOST: &str = "tokenpair_rotations_lost_total";
const COUNTER_RECORDS_PURGED: &str = "tokenpair_refresh_records_purged_total";

/// 初始化 Prometheus 指标（安装全局 Recorder，返回 Handle 用于 HTTP 暴露）。
/// 仅需在进程内调用一次；重复调用会返回 Err。
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
    HANDLE
        .set(handle)
        .map_err(|_| "metrics already initialized")?;
    Ok(())
}

/// 是否已初始化
pub fn is_initialized() -> bool {
    HANDLE.get().is_some()
}

/// 渲染当前指标为 Prometheus 文本格式，供 GET /metrics 使用。
pub fn render_metrics() -> Option<String> {
    HANDLE.get().map(|h| h.render())
}

/// 签发 token 对 +1（首次授权和刷新都会计入）
pub fn record_pair_issued() {
    metrics::counter!(COUNTER_PAIRS_ISSUED).increment(1);
}

/// 成功刷新 +1
pub fn record_rotation() {
    metrics::counter!(COUNTER_ROTATIONS).increment(1);
}

/// 刷新被拒绝，按原因打标签
pub fn record_refresh_rejected(reason: &'static str) {
    metrics::counter!(COUNTER_REFRESH_REJECTED, "reason" => reason).increment(1);
}

/// 旧记录已兑换但新记录保存失败
pub fn record_rotation_lost() {
    metrics::counter!(COUNTER_ROTATIONS_LOST).increment(1);
}

/// 清理的过期记录数
pub fn record_records_purged(count: u64) {
    metrics::counter!(COUNTER_RECORDS_PURGED).increment(count);
}
