//! # 批量结果报告导出
//!
//! 将 `BatchConversionResult` 导出为 CSV 或 JSON。
//!
//! ## 支持格式
//! - CSV: 每个任务结果与每个错误各一行
//! - JSON: 完整结果结构（扩展名为 `.json` 时）
//!
//! ## 依赖关系
//! - 被 `commands/convert.rs` 调用
//! - 使用 `csv` 与 `serde_json`

use crate::error::{MdBatchError, Result};
use crate::models::BatchConversionResult;

use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// 报告中的一行
#[derive(Debug, Serialize)]
struct ReportRow {
    input: String,
    output: String,
    status: &'static str,
    error_kind: String,
    can_retry: String,
    processing_ms: String,
    input_size: String,
    output_size: String,
    message: String,
}

/// 按扩展名选择格式写出报告
pub fn write_report(result: &BatchConversionResult, path: &Path) -> Result<()> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        write_json(result, path)
    } else {
        write_csv(result, path)
    }
}

/// 导出为 JSON
pub fn write_json(result: &BatchConversionResult, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| MdBatchError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::to_writer_pretty(BufWriter::new(file), result)?;
    Ok(())
}

/// 导出为 CSV
pub fn write_csv(result: &BatchConversionResult, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for row in report_rows(result) {
        wtr.serialize(row)?;
    }
    wtr.flush().map_err(|e| MdBatchError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(())
}

/// 任务结果在前，之后是没有对应任务结果的错误（验证失败、取消）
fn report_rows(result: &BatchConversionResult) -> Vec<ReportRow> {
    let mut rows = Vec::with_capacity(result.results.len() + result.errors.len());
    let mut reported = HashSet::new();

    for r in &result.results {
        reported.insert(r.input_path.clone());
        let stats = r.stats.as_ref();
        rows.push(ReportRow {
            input: r.input_path.display().to_string(),
            output: r.output_path.display().to_string(),
            status: if r.success { "success" } else { "failed" },
            error_kind: r
                .error
                .as_ref()
                .map(|e| e.kind.to_string())
                .unwrap_or_default(),
            can_retry: r
                .error
                .as_ref()
                .map(|e| e.can_retry().to_string())
                .unwrap_or_default(),
            processing_ms: r.processing_time.as_millis().to_string(),
            input_size: stats.map(|s| s.input_size.to_string()).unwrap_or_default(),
            output_size: stats
                .and_then(|s| s.output_size)
                .map(|n| n.to_string())
                .unwrap_or_default(),
            message: r.error.as_ref().map(|e| e.message.clone()).unwrap_or_default(),
        });
    }

    for e in result.errors.iter().filter(|e| !reported.contains(&e.input_path)) {
        rows.push(ReportRow {
            input: e.input_path.display().to_string(),
            output: e
                .output_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            status: if e.is_batch_level() { "aborted" } else { "invalid" },
            error_kind: e.error.kind.to_string(),
            can_retry: e.can_retry.to_string(),
            processing_ms: String::new(),
            input_size: String::new(),
            output_size: String::new(),
            message: e.error.message.clone(),
        });
    }

    rows
}
