//! # convert 命令实现
//!
//! 批量将 markdown 文件转换为 PDF。
//!
//! ## 功能
//! - 发现输入文件并消解输出冲突
//! - 通过外部命令并行转换
//! - 进度条显示与失败汇总
//! - 可选的定向重试与报告导出
//!
//! ## 依赖关系
//! - 使用 `cli/convert.rs` 定义的参数
//! - 使用 `batch/` 引擎
//! - 使用 `utils/output.rs`, `utils/progress.rs`, `utils/report.rs`

use crate::batch::{BatchProcessor, CommandConverter};
use crate::cli::convert::ConvertArgs;
use crate::error::{MdBatchError, Result};
use crate::models::BatchConversionResult;
use crate::utils::{output, progress, report};

use tabled::{Table, Tabled};

/// 最多列出的条目数
const LIST_LIMIT: usize = 10;

/// 执行 convert 命令
pub fn execute(args: ConvertArgs) -> Result<()> {
    output::print_header("Converting markdown to PDF");

    let config = args.batch.to_config()?;
    let converter = CommandConverter::from_template(&args.command)?;

    output::print_info(&format!(
        "Input: {} -> '{}' ({} naming, {} parallel job(s))",
        config.input,
        config.output_directory.display(),
        config.filename_format,
        config.max_concurrent_processes
    ));
    output::print_info(&format!("Converter: {}", converter.program()));

    let pb = progress::create_progress_bar(0, "Converting");
    let pb_events = pb.clone();
    let pb_errors = pb.clone();

    let processor = BatchProcessor::new(config)
        .on_progress(move |event| progress::render_event(&pb_events, event))
        .on_file_error(move |error| {
            pb_errors.suspend(|| {
                output::print_failure(
                    &error.input_path.display().to_string(),
                    error.error.kind.as_str(),
                    error.can_retry,
                )
            })
        });

    let mut result = processor.convert_batch(&converter)?;

    for attempt in 1..=args.retries {
        match processor.retry_failed(&result, &converter)? {
            Some(retry) => {
                output::print_info(&format!(
                    "Retry pass {}: {} file(s), {} recovered",
                    attempt,
                    retry.total_files,
                    retry.successful_files
                ));
                result.merge_retry(retry);
            }
            None => break,
        }
    }

    print_summary(&result);

    if let Some(path) = &args.report {
        report::write_report(&result, path)?;
        output::print_info(&format!("Report written to '{}'", path.display()));
    }

    if result.success {
        Ok(())
    } else if result.cancelled {
        Err(MdBatchError::Other("batch was cancelled".to_string()))
    } else {
        Err(MdBatchError::Other(format!(
            "no files were converted ({} failed)",
            result.failed_files
        )))
    }
}

/// 打印结果汇总
fn print_summary(result: &BatchConversionResult) {
    output::print_separator();

    for r in result.results.iter().filter(|r| r.success).take(LIST_LIMIT) {
        output::print_conversion(
            &r.input_path.display().to_string(),
            &r.output_path.display().to_string(),
        );
    }
    if result.successful_files > LIST_LIMIT {
        output::print_info(&format!(
            "  ... and {} more",
            result.successful_files - LIST_LIMIT
        ));
    }

    let summary = format!(
        "Batch complete: {} of {} converted, {} failed, {} skipped ({:.1}s)",
        result.successful_files,
        result.total_files,
        result.failed_files,
        result.skipped_files,
        result.processing_time.as_secs_f64()
    );
    if result.failed_files == 0 {
        output::print_done(&summary);
    } else {
        output::print_success(&summary);
    }

    if !result.errors.is_empty() {
        print_failure_table(result);
    }

    let retryable = result.retryable_inputs().len();
    if retryable > 0 {
        output::print_warning(&format!(
            "{} failed file(s) can be retried (use --retries)",
            retryable
        ));
    }
}

/// 打印失败表格
fn print_failure_table(result: &BatchConversionResult) {
    #[derive(Tabled)]
    struct FailureRow {
        #[tabled(rename = "File")]
        file: String,
        #[tabled(rename = "Kind")]
        kind: String,
        #[tabled(rename = "Retry")]
        retry: String,
        #[tabled(rename = "Message")]
        message: String,
    }

    let rows: Vec<FailureRow> = result
        .errors
        .iter()
        .take(LIST_LIMIT)
        .map(|e| FailureRow {
            file: if e.is_batch_level() {
                "(batch)".to_string()
            } else {
                e.input_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| e.input_path.display().to_string())
            },
            kind: e.error.kind.to_string(),
            retry: if e.can_retry { "yes" } else { "no" }.to_string(),
            message: e.error.message.lines().next().unwrap_or("").to_string(),
        })
        .collect();

    output::print_header(&format!("Failures ({})", result.errors.len()));
    println!("{}", Table::new(&rows));
    if result.errors.len() > LIST_LIMIT {
        output::print_warning(&format!(
            "  ... and {} more",
            result.errors.len() - LIST_LIMIT
        ));
    }
}
