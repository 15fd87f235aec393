//! # 单文件转换器接口
//!
//! 批量引擎只通过 `Converter` 调用单个文件的转换，渲染细节对调度器不透明。
//!
//! ## 功能
//! - `Converter` trait，闭包自动实现
//! - `CommandConverter`: 为每个文件调用外部命令（如 pandoc）
//!
//! ## 依赖关系
//! - 被 `batch/scheduler.rs` 调用
//! - `CommandConverter` 被 `commands/convert.rs` 使用

use crate::error::{MdBatchError, Result};
use crate::models::{ConversionStats, ConversionTask};

use std::fs;
use std::process::Command;
use tracing::debug;

/// 单文件转换器
pub trait Converter: Sync {
    fn convert(&self, task: &ConversionTask) -> anyhow::Result<ConversionStats>;
}

impl<F> Converter for F
where
    F: Fn(&ConversionTask) -> anyhow::Result<ConversionStats> + Sync,
{
    fn convert(&self, task: &ConversionTask) -> anyhow::Result<ConversionStats> {
        self(task)
    }
}

/// 外部命令转换器
///
/// 模板按空白拆分为程序与参数（不经过 shell），参数中的 `{input}`、`{output}`、
/// `{name}` 会被替换。
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: String,
    args: Vec<String>,
}

impl CommandConverter {
    /// 解析命令模板，如 `pandoc {input} -o {output}`
    pub fn from_template(template: &str) -> Result<Self> {
        let mut parts = split_command_line(template).into_iter();
        let program = parts.next().ok_or_else(|| {
            MdBatchError::InvalidArgument("converter command must not be empty".to_string())
        })?;
        let args: Vec<String> = parts.collect();

        if !args.iter().any(|a| a.contains("{input}")) {
            return Err(MdBatchError::InvalidArgument(format!(
                "converter command must reference {{input}}: '{}'",
                template
            )));
        }

        Ok(CommandConverter { program, args })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// 为指定任务展开参数
    pub fn expand_args(&self, task: &ConversionTask) -> Vec<String> {
        let input = task.input_path.display().to_string();
        let output = task.output_path.display().to_string();
        let name = task
            .input_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document")
            .to_string();

        self.args
            .iter()
            .map(|arg| {
                arg.replace("{input}", &input)
                    .replace("{output}", &output)
                    .replace("{name}", &name)
            })
            .collect()
    }
}

impl Converter for CommandConverter {
    fn convert(&self, task: &ConversionTask) -> anyhow::Result<ConversionStats> {
        let args = self.expand_args(task);
        debug!(program = %self.program, ?args, "running converter command");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => MdBatchError::CommandNotFound {
                    command: self.program.clone(),
                },
                _ => MdBatchError::CommandFailed {
                    command: self.program.clone(),
                    stderr: e.to_string(),
                },
            })?;

        if !output.status.success() {
            return Err(MdBatchError::CommandFailed {
                command: format!("{} {}", self.program, args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        let output_size = fs::metadata(&task.output_path)
            .map(|m| m.len())
            .map_err(|_| MdBatchError::ConversionError {
                path: task.input_path.display().to_string(),
                reason: format!("no output produced at {}", task.output_path.display()),
            })?;

        Ok(ConversionStats {
            input_size: task.size,
            output_size: Some(output_size),
            page_count: None,
        })
    }
}

/// 按空白拆分命令行，支持单/双引号包裹的参数
fn split_command_line(line: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut has_token = false;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                has_token = true;
            }
            None if c.is_whitespace() => {
                if has_token {
                    parts.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            None => {
                current.push(c);
                has_token = true;
            }
        }
    }

    if has_token {
        parts.push(current);
    }

    parts
}
