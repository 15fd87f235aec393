//! # 批量转换配置
//!
//! 输入规格、输出目录、命名格式与并发控制。
//!
//! ## 依赖关系
//! - 被 `cli/` 构造
//! - 被 `batch/` 读取

use crate::error::{MdBatchError, Result};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 输入规格：模式字符串或显式文件列表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSpec {
    /// 逗号分隔路径、glob 模式（`*`/`**`）、目录或单个文件
    Pattern(String),
    /// 显式文件列表
    Files(Vec<PathBuf>),
}

impl std::fmt::Display for InputSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputSpec::Pattern(p) => write!(f, "{}", p),
            InputSpec::Files(files) => {
                let names: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
                write!(f, "{}", names.join(", "))
            }
        }
    }
}

/// 输出文件命名格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilenameFormat {
    /// `stem.pdf`
    #[default]
    Original,
    /// `stem_YYYY-MM-DD.pdf`
    WithDate,
    /// `stem_<epoch-ms>.pdf`
    WithTimestamp,
    /// 自定义模板，支持 `{name}`、`{timestamp}`、`{date}`
    Custom,
}

impl std::fmt::Display for FilenameFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilenameFormat::Original => write!(f, "original"),
            FilenameFormat::WithDate => write!(f, "with_date"),
            FilenameFormat::WithTimestamp => write!(f, "with_timestamp"),
            FilenameFormat::Custom => write!(f, "custom"),
        }
    }
}

/// 批量转换配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    pub input: InputSpec,
    pub output_directory: PathBuf,
    pub preserve_directory_structure: bool,
    pub filename_format: FilenameFormat,
    pub custom_filename_pattern: Option<String>,
    pub max_concurrent_processes: usize,
    pub continue_on_error: bool,
}

impl BatchConfig {
    /// 创建默认配置（并发数取 CPU 逻辑核数，出错继续）
    pub fn new(input: InputSpec, output_directory: impl Into<PathBuf>) -> Self {
        BatchConfig {
            input,
            output_directory: output_directory.into(),
            preserve_directory_structure: false,
            filename_format: FilenameFormat::Original,
            custom_filename_pattern: None,
            max_concurrent_processes: num_cpus::get().max(1),
            continue_on_error: true,
        }
    }

    pub fn with_pattern(pattern: impl Into<String>, output_directory: impl Into<PathBuf>) -> Self {
        Self::new(InputSpec::Pattern(pattern.into()), output_directory)
    }

    pub fn with_files(files: Vec<PathBuf>, output_directory: impl Into<PathBuf>) -> Self {
        Self::new(InputSpec::Files(files), output_directory)
    }

    pub fn preserve_structure(mut self, preserve: bool) -> Self {
        self.preserve_directory_structure = preserve;
        self
    }

    pub fn filename_format(mut self, format: FilenameFormat) -> Self {
        self.filename_format = format;
        self
    }

    pub fn custom_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.filename_format = FilenameFormat::Custom;
        self.custom_filename_pattern = Some(pattern.into());
        self
    }

    pub fn concurrency(mut self, max: usize) -> Self {
        self.max_concurrent_processes = max;
        self
    }

    pub fn continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// 有效的自定义模板（空白模板视为未设置）
    pub fn custom_template(&self) -> Option<&str> {
        self.custom_filename_pattern
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_processes == 0 {
            return Err(MdBatchError::InvalidConfig(
                "max_concurrent_processes must be at least 1".to_string(),
            ));
        }

        if self.output_directory.as_os_str().is_empty() {
            return Err(MdBatchError::InvalidConfig(
                "output directory must not be empty".to_string(),
            ));
        }

        if let Some(template) = self.custom_template() {
            if template.contains('/') || template.contains('\\') {
                return Err(MdBatchError::InvalidConfig(format!(
                    "custom filename pattern must not contain path separators: '{}'",
                    template
                )));
            }
        }

        match &self.input {
            InputSpec::Pattern(p) if p.trim().is_empty() => Err(MdBatchError::InvalidConfig(
                "input pattern must not be empty".to_string(),
            )),
            _ => Ok(()),
        }
    }
}
