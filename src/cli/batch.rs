//! # 批量输入参数
//!
//! `convert` 与 `plan` 共用的输入、输出与命名参数，每个参数同时可由
//! `MDBATCH_*` 环境变量提供。
//!
//! ## 依赖关系
//! - 被 `cli/convert.rs`, `cli/plan.rs` 嵌入
//! - 转换为 `models/config.rs` 的 `BatchConfig`

use crate::error::{MdBatchError, Result};
use crate::models::{BatchConfig, FilenameFormat, InputSpec};

use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// 输出文件命名格式
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum NamingFormat {
    /// name.pdf
    Original,
    /// name_YYYY-MM-DD.pdf
    WithDate,
    /// name_<epoch-ms>.pdf
    WithTimestamp,
    /// Use --template with {name}, {date}, {timestamp}
    Custom,
}

impl From<NamingFormat> for FilenameFormat {
    fn from(format: NamingFormat) -> Self {
        match format {
            NamingFormat::Original => FilenameFormat::Original,
            NamingFormat::WithDate => FilenameFormat::WithDate,
            NamingFormat::WithTimestamp => FilenameFormat::WithTimestamp,
            NamingFormat::Custom => FilenameFormat::Custom,
        }
    }
}

/// 批量输入参数
#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// Input pattern: glob (*, **), directory, file, or comma-separated list
    #[arg(short, long, env = "MDBATCH_PATTERN", conflicts_with = "files")]
    pub pattern: Option<String>,

    /// Explicit list of markdown files
    #[arg(short, long, num_args = 1.., value_delimiter = ',')]
    pub files: Vec<PathBuf>,

    /// Output directory for generated PDFs
    #[arg(short, long, env = "MDBATCH_OUTPUT", default_value = "pdf")]
    pub output: PathBuf,

    /// Mirror the input directory structure under the output directory
    #[arg(long, env = "MDBATCH_PRESERVE_STRUCTURE", default_value_t = false)]
    pub preserve_structure: bool,

    /// Output filename format
    #[arg(long, value_enum, env = "MDBATCH_NAMING", default_value_t = NamingFormat::Original)]
    pub naming: NamingFormat,

    /// Custom filename template (implies --naming custom)
    #[arg(long, env = "MDBATCH_TEMPLATE")]
    pub template: Option<String>,

    /// Number of parallel conversions (0 = auto)
    #[arg(short, long, env = "MDBATCH_JOBS", default_value_t = 0)]
    pub jobs: usize,

    /// Stop launching new files after the first failed chunk
    #[arg(long, env = "MDBATCH_FAIL_FAST", default_value_t = false)]
    pub fail_fast: bool,
}

impl BatchArgs {
    /// 构造批量配置
    pub fn to_config(&self) -> Result<BatchConfig> {
        let input = match (&self.pattern, self.files.is_empty()) {
            (Some(pattern), _) => InputSpec::Pattern(pattern.clone()),
            (None, false) => InputSpec::Files(self.files.clone()),
            (None, true) => {
                return Err(MdBatchError::InvalidArgument(
                    "either --pattern or --files is required".to_string(),
                ))
            }
        };

        let jobs = if self.jobs == 0 {
            num_cpus::get()
        } else {
            self.jobs
        };

        let mut config = BatchConfig::new(input, self.output.clone())
            .preserve_structure(self.preserve_structure)
            .filename_format(self.naming.into())
            .concurrency(jobs)
            .continue_on_error(!self.fail_fast);

        if let Some(template) = &self.template {
            config = config.custom_pattern(template.clone());
        }

        config.validate()?;
        Ok(config)
    }
}
