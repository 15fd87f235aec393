//! # 输出路径解析
//!
//! 消解输出文件名冲突、校验可写性并创建输出目录。
//!
//! ## 冲突消解
//! 按输入顺序处理，首个占用者保留原名，之后的冲突者依次加数字后缀：
//! `x.pdf`, `x-1.pdf`, `x-2.pdf` ... 比较时忽略大小写，以兼容大小写不敏感的文件系统。
//!
//! ## 依赖关系
//! - 被 `batch/mod.rs` 调用（发现之后、调度之前）
//! - 被 `batch/discovery.rs` 复用可写性检查

use crate::batch::classify::{ClassifiedError, ErrorKind};
use crate::batch::ValidationOutcome;
use crate::error::{MdBatchError, Result};
use crate::models::{BatchError, ConversionTask};

use std::collections::{BTreeSet, HashSet};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 消解输出路径冲突，返回输出路径两两不同的任务列表
///
/// 对固定的输入顺序结果是确定的。
pub fn resolve_file_name_conflicts(tasks: Vec<ConversionTask>) -> Vec<ConversionTask> {
    let mut used: HashSet<String> = HashSet::with_capacity(tasks.len());

    tasks
        .into_iter()
        .map(|mut task| {
            if used.insert(conflict_key(&task.output_path)) {
                return task;
            }

            let original = task.output_path.clone();
            let mut n = 1;
            loop {
                let candidate = with_suffix(&original, n);
                if used.insert(conflict_key(&candidate)) {
                    debug!(
                        input = %task.input_path.display(),
                        from = %original.display(),
                        to = %candidate.display(),
                        "output name conflict resolved"
                    );
                    task.output_path = candidate;
                    return task;
                }
                n += 1;
            }
        })
        .collect()
}

/// 消解后再次校验输出路径
pub fn validate_output_paths(tasks: Vec<ConversionTask>) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();

    for task in tasks {
        match check_output_path(&task) {
            Ok(()) => outcome.valid.push(task),
            Err(error) => {
                warn!(output = %task.output_path.display(), kind = %error.kind, "invalid output path");
                outcome.invalid.push(BatchError::for_task(&task, error));
            }
        }
    }

    outcome
}

/// 创建所有需要的输出目录（幂等）
///
/// 任一目录创建失败对整个批次是致命的。
pub fn prepare_output_directories(tasks: &[ConversionTask]) -> Result<usize> {
    let dirs: BTreeSet<&Path> = tasks
        .iter()
        .filter_map(|t| t.output_path.parent())
        .collect();

    for dir in &dirs {
        fs::create_dir_all(dir).map_err(|e| MdBatchError::DirectoryCreateError {
            path: dir.display().to_string(),
            source: e,
        })?;
    }

    debug!(directories = dirs.len(), "output directories prepared");
    Ok(dirs.len())
}

/// 检查目录可创建、可写
///
/// 目录不存在时检查最近的已存在祖先。可写性以实际创建临时文件为准，
/// 权限位无法反映进程的真实访问权。
pub fn check_output_directory(dir: &Path) -> Result<()> {
    let mut current = Some(dir);
    while let Some(path) = current {
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => return probe_writable(path),
            Ok(_) => {
                return Err(MdBatchError::FileWriteError {
                    path: dir.display().to_string(),
                    source: io::Error::new(
                        io::ErrorKind::Other,
                        format!("{} exists and is not a directory", path.display()),
                    ),
                });
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => current = path.parent(),
            Err(e) => {
                return Err(MdBatchError::FileWriteError {
                    path: dir.display().to_string(),
                    source: e,
                });
            }
        }
    }

    Err(MdBatchError::FileNotFound {
        path: dir.display().to_string(),
    })
}

/// 在目录中创建并立即删除一个临时文件
fn probe_writable(dir: &Path) -> Result<()> {
    tempfile::Builder::new()
        .prefix(".mdbatch-")
        .tempfile_in(dir)
        .map(drop)
        .map_err(|e| write_error(dir, e))
}

/// 以写方式打开已存在的输出文件（不截断）
fn open_for_write(path: &Path) -> Result<()> {
    OpenOptions::new()
        .write(true)
        .open(path)
        .map(drop)
        .map_err(|e| write_error(path, e))
}

fn write_error(path: &Path, e: io::Error) -> MdBatchError {
    if e.kind() == io::ErrorKind::PermissionDenied {
        MdBatchError::PermissionDenied {
            path: path.display().to_string(),
        }
    } else {
        MdBatchError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        }
    }
}

fn check_output_path(task: &ConversionTask) -> std::result::Result<(), ClassifiedError> {
    if task.output_path == task.input_path {
        return Err(ClassifiedError::new(
            ErrorKind::InvalidFormat,
            format!("output would overwrite input: {}", task.input_path.display()),
        ));
    }

    if task.output_path.is_dir() {
        return Err(ClassifiedError::new(
            ErrorKind::InvalidFormat,
            format!("output path is a directory: {}", task.output_path.display()),
        ));
    }

    if task.output_path.is_file() {
        open_for_write(&task.output_path).map_err(ClassifiedError::from)?;
    }

    let dir = task.output_path.parent().unwrap_or_else(|| Path::new("/"));
    check_output_directory(dir).map_err(ClassifiedError::from)
}

fn conflict_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

/// `dir/stem.ext` -> `dir/stem-n.ext`
fn with_suffix(path: &Path, n: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}-{}.{}", stem, n, ext),
        None => format!("{}-{}", stem, n),
    };
    path.with_file_name(name)
}
