//! # 文件发现器
//!
//! 将输入规格解析为带输出路径的候选任务列表。
//!
//! ## 输入解析
//! - 逗号分隔列表（可带引号）: 逐项清理并解析为绝对路径，根目录为工作目录
//! - 含 `**`: 递归遍历
//! - 含单个 `*`: 按模式层级遍历（`*.md` 只列出一层）
//! - 目录: 递归遍历
//! - 单个路径: 直接检查存在性
//!
//! ## 过滤规则
//! - 仅保留 `.md` / `.markdown`（不区分大小写）
//! - 排除点文件、`readme.md`、以及忽略目录下的文件
//!
//! ## 依赖关系
//! - 被 `batch/mod.rs` 调用
//! - 使用 `walkdir` 遍历目录，`glob` 匹配模式，`regex` 展开自定义模板
//! - 使用 `batch/output_paths.rs` 的可写性检查

use crate::batch::classify::{classify_io, ClassifiedError};
use crate::batch::output_paths::check_output_directory;
use crate::batch::ValidationOutcome;
use crate::error::{MdBatchError, Result};
use crate::models::{BatchConfig, BatchError, ConversionTask, FilenameFormat, InputSpec};

use chrono::{DateTime, Local, Utc};
use glob::{MatchOptions, Pattern};
use regex::{Captures, Regex};
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// 被忽略的目录名（另外所有点开头的目录也被忽略）
const IGNORED_DIRS: &[&str] = &[
    "node_modules",
    "dist",
    "coverage",
    "build",
    ".git",
    ".next",
    ".vscode",
    ".idea",
];

const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

/// 解析后的输入：候选路径与计算相对路径用的根目录
#[derive(Debug)]
struct ResolvedInput {
    candidates: Vec<PathBuf>,
    base: PathBuf,
}

/// 文件发现器
pub struct FileDiscoverer<'a> {
    config: &'a BatchConfig,
    cwd: PathBuf,
    now: DateTime<Local>,
}

impl<'a> FileDiscoverer<'a> {
    /// 创建发现器，使用当前工作目录与当前时间
    pub fn new(config: &'a BatchConfig) -> Result<Self> {
        let cwd = std::env::current_dir().map_err(|e| MdBatchError::FileReadError {
            path: ".".to_string(),
            source: e,
        })?;
        Ok(FileDiscoverer {
            config,
            cwd,
            now: Local::now(),
        })
    }

    /// 指定解析相对路径的工作目录
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    /// 固定命名用的时间（日期/时间戳格式）
    pub fn with_clock(mut self, now: DateTime<Local>) -> Self {
        self.now = now;
        self
    }

    /// 发现所有匹配的 markdown 文件并生成任务
    ///
    /// 没有任何匹配时返回 `NoFilesFound`，整个批次中止。
    pub fn discover(&self) -> Result<Vec<ConversionTask>> {
        let resolved = self.resolve_input()?;
        debug!(
            candidates = resolved.candidates.len(),
            base = %resolved.base.display(),
            "input resolved"
        );

        let mut tasks = Vec::new();
        for path in resolved.candidates {
            if !is_markdown_candidate(&path) || is_in_ignored_dir(&path, &resolved.base) {
                continue;
            }

            let metadata = match fs::metadata(&path) {
                Ok(m) => m,
                Err(e) => {
                    debug!(input = %path.display(), error = %e, "skipping unreadable candidate");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            let relative_input_path = path
                .strip_prefix(&resolved.base)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| path.file_name().map(PathBuf::from).unwrap_or_default());

            let output_path = self.output_path_for(&path, &relative_input_path);

            tasks.push(ConversionTask {
                input_path: path,
                output_path,
                relative_input_path,
                size: metadata.len(),
                last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        if tasks.is_empty() {
            return Err(MdBatchError::NoFilesFound {
                pattern: self.config.input.to_string(),
            });
        }

        Ok(tasks)
    }

    /// 按输入可读性与输出目录可写性划分有效/无效任务
    pub fn validate_files(&self, tasks: Vec<ConversionTask>) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();

        for task in tasks {
            if let Err(e) = File::open(&task.input_path) {
                let error = ClassifiedError::new(
                    classify_io(&e),
                    format!("cannot read {}: {}", task.input_path.display(), e),
                );
                warn!(input = %task.input_path.display(), kind = %error.kind, "input not readable");
                outcome.invalid.push(BatchError::for_task(&task, error));
                continue;
            }

            let dir = task.output_path.parent().unwrap_or_else(|| Path::new("/"));
            match check_output_directory(dir) {
                Ok(()) => outcome.valid.push(task),
                Err(e) => {
                    let error = ClassifiedError::from(&e);
                    warn!(input = %task.input_path.display(), kind = %error.kind, "output directory unusable");
                    outcome.invalid.push(BatchError::for_task(&task, error));
                }
            }
        }

        outcome
    }

    // ─────────────────────────────────────────────────────────────
    // 输入解析
    // ─────────────────────────────────────────────────────────────

    fn resolve_input(&self) -> Result<ResolvedInput> {
        match &self.config.input {
            InputSpec::Files(files) => Ok(ResolvedInput {
                candidates: dedup_sorted(files.iter().map(|f| self.absolute(f)).collect()),
                base: self.cwd.clone(),
            }),
            InputSpec::Pattern(pattern) => self.resolve_pattern(pattern.trim()),
        }
    }

    fn resolve_pattern(&self, pattern: &str) -> Result<ResolvedInput> {
        if pattern.contains(',') {
            let candidates = split_path_list(pattern)
                .iter()
                .map(|entry| self.absolute(Path::new(entry)))
                .collect();
            return Ok(ResolvedInput {
                candidates: dedup_sorted(candidates),
                base: self.cwd.clone(),
            });
        }

        // 已存在的路径按字面处理，如 `notes[1].md`
        let path = self.absolute(Path::new(strip_quotes(pattern)));
        if has_glob_meta(pattern) && !path.exists() {
            return self.resolve_glob(pattern);
        }

        if path.is_dir() {
            Ok(ResolvedInput {
                candidates: walk(&path, usize::MAX),
                base: path,
            })
        } else {
            let base = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.cwd.clone());
            let candidates = if path.exists() { vec![path] } else { vec![] };
            Ok(ResolvedInput { candidates, base })
        }
    }

    fn resolve_glob(&self, pattern: &str) -> Result<ResolvedInput> {
        let pattern = strip_quotes(pattern);
        let (base, rest) = split_glob_base(pattern);
        let base = self.absolute(&base);

        let matcher = Pattern::new(&rest).map_err(|e| MdBatchError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        let max_depth = if rest.contains("**") {
            usize::MAX
        } else {
            rest.split('/').filter(|s| !s.is_empty()).count()
        };

        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: true,
        };

        let candidates = walk(&base, max_depth)
            .into_iter()
            .filter(|path| {
                path.strip_prefix(&base)
                    .map(|rel| matcher.matches_path_with(rel, options))
                    .unwrap_or(false)
            })
            .collect();

        Ok(ResolvedInput { candidates, base })
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize_path(path)
        } else {
            normalize_path(&self.cwd.join(path))
        }
    }

    // ─────────────────────────────────────────────────────────────
    // 输出路径
    // ─────────────────────────────────────────────────────────────

    /// 计算输出路径（总是绝对路径）
    fn output_path_for(&self, input: &Path, relative: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");

        let mut dir = self.absolute(&self.config.output_directory);
        if self.config.preserve_directory_structure {
            if let Some(parent) = relative.parent() {
                if !parent.as_os_str().is_empty() && parent != Path::new(".") {
                    dir = normalize_path(&dir.join(parent));
                }
            }
        }

        dir.join(output_file_name(
            stem,
            self.config.filename_format,
            self.config.custom_template(),
            &self.now,
        ))
    }
}

/// 按命名格式生成输出文件名
pub fn output_file_name(
    stem: &str,
    format: FilenameFormat,
    template: Option<&str>,
    now: &DateTime<Local>,
) -> String {
    let date = now.format("%Y-%m-%d").to_string();
    let timestamp = now.timestamp_millis().to_string();

    match format {
        FilenameFormat::Original => format!("{}.pdf", stem),
        FilenameFormat::WithDate => format!("{}_{}.pdf", stem, date),
        FilenameFormat::WithTimestamp => format!("{}_{}.pdf", stem, timestamp),
        FilenameFormat::Custom => match template {
            Some(template) => {
                let name = expand_template(template, stem, &timestamp, &date);
                if name.to_lowercase().ends_with(".pdf") {
                    name
                } else {
                    format!("{}.pdf", name)
                }
            }
            None => format!("{}.pdf", stem),
        },
    }
}

/// 替换 `{name}`、`{timestamp}`、`{date}`，未知占位符原样保留
fn expand_template(template: &str, name: &str, timestamp: &str, date: &str) -> String {
    static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();

    match PLACEHOLDER.get_or_init(|| Regex::new(r"\{(\w+)\}").ok()) {
        Some(re) => re
            .replace_all(template, |caps: &Captures| match &caps[1] {
                "name" => name.to_string(),
                "timestamp" => timestamp.to_string(),
                "date" => date.to_string(),
                _ => caps[0].to_string(),
            })
            .into_owned(),
        None => template
            .replace("{name}", name)
            .replace("{timestamp}", timestamp)
            .replace("{date}", date),
    }
}

// ─────────────────────────────────────────────────────────────
// 路径工具
// ─────────────────────────────────────────────────────────────

/// 是否为可转换的 markdown 文件
pub fn is_markdown_candidate(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return false,
    };

    if name.starts_with('.') || name.eq_ignore_ascii_case("readme.md") {
        return false;
    }

    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            MARKDOWN_EXTENSIONS
                .iter()
                .any(|m| e.eq_ignore_ascii_case(m))
        })
        .unwrap_or(false)
}

fn is_ignored_dir_name(name: &str) -> bool {
    name.starts_with('.') || IGNORED_DIRS.contains(&name)
}

/// 文件是否位于被忽略的目录下（只检查根目录以下的部分，根目录外的显式路径不过滤）
fn is_in_ignored_dir(path: &Path, base: &Path) -> bool {
    let parent = match path.strip_prefix(base).ok().and_then(Path::parent) {
        Some(p) => p,
        None => return false,
    };

    parent.components().any(|c| match c {
        Component::Normal(name) => name.to_str().map(is_ignored_dir_name).unwrap_or(false),
        _ => false,
    })
}

fn is_ignored_entry(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(is_ignored_dir_name)
            .unwrap_or(false)
}

/// 遍历目录下的文件，跳过忽略目录，结果排序
fn walk(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|e| !is_ignored_entry(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .collect();

    files.sort();
    files
}

fn has_glob_meta(s: &str) -> bool {
    s.contains('*') || s.contains('?') || s.contains('[')
}

/// 拆分出不含通配符的前缀目录与剩余模式
fn split_glob_base(pattern: &str) -> (PathBuf, String) {
    let normalized = pattern.replace('\\', "/");
    let segments: Vec<&str> = normalized.split('/').collect();
    let split_at = segments
        .iter()
        .position(|s| has_glob_meta(s))
        .unwrap_or(segments.len());

    let base_str = segments[..split_at].join("/");
    let base = if base_str.is_empty() {
        if normalized.starts_with('/') {
            PathBuf::from("/")
        } else {
            PathBuf::from(".")
        }
    } else {
        PathBuf::from(base_str)
    };

    (base, segments[split_at..].join("/"))
}

/// 拆分逗号分隔的路径列表，去除引号与空白
fn split_path_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| strip_quotes(s.trim()).trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    for q in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

fn dedup_sorted(mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths.sort();
    paths.dedup();
    paths
}

/// 词法规范化路径（处理 `.` 与 `..`，不访问文件系统）
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn touch(dir: &Path, rel: &str) -> PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "# title\n").unwrap();
        path
    }

    fn names(tasks: &[ConversionTask]) -> BTreeSet<String> {
        tasks
            .iter()
            .map(|t| t.input_path.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    fn discover(config: &BatchConfig, cwd: &Path) -> Result<Vec<ConversionTask>> {
        FileDiscoverer::new(config)?.with_cwd(cwd).discover()
    }

    #[test]
    fn test_existing_path_with_bracket_is_literal() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "notes[1].md");
        touch(tmp.path(), "notes1.md");

        let config = BatchConfig::with_pattern("notes[1].md", "out");
        let tasks = discover(&config, tmp.path()).unwrap();
        assert_eq!(names(&tasks), BTreeSet::from(["notes[1].md".to_string()]));

        let config = BatchConfig::with_pattern("notes?.md", "out");
        let tasks = discover(&config, tmp.path()).unwrap();
        assert_eq!(names(&tasks), BTreeSet::from(["notes1.md".to_string()]));
    }

    #[test]
    fn test_star_pattern_filters_readme_and_non_markdown() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.md");
        touch(tmp.path(), "b.md");
        touch(tmp.path(), "README.md");
        touch(tmp.path(), "notes.txt");
        touch(tmp.path(), "sub/c.md");

        let config = BatchConfig::with_pattern("*.md", "out");
        let tasks = discover(&config, tmp.path()).unwrap();

        assert_eq!(
            names(&tasks),
            ["a.md", "b.md"].iter().map(|s| s.to_string()).collect()
        );
    }

    #[test]
    fn test_recursive_pattern_skips_ignored_dirs() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "docs/a.md");
        touch(tmp.path(), "docs/deep/b.markdown");
        touch(tmp.path(), "docs/node_modules/pkg/c.md");
        touch(tmp.path(), "docs/.hidden/d.md");
        touch(tmp.path(), "docs/build/e.md");
        touch(tmp.path(), "docs/.draft.md");

        let pattern = format!("{}/docs/**/*.md", tmp.path().display());
        let config = BatchConfig::with_pattern(pattern, "out");
        let tasks = discover(&config, tmp.path()).unwrap();
        assert_eq!(names(&tasks), ["a.md"].iter().map(|s| s.to_string()).collect());

        let pattern = format!("{}/docs/**", tmp.path().display());
        let config = BatchConfig::with_pattern(pattern, "out");
        let tasks = discover(&config, tmp.path()).unwrap();
        assert_eq!(
            names(&tasks),
            ["a.md", "b.markdown"].iter().map(|s| s.to_string()).collect()
        );
    }

    #[test]
    fn test_directory_input_walks_recursively() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "notes/x.md");
        touch(tmp.path(), "notes/y/z.MD");

        let config = BatchConfig::with_pattern("notes", "out");
        let tasks = discover(&config, tmp.path()).unwrap();
        assert_eq!(tasks.len(), 2);

        let nested = tasks.iter().find(|t| t.input_path.ends_with("z.MD")).unwrap();
        assert_eq!(nested.relative_input_path, PathBuf::from("y/z.MD"));
        assert!(nested.output_path.is_absolute());
        assert_eq!(nested.size, "# title\n".len() as u64);
    }

    #[test]
    fn test_comma_list_with_quotes() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "one.md");
        touch(tmp.path(), "two words.md");
        touch(tmp.path(), "three.md");

        let config = BatchConfig::with_pattern(r#"one.md, "two words.md", 'missing.md'"#, "out");
        let tasks = discover(&config, tmp.path()).unwrap();
        assert_eq!(
            names(&tasks),
            ["one.md", "two words.md"].iter().map(|s| s.to_string()).collect()
        );
        assert!(tasks.iter().all(|t| t.relative_input_path.parent() == Some(Path::new(""))));
    }

    #[test]
    fn test_explicit_file_list() {
        let tmp = TempDir::new().unwrap();
        let a = touch(tmp.path(), "a.md");
        let config = BatchConfig::with_files(vec![a.clone(), a.clone()], "out");
        let tasks = discover(&config, tmp.path()).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].input_path, a);
    }

    #[test]
    fn test_no_match_is_fatal() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "notes.txt");
        let config = BatchConfig::with_pattern("*.md", "out");
        assert!(matches!(
            discover(&config, tmp.path()),
            Err(MdBatchError::NoFilesFound { .. })
        ));
    }

    #[test]
    fn test_with_date_naming() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "report.md");
        let now = Local.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap();

        let config = BatchConfig::with_pattern("report.md", "out")
            .filename_format(FilenameFormat::WithDate);
        let tasks = FileDiscoverer::new(&config)
            .unwrap()
            .with_cwd(tmp.path())
            .with_clock(now)
            .discover()
            .unwrap();

        assert_eq!(
            tasks[0].output_path.file_name().unwrap(),
            "report_2024-05-01.pdf"
        );
        assert_eq!(tasks[0].output_path, tmp.path().join("out/report_2024-05-01.pdf"));
    }

    #[test]
    fn test_output_file_name_formats() {
        let now = Local.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let ms = now.timestamp_millis();

        assert_eq!(output_file_name("a", FilenameFormat::Original, None, &now), "a.pdf");
        assert_eq!(
            output_file_name("a", FilenameFormat::WithTimestamp, None, &now),
            format!("a_{}.pdf", ms)
        );
        assert_eq!(
            output_file_name("a", FilenameFormat::Custom, Some("{date}-{name}-{other}"), &now),
            "2024-05-01-a-{other}.pdf"
        );
        assert_eq!(
            output_file_name("a", FilenameFormat::Custom, Some("{name}_{timestamp}.PDF"), &now),
            format!("a_{}.PDF", ms)
        );
        assert_eq!(output_file_name("a", FilenameFormat::Custom, None, &now), "a.pdf");
    }

    #[test]
    fn test_preserve_directory_structure() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "docs/top.md");
        touch(tmp.path(), "docs/guide/intro.md");

        let config = BatchConfig::with_pattern("docs", "out").preserve_structure(true);
        let tasks = discover(&config, tmp.path()).unwrap();

        let top = tasks.iter().find(|t| t.input_path.ends_with("top.md")).unwrap();
        let intro = tasks.iter().find(|t| t.input_path.ends_with("intro.md")).unwrap();
        assert_eq!(top.output_path, tmp.path().join("out/top.pdf"));
        assert_eq!(intro.output_path, tmp.path().join("out/guide/intro.pdf"));
    }

    #[test]
    fn test_discovery_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.md");
        touch(tmp.path(), "sub/b.md");
        let config = BatchConfig::with_pattern("**/*.md", "out");

        let pairs = |tasks: Vec<ConversionTask>| -> BTreeSet<(PathBuf, PathBuf)> {
            tasks.into_iter().map(|t| (t.input_path, t.output_path)).collect()
        };
        let first = pairs(discover(&config, tmp.path()).unwrap());
        let second = pairs(discover(&config, tmp.path()).unwrap());
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_validate_files_partitions() {
        let tmp = TempDir::new().unwrap();
        let a = touch(tmp.path(), "a.md");
        let blocker = touch(tmp.path(), "blocker.md");

        let good = ConversionTask::new(a.clone(), tmp.path().join("out/a.pdf"));
        let missing = ConversionTask::new(tmp.path().join("gone.md"), tmp.path().join("out/gone.pdf"));
        let bad_dir = ConversionTask::new(a, blocker.join("a.pdf"));

        let config = BatchConfig::with_pattern("*.md", "out");
        let discoverer = FileDiscoverer::new(&config).unwrap();
        let outcome = discoverer.validate_files(vec![good, missing, bad_dir]);

        assert_eq!(outcome.valid.len(), 1);
        assert_eq!(outcome.invalid.len(), 2);
        assert_eq!(
            outcome.invalid[0].kind(),
            crate::batch::classify::ErrorKind::FileNotFound
        );
        assert!(outcome.invalid[0].can_retry);
        assert!(outcome.invalid[0].output_path.is_some());
    }

    #[test]
    fn test_split_glob_base() {
        assert_eq!(
            split_glob_base("docs/**/*.md"),
            (PathBuf::from("docs"), "**/*.md".to_string())
        );
        assert_eq!(split_glob_base("*.md"), (PathBuf::from("."), "*.md".to_string()));
        assert_eq!(
            split_glob_base("/abs/x/*.md"),
            (PathBuf::from("/abs/x"), "*.md".to_string())
        );
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
    }

    #[test]
    fn test_is_markdown_candidate() {
        assert!(is_markdown_candidate(Path::new("a.MARKDOWN")));
        assert!(!is_markdown_candidate(Path::new("ReadMe.md")));
        assert!(!is_markdown_candidate(Path::new(".a.md")));
        assert!(!is_markdown_candidate(Path::new("a.mdx")));
    }
}
