//! 路径分组解析
//!
//! 把完整路径转换成有序的匹配片段序列（字面量或正则）。
//!
//! # 两种模式
//!
//! - **普通模式**：按 `/` 切分完整路径；根路径 `/` 只产生一个空字符串片段；
//!   以 `:` 开头的片段编译为正则
//! - **分组模式**：以节点**声明的 path** 作为分隔符切分完整路径，
//!   声明路径整体作为一个片段放回前缀与后缀之间，
//!   从而支持声明路径本身包含 `/` 却要作为一个匹配单元的情形
//!
//! 解析是纯函数：相同输入永远得到相同输出。

use regex::Regex;
use std::fmt;
use tracing::{debug, warn};

/// 捕获片段前缀
const CAPTURE_PREFIX: char = ':';

/// 匹配片段
#[derive(Debug, Clone)]
pub enum MatchSegment {
    /// 字面量：候选片段必须完全相等
    Literal(String),
    /// 正则：候选片段必须满足该正则（非锚定搜索）
    Pattern(Regex),
}

impl MatchSegment {
    /// 由原始片段构造：`:` 开头编译为正则，编译失败时退化为字面量
    pub fn from_raw(raw: &str) -> Self {
        match raw.strip_prefix(CAPTURE_PREFIX) {
            Some(source) => match Regex::new(source) {
                Ok(regex) => MatchSegment::Pattern(regex),
                Err(e) => {
                    warn!(segment = %raw, error = %e, "捕获片段正则无效，按字面量处理");
                    MatchSegment::Literal(raw.to_string())
                }
            },
            None => MatchSegment::Literal(raw.to_string()),
        }
    }

    /// 构造字面量片段
    pub fn literal(value: impl Into<String>) -> Self {
        MatchSegment::Literal(value.into())
    }

    /// 构造正则片段
    pub fn pattern(source: &str) -> Result<Self, regex::Error> {
        Regex::new(source).map(MatchSegment::Pattern)
    }

    /// 检查单个候选片段
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            MatchSegment::Literal(value) => value == candidate,
            MatchSegment::Pattern(regex) => regex.is_match(candidate),
        }
    }

    /// 是否为正则片段
    pub fn is_pattern(&self) -> bool {
        matches!(self, MatchSegment::Pattern(_))
    }
}

impl PartialEq for MatchSegment {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MatchSegment::Literal(a), MatchSegment::Literal(b)) => a == b,
            (MatchSegment::Pattern(a), MatchSegment::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl fmt::Display for MatchSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchSegment::Literal(value) => write!(f, "'{}'", value),
            MatchSegment::Pattern(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

impl From<&str> for MatchSegment {
    fn from(value: &str) -> Self {
        MatchSegment::literal(value)
    }
}

/// 分组解析结果
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPath {
    /// 有序匹配片段
    pub segments: Vec<MatchSegment>,

    /// 最后一个片段是否为分组片段
    ///
    /// 分组片段匹配地址中从该位置开始、以 `/` 重新拼接的剩余部分
    pub group_tail: bool,
}

impl ParsedPath {
    /// 片段数量
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// 是否没有任何片段
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// 解析完整路径
///
/// # Arguments
///
/// * `full_path` - 节点完整路径
/// * `declared` - 节点声明的 path
/// * `group_mode` - 是否启用分组模式
///
/// # Example
///
/// ```
/// use native_route::router::group::{parse_groups, MatchSegment};
///
/// let parsed = parse_groups("/root/:(?:hello)|(?:world)", ":(?:hello)|(?:world)", true);
/// assert_eq!(
///     parsed.segments,
///     vec![
///         MatchSegment::literal(""),
///         MatchSegment::literal("root"),
///         MatchSegment::pattern("(?:hello)|(?:world)").unwrap(),
///     ]
/// );
/// ```
pub fn parse_groups(full_path: &str, declared: &str, group_mode: bool) -> ParsedPath {
    if group_mode {
        if let Some(parsed) = parse_grouped(full_path, declared) {
            return parsed;
        }
        debug!(full_path = %full_path, declared = %declared, "分组模式无法切分，回落到普通模式");
    }

    ParsedPath {
        segments: split_segments(full_path),
        group_tail: false,
    }
}

/// 普通模式：按 `/` 切分
fn split_segments(full_path: &str) -> Vec<MatchSegment> {
    if full_path == "/" {
        return vec![MatchSegment::literal("")];
    }
    full_path.split('/').map(MatchSegment::from_raw).collect()
}

/// 分组模式：以声明路径为分隔符切分
///
/// 声明路径总是完整路径的结尾，因此只在最后一次出现处切分。
/// 切分后还有非空后缀（规范化改写过结尾）时放弃分组，由调用方回落。
fn parse_grouped(full_path: &str, declared: &str) -> Option<ParsedPath> {
    if declared.is_empty() {
        return None;
    }

    let (prefix, suffix) = full_path.rsplit_once(declared)?;
    if !suffix.is_empty() {
        return None;
    }

    let prefix = prefix.trim_end_matches('/');
    let mut segments: Vec<MatchSegment> = prefix.split('/').map(MatchSegment::from_raw).collect();

    let group = declared.strip_prefix('/').unwrap_or(declared);
    segments.push(MatchSegment::from_raw(group));

    Some(ParsedPath {
        segments,
        group_tail: true,
    })
}
