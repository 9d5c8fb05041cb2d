//! 匹配判定
//!
//! 给定当前地址的 pathname 与节点解析出的匹配片段，
//! 计算节点的 `active`（前缀匹配）与 `exact`（完全匹配）两个布尔值。
//!
//! 匹配以前缀为准：只要地址开头的若干片段与节点片段一致，节点就处于激活状态，
//! 这使得父路由在更具体的子路由激活时仍然保持激活。
//! 只有声明了 `exact` 的节点才要求完全相等。

use crate::router::group::{parse_groups, MatchSegment, ParsedPath};

/// 匹配结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchOutcome {
    /// 前缀匹配（或完全匹配）成立
    pub active: bool,
    /// 地址与完整路径完全相等
    pub exact: bool,
}

impl MatchOutcome {
    /// 未匹配
    pub const MISS: MatchOutcome = MatchOutcome {
        active: false,
        exact: false,
    };
}

/// 路由匹配器
///
/// 持有节点的完整路径与解析结果。完整路径变化时必须整体重建，
/// 因此匹配时使用的片段永远与完整路径一致。
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatcher {
    full_path: String,
    exact: bool,
    parsed: ParsedPath,
}

impl RouteMatcher {
    /// 创建匹配器
    ///
    /// # Arguments
    ///
    /// * `full_path` - 节点完整路径
    /// * `declared` - 节点声明的 path（分组模式下作为分隔符）
    /// * `exact` - 是否只接受完全匹配
    /// * `group_mode` - 是否启用分组模式
    pub fn new(full_path: impl Into<String>, declared: &str, exact: bool, group_mode: bool) -> Self {
        let full_path = full_path.into();
        let parsed = parse_groups(&full_path, declared, group_mode);
        Self {
            full_path,
            exact,
            parsed,
        }
    }

    /// 完整路径
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// 匹配片段
    pub fn segments(&self) -> &[MatchSegment] {
        &self.parsed.segments
    }

    /// 是否只接受完全匹配
    pub fn is_exact_only(&self) -> bool {
        self.exact
    }

    /// 判定当前地址
    ///
    /// 判定是幂等的：同一地址重复判定总是得到相同结果。
    ///
    /// # Example
    ///
    /// ```
    /// use native_route::router::matcher::RouteMatcher;
    ///
    /// let matcher = RouteMatcher::new("/user/:\\d+", ":\\d+", false, false);
    /// assert!(matcher.evaluate("/user/42/settings").active);
    /// assert!(!matcher.evaluate("/user/me").active);
    /// ```
    pub fn evaluate(&self, pathname: &str) -> MatchOutcome {
        let exact = pathname == self.full_path;

        if self.exact {
            return MatchOutcome {
                active: exact,
                exact,
            };
        }

        if exact {
            return MatchOutcome {
                active: true,
                exact,
            };
        }

        MatchOutcome {
            active: self.matches_prefix(pathname),
            exact,
        }
    }

    /// 前缀比较
    fn matches_prefix(&self, pathname: &str) -> bool {
        let local: Vec<&str> = pathname.split('/').collect();
        let segments = &self.parsed.segments;

        if segments.len() > local.len() {
            return false;
        }

        let (head, tail) = match (self.parsed.group_tail, segments.split_last()) {
            (true, Some((last, head))) => (head, Some(last)),
            _ => (segments.as_slice(), None),
        };

        let head_matches = head
            .iter()
            .zip(local.iter())
            .all(|(segment, candidate)| segment.matches(candidate));
        if !head_matches {
            return false;
        }

        match tail {
            Some(group) => {
                let remainder = local[head.len()..].join("/");
                matches_group(group, &remainder)
            }
            None => true,
        }
    }
}

/// 分组片段匹配剩余地址
///
/// 字面量分组要求剩余部分等于它，或以它加 `/` 开头；空字面量匹配任何剩余部分。
fn matches_group(group: &MatchSegment, remainder: &str) -> bool {
    match group {
        MatchSegment::Literal(value) if value.is_empty() => true,
        MatchSegment::Literal(value) => {
            remainder == value
                || remainder
                    .strip_prefix(value.as_str())
                    .map(|rest| rest.starts_with('/'))
                    .unwrap_or(false)
        }
        MatchSegment::Pattern(regex) => regex.is_match(remainder),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_hit_is_always_active() {
        let matcher = RouteMatcher::new("/about", "about", false, false);
        assert_eq!(
            matcher.evaluate("/about"),
            MatchOutcome {
                active: true,
                exact: true
            }
        );
    }

    #[test]
    fn test_prefix_match() {
        let matcher = RouteMatcher::new("/docs", "docs", false, false);
        assert_eq!(
            matcher.evaluate("/docs/intro"),
            MatchOutcome {
                active: true,
                exact: false
            }
        );
        assert_eq!(matcher.evaluate("/doc"), MatchOutcome::MISS);
        assert_eq!(matcher.evaluate("/"), MatchOutcome::MISS);
    }

    #[test]
    fn test_root_matches_everything_as_prefix() {
        let matcher = RouteMatcher::new("/", "/", false, false);
        assert!(matcher.evaluate("/").exact);
        assert!(matcher.evaluate("/anything").active);
        assert!(!matcher.evaluate("/anything").exact);
    }

    #[test]
    fn test_exact_only_ignores_prefix() {
        let matcher = RouteMatcher::new("/docs", "docs", true, false);
        for pathname in ["/docs", "/docs/intro", "/", "/docsx"] {
            let outcome = matcher.evaluate(pathname);
            assert_eq!(outcome.active, pathname == "/docs", "{}", pathname);
            assert_eq!(outcome.active, outcome.exact);
        }
    }

    #[test]
    fn test_more_segments_than_location_never_active() {
        let matcher = RouteMatcher::new("/a/:.*/:.*", ":.*", false, false);
        assert_eq!(matcher.segments().len(), 4);
        assert!(!matcher.evaluate("/a/b").active);
        assert!(matcher.evaluate("/a/b/c").active);
    }

    #[test]
    fn test_pattern_segment_is_unanchored() {
        let matcher = RouteMatcher::new("/item/:\\d", ":\\d", false, false);
        assert!(matcher.evaluate("/item/abc1").active);
        assert!(!matcher.evaluate("/item/abc").active);
    }

    #[test]
    fn test_group_mode_alternation() {
        let matcher = RouteMatcher::new(
            "/root/:(?:hello)|(?:world)",
            ":(?:hello)|(?:world)",
            false,
            true,
        );
        assert!(matcher.evaluate("/root/hello").active);
        assert!(matcher.evaluate("/root/world").active);
        assert!(!matcher.evaluate("/root/other").active);
        assert!(!matcher.evaluate("/other/hello").active);
    }

    #[test]
    fn test_group_mode_pattern_spanning_slash() {
        let matcher = RouteMatcher::new(
            "/root/:(?:hello/world)",
            ":(?:hello/world)",
            false,
            true,
        );
        assert!(matcher.evaluate("/root/hello/world").active);
        assert!(!matcher.evaluate("/root/hello").active);
    }

    #[test]
    fn test_group_mode_literal_tail() {
        let matcher = RouteMatcher::new("/docs/api/v2", "/docs/api/v2", false, true);
        assert!(matcher.evaluate("/docs/api/v2").exact);
        assert!(matcher.evaluate("/docs/api/v2/users").active);
        assert!(!matcher.evaluate("/docs/api/v20").active);
        assert!(!matcher.evaluate("/docs/api").active);
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let matcher = RouteMatcher::new("/a/:b+", ":b+", false, false);
        for pathname in ["/a/b", "/a/c", "/", "/a/bb/c"] {
            assert_eq!(matcher.evaluate(pathname), matcher.evaluate(pathname));
        }
    }
}
