//! URI 模式匹配
//!
//! 每个模式都是整串匹配：模式在编译时被包裹为 `^(?:...)$`，
//! 所以 `.*/api/.*` 匹配 `/svc/api/x`，而 `/api` 不会匹配 `/api/x`。

use crate::error::AuditError;
use regex::Regex;

/// 一组已编译的 URI 模式，保持配置中的顺序
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Regex>,
    sources: Vec<String>,
}

impl PatternSet {
    /// 编译一组模式
    ///
    /// 任意一个模式非法都会返回 [`AuditError::InvalidPattern`]，
    /// 不会跳过非法模式继续工作。
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self, AuditError> {
        let sources: Vec<String> = patterns.iter().map(|p| p.as_ref().to_string()).collect();
        let patterns = sources
            .iter()
            .map(|p| compile_full_match(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns, sources })
    }

    /// 是否至少有一个模式整串匹配 `candidate`
    pub fn matches(&self, candidate: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(candidate))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// 配置中的原始模式
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(String::as_str)
    }
}

fn compile_full_match(pattern: &str) -> Result<Regex, AuditError> {
    // 先单独编译一次，让错误信息指向用户写的模式
    Regex::new(pattern).map_err(|source| AuditError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })?;

    // 详细模式（x 标志）下结尾的 `#` 注释会吞掉 `)$`，用换行结束注释后重试
    Regex::new(&format!("^(?:{})$", pattern))
        .or_else(|_| Regex::new(&format!("^(?:{}\n)$", pattern)))
        .map_err(|source| AuditError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}

/// 一次性匹配：编译 `patterns` 并检查 `candidate`
///
/// 请求路径上应使用预先编译的 [`PatternSet`]，这个函数用于工具和测试。
pub fn matches<S: AsRef<str>>(patterns: &[S], candidate: &str) -> Result<bool, AuditError> {
    Ok(PatternSet::compile(patterns)?.matches(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_set_never_matches() {
        let set = PatternSet::compile::<&str>(&[]).unwrap();
        assert!(set.is_empty());
        assert!(!set.matches(""));
        assert!(!set.matches("/api/anything"));
    }

    #[test]
    fn test_full_string_semantics() {
        let set = PatternSet::compile(&["/api"]).unwrap();
        assert!(set.matches("/api"));
        assert!(!set.matches("/api/patient"));
        assert!(!set.matches("/v1/api"));
    }

    #[test]
    fn test_explicit_anchors_are_harmless() {
        let set = PatternSet::compile(&["^/uaaserver.*", ".*/api/profile-info$"]).unwrap();
        assert!(set.matches("/uaaserver/api/account"));
        assert!(set.matches("/ui/api/profile-info"));
        assert!(!set.matches("/ui/api/profile-info/extra"));
    }

    #[test]
    fn test_alternation_is_anchored_as_a_whole() {
        // 没有分组时 `^a|b$` 只会锚定一端
        let set = PatternSet::compile(&["/a|/b"]).unwrap();
        assert!(set.matches("/a"));
        assert!(set.matches("/b"));
        assert!(!set.matches("/a/x"));
        assert!(!set.matches("/x/b"));
    }

    #[test]
    fn test_any_pattern_matches() {
        let set = PatternSet::compile(&[".*/gateway/.*", ".*/api/.*"]).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.matches("/api/gateway/routes/"));
        assert!(set.matches("/svc/api/x"));
        assert!(!set.matches("/other"));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let err = PatternSet::compile(&[".*/api/.*", "(unclosed"]).unwrap_err();
        match err {
            AuditError::InvalidPattern { pattern, .. } => assert_eq!(pattern, "(unclosed"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_sources_round_trip() {
        let set = PatternSet::compile(&[".*/api/.*", ".*/Patient\\?.*"]).unwrap();
        let sources: Vec<&str> = set.sources().collect();
        assert_eq!(sources, vec![".*/api/.*", ".*/Patient\\?.*"]);
    }

    #[test]
    fn test_verbose_pattern_with_trailing_comment() {
        let set = PatternSet::compile(&["(?x)/api/.* # comment"]).unwrap();
        assert!(set.matches("/api/patient"));
        assert!(!set.matches("/v1/other"));

        let set = PatternSet::compile(&["(?x) /svc /api/ .*"]).unwrap();
        assert!(set.matches("/svc/api/x"));
        assert!(!set.matches("/svc /api/x"));
    }

    #[test]
    fn test_one_shot_matches() {
        assert!(matches(&[".*/api/.*"], "/x/api/y").unwrap());
        assert!(!matches::<&str>(&[], "/x/api/y").unwrap());
        assert!(matches(&["["], "/x").is_err());
    }
}
