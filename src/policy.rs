//! 审计策略评估器
//!
//! 请求审计和响应审计使用两套独立的模式列表，规则相同：
//! 先检查黑名单（deny），命中即不审计；否则检查白名单（allow）。

use crate::error::AuditError;
use crate::matcher::PatternSet;
use hyper::Method;

/// 策略评估器 trait
pub trait PolicyEvaluator: Send + Sync {
    /// 评估请求是否需要审计
    fn should_audit_request(&self, method: &Method, uri: &str) -> bool;

    /// 评估响应是否需要审计
    fn should_audit_response(&self, method: &Method, uri: &str, query: Option<&str>) -> bool;
}

/// 基于 URI 正则模式的审计策略
///
/// 加载后不可变，可以通过 `Arc` 在所有请求之间共享。
#[derive(Debug, Clone)]
pub struct AuditPolicy {
    request_allow: PatternSet,
    request_deny: PatternSet,
    response_allow: PatternSet,
    response_deny: PatternSet,
    anonymous_principal: Option<String>,
}

/// 默认的请求白名单：所有包含 `/api/` 的路径
pub const DEFAULT_REQUEST_ALLOW_PATTERN: &str = ".*/api/.*";

impl AuditPolicy {
    pub fn new(
        request_allow: PatternSet,
        request_deny: PatternSet,
        response_allow: PatternSet,
        response_deny: PatternSet,
    ) -> Self {
        Self {
            request_allow,
            request_deny,
            response_allow,
            response_deny,
            anonymous_principal: None,
        }
    }

    /// 从原始模式字符串构建策略
    pub fn from_patterns<S: AsRef<str>>(
        request_allow: &[S],
        request_deny: &[S],
        response_allow: &[S],
        response_deny: &[S],
    ) -> Result<Self, AuditError> {
        Ok(Self::new(
            PatternSet::compile(request_allow)?,
            PatternSet::compile(request_deny)?,
            PatternSet::compile(response_allow)?,
            PatternSet::compile(response_deny)?,
        ))
    }

    /// 没有认证主体时使用的占位主体
    pub fn with_anonymous_principal(mut self, principal: Option<String>) -> Self {
        self.anonymous_principal = principal;
        self
    }

    pub fn anonymous_principal(&self) -> Option<&str> {
        self.anonymous_principal.as_deref()
    }

    pub fn request_allow(&self) -> &PatternSet {
        &self.request_allow
    }

    pub fn request_deny(&self) -> &PatternSet {
        &self.request_deny
    }

    pub fn response_allow(&self) -> &PatternSet {
        &self.response_allow
    }

    pub fn response_deny(&self) -> &PatternSet {
        &self.response_deny
    }
}

impl Default for AuditPolicy {
    fn default() -> Self {
        Self::new(
            PatternSet::compile(&[DEFAULT_REQUEST_ALLOW_PATTERN])
                .unwrap_or_default(),
            PatternSet::default(),
            PatternSet::default(),
            PatternSet::default(),
        )
    }
}

impl PolicyEvaluator for AuditPolicy {
    fn should_audit_request(&self, method: &Method, uri: &str) -> bool {
        // 预检请求没有业务语义
        if *method == Method::OPTIONS {
            return false;
        }

        let audit = !self.request_deny.matches(uri) && self.request_allow.matches(uri);
        tracing::debug!(%method, uri, audit, "request audit eligibility");
        audit
    }

    fn should_audit_response(&self, method: &Method, uri: &str, query: Option<&str>) -> bool {
        if *method != Method::GET && *method != Method::POST {
            return false;
        }

        let candidate = response_candidate(uri, query);
        let audit =
            !self.response_deny.matches(&candidate) && self.response_allow.matches(&candidate);
        tracing::debug!(%method, candidate = %candidate, audit, "response audit eligibility");
        audit
    }
}

/// 响应审计匹配的目标串：有查询串时为 `uri?query`
pub fn response_candidate(uri: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{}?{}", uri, q),
        _ => uri.to_string(),
    }
}
