//! 审计配置
//!
//! 配置只在启动时加载一次，编译为不可变的 [`AuditPolicy`]。
//! 支持 YAML 和 JSON；键名使用 camelCase，同时接受旧的
//! `hipaa*UriPatterns` 名称（camelCase 或 kebab-case）。未知键会被拒绝。
//!
//! 配置可以直接位于文档根部，也可以位于 `igia.hipaa.audit` 下，
//! 这样已有的 `application.yml` 可以直接加载，其余顶层键会被忽略。
//!
//! ```yaml
//! requestAllowPatterns:
//!   - ".*/api/.*"
//! requestDenyPatterns:
//!   - "^/uaaserver.*"
//!   - ".*/api/healthcheck/alive\\.json$"
//! responseAllowPatterns:
//!   - ".*/Patient\\?.*"
//! anonymousPrincipal: anonymousUser
//! ```

use crate::error::AuditError;
use crate::matcher::PatternSet;
use crate::policy::{AuditPolicy, DEFAULT_REQUEST_ALLOW_PATTERN};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 嵌套配置所在的路径
const NESTED_SECTION: [&str; 3] = ["igia", "hipaa", "audit"];

/// HIPAA 审计配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct HipaaAuditOptions {
    /// 需要审计的请求 URI 模式
    #[serde(alias = "hipaaWhitelistUriPatterns", alias = "hipaa-whitelist-uri-patterns")]
    pub request_allow_patterns: Vec<String>,
    /// 不审计的请求 URI 模式，优先于白名单
    #[serde(alias = "hipaaBlacklistUriPatterns", alias = "hipaa-blacklist-uri-patterns")]
    pub request_deny_patterns: Vec<String>,
    /// 需要审计响应体的 URI 模式（含查询串）
    #[serde(alias = "hipaaResponseWhitelistUriPatterns", alias = "hipaa-response-whitelist-uri-patterns")]
    pub response_allow_patterns: Vec<String>,
    /// 不审计响应体的 URI 模式，优先于白名单
    #[serde(alias = "hipaaResponseBlacklistUriPatterns", alias = "hipaa-response-blacklist-uri-patterns")]
    pub response_deny_patterns: Vec<String>,
    /// 没有认证身份时使用的占位身份；为空时此类调用会被中止
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anonymous_principal: Option<String>,
}

impl Default for HipaaAuditOptions {
    fn default() -> Self {
        Self {
            request_allow_patterns: vec![DEFAULT_REQUEST_ALLOW_PATTERN.to_string()],
            request_deny_patterns: Vec::new(),
            response_allow_patterns: Vec::new(),
            response_deny_patterns: Vec::new(),
            anonymous_principal: None,
        }
    }
}

impl HipaaAuditOptions {
    /// 从文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, AuditError> {
        let path = path.as_ref();
        let data = fs::read(path)
            .map_err(|e| AuditError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let options = Self::from_slice(&data)?;
        tracing::info!(path = %path.display(), "loaded HIPAA audit configuration");
        Ok(options)
    }

    /// 从 YAML 或 JSON 字节解析配置
    ///
    /// 空文档视为全部使用默认值。
    pub fn from_slice(data: &[u8]) -> Result<Self, AuditError> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        let document: serde_yaml::Value = decode_document(data)?;
        let section = NESTED_SECTION
            .iter()
            .try_fold(&document, |value, key| value.get(key));

        let options: Result<Self, serde_yaml::Error> = match section {
            Some(section) => {
                tracing::debug!(section = %NESTED_SECTION.join("."), "reading nested audit configuration");
                serde_yaml::from_value(section.clone())
            }
            None => serde_yaml::from_value(document),
        };
        options.map_err(|e| AuditError::Config(format!("invalid audit configuration: {}", e)))
    }

    /// 检查所有模式是否合法，返回全部错误
    pub fn validate(&self) -> Result<(), Vec<AuditError>> {
        let errors: Vec<AuditError> = [
            &self.request_allow_patterns[..],
            &self.request_deny_patterns[..],
            &self.response_allow_patterns[..],
            &self.response_deny_patterns[..],
        ]
        .into_iter()
        .flat_map(|patterns| patterns.iter())
        .filter_map(|p| PatternSet::compile(std::slice::from_ref(p)).err())
        .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// 编译为审计策略
    pub fn compile(&self) -> Result<AuditPolicy, AuditError> {
        let policy = AuditPolicy::from_patterns(
            &self.request_allow_patterns[..],
            &self.request_deny_patterns[..],
            &self.response_allow_patterns[..],
            &self.response_deny_patterns[..],
        )?
        .with_anonymous_principal(self.anonymous_principal.clone());

        let sources = |set: &PatternSet| set.sources().collect::<Vec<_>>().join(", ");
        tracing::info!(
            request_allow = %sources(policy.request_allow()),
            request_deny = %sources(policy.request_deny()),
            response_allow = %sources(policy.response_allow()),
            response_deny = %sources(policy.response_deny()),
            anonymous_principal = ?policy.anonymous_principal(),
            "configured HIPAA audit policy"
        );
        Ok(policy)
    }
}

/// 解析 YAML 或 JSON 文档
fn decode_document<T: DeserializeOwned>(data: &[u8]) -> Result<T, AuditError> {
    // JSON 是 YAML 的子集，先按 YAML 解析，失败时再按 JSON 解析以得到更准确的错误
    match serde_yaml::from_slice::<T>(data) {
        Ok(document) => Ok(document),
        Err(yaml_err) => serde_json::from_slice::<T>(data).map_err(|json_err| {
            AuditError::Config(format!(
                "cannot decode audit configuration: yaml: {}; json: {}",
                yaml_err, json_err
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyEvaluator;
    use hyper::Method;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let options = HipaaAuditOptions::default();
        assert_eq!(options.request_allow_patterns, vec![".*/api/.*".to_string()]);
        assert!(options.request_deny_patterns.is_empty());
        assert!(options.response_allow_patterns.is_empty());
        assert!(options.response_deny_patterns.is_empty());
        assert!(options.anonymous_principal.is_none());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let options = HipaaAuditOptions::from_slice(b"  \n").unwrap();
        assert_eq!(options, HipaaAuditOptions::default());
    }

    #[test]
    fn test_yaml_partial_keeps_defaults() {
        let yaml = br#"
requestDenyPatterns:
  - "^/uaaserver.*"
responseAllowPatterns:
  - ".*/Patient\\?.*"
"#;
        let options = HipaaAuditOptions::from_slice(yaml).unwrap();
        assert_eq!(options.request_allow_patterns, vec![".*/api/.*".to_string()]);
        assert_eq!(options.request_deny_patterns, vec!["^/uaaserver.*".to_string()]);
        assert_eq!(options.response_allow_patterns, vec![".*/Patient\\?.*".to_string()]);
    }

    #[test]
    fn test_legacy_key_names() {
        let yaml = br#"
hipaaWhitelistUriPatterns: [".*/fhir/.*"]
hipaaBlacklistUriPatterns: [".*/gateway/.*"]
hipaaResponseWhitelistUriPatterns: [".*/fhir/Patient"]
hipaaResponseBlacklistUriPatterns: []
"#;
        let options = HipaaAuditOptions::from_slice(yaml).unwrap();
        assert_eq!(options.request_allow_patterns, vec![".*/fhir/.*".to_string()]);
        assert_eq!(options.request_deny_patterns, vec![".*/gateway/.*".to_string()]);
        assert_eq!(options.response_allow_patterns, vec![".*/fhir/Patient".to_string()]);
    }

    #[test]
    fn test_nested_application_yaml() {
        let yaml = br#"
server:
  port: 8080
igia:
  hipaa:
    audit:
      hipaa-blacklist-uri-patterns:
        - "^/uaaserver.*"
      hipaaResponseWhitelistUriPatterns:
        - ".*/Patient\\?.*"
"#;
        let options = HipaaAuditOptions::from_slice(yaml).unwrap();
        assert_eq!(options.request_allow_patterns, vec![".*/api/.*".to_string()]);
        assert_eq!(options.request_deny_patterns, vec!["^/uaaserver.*".to_string()]);
        assert_eq!(options.response_allow_patterns, vec![".*/Patient\\?.*".to_string()]);
    }

    #[test]
    fn test_nested_section_rejects_unknown_key() {
        let yaml = b"igia:\n  hipaa:\n    audit:\n      hipaaWhitelist: []\n";
        let err = HipaaAuditOptions::from_slice(yaml).unwrap_err();
        assert!(matches!(err, AuditError::Config(_)));
    }

    #[test]
    fn test_json_document() {
        let json = br#"{"requestAllowPatterns": [".*"], "anonymousPrincipal": "anonymousUser"}"#;
        let options = HipaaAuditOptions::from_slice(json).unwrap();
        assert_eq!(options.request_allow_patterns, vec![".*".to_string()]);
        assert_eq!(options.anonymous_principal.as_deref(), Some("anonymousUser"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = HipaaAuditOptions::from_slice(b"requestAllowPattern: [\".*\"]\n").unwrap_err();
        assert!(matches!(err, AuditError::Config(_)));
    }

    #[test]
    fn test_invalid_pattern_fails_compile() {
        let options = HipaaAuditOptions {
            request_deny_patterns: vec!["(broken".to_string()],
            response_allow_patterns: vec!["[also".to_string()],
            ..Default::default()
        };

        assert_eq!(options.validate().unwrap_err().len(), 2);
        assert!(matches!(
            options.compile(),
            Err(AuditError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_compile_policy() {
        let options = HipaaAuditOptions {
            request_deny_patterns: vec![".*/api/healthcheck/alive\\.json$".to_string()],
            response_allow_patterns: vec![".*/Patient\\?.*".to_string()],
            anonymous_principal: Some("anonymousUser".to_string()),
            ..Default::default()
        };
        assert!(options.validate().is_ok());

        let policy = options.compile().unwrap();
        assert!(policy.should_audit_request(&Method::GET, "/ui/api/all.json"));
        assert!(!policy.should_audit_request(&Method::GET, "/ui/api/healthcheck/alive.json"));
        assert!(policy.should_audit_response(&Method::GET, "/Patient", Some("identifier=1")));
        assert_eq!(policy.anonymous_principal(), Some("anonymousUser"));
        assert_eq!(
            policy.response_allow().sources().collect::<Vec<_>>(),
            vec![".*/Patient\\?.*"]
        );
        assert!(policy.response_deny().is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "requestDenyPatterns:\n  - \".*/gateway/.*\"").unwrap();

        let options = HipaaAuditOptions::load_from_file(file.path()).unwrap();
        assert_eq!(options.request_deny_patterns, vec![".*/gateway/.*".to_string()]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = HipaaAuditOptions::load_from_file("/nonexistent/hipaa-audit.yaml").unwrap_err();
        assert!(matches!(err, AuditError::Config(_)));
    }
}
