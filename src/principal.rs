//! 调用者身份解析

use crate::context::RequestContext;
use crate::error::AuditError;

/// 认证层在请求扩展中附加的调用者身份
///
/// 网关的认证中间件在转发前插入：
///
/// ```rust
/// use hipaa_audit_filter::AuthenticatedPrincipal;
/// use hyper::{Body, Request};
///
/// let mut req = Request::new(Body::empty());
/// req.extensions_mut().insert(AuthenticatedPrincipal("admin".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedPrincipal(pub String);

/// 身份解析 trait
pub trait PrincipalResolver: Send + Sync {
    /// 返回当前调用者身份；无法确定时返回错误
    fn current_principal(&self, ctx: &RequestContext) -> Result<String, AuditError>;
}

/// 从请求上下文读取身份
///
/// 默认在没有身份时失败，使调用中止而不是在没有审计的情况下继续；
/// 配置了匿名身份时改用该占位值。
#[derive(Debug, Clone, Default)]
pub struct ContextPrincipalResolver {
    anonymous: Option<String>,
}

impl ContextPrincipalResolver {
    pub fn new(anonymous: Option<String>) -> Self {
        Self { anonymous }
    }
}

impl PrincipalResolver for ContextPrincipalResolver {
    fn current_principal(&self, ctx: &RequestContext) -> Result<String, AuditError> {
        if let Some(principal) = ctx.principal() {
            return Ok(principal.to_string());
        }

        match &self.anonymous {
            Some(anonymous) => {
                tracing::warn!(uri = ctx.path(), "no authenticated principal, auditing as {}", anonymous);
                Ok(anonymous.clone())
            }
            None => Err(AuditError::Unauthenticated {
                uri: ctx.path().to_string(),
            }),
        }
    }
}
