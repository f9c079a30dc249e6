//! HIPAA 审计过滤器
//!
//! 网关在两个位置调用过滤器：
//!
//! 1. 转发前调用 [`HipaaAuditFilter::pre_forward`]，符合条件时记录请求事件；
//! 2. 后端响应后、发送给调用方前调用 [`HipaaAuditFilter::post_response`]，
//!    符合条件时记录响应事件。
//!
//! 两个钩子都返回 `Result<FilterOutcome, AuditError>`：
//! `Ok(Skipped)` 表示不需要审计，`Ok(Audited)` 表示事件已发布，
//! `Err` 表示调用必须中止。

use crate::context::RequestContext;
use crate::error::AuditError;
use crate::policy::{AuditPolicy, PolicyEvaluator};
use crate::principal::{ContextPrincipalResolver, PrincipalResolver};
use crate::recorder::{record_request, record_response};
use crate::sink::AuditSink;
use hyper::{Body, Response};
use std::sync::Arc;

/// 过滤器处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    /// 调用不在审计范围内，原样放行
    Skipped,
    /// 已发布审计事件
    Audited,
}

/// 请求/响应审计过滤器
#[derive(Clone)]
pub struct HipaaAuditFilter {
    policy: Arc<dyn PolicyEvaluator>,
    principals: Arc<dyn PrincipalResolver>,
    sink: Arc<dyn AuditSink>,
}

impl HipaaAuditFilter {
    pub fn new(
        policy: Arc<dyn PolicyEvaluator>,
        principals: Arc<dyn PrincipalResolver>,
        sink: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            policy,
            principals,
            sink,
        }
    }

    /// 使用模式策略和上下文身份解析构建过滤器
    pub fn from_policy(policy: AuditPolicy, sink: Arc<dyn AuditSink>) -> Self {
        let principals = ContextPrincipalResolver::new(policy.anonymous_principal().map(str::to_string));
        Self::new(Arc::new(policy), Arc::new(principals), sink)
    }

    /// 转发前钩子
    pub fn pre_forward(&self, ctx: &RequestContext) -> Result<FilterOutcome, AuditError> {
        if !self.policy.should_audit_request(ctx.method(), ctx.path()) {
            return Ok(FilterOutcome::Skipped);
        }

        record_request(ctx, self.principals.as_ref(), self.sink.as_ref())?;
        Ok(FilterOutcome::Audited)
    }

    /// 响应后钩子
    ///
    /// 返回错误时响应体已被消费，调用方不得再发送 `response`。
    pub async fn post_response(
        &self,
        ctx: &RequestContext,
        response: &mut Response<Body>,
    ) -> Result<FilterOutcome, AuditError> {
        if !self
            .policy
            .should_audit_response(ctx.method(), ctx.path(), ctx.query())
        {
            return Ok(FilterOutcome::Skipped);
        }

        record_response(ctx, response, self.principals.as_ref(), self.sink.as_ref()).await?;
        Ok(FilterOutcome::Audited)
    }
}
