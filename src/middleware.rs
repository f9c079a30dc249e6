//! 审计中间件实现

use crate::context::RequestContext;
use crate::error::AuditError;
use crate::filter::{FilterOutcome, HipaaAuditFilter};
use hyper::{Body, Request, Response, StatusCode};
use std::future::Future;
use std::net::SocketAddr;

/// 中间件和业务处理函数使用的错误类型
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 审计中间件
///
/// # 参数
/// - `req`: HTTP 请求
/// - `remote_addr`: 连接的远端地址
/// - `handler`: 业务处理函数（通常是转发到后端）
/// - `filter`: 审计过滤器
///
/// # 返回
/// 不在审计范围内的调用原样返回处理函数的结果。
/// 审计失败时返回 [`AuditError`]（装箱），原始响应不会被返回；
/// 宿主可以用 [`fault_response`] 把错误转换为 500 响应。
pub async fn with_audit<F, Fut>(
    req: Request<Body>,
    remote_addr: Option<SocketAddr>,
    handler: F,
    filter: &HipaaAuditFilter,
) -> Result<Response<Body>, BoxError>
where
    F: FnOnce(Request<Body>) -> Fut,
    Fut: Future<Output = Result<Response<Body>, BoxError>>,
{
    // 1. 提取请求上下文
    let ctx = RequestContext::from_request(&req, remote_addr);

    // 2. 转发前审计
    if filter.pre_forward(&ctx)? == FilterOutcome::Audited {
        tracing::debug!(method = %ctx.method(), uri = ctx.path(), "request audited");
    }

    // 3. 执行业务逻辑
    let mut response = handler(req).await?;

    // 4. 发送前审计响应
    if filter.post_response(&ctx, &mut response).await? == FilterOutcome::Audited {
        tracing::debug!(method = %ctx.method(), uri = ctx.path(), "response audited");
    }

    Ok(response)
}

/// 将中间件错误转换为 HTTP 响应
///
/// 审计错误按 [`AuditError::fault_response`] 处理，其他错误返回 500。
pub fn fault_response(err: &BoxError) -> Response<Body> {
    match err.downcast_ref::<AuditError>() {
        Some(audit_err) => audit_err.fault_response(),
        None => {
            let mut response = Response::new(Body::from("internal error"));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}
