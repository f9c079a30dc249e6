//! HIPAA Audit Filter - API 网关的请求/响应审计中间件
//!
//! 为满足 HIPAA 合规日志要求，网关需要为所有访问受保护 API 的请求记录审计事件，
//! 并对一部分路由记录返回给调用方的响应体；健康检查、网关内部路由等流量被排除。
//!
//! # 核心特性
//!
//! - **黑名单优先**：deny 模式命中即不审计，无论 allow 是否命中
//! - **整串匹配**：每个模式都按完整 URI 匹配，而不是子串搜索
//! - **响应体还原**：读取响应体后原样放回，下游发送不受影响（包括 gzip 响应）
//! - **失败即中止**：无法完整读取响应体时中止调用，而不是发送未审计的响应
//! - **无共享可变状态**：策略加载后只读，可在任意并发请求之间共享
//!
//! # 使用示例
//!
//! ```rust,no_run
//! use hipaa_audit_filter::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AuditError> {
//!     // 1. 加载配置并编译策略
//!     let policy = HipaaAuditOptions::load_from_file("hipaa-audit.yaml")?.compile()?;
//!
//!     // 2. 创建审计处理器
//!     let processor = AuditProcessor::new(Arc::new(TracingSink));
//!
//!     // 3. 创建过滤器
//!     let filter = HipaaAuditFilter::from_policy(policy, Arc::new(processor.sink()));
//!
//!     // 4. 使用中间件
//!     let req = hyper::Request::new(hyper::Body::empty());
//!     let response = with_audit(req, None, my_handler, &filter).await;
//!     Ok(())
//! }
//!
//! async fn my_handler(
//!     req: hyper::Request<hyper::Body>
//! ) -> Result<hyper::Response<hyper::Body>, BoxError> {
//!     Ok(hyper::Response::new(hyper::Body::from("Hello")))
//! }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod matcher;
pub mod middleware;
pub mod policy;
pub mod principal;
pub mod recorder;
pub mod sink;
pub mod types;

// 重新导出主要类型
pub use config::HipaaAuditOptions;
pub use context::{RequestContext, ResponseEncoding};
pub use error::AuditError;
pub use filter::{FilterOutcome, HipaaAuditFilter};
pub use matcher::PatternSet;
pub use middleware::{fault_response, with_audit, BoxError};
pub use policy::{AuditPolicy, PolicyEvaluator};
pub use principal::{AuthenticatedPrincipal, ContextPrincipalResolver, PrincipalResolver};
pub use recorder::{record_request, record_response};
pub use sink::{AuditProcessor, AuditSink, ChannelSink, JsonLinesSink, TracingSink};
pub use types::{AuditEvent, AuditEventKind, AUDIT_EVENT_TYPE};
