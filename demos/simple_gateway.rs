//! 简单的 HTTP 网关示例，演示如何挂载 HIPAA 审计中间件
//!
//! ```text
//! cargo run --example simple_gateway -- --config hipaa-audit.yaml
//! curl -H 'x-demo-user: admin' http://localhost:3000/ehr/api/patient?id=1
//! curl http://localhost:3000/ehr/api/healthcheck/alive.json
//! ```

use anyhow::Context;
use clap::Parser;
use hipaa_audit_filter::*;
use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// 示例中代替真实认证层的请求头
const DEMO_USER_HEADER: &str = "x-demo-user";

#[derive(Debug, Parser)]
#[command(name = "simple_gateway", about = "HIPAA audit filter demo gateway")]
struct Args {
    /// 审计配置文件（YAML 或 JSON），缺省时使用默认策略
    #[arg(long)]
    config: Option<PathBuf>,

    /// 监听地址
    #[arg(long, default_value = "127.0.0.1:3000")]
    listen: SocketAddr,

    /// 将审计事件写为 JSON 行输出到 stdout，而不是 tracing 日志
    #[arg(long)]
    json: bool,
}

/// 业务 Handler
async fn handle_request(req: Request<Body>) -> Result<Response<Body>, BoxError> {
    let path = req.uri().path();

    if path.ends_with("/healthcheck/alive.json") {
        return Ok(Response::new(Body::from(r#"{"status":"UP"}"#)));
    }
    if path.contains("/api/patient") {
        return Ok(Response::new(Body::from(
            r#"[{"resourceType":"Patient","id":"1","name":"Jane Doe"}]"#,
        )));
    }
    if path.ends_with("/error") {
        return Err("Intentional backend error".into());
    }

    let mut response = Response::new(Body::from("Not Found"));
    *response.status_mut() = StatusCode::NOT_FOUND;
    Ok(response)
}

/// 示例认证：把请求头中的用户名作为已认证身份
fn authenticate(mut req: Request<Body>) -> Request<Body> {
    let user = req
        .headers()
        .get(DEMO_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if let Some(user) = user {
        req.extensions_mut().insert(AuthenticatedPrincipal(user));
    }
    req
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // 1. 加载配置
    let options = match &args.config {
        Some(path) => HipaaAuditOptions::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => HipaaAuditOptions::default(),
    };
    if let Err(errors) = options.validate() {
        for e in &errors {
            tracing::error!("{}", e);
        }
        anyhow::bail!("{} invalid audit pattern(s)", errors.len());
    }
    let policy = options.compile()?;

    // 2. 创建审计处理器（启动后台任务）
    let sink: Arc<dyn AuditSink> = if args.json {
        Arc::new(JsonLinesSink::new(std::io::stdout()))
    } else {
        Arc::new(TracingSink)
    };
    let processor = AuditProcessor::new(sink);

    // 3. 创建过滤器
    let filter = HipaaAuditFilter::from_policy(policy, Arc::new(processor.sink()));

    // 4. 创建服务
    let make_svc = make_service_fn(move |conn: &AddrStream| {
        let filter = filter.clone();
        let remote_addr = conn.remote_addr();

        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let filter = filter.clone();

                async move {
                    let req = authenticate(req);
                    // 使用审计中间件包装请求
                    let result = with_audit(req, Some(remote_addr), handle_request, &filter).await;

                    // 将错误转换为 HTTP 响应
                    match result {
                        Ok(response) => Ok::<_, Infallible>(response),
                        Err(e) => {
                            tracing::error!("Request failed: {}", e);
                            Ok(fault_response(&e))
                        }
                    }
                }
            }))
        }
    });

    // 5. 启动服务器
    let server = Server::bind(&args.listen).serve(make_svc);
    tracing::info!("Listening on http://{}", args.listen);

    server.await.context("server error")?;
    Ok(())
}
