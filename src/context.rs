//! 审计上下文
//!
//! 每次调用显式构造一个 [`RequestContext`]，审计逻辑只读取它，
//! 不依赖任何线程局部或全局的"当前请求"。
//!
//! # 示例
//!
//! ```rust
//! use hipaa_audit_filter::RequestContext;
//! use hyper::{Body, Request};
//!
//! let req = Request::builder()
//!     .method("GET")
//!     .uri("http://localhost/api/patient?id=1&id=2")
//!     .body(Body::empty())
//!     .unwrap();
//!
//! let ctx = RequestContext::from_request(&req, Some(([10, 0, 0, 1], 4000).into()));
//! assert_eq!(ctx.path(), "/api/patient");
//! assert_eq!(ctx.query(), Some("id=1&id=2"));
//! assert_eq!(ctx.remote_address(), "10.0.0.1");
//! ```

use crate::principal::AuthenticatedPrincipal;
use hyper::header::{CONTENT_ENCODING, CONTENT_TYPE};
use hyper::{HeaderMap, Method, Request};
use std::net::SocketAddr;

/// 远端地址未知时的占位值
pub const UNKNOWN_REMOTE_ADDRESS: &str = "<unknown>";

/// 单次调用的只读请求视图
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// 请求方法
    method: Method,
    /// 请求路径（不含查询串）
    path: String,
    /// 原始查询串
    query: Option<String>,
    /// 远端 IP
    remote_address: String,
    /// 请求参数，按首次出现的顺序
    params: Vec<(String, Vec<String>)>,
    /// 认证层附加的调用者身份
    principal: Option<String>,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            remote_address: UNKNOWN_REMOTE_ADDRESS.to_string(),
            params: Vec::new(),
            principal: None,
        }
    }

    /// 从 hyper 请求构造上下文
    ///
    /// 参数取自查询串；请求体不会被读取。
    /// 调用者身份取自请求扩展中的 [`AuthenticatedPrincipal`]。
    pub fn from_request<B>(req: &Request<B>, remote_addr: Option<SocketAddr>) -> Self {
        let mut ctx = Self::new(req.method().clone(), req.uri().path())
            .with_query(req.uri().query().map(str::to_string));

        if let Some(addr) = remote_addr {
            ctx.remote_address = addr.ip().to_string();
        }
        if let Some(AuthenticatedPrincipal(name)) = req.extensions().get::<AuthenticatedPrincipal>() {
            ctx.principal = Some(name.clone());
        }
        ctx
    }

    /// 设置查询串，同时重新解析参数
    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.params = query.as_deref().map(parse_params).unwrap_or_default();
        self.query = query;
        self
    }

    pub fn with_remote_address(mut self, remote_address: impl Into<String>) -> Self {
        self.remote_address = remote_address.into();
        self
    }

    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    /// 追加一个参数值
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        push_param(&mut self.params, name.into(), value.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// 查询串，空串视为没有
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref().filter(|q| !q.is_empty())
    }

    pub fn remote_address(&self) -> &str {
        &self.remote_address
    }

    pub fn params(&self) -> &[(String, Vec<String>)] {
        &self.params
    }

    pub fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }
}

fn parse_params(query: &str) -> Vec<(String, Vec<String>)> {
    let mut params = Vec::new();
    for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
        push_param(&mut params, name.into_owned(), value.into_owned());
    }
    params
}

fn push_param(params: &mut Vec<(String, Vec<String>)>, name: String, value: String) {
    match params.iter_mut().find(|(n, _)| *n == name) {
        Some((_, values)) => values.push(value),
        None => params.push((name, vec![value])),
    }
}

/// 响应体的编码信息，取自响应头
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseEncoding {
    /// `Content-Encoding: gzip`
    pub gzipped: bool,
    /// `Content-Type` 中声明的字符集
    pub charset: Option<String>,
}

impl ResponseEncoding {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let gzipped = headers
            .get_all(CONTENT_ENCODING)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .any(|coding| {
                let coding = coding.trim();
                coding.eq_ignore_ascii_case("gzip") || coding.eq_ignore_ascii_case("x-gzip")
            });

        let charset = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_param);

        Self { gzipped, charset }
    }
}

fn charset_param(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"').to_string())
        } else {
            None
        }
    })
}
