//! 错误类型
//!
//! 审计过滤器的错误分为两类：
//!
//! - **启动期错误**：配置文件无法读取、无法解析，或者包含非法的正则表达式。
//!   这些错误在加载配置时就会暴露给运维人员，不会出现在请求路径上。
//! - **运行期错误**：调用已经被判定为需要审计，但审计无法完成（没有主体、
//!   响应体读取/解压/解码失败、Sink 发送失败）。这些错误会中止当前调用，
//!   宿主应返回 500 而不是原始响应。

use hyper::{Body, Response, StatusCode};
use thiserror::Error;

/// 审计过滤器错误
#[derive(Debug, Error)]
pub enum AuditError {
    /// 配置中的正则表达式非法
    #[error("invalid audit uri pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// 配置文件读取或解析失败
    #[error("audit configuration error: {0}")]
    Config(String),

    /// 无法确定调用者身份
    #[error("no authenticated principal for audited call to {uri}")]
    Unauthenticated { uri: String },

    /// 读取或解压响应体失败
    #[error("failed to read response body of {uri}: {source}")]
    ResponseBody {
        uri: String,
        #[source]
        source: std::io::Error,
    },

    /// 读取响应流本身失败
    #[error("failed to receive response body of {uri}: {source}")]
    ResponseStream {
        uri: String,
        #[source]
        source: hyper::Error,
    },

    /// 响应声明的字符集不受支持
    #[error("unsupported response charset `{charset}`")]
    UnsupportedCharset { charset: String },

    /// 审计事件发送失败
    #[error("failed to publish audit event: {0}")]
    Sink(String),
}

impl AuditError {
    /// 中止调用时返回给调用方的状态码
    pub fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    /// 构造替代原始响应的错误响应
    ///
    /// 响应体只包含通用描述，不携带任何可能含有受保护数据的细节。
    pub fn fault_response(&self) -> Response<Body> {
        let mut response = Response::new(Body::from("audit failure"));
        *response.status_mut() = self.status_code();
        response
    }
}
