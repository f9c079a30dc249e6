//! 请求/响应审计记录
//!
//! 调用方负责先做资格判断，这里的函数不会再检查策略。
//! 事件只在全部字段提取完成后发布一次，失败时不会发布任何事件。

use crate::context::{RequestContext, ResponseEncoding};
use crate::error::AuditError;
use crate::principal::PrincipalResolver;
use crate::sink::AuditSink;
use crate::types::{keys, AuditEvent, AuditEventKind};
use encoding_rs::{Encoding, UTF_8};
use flate2::read::GzDecoder;
use hyper::{Body, Response};
use std::collections::BTreeMap;
use std::io::Read;

/// 不写入审计记录的参数名
pub const CACHE_BUSTER_PARAM: &str = "cacheBuster";

/// 渲染请求参数：`name:[v1, v2], other:[v]`
pub fn render_request_params(params: &[(String, Vec<String>)]) -> String {
    params
        .iter()
        .filter(|(name, _)| name != CACHE_BUSTER_PARAM)
        .map(|(name, values)| format!("{}:[{}]", name, values.join(", ")))
        .collect::<Vec<_>>()
        .join(", ")
}

/// 构造请求审计事件
pub fn build_request_event(ctx: &RequestContext, principal: String) -> AuditEvent {
    let mut data = BTreeMap::new();
    data.insert(keys::REMOTE_ADDRESS.to_string(), ctx.remote_address().to_string());
    data.insert(keys::HTTP_METHOD.to_string(), ctx.method().to_string());
    data.insert(keys::REQUEST_URI.to_string(), ctx.path().to_string());
    data.insert(keys::REQUEST_PARAM.to_string(), render_request_params(ctx.params()));
    data.insert(
        keys::MESSAGE.to_string(),
        format!("Attempt to access API {}", ctx.path()),
    );
    AuditEvent::new(principal, AuditEventKind::Request, data)
}

/// 构造响应审计事件
pub fn build_response_event(ctx: &RequestContext, principal: String, body: String) -> AuditEvent {
    let mut data = BTreeMap::new();
    data.insert(keys::RESPONSE_BODY.to_string(), body);
    data.insert(keys::REMOTE_ADDRESS.to_string(), ctx.remote_address().to_string());
    data.insert(keys::MESSAGE.to_string(), format!("API {} accessed", ctx.path()));
    AuditEvent::new(principal, AuditEventKind::Response, data)
}

/// 记录请求审计事件
///
/// 只读取上下文，请求本身（包括请求体）不受影响。
pub fn record_request(
    ctx: &RequestContext,
    principals: &dyn PrincipalResolver,
    sink: &dyn AuditSink,
) -> Result<(), AuditError> {
    let principal = principals.current_principal(ctx)?;
    let event = build_request_event(ctx, principal);
    tracing::debug!(event_id = %event.event_id, uri = ctx.path(), "recording request audit event");
    sink.publish(event)
}

/// 记录响应审计事件
///
/// 完整读取响应体一次，按需解压和解码后发布事件，
/// 并把原始字节（仍是压缩形式）放回响应，下游发送不受影响。
///
/// 读取、解压或解码失败时返回错误且不发布事件；
/// 此时响应体已被消费，调用方必须以错误响应替代原始响应。
pub async fn record_response(
    ctx: &RequestContext,
    response: &mut Response<Body>,
    principals: &dyn PrincipalResolver,
    sink: &dyn AuditSink,
) -> Result<(), AuditError> {
    let principal = principals.current_principal(ctx)?;
    let encoding = ResponseEncoding::from_headers(response.headers());

    let body = std::mem::take(response.body_mut());
    let raw = hyper::body::to_bytes(body).await.map_err(|source| {
        tracing::error!(uri = ctx.path(), "Error receiving response body: {}", source);
        AuditError::ResponseStream {
            uri: ctx.path().to_string(),
            source,
        }
    })?;

    let text = decode_response_body(&raw, &encoding, ctx.path()).map_err(|e| {
        tracing::error!(uri = ctx.path(), "Error reading response body: {}", e);
        e
    })?;

    *response.body_mut() = Body::from(raw);

    let event = build_response_event(ctx, principal, text);
    tracing::debug!(event_id = %event.event_id, uri = ctx.path(), "recording response audit event");
    sink.publish(event)
}

/// 解压并解码响应体
pub fn decode_response_body(
    raw: &[u8],
    encoding: &ResponseEncoding,
    uri: &str,
) -> Result<String, AuditError> {
    if !encoding.gzipped {
        return decode_text(raw, encoding.charset.as_deref());
    }

    let mut decoded = Vec::new();
    GzDecoder::new(raw)
        .read_to_end(&mut decoded)
        .map_err(|source| AuditError::ResponseBody {
            uri: uri.to_string(),
            source,
        })?;
    decode_text(&decoded, encoding.charset.as_deref())
}

/// 按声明的字符集解码，未声明时按 UTF-8
///
/// 字符集名称按 WHATWG 标签解析，非法字节序列替换为 U+FFFD；
/// 无法识别的字符集名称返回错误。
fn decode_text(bytes: &[u8], charset: Option<&str>) -> Result<String, AuditError> {
    let encoding = match charset {
        None => UTF_8,
        Some(label) => Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
            AuditError::UnsupportedCharset {
                charset: label.to_string(),
            }
        })?,
    };
    // 按声明的字符集解码，不做 BOM 嗅探
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        tracing::debug!(charset = encoding.name(), "malformed bytes replaced in response body");
    }
    Ok(text.into_owned())
}
