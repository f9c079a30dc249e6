//! 公共类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 审计事件类型标识
pub const AUDIT_EVENT_TYPE: &str = "HIPAA_AUDIT";

/// 审计属性名
pub mod keys {
    pub const REMOTE_ADDRESS: &str = "remoteAddress";
    pub const HTTP_METHOD: &str = "httpMethod";
    pub const REQUEST_URI: &str = "requestUri";
    pub const REQUEST_PARAM: &str = "requestParam";
    pub const RESPONSE_BODY: &str = "responseBody";
    pub const MESSAGE: &str = "message";
}

/// 审计事件种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuditEventKind {
    /// 转发前的请求审计
    Request,
    /// 返回前的响应审计
    Response,
}

impl AuditEventKind {
    /// 该种类事件必须携带的属性
    pub fn required_keys(&self) -> &'static [&'static str] {
        match self {
            AuditEventKind::Request => &[
                keys::REMOTE_ADDRESS,
                keys::HTTP_METHOD,
                keys::REQUEST_URI,
                keys::REQUEST_PARAM,
                keys::MESSAGE,
            ],
            AuditEventKind::Response => {
                &[keys::RESPONSE_BODY, keys::REMOTE_ADDRESS, keys::MESSAGE]
            }
        }
    }
}

/// 审计事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// 事件唯一 ID
    pub event_id: String,
    /// 调用者身份
    pub principal: String,
    /// 固定为 [`AUDIT_EVENT_TYPE`]
    #[serde(rename = "type")]
    pub event_type: String,
    pub kind: AuditEventKind,
    /// 时间戳
    pub timestamp: DateTime<Utc>,
    /// 审计属性
    pub data: BTreeMap<String, String>,
}

impl AuditEvent {
    pub fn new(
        principal: impl Into<String>,
        kind: AuditEventKind,
        data: BTreeMap<String, String>,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            principal: principal.into(),
            event_type: AUDIT_EVENT_TYPE.to_string(),
            kind,
            timestamp: Utc::now(),
            data,
        }
    }

    /// 获取属性值
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    /// 缺失的必需属性
    pub fn missing_keys(&self) -> Vec<&'static str> {
        self.kind
            .required_keys()
            .iter()
            .copied()
            .filter(|k| !self.data.contains_key(*k))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_keys().is_empty()
    }
}
