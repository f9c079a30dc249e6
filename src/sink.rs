//! 审计事件接收器

use crate::error::AuditError;
use crate::types::AuditEvent;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// 审计事件接收器 trait
pub trait AuditSink: Send + Sync {
    /// 发布审计事件
    ///
    /// 返回错误时当前调用会被中止。
    fn publish(&self, event: AuditEvent) -> Result<(), AuditError>;
}

impl<S: AuditSink + ?Sized> AuditSink for Arc<S> {
    fn publish(&self, event: AuditEvent) -> Result<(), AuditError> {
        (**self).publish(event)
    }
}

/// 以 `tracing` 记录输出审计事件，target 为 `hipaa_audit`
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn publish(&self, event: AuditEvent) -> Result<(), AuditError> {
        let data = serde_json::to_string(&event.data).map_err(|e| AuditError::Sink(e.to_string()))?;
        tracing::info!(
            target: "hipaa_audit",
            event_id = %event.event_id,
            principal = %event.principal,
            event_type = %event.event_type,
            kind = ?event.kind,
            timestamp = %event.timestamp.to_rfc3339(),
            data = %data,
            "audit event"
        );
        Ok(())
    }
}

/// 每个事件一行 JSON
pub struct JsonLinesSink<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> AuditSink for JsonLinesSink<W> {
    fn publish(&self, event: AuditEvent) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(&event).map_err(|e| AuditError::Sink(e.to_string()))?;
        line.push(b'\n');

        let mut out = match self.out.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!(
                    "JSON audit sink mutex poisoned while publishing {}, recovering writer",
                    event.event_id
                );
                poisoned.into_inner()
            }
        };

        out.write_all(&line)
            .and_then(|_| out.flush())
            .map_err(|e| AuditError::Sink(e.to_string()))
    }
}

/// 指向 [`AuditProcessor`] 后台任务的发送端
#[derive(Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<AuditEvent>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::UnboundedSender<AuditEvent>) -> Self {
        Self { sender }
    }
}

impl AuditSink for ChannelSink {
    fn publish(&self, event: AuditEvent) -> Result<(), AuditError> {
        // 非阻塞发送到后台任务
        self.sender
            .send(event)
            .map_err(|e| AuditError::Sink(format!("audit processor closed, dropped event {}", e.0.event_id)))
    }
}

/// 审计事件处理器（后台任务）
///
/// 请求路径只做一次 channel 发送，真正的 Sink 在后台任务中执行。
pub struct AuditProcessor {
    sender: mpsc::UnboundedSender<AuditEvent>,
}

impl AuditProcessor {
    /// 创建新的审计处理器，启动后台任务
    ///
    /// 必须在 tokio 运行时中调用。
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<AuditEvent>();

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let event_id = event.event_id.clone();
                if let Err(e) = sink.publish(event) {
                    tracing::error!("Failed to deliver audit event {}: {}", event_id, e);
                }
            }
            tracing::debug!("Audit processor task terminated");
        });

        Self { sender: tx }
    }

    /// 获取可共享的 Sink 句柄
    pub fn sink(&self) -> ChannelSink {
        ChannelSink::new(self.sender.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{keys, AuditEventKind};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn event(message: &str) -> AuditEvent {
        let mut data = BTreeMap::new();
        data.insert(keys::MESSAGE.to_string(), message.to_string());
        AuditEvent::new("admin", AuditEventKind::Request, data)
    }

    struct CollectSink(Mutex<Vec<AuditEvent>>);

    impl AuditSink for CollectSink {
        fn publish(&self, event: AuditEvent) -> Result<(), AuditError> {
            self.0.lock().unwrap().push(event);
            Ok(())
        }
    }

    #[test]
    fn test_json_lines_sink() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.publish(event("first")).unwrap();
        sink.publish(event("second")).unwrap();

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: AuditEvent = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed.get(keys::MESSAGE), Some("second"));
        assert_eq!(parsed.event_type, "HIPAA_AUDIT");
    }

    #[test]
    fn test_tracing_sink_accepts_events() {
        assert!(TracingSink.publish(event("traced")).is_ok());
    }

    #[tokio::test]
    async fn test_channel_sink_closed() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let sink = ChannelSink::new(tx);
        assert!(matches!(sink.publish(event("lost")), Err(AuditError::Sink(_))));
    }

    #[tokio::test]
    async fn test_processor_delivers_in_background() {
        let collected = Arc::new(CollectSink(Mutex::new(Vec::new())));
        let processor = AuditProcessor::new(collected.clone());

        let sink = processor.sink();
        sink.publish(event("one")).unwrap();
        sink.publish(event("two")).unwrap();

        for _ in 0..50 {
            if collected.0.lock().unwrap().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let events = collected.0.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].get(keys::MESSAGE), Some("one"));
    }
}
