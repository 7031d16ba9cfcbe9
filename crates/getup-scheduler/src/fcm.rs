//! Push transports: FCM HTTP v1, and a logging dry-run transport.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use getup_core::config::PushConfig;
use getup_core::error::{GetUpError, Result};
use getup_core::traits::{MulticastMessage, PushTransport, TokenOutcome};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::dispatch::mask_token;

/// FCM HTTP v1 client. The v1 API addresses one token per request, so a
/// multicast fans out into concurrent `messages:send` calls that are all
/// joined before returning. Outcomes stay in token order.
pub struct FcmTransport {
    client: reqwest::Client,
    url: String,
    access_token: String,
    timeout: Duration,
}

#[derive(Debug, Default, Deserialize)]
struct FcmErrorResponse {
    #[serde(default)]
    error: FcmError,
}

#[derive(Debug, Default, Deserialize)]
struct FcmError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<FcmErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct FcmErrorDetail {
    #[serde(rename = "errorCode", default)]
    error_code: Option<String>,
}

impl FcmTransport {
    pub fn new(config: &PushConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.send_url(),
            access_token: config.access_token.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// `messages:send` body for one token.
    fn message_body(token: &str, message: &MulticastMessage) -> Value {
        let apns = &message.apns;
        let android_priority = if apns.priority == "10" { "high" } else { "normal" };
        json!({
            "message": {
                "token": token,
                "notification": {
                    "title": message.title,
                    "body": message.body,
                },
                "android": {
                    "priority": android_priority,
                    "notification": { "sound": apns.sound },
                },
                "apns": {
                    "headers": { "apns-priority": apns.priority },
                    "payload": {
                        "aps": {
                            "alert": {
                                "title": apns.alert_title,
                                "body": apns.alert_body,
                            },
                            "sound": apns.sound,
                            "badge": apns.badge,
                        },
                    },
                },
            },
        })
    }

    async fn send_one(&self, token: &str, message: &MulticastMessage) -> TokenOutcome {
        let resp = match self
            .client
            .post(&self.url)
            .bearer_auth(&self.access_token)
            .json(&Self::message_body(token, message))
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return TokenOutcome::failed(token, format!("FCM send failed: {e}")),
        };

        let status = resp.status();
        if status.is_success() {
            return TokenOutcome::delivered(token);
        }
        let body = resp.text().await.unwrap_or_default();
        TokenOutcome::failed(token, error_reason(status.as_u16(), &body))
    }
}

/// Short reason for a rejected send: the FCM error code when present, then
/// the RPC status, then the bare HTTP status.
fn error_reason(status: u16, body: &str) -> String {
    let error = serde_json::from_str::<FcmErrorResponse>(body)
        .unwrap_or_default()
        .error;
    let code = error
        .details
        .iter()
        .find_map(|d| d.error_code.clone())
        .or_else(|| (!error.status.is_empty()).then(|| error.status.clone()))
        .unwrap_or_else(|| format!("HTTP {status}"));
    if error.message.is_empty() {
        code
    } else {
        format!("{code}: {}", error.message)
    }
}

#[async_trait]
impl PushTransport for FcmTransport {
    fn name(&self) -> &str {
        "fcm"
    }

    async fn send_multicast(&self, message: &MulticastMessage) -> Result<Vec<TokenOutcome>> {
        if self.access_token.is_empty() {
            return Err(GetUpError::Config("FCM access token not configured".into()));
        }
        let sends = message.tokens.iter().map(|t| self.send_one(t, message));
        Ok(join_all(sends).await)
    }
}

/// Logs each push instead of sending it; every token counts as delivered.
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl PushTransport for LogTransport {
    fn name(&self) -> &str {
        "log"
    }

    async fn send_multicast(&self, message: &MulticastMessage) -> Result<Vec<TokenOutcome>> {
        let masked: Vec<String> = message.tokens.iter().map(|t| mask_token(t)).collect();
        tracing::info!(
            "📢 [dry-run] '{}' / '{}' → {}",
            message.title,
            message.body,
            masked.join(", ")
        );
        Ok(message.tokens.iter().map(|t| TokenOutcome::delivered(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use getup_core::traits::ApnsPayload;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::Mutex;

    type Seen = Arc<Mutex<Vec<(String, Value)>>>;

    fn message() -> MulticastMessage {
        MulticastMessage {
            tokens: vec!["A".into(), "B".into(), "C".into()],
            title: "Task due: Go to gym".into(),
            body: "Leg day".into(),
            apns: ApnsPayload {
                alert_title: "Reminder: Go to gym".into(),
                alert_body: "Leg day".into(),
                sound: "default".into(),
                badge: 1,
                priority: "10".into(),
            },
        }
    }

    fn config(endpoint: &str) -> PushConfig {
        PushConfig {
            endpoint: endpoint.into(),
            project_id: "getup-app".into(),
            access_token: "ya29.token".into(),
            timeout_secs: 2,
            dry_run: false,
        }
    }

    fn header(head: &str, name: &str) -> Option<String> {
        head.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.eq_ignore_ascii_case(name).then(|| value.trim().to_string())
        })
    }

    async fn read_request(socket: &mut TcpStream) -> (String, Value) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return (String::new(), Value::Null);
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            let len: usize = header(&head, "content-length")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + len {
                let body = serde_json::from_slice(&buf[end + 4..end + 4 + len]).unwrap_or(Value::Null);
                return (header(&head, "authorization").unwrap_or_default(), body);
            }
        }
    }

    /// Local stand-in for `messages:send`. Tokens starting with "BAD" get a
    /// 404 UNREGISTERED answer, all others a 200. Records the authorization
    /// header and body of every request.
    async fn fake_fcm() -> (String, Seen) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let (auth, body) = read_request(&mut socket).await;
                    let bad = body["message"]["token"]
                        .as_str()
                        .is_some_and(|t| t.starts_with("BAD"));
                    log.lock().await.push((auth, body));
                    let (status, payload) = if bad {
                        (
                            "404 Not Found",
                            r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND","details":[{"@type":"type.googleapis.com/google.firebase.fcm.v1.FcmError","errorCode":"UNREGISTERED"}]}}"#,
                        )
                    } else {
                        ("200 OK", r#"{"name":"projects/getup-app/messages/1"}"#)
                    };
                    let response = format!(
                        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{payload}",
                        payload.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        (format!("http://{addr}"), seen)
    }

    #[test]
    fn test_message_body_carries_apns_block() {
        let body = FcmTransport::message_body("A", &message());
        let msg = &body["message"];
        assert_eq!(msg["token"], "A");
        assert_eq!(msg["notification"]["title"], "Task due: Go to gym");
        assert_eq!(msg["notification"]["body"], "Leg day");
        assert_eq!(msg["android"]["priority"], "high");
        assert_eq!(msg["apns"]["headers"]["apns-priority"], "10");
        let aps = &msg["apns"]["payload"]["aps"];
        assert_eq!(aps["alert"]["title"], "Reminder: Go to gym");
        assert_eq!(aps["alert"]["body"], "Leg day");
        assert_eq!(aps["sound"], "default");
        assert_eq!(aps["badge"], 1);
        assert!(msg.get("data").is_none());
    }

    #[test]
    fn test_message_body_normal_priority() {
        let mut msg = message();
        msg.apns.priority = "5".into();
        let body = FcmTransport::message_body("A", &msg);
        assert_eq!(body["message"]["android"]["priority"], "normal");
        assert_eq!(body["message"]["apns"]["headers"]["apns-priority"], "5");
    }

    #[test]
    fn test_error_reason() {
        let body = r#"{"error":{"code":404,"message":"gone","status":"NOT_FOUND","details":[{"errorCode":"UNREGISTERED"}]}}"#;
        assert_eq!(error_reason(404, body), "UNREGISTERED: gone");
        let body = r#"{"error":{"code":401,"message":"bad credentials","status":"UNAUTHENTICATED"}}"#;
        assert_eq!(error_reason(401, body), "UNAUTHENTICATED: bad credentials");
        assert_eq!(error_reason(502, "<html>bad gateway</html>"), "HTTP 502");
    }

    #[tokio::test]
    async fn test_multicast_fans_out_one_request_per_token() {
        let (endpoint, seen) = fake_fcm().await;
        let transport = FcmTransport::new(&config(&endpoint));
        let mut msg = message();
        msg.tokens = vec!["A".into(), "BAD1".into(), "C".into()];

        let outcomes = transport.send_multicast(&msg).await.unwrap();
        let tokens: Vec<&str> = outcomes.iter().map(|o| o.token.as_str()).collect();
        assert_eq!(tokens, vec!["A", "BAD1", "C"]);
        assert!(outcomes[0].success);
        assert!(!outcomes[1].success);
        assert!(outcomes[2].success);
        assert_eq!(
            outcomes[1].error.as_deref(),
            Some("UNREGISTERED: Requested entity was not found.")
        );

        let seen = seen.lock().await;
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|(auth, _)| auth == "Bearer ya29.token"));
        assert!(seen.iter().all(|(_, body)| body["message"]["apns"]["payload"]["aps"]["badge"] == 1));
        let mut sent: Vec<&str> = seen
            .iter()
            .filter_map(|(_, body)| body["message"]["token"].as_str())
            .collect();
        sent.sort();
        assert_eq!(sent, vec!["A", "BAD1", "C"]);
    }

    #[tokio::test]
    async fn test_log_transport_delivers_all() {
        let outcomes = LogTransport.send_multicast(&message()).await.unwrap();
        assert!(outcomes.iter().all(|o| o.success));
        assert_eq!(LogTransport.name(), "log");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_each_token() {
        let transport = FcmTransport::new(&config("http://127.0.0.1:9"));
        let outcomes = transport.send_multicast(&message()).await.unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| !o.success));
        assert!(
            outcomes
                .iter()
                .all(|o| o.error.as_deref().is_some_and(|e| e.starts_with("FCM send failed")))
        );
    }

    #[tokio::test]
    async fn test_missing_access_token_is_config_error() {
        let config = PushConfig {
            access_token: String::new(),
            ..config("http://127.0.0.1:9")
        };
        let err = FcmTransport::new(&config)
            .send_multicast(&message())
            .await
            .unwrap_err();
        assert!(matches!(err, GetUpError::Config(_)));
    }
}
