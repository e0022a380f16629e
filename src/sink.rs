//! ==============================================================================
//! sink.rs - ThingSpeak telemetry sink
//! ==============================================================================
//!
//! purpose:
//!     pushes single field values to a ThingSpeak channel over http.
//!     mirrors the status codes of the ThingSpeak client library so the logs
//!     read the same as on an esp8266 running the arduino library:
//!
//!         200   entry accepted
//!         -101  value out of range (NaN / infinite)
//!         -201  field number outside 1..=8
//!         -301  failed to connect
//!         -302  unexpected transport failure
//!         -303  response body not understood
//!         -304  timed out waiting for the server
//!         -401  not inserted (bad key or rate limited, server answered "0")
//!
//!     any other http status is returned as is.
//!
//! relationships:
//!     - used by: cycle.rs (one write per field), main.rs (probe-sink)
//!
//! ==============================================================================

use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::ThingSpeakConfig;
use crate::domain::STATUS_OK;

pub const ERR_OUT_OF_RANGE: i32 = -101;
pub const ERR_INVALID_FIELD_NUM: i32 = -201;
pub const ERR_CONNECT_FAILED: i32 = -301;
pub const ERR_UNEXPECTED_FAIL: i32 = -302;
pub const ERR_BAD_RESPONSE: i32 = -303;
pub const ERR_TIMEOUT: i32 = -304;
pub const ERR_NOT_INSERTED: i32 = -401;

/// remote service accepting per-field numeric writes
pub trait TelemetrySink {
    async fn write_field(&self, channel_id: u64, field: u8, value: f32, write_key: &str) -> i32;
}

/// human readable meaning of a sink status code
pub fn describe_status(code: i32) -> &'static str {
    match code {
        STATUS_OK => "ok",
        ERR_OUT_OF_RANGE => "value out of range",
        ERR_INVALID_FIELD_NUM => "invalid field number",
        ERR_CONNECT_FAILED => "failed to connect",
        ERR_UNEXPECTED_FAIL => "unexpected failure",
        ERR_BAD_RESPONSE => "bad response",
        ERR_TIMEOUT => "timeout",
        ERR_NOT_INSERTED => "not inserted (check write key / rate limit)",
        400 => "bad api key",
        404 => "bad url",
        _ => "http error",
    }
}

pub struct ThingSpeakClient {
    client: reqwest::Client,
    update_url: String,
}

impl ThingSpeakClient {
    pub fn new(config: &ThingSpeakConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("failed to build http client")?;
        let update_url = format!("{}/update", config.url.trim_end_matches('/'));
        tracing::info!("[SINK] ThingSpeak initialized ({})", update_url);
        Ok(Self { client, update_url })
    }
}

impl TelemetrySink for ThingSpeakClient {
    async fn write_field(&self, channel_id: u64, field: u8, value: f32, write_key: &str) -> i32 {
        if !(1..=8).contains(&field) {
            return ERR_INVALID_FIELD_NUM;
        }
        if !value.is_finite() {
            return ERR_OUT_OF_RANGE;
        }

        let field_name = format!("field{}", field);
        let value = value.to_string();
        let result = self
            .client
            .post(&self.update_url)
            .form(&[("api_key", write_key), (field_name.as_str(), value.as_str())])
            .send()
            .await;

        let response = match result {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!("[SINK] channel {} field {}: {}", channel_id, field, e);
                return transport_error_code(&e);
            }
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => interpret_response(status, &body),
            Err(e) => {
                tracing::debug!("[SINK] channel {} field {}: reading body: {}", channel_id, field, e);
                transport_error_code(&e)
            }
        }
    }
}

fn transport_error_code(e: &reqwest::Error) -> i32 {
    if e.is_timeout() {
        ERR_TIMEOUT
    } else if e.is_connect() {
        ERR_CONNECT_FAILED
    } else {
        ERR_UNEXPECTED_FAIL
    }
}

/// the update endpoint answers 200 with the new entry id, or "0" when the
/// entry was rejected
pub fn interpret_response(status: u16, body: &str) -> i32 {
    if status != 200 {
        return status as i32;
    }
    match body.trim().parse::<u64>() {
        Ok(0) => ERR_NOT_INSERTED,
        Ok(_) => STATUS_OK,
        Err(_) => ERR_BAD_RESPONSE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// one-shot http stub, returns the raw request body it received
    async fn serve_once(listener: TcpListener, status: &'static str, body: &'static str) -> String {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];

        let header_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed before sending headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
        let content_length = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .map(|v| v.trim().parse::<usize>().unwrap())
            .unwrap_or(0);

        while buf.len() < header_end + content_length {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();

        String::from_utf8_lossy(&buf[header_end..]).to_string()
    }

    fn client_for(port: u16) -> ThingSpeakClient {
        ThingSpeakClient::new(&ThingSpeakConfig {
            url: format!("http://127.0.0.1:{}/", port),
            channel_id: 2384399,
            write_key: "KEY".into(),
            timeout_seconds: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_interpret_response() {
        assert_eq!(interpret_response(200, "1234\n"), STATUS_OK);
        assert_eq!(interpret_response(200, "0"), ERR_NOT_INSERTED);
        assert_eq!(interpret_response(200, "<html>"), ERR_BAD_RESPONSE);
        assert_eq!(interpret_response(400, "0"), 400);
        assert_eq!(describe_status(ERR_NOT_INSERTED), "not inserted (check write key / rate limit)");
    }

    #[tokio::test]
    async fn test_write_field_posts_form() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve_once(listener, "200 OK", "17"));

        let code = client_for(port).write_field(2384399, 3, 512.0, "KEY").await;
        assert_eq!(code, STATUS_OK);

        let body = server.await.unwrap();
        assert_eq!(body, "api_key=KEY&field3=512");
    }

    #[tokio::test]
    async fn test_rejected_entry() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve_once(listener, "200 OK", "0"));

        let code = client_for(port).write_field(2384399, 1, 22.5, "KEY").await;
        assert_eq!(code, ERR_NOT_INSERTED);
        assert_eq!(server.await.unwrap(), "api_key=KEY&field1=22.5");
    }

    #[tokio::test]
    async fn test_local_rejections() {
        let client = client_for(9);
        assert_eq!(client.write_field(1, 0, 1.0, "KEY").await, ERR_INVALID_FIELD_NUM);
        assert_eq!(client.write_field(1, 9, 1.0, "KEY").await, ERR_INVALID_FIELD_NUM);
        assert_eq!(client.write_field(1, 1, f32::NAN, "KEY").await, ERR_OUT_OF_RANGE);
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let code = client_for(port).write_field(1, 1, 1.0, "KEY").await;
        assert_eq!(code, ERR_CONNECT_FAILED);
    }
}
