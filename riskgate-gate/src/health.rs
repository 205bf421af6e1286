//! Bounded-retry reachability check.
//!
//! Attempts run strictly one after another with a fixed backoff between
//! them. There is no exponential growth and no jitter.

use std::time::Duration;

use riskgate_core::types::{body_preview, HealthCheckResult};

/// Fixed pause between two failed attempts.
pub const RETRY_BACKOFF: Duration = Duration::from_millis(300);

/// A response received from the health endpoint, of any status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl ProbeResponse {
    pub fn is_healthy(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport used to reach the health endpoint.
///
/// `Err` means no response was received at all (refused, DNS, timeout,
/// malformed reply). Non-2xx responses are `Ok`.
pub trait HealthProbe {
    fn probe(&self, url: &str, timeout: Duration) -> Result<ProbeResponse, String>;
}

/// HTTP(S) probe issuing a plain GET.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpProbe;

impl HealthProbe for HttpProbe {
    fn probe(&self, url: &str, timeout: Duration) -> Result<ProbeResponse, String> {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .redirects(0)
            .user_agent(concat!("riskgate/", env!("CARGO_PKG_VERSION")))
            .build();

        let response = match agent.get(url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => return Err(transport.to_string()),
        };

        let status = response.status();
        let content_type = response.header("content-type").unwrap_or("").to_string();
        let body = response
            .into_string()
            .map_err(|e| format!("malformed response body: {e}"))?;
        Ok(ProbeResponse {
            status,
            content_type,
            body,
        })
    }
}

/// GET `url` up to `max_attempts` times and classify the remote.
///
/// Never fails: an unreachable remote is `ok=false` with `status_code=0` and
/// the last transport error as preview. A blank URL fails without probing.
pub fn check_remote_health(
    probe: &dyn HealthProbe,
    url: &str,
    timeout: Duration,
    max_attempts: u32,
) -> HealthCheckResult {
    check_with_backoff(probe, url, timeout, max_attempts, RETRY_BACKOFF)
}

pub(crate) fn check_with_backoff(
    probe: &dyn HealthProbe,
    url: &str,
    timeout: Duration,
    max_attempts: u32,
    backoff: Duration,
) -> HealthCheckResult {
    let url = url.trim();
    if url.is_empty() {
        tracing::warn!("health check requested without a URL");
        return HealthCheckResult::unreachable("missing health url");
    }

    let attempts = max_attempts.max(1);
    let mut last = HealthCheckResult::unreachable("no attempt made");

    for attempt in 1..=attempts {
        match probe.probe(url, timeout) {
            Ok(response) => {
                let healthy = response.is_healthy();
                tracing::debug!(
                    url,
                    attempt,
                    status = response.status,
                    healthy,
                    "health probe answered"
                );
                last = HealthCheckResult {
                    ok: healthy,
                    status_code: response.status,
                    content_type: response.content_type,
                    body_preview: body_preview(&response.body),
                };
                if healthy {
                    return last;
                }
            }
            Err(err) => {
                tracing::debug!(url, attempt, error = %err, "health probe failed");
                last = HealthCheckResult::unreachable(err);
            }
        }

        if attempt < attempts {
            std::thread::sleep(backoff);
        }
    }

    tracing::warn!(url, attempts, status = last.status_code, "remote not responsive");
    last
}
