//! Pre-flight controller configuration.
//!
//! Everything else the controller is asked to do is fire-and-forget; this
//! flow is the single place where a failure blocks a user action, so a round
//! is never started against an unreachable or unconfigured controller.

use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::config::QuizConfig;
use crate::controller::{ControllerClient, ControllerError, HealthReport};

/// Errors surfaced to the user when applying configuration to the controller.
#[derive(Debug, Error)]
pub enum FlowError {
    /// The controller did not answer the liveness probe.
    #[error("controller is unreachable")]
    Unreachable(#[source] ControllerError),
    /// The controller answered but reported itself not operational.
    #[error("controller reported itself unhealthy")]
    Unhealthy,
    /// The controller refused or failed the configuration command.
    #[error("controller rejected the configuration")]
    Rejected(#[source] ControllerError),
}

/// Round duration sent to the controller: the configured timeout rounded to
/// whole minutes of milliseconds, floored at zero.
pub fn round_duration(config: &QuizConfig) -> Duration {
    let minutes = (u64::from(config.question_timeout_seconds) + 30) / 60;
    Duration::from_millis(minutes * 60_000)
}

/// Probe the controller and apply the configured round duration.
///
/// Returns the health report on success so the caller can show the
/// controller's identity.
pub async fn apply_controller_config(
    client: &ControllerClient,
    config: &QuizConfig,
) -> Result<HealthReport, FlowError> {
    let health = client.health().await.map_err(FlowError::Unreachable)?;
    if !health.ok {
        return Err(FlowError::Unhealthy);
    }

    let duration = round_duration(config);
    client
        .configure(duration)
        .await
        .map_err(FlowError::Rejected)?;

    info!(
        ip = %health.ip,
        duration_ms = duration.as_millis() as u64,
        "controller configured"
    );
    Ok(health)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config_with_timeout(seconds: u32) -> QuizConfig {
        QuizConfig {
            question_timeout_seconds: seconds,
            ..QuizConfig::default()
        }
    }

    fn healthy_body() -> serde_json::Value {
        json!({ "ok": true, "ip": "192.168.4.17" })
    }

    #[test]
    fn duration_rounds_to_whole_minutes() {
        assert_eq!(round_duration(&config_with_timeout(120)).as_millis(), 120_000);
        // 90 seconds rounds up to two minutes, 20 seconds down to zero.
        assert_eq!(round_duration(&config_with_timeout(90)).as_millis(), 120_000);
        assert_eq!(round_duration(&config_with_timeout(20)).as_millis(), 0);
    }

    #[tokio::test]
    async fn healthy_controller_receives_the_duration() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(healthy_body()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/game/config"))
            .and(body_json(json!({ "durationMs": 120_000u64 })))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let client = ControllerClient::new(&server.uri()).unwrap();
        let health = apply_controller_config(&client, &config_with_timeout(120))
            .await
            .unwrap();
        assert_eq!(health.ip, "192.168.4.17");
    }

    #[tokio::test]
    async fn unreachable_controller_blocks_the_flow() {
        let client = ControllerClient::new("http://127.0.0.1:9").unwrap();
        let err = apply_controller_config(&client, &config_with_timeout(60))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Unreachable(_)));
    }

    #[tokio::test]
    async fn unhealthy_report_blocks_before_configuring() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "ok": false, "ip": "0.0.0.0" })),
            )
            .mount(&server)
            .await;
        // No /api/game/config mock: reaching it would 404 and fail the test
        // with a Rejected error instead of Unhealthy.

        let client = ControllerClient::new(&server.uri()).unwrap();
        let err = apply_controller_config(&client, &config_with_timeout(60))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Unhealthy));
    }

    #[tokio::test]
    async fn rejected_configure_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(healthy_body()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/game/config"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = ControllerClient::new(&server.uri()).unwrap();
        let err = apply_controller_config(&client, &config_with_timeout(60))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Rejected(_)));
    }
}
