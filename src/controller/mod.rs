//! HTTP client for the embedded buzzer controller: imperative game commands,
//! liveness probe, and the point-in-time status poll.

pub mod events;

use std::{sync::Arc, time::Duration};

use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias for controller calls.
pub type ControllerResult<T> = Result<T, ControllerError>;

/// Errors raised by controller requests.
///
/// Whether one of these blocks anything is the caller's decision: the
/// pre-flight configuration flow surfaces them, the in-round commands log and
/// swallow them.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The underlying HTTP client could not be constructed.
    #[error("failed to build http client")]
    ClientBuilder {
        /// Builder failure.
        #[source]
        source: reqwest::Error,
    },
    /// The request could not be sent or the connection failed mid-flight.
    #[error("request to `{path}` failed")]
    RequestSend {
        /// Request path relative to the base URL.
        path: String,
        /// Transport failure.
        #[source]
        source: reqwest::Error,
    },
    /// The controller answered with a non-success status.
    #[error("request to `{path}` returned status {status}")]
    RequestStatus {
        /// Request path relative to the base URL.
        path: String,
        /// HTTP status received.
        status: StatusCode,
    },
    /// The response body could not be decoded.
    #[error("failed to decode response from `{path}`")]
    DecodeResponse {
        /// Request path relative to the base URL.
        path: String,
        /// Decode failure.
        #[source]
        source: reqwest::Error,
    },
}

/// Liveness report from `GET /api/health`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Whether the controller considers itself operational.
    pub ok: bool,
    /// Address the controller reports for itself.
    pub ip: String,
    /// Network name the controller joined, when reported.
    #[serde(default)]
    pub ssid: Option<String>,
}

/// Point-in-time game status from `GET /api/status`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerStatus {
    /// Whether a round is currently running on the controller.
    #[serde(default)]
    pub game_active: bool,
    /// Milliseconds left in the controller's own countdown.
    #[serde(default)]
    pub remaining_ms: u64,
    /// Press order recorded so far, as roster indices.
    #[serde(default)]
    pub press_order: Vec<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigureBody {
    duration_ms: u64,
}

const CONFIG_PATH: &str = "/api/game/config";
const START_PATH: &str = "/api/game/start";
const RESET_PATH: &str = "/api/game/reset";
const HEALTH_PATH: &str = "/api/health";
const STATUS_PATH: &str = "/api/status";
const EVENTS_PATH: &str = "/events";

/// Per-command timeout; the controller answers on the local network or not at
/// all. The event stream request is exempt.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
/// Connection timeout shared by every request, the event stream included.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the controller's HTTP surface. Cheap to clone.
#[derive(Clone)]
pub struct ControllerClient {
    client: Client,
    base_url: Arc<str>,
}

impl ControllerClient {
    /// Build a client for the controller at `base_url` (scheme and host, no
    /// trailing slash required).
    pub fn new(base_url: &str) -> ControllerResult<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|source| ControllerError::ClientBuilder { source })?;
        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
        })
    }

    /// Base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .timeout(COMMAND_TIMEOUT)
    }

    async fn post_command(&self, path: &str, body: Option<&ConfigureBody>) -> ControllerResult<()> {
        let mut builder = self.request(Method::POST, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder
            .send()
            .await
            .map_err(|source| ControllerError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ControllerError::RequestStatus {
                path: path.to_string(),
                status: response.status(),
            })
        }
    }

    async fn get_json<T>(&self, path: &str) -> ControllerResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .request(Method::GET, path)
            .send()
            .await
            .map_err(|source| ControllerError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(ControllerError::RequestStatus {
                path: path.to_string(),
                status: response.status(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| ControllerError::DecodeResponse {
                path: path.to_string(),
                source,
            })
    }

    /// Store the round duration on the controller without starting a round.
    pub async fn configure(&self, duration: Duration) -> ControllerResult<()> {
        let body = ConfigureBody {
            duration_ms: duration.as_millis() as u64,
        };
        self.post_command(CONFIG_PATH, Some(&body)).await
    }

    /// Arm the controller for a new round using the stored duration.
    pub async fn start(&self) -> ControllerResult<()> {
        self.post_command(START_PATH, None).await
    }

    /// Clear the controller's press state and stop any running round.
    pub async fn reset(&self) -> ControllerResult<()> {
        self.post_command(RESET_PATH, None).await
    }

    /// Probe the controller before applying configuration to it.
    pub async fn health(&self) -> ControllerResult<HealthReport> {
        self.get_json(HEALTH_PATH).await
    }

    /// Poll the controller's point-in-time game status.
    pub async fn status(&self) -> ControllerResult<ControllerStatus> {
        self.get_json(STATUS_PATH).await
    }

    /// Open the long-lived push-event stream. No per-request timeout applies;
    /// the subscription layer owns the lifetime of this connection.
    pub(crate) async fn open_event_stream(&self) -> ControllerResult<reqwest::Response> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, EVENTS_PATH))
            .send()
            .await
            .map_err(|source| ControllerError::RequestSend {
                path: EVENTS_PATH.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ControllerError::RequestStatus {
                path: EVENTS_PATH.to_string(),
                status: response.status(),
            })
        }
    }
}
