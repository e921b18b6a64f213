//! Workload runtime client.
//!
//! [`WorkloadRuntime`] is the seam the relocation sequencer drives; every
//! call is addressed to a specific node. [`DockerRuntime`] implements it
//! against the Docker Engine API on `http://{node.address}:{port}`.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::{Deserialize, Serialize};
use tracing::debug;

use mantle_core::NodeEndpoint;

use crate::error::{RuntimeError, RuntimeResult};
use crate::types::{InstanceSummary, WorkloadSpec};

/// Boxed future alias for runtime call results.
pub type RuntimeFuture<'a, T> = Pin<Box<dyn Future<Output = RuntimeResult<T>> + Send + 'a>>;

/// The four operations Mantle needs from a workload runtime.
pub trait WorkloadRuntime: Send + Sync {
    fn list_instances<'a>(&'a self, node: &'a NodeEndpoint)
    -> RuntimeFuture<'a, Vec<InstanceSummary>>;

    /// Create an instance from `spec`, returning the runtime's instance id.
    ///
    /// An empty id is a valid return here; callers decide whether it is
    /// usable.
    fn create_instance<'a>(
        &'a self,
        node: &'a NodeEndpoint,
        spec: &'a WorkloadSpec,
    ) -> RuntimeFuture<'a, String>;

    fn start_instance<'a>(&'a self, node: &'a NodeEndpoint, id: &'a str) -> RuntimeFuture<'a, ()>;

    fn remove_instance<'a>(
        &'a self,
        node: &'a NodeEndpoint,
        id: &'a str,
        force: bool,
    ) -> RuntimeFuture<'a, ()>;
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateBody<'a> {
    image: &'a str,
    /// Omitted so the image's default command applies.
    #[serde(skip_serializing_if = "Option::is_none")]
    cmd: Option<&'a [String]>,
    env: Vec<String>,
    host_config: HostConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct HostConfig<'a> {
    binds: &'a [String],
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateResponse {
    #[serde(default)]
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerEntry {
    id: String,
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    image: String,
    #[serde(default)]
    state: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Docker Engine API client.
///
/// Holds one pooled HTTP client for its whole lifetime. Each call builds
/// a fresh request, so no headers or body leak from one call to the next.
#[derive(Clone)]
pub struct DockerRuntime {
    client: Client<HttpConnector, Full<Bytes>>,
    port: u16,
}

impl DockerRuntime {
    pub fn new(port: u16) -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            port,
        }
    }

    fn url(&self, node: &NodeEndpoint, path: &str) -> String {
        format!("http://{}:{}{}", node.address, self.port, path)
    }

    /// Send one request and collect the whole response body.
    async fn call(
        &self,
        node: &NodeEndpoint,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> RuntimeResult<(StatusCode, Bytes)> {
        let url = self.url(node, path);
        let mut builder = Request::builder()
            .method(method.clone())
            .uri(&url)
            .header("user-agent", "mantle/0.1");
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let req = builder
            .body(Full::new(Bytes::from(body.unwrap_or_default())))
            .map_err(|e| RuntimeError::Request(e.to_string()))?;

        let resp = self
            .client
            .request(req)
            .await
            .map_err(|e| RuntimeError::Transport {
                node: node.id.to_string(),
                reason: e.to_string(),
            })?;
        let status = resp.status();
        let bytes = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| RuntimeError::Transport {
                node: node.id.to_string(),
                reason: e.to_string(),
            })?
            .to_bytes();

        debug!(node = %node.id, %method, %url, status = status.as_u16(), "runtime call");
        Ok((status, bytes))
    }

    fn status_error(node: &NodeEndpoint, status: StatusCode, body: &[u8]) -> RuntimeError {
        let message = serde_json::from_slice::<ErrorBody>(body)
            .map(|e| e.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(body).trim().to_string());
        RuntimeError::Status {
            node: node.id.to_string(),
            status: status.as_u16(),
            message,
        }
    }

    fn decode<T: for<'de> Deserialize<'de>>(node: &NodeEndpoint, body: &[u8]) -> RuntimeResult<T> {
        serde_json::from_slice(body).map_err(|e| RuntimeError::Decode {
            node: node.id.to_string(),
            reason: e.to_string(),
        })
    }
}

impl WorkloadRuntime for DockerRuntime {
    fn list_instances<'a>(
        &'a self,
        node: &'a NodeEndpoint,
    ) -> RuntimeFuture<'a, Vec<InstanceSummary>> {
        Box::pin(async move {
            let (status, body) = self.call(node, Method::GET, "/containers/json", None).await?;
            if !status.is_success() {
                return Err(Self::status_error(node, status, &body));
            }
            let entries: Vec<ContainerEntry> = Self::decode(node, &body)?;
            Ok(entries
                .into_iter()
                .map(|c| InstanceSummary {
                    id: c.id,
                    names: c.names,
                    image: c.image,
                    state: c.state,
                })
                .collect())
        })
    }

    fn create_instance<'a>(
        &'a self,
        node: &'a NodeEndpoint,
        spec: &'a WorkloadSpec,
    ) -> RuntimeFuture<'a, String> {
        Box::pin(async move {
            let payload = CreateBody {
                image: &spec.image,
                cmd: (!spec.command.is_empty()).then_some(spec.command.as_slice()),
                env: spec.env_pairs(),
                host_config: HostConfig { binds: &spec.binds },
            };
            let json = serde_json::to_vec(&payload)
                .map_err(|e| RuntimeError::Request(format!("serialize create body: {e}")))?;

            let path = format!("/containers/create?name={}", spec.name);
            let (status, body) = self.call(node, Method::POST, &path, Some(json)).await?;
            if !status.is_success() {
                return Err(Self::status_error(node, status, &body));
            }
            let created: CreateResponse = Self::decode(node, &body)?;
            Ok(created.id)
        })
    }

    fn start_instance<'a>(&'a self, node: &'a NodeEndpoint, id: &'a str) -> RuntimeFuture<'a, ()> {
        Box::pin(async move {
            let path = format!("/containers/{id}/start");
            let (status, body) = self.call(node, Method::POST, &path, None).await?;
            match status {
                s if s.is_success() => Ok(()),
                StatusCode::NOT_MODIFIED => {
                    debug!(node = %node.id, %id, "instance already started");
                    Ok(())
                }
                s => Err(Self::status_error(node, s, &body)),
            }
        })
    }

    fn remove_instance<'a>(
        &'a self,
        node: &'a NodeEndpoint,
        id: &'a str,
        force: bool,
    ) -> RuntimeFuture<'a, ()> {
        Box::pin(async move {
            let path = format!("/containers/{id}?force={force}");
            let (status, body) = self.call(node, Method::DELETE, &path, None).await?;
            match status {
                s if s.is_success() => Ok(()),
                StatusCode::NOT_FOUND => {
                    debug!(node = %node.id, %id, "instance already gone");
                    Ok(())
                }
                s => Err(Self::status_error(node, s, &body)),
            }
        })
    }
}
