//! Job submission client.
//!
//! `GearClient` owns one connection to the scheduler's Gearman port and
//! submits jobs one at a time, waiting for each to complete before
//! returning. There is no pooling and no pipelining; every `run` call is a
//! single independent round trip.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use tokio_rustls::TlsConnector;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ClientError, ProtocolError};

use super::packet::{Packet, PacketMagic, PacketType, HEADER_LEN};

/// Fixed Gearman port, shared by the job protocol and the status port.
pub const GEARMAN_PORT: u16 = 4730;

/// How long to wait for the server to become ready.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Overall budget for one submitted job, submission included.
const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(300);

/// Connection settings for [`GearClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Scheduler host name or address.
    pub host: String,
    /// Gearman port.
    pub port: u16,
    /// Directory holding `client.key`, `client.pem` and `ca.pem`. TLS client
    /// authentication is enabled when set; connections are plaintext when
    /// unset.
    pub certs_dir: Option<PathBuf>,
    /// Budget for establishing the connection.
    pub connect_timeout: Duration,
    /// Budget for one submitted job.
    pub job_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "scheduler".to_string(),
            port: GEARMAN_PORT,
            certs_dir: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            job_timeout: DEFAULT_JOB_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Creates a configuration for the given host with default settings.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the certificate directory, enabling TLS client authentication.
    pub fn with_certs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.certs_dir = Some(dir.into());
        self
    }

    /// Sets the connect budget.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-job budget.
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// The `host:port` pair this configuration points at.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// One connection to the Gearman port, able to submit jobs and wait for
/// their replies.
pub struct GearClient {
    stream: Box<dyn Transport>,
    addr: String,
    job_timeout: Duration,
}

impl std::fmt::Debug for GearClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GearClient")
            .field("addr", &self.addr)
            .field("job_timeout", &self.job_timeout)
            .finish()
    }
}

impl GearClient {
    /// Connects to the configured server.
    ///
    /// The whole establishment, TLS handshake included, must finish within
    /// the connect budget or the attempt fails with
    /// [`ClientError::ConnectTimeout`].
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let addr = config.addr();
        match timeout(config.connect_timeout, Self::establish(config, &addr)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::ConnectTimeout {
                addr,
                timeout: config.connect_timeout,
            }),
        }
    }

    async fn establish(config: &ClientConfig, addr: &str) -> Result<Self, ClientError> {
        let tcp = TcpStream::connect(addr)
            .await
            .map_err(|e| ClientError::ConnectionFailed {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;

        let stream: Box<dyn Transport> = match &config.certs_dir {
            Some(dir) => {
                let connector = tls_connector(dir)?;
                let server_name = ServerName::try_from(config.host.clone())
                    .map_err(|e| ClientError::Tls(e.to_string()))?;
                let tls = connector.connect(server_name, tcp).await.map_err(|e| {
                    ClientError::ConnectionFailed {
                        addr: addr.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                Box::new(tls)
            }
            None => Box::new(tcp),
        };

        debug!(addr, tls = config.certs_dir.is_some(), "connected to gearman");

        Ok(Self {
            stream,
            addr: addr.to_string(),
            job_timeout: config.job_timeout,
        })
    }

    /// Submits a job and waits for its reply, parsed as JSON.
    ///
    /// The submission and the wait for completion share one overall budget;
    /// exceeding it fails with [`ClientError::JobTimeout`]. A reply that is
    /// not valid UTF-8 JSON fails with [`ClientError::Protocol`] and never
    /// yields a partial value.
    pub async fn run(&mut self, job_name: &str, args: Value) -> Result<Value, ClientError> {
        let budget = self.job_timeout;
        match timeout(budget, self.run_inner(job_name, &args)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::JobTimeout {
                name: job_name.to_string(),
                timeout: budget,
            }),
        }
    }

    async fn run_inner(&mut self, job_name: &str, args: &Value) -> Result<Value, ClientError> {
        let payload = serde_json::to_vec(args).map_err(ProtocolError::from)?;
        let unique = Uuid::new_v4().to_string();

        debug!(job = job_name, addr = %self.addr, "submitting job");
        let submit = Packet::request(
            PacketType::SubmitJob,
            &[job_name.as_bytes(), unique.as_bytes(), &payload],
        );
        self.stream.write_all(&submit.to_bytes()).await?;

        let handle = self.wait_for_handle().await?;
        let reply = self.wait_for_completion(job_name, &handle).await?;

        let text = std::str::from_utf8(&reply).map_err(|_| ProtocolError::NonUtf8Reply)?;
        let value = serde_json::from_str(text).map_err(ProtocolError::from)?;
        Ok(value)
    }

    async fn wait_for_handle(&mut self) -> Result<String, ClientError> {
        let response = self.read_response().await?;
        match response.ptype {
            PacketType::JobCreated => {
                Ok(String::from_utf8_lossy(&response.data).into_owned())
            }
            other => Err(ProtocolError::UnexpectedPacket {
                packet: format!("{other:?}"),
                expected: "JobCreated".to_string(),
            }
            .into()),
        }
    }

    /// Reads response frames until the job completes, collecting data
    /// payloads along the way. The reply is the first payload received,
    /// whether it arrived in a `WorkData` frame or in `WorkComplete` itself.
    async fn wait_for_completion(
        &mut self,
        job_name: &str,
        handle: &str,
    ) -> Result<Vec<u8>, ClientError> {
        let mut data: Vec<Vec<u8>> = Vec::new();
        loop {
            let response = self.read_response().await?;
            let (frame_handle, rest) = split_first_arg(&response.data);
            if frame_handle != handle.as_bytes() {
                continue;
            }
            match response.ptype {
                PacketType::WorkData => data.push(rest.to_vec()),
                PacketType::WorkComplete => {
                    data.push(rest.to_vec());
                    let reply = data.into_iter().find(|d| !d.is_empty()).unwrap_or_default();
                    return Ok(reply);
                }
                PacketType::WorkStatus | PacketType::WorkWarning => continue,
                PacketType::WorkFail => {
                    return Err(ClientError::JobFailed {
                        name: job_name.to_string(),
                        handle: handle.to_string(),
                    })
                }
                PacketType::WorkException => {
                    return Err(ClientError::JobException {
                        name: job_name.to_string(),
                        detail: String::from_utf8_lossy(rest).into_owned(),
                    })
                }
                other => {
                    return Err(ProtocolError::UnexpectedPacket {
                        packet: format!("{other:?}"),
                        expected: "WorkComplete".to_string(),
                    }
                    .into())
                }
            }
        }
    }

    async fn read_response(&mut self) -> Result<Packet, ClientError> {
        let mut header = [0u8; HEADER_LEN];
        self.stream.read_exact(&mut header).await?;
        let (magic, ptype, size) = Packet::parse_header(&header)?;
        if magic != PacketMagic::Response {
            return Err(ProtocolError::UnexpectedRequestPacket.into());
        }

        let mut data = vec![0u8; size as usize];
        self.stream.read_exact(&mut data).await?;
        Ok(Packet {
            magic,
            ptype,
            data,
        })
    }
}

/// Splits a payload at the first NUL into `(handle, rest)`.
fn split_first_arg(data: &[u8]) -> (&[u8], &[u8]) {
    match data.iter().position(|b| *b == 0) {
        Some(i) => (&data[..i], &data[i + 1..]),
        None => (data, &[]),
    }
}

fn tls_connector(dir: &Path) -> Result<TlsConnector, ClientError> {
    let ca_certs = load_certs(&dir.join("ca.pem"))?;
    let mut roots = tokio_rustls::rustls::RootCertStore::empty();
    for cert in ca_certs {
        roots
            .add(cert)
            .map_err(|e| ClientError::Tls(format!("ca.pem: {e}")))?;
    }

    let certs = load_certs(&dir.join("client.pem"))?;
    let key = load_key(&dir.join("client.key"))?;

    let tls_config = tokio_rustls::rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_client_auth_cert(certs, key)
        .map_err(|e| ClientError::Tls(e.to_string()))?;

    Ok(TlsConnector::from(Arc::new(tls_config)))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ClientError> {
    let pem = std::fs::read(path)
        .map_err(|e| ClientError::Tls(format!("{}: {e}", path.display())))?;
    rustls_pemfile::certs(&mut pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ClientError::Tls(format!("{}: {e}", path.display())))
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, ClientError> {
    let pem = std::fs::read(path)
        .map_err(|e| ClientError::Tls(format!("{}: {e}", path.display())))?;
    rustls_pemfile::private_key(&mut pem.as_slice())
        .map_err(|e| ClientError::Tls(format!("{}: {e}", path.display())))?
        .ok_or_else(|| ClientError::Tls(format!("{}: no private key found", path.display())))
}
