//! The two TCP services.
//!
//! The programmer port speaks the register protocol that vendor tooling
//! expects; the control port speaks a line-oriented JSON protocol for
//! named-parameter access. Both accept any number of connections; every
//! request funnels into the single bus worker, so connections contend in
//! arrival order and never interleave on the wire.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sigma_params::{ParameterDescriptor, ParameterValue};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{BridgeError, Result};
use crate::translator::{serve_programmer, NamedTranslator};
use crate::worker::DspHandle;

/// One control request, a JSON object on its own line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ControlRequest {
    /// Read a named cell.
    ReadParameter {
        /// Cell name.
        name: String,
    },
    /// Write a value to a named cell.
    WriteParameter {
        /// Cell name.
        name: String,
        /// Host value to encode.
        value: ParameterValue,
    },
    /// Set a volume cell in dB.
    SetVolume {
        /// Cell name.
        name: String,
        /// Target level in dB.
        db: f64,
    },
    /// Shift a volume cell by a dB delta.
    AdjustVolume {
        /// Cell name.
        name: String,
        /// Delta in dB.
        db: f64,
    },
    /// Describe a catalog row.
    Describe {
        /// Cell name.
        name: String,
    },
    /// Describe the catalog row whose span starts at an address.
    DescribeAddress {
        /// First word address of the cell.
        address: u16,
    },
    /// List all parameter names.
    ListParameters,
    /// Reload the parameter catalog from disk.
    ReloadParameters {
        /// Source file; defaults to the configured one.
        #[serde(default)]
        path: Option<PathBuf>,
    },
    /// Soft reset through the reset register.
    SoftReset,
    /// Hard reset through the reset pin.
    HardReset,
    /// Drive the self-boot select line.
    SetSelfBoot {
        /// Engage or release.
        engaged: bool,
    },
}

/// Reply to a control request.
///
/// `status` is `"ok"` or `"error"`; the other fields appear only when
/// they carry something.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ControlResponse {
    /// `"ok"` or `"error"`.
    pub status: String,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Value read or written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<ParameterValue>,
    /// Resulting level in dB, for the volume operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db: Option<f64>,
    /// Whether a written value was clamped into the cell's range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clamped: Option<bool>,
    /// The described catalog row.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<ParameterDescriptor>,
    /// Parameter names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<String>>,
    /// Catalog row count after a reload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
}

impl ControlResponse {
    /// A bare success.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            ..Self::default()
        }
    }

    /// A failure carrying `message`.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Execute one control request.
///
/// Failures come back as error responses, never as `Err`; a control
/// connection only dies on socket trouble.
pub async fn dispatch(request: ControlRequest, translator: &NamedTranslator) -> ControlResponse {
    let result = match request {
        ControlRequest::ReadParameter { name } => {
            translator.read_parameter(&name).await.map(|value| ControlResponse {
                value: Some(value),
                ..ControlResponse::ok()
            })
        }
        ControlRequest::WriteParameter { name, value } => translator
            .write_parameter(&name, value)
            .await
            .map(|saturation| ControlResponse {
                value: Some(value),
                clamped: Some(saturation.clamped()),
                ..ControlResponse::ok()
            }),
        ControlRequest::SetVolume { name, db } => {
            translator.set_volume_db(&name, db).await.map(|db| ControlResponse {
                db: Some(db),
                ..ControlResponse::ok()
            })
        }
        ControlRequest::AdjustVolume { name, db } => {
            translator.adjust_volume_db(&name, db).await.map(|db| ControlResponse {
                db: Some(db),
                ..ControlResponse::ok()
            })
        }
        ControlRequest::Describe { name } => translator.describe(&name).map(|row| ControlResponse {
            parameter: Some(row),
            ..ControlResponse::ok()
        }),
        ControlRequest::DescribeAddress { address } => {
            translator.describe_address(address).map(|row| ControlResponse {
                parameter: Some(row),
                ..ControlResponse::ok()
            })
        }
        ControlRequest::ListParameters => Ok(ControlResponse {
            parameters: Some(translator.names()),
            ..ControlResponse::ok()
        }),
        ControlRequest::ReloadParameters { path } => {
            translator.reload(path.as_deref()).map(|rows| ControlResponse {
                rows: Some(rows),
                ..ControlResponse::ok()
            })
        }
        ControlRequest::SoftReset => translator.handle().soft_reset().await.map(|()| ControlResponse::ok()),
        ControlRequest::HardReset => translator.handle().hard_reset().await.map(|()| ControlResponse::ok()),
        ControlRequest::SetSelfBoot { engaged } => translator
            .handle()
            .set_self_boot(engaged)
            .await
            .map(|()| ControlResponse::ok()),
    };
    result.unwrap_or_else(|err| ControlResponse::error(err.to_string()))
}

/// Serve the JSON control protocol on one connection.
///
/// One request per line in, one response per line out. A malformed line
/// gets an error response and the connection stays open; EOF ends it.
///
/// # Errors
///
/// Socket I/O failures.
pub async fn serve_control<S>(stream: S, translator: NamedTranslator) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<ControlRequest>(&line) {
            Ok(request) => {
                tracing::debug!("Control request: {request:?}");
                dispatch(request, &translator).await
            }
            Err(err) => ControlResponse::error(format!("malformed request: {err}")),
        };
        let mut text = serde_json::to_string(&response)
            .map_err(|err| BridgeError::protocol(err.to_string()))?;
        text.push('\n');
        writer.write_all(text.as_bytes()).await?;
    }
    tracing::debug!("Control client disconnected");
    Ok(())
}

/// Accept and serve connections on both listeners.
///
/// Each connection runs in its own task; the loop itself only returns on
/// listener failure.
///
/// # Errors
///
/// Accept failures on either listener.
pub async fn serve(
    programmer: TcpListener,
    control: TcpListener,
    handle: DspHandle,
    translator: NamedTranslator,
) -> Result<()> {
    loop {
        tokio::select! {
            accepted = programmer.accept() => {
                let (stream, peer) = accepted?;
                tracing::info!("Programmer connection from {peer}");
                let handle = handle.clone();
                tokio::spawn(async move {
                    if let Err(err) = serve_programmer(stream, handle).await {
                        tracing::warn!("Programmer connection {peer} failed: {err}");
                    }
                });
            }
            accepted = control.accept() => {
                let (stream, peer) = accepted?;
                tracing::info!("Control connection from {peer}");
                let translator = translator.clone();
                tokio::spawn(async move {
                    if let Err(err) = serve_control(stream, translator).await {
                        tracing::warn!("Control connection {peer} failed: {err}");
                    }
                });
            }
        }
    }
}

/// Bind the configured endpoints and serve until interrupted.
///
/// # Errors
///
/// Bind failures, accept failures, and signal-handler installation
/// failures.
pub async fn run(
    config: &ServerConfig,
    handle: DspHandle,
    translator: NamedTranslator,
) -> Result<()> {
    let programmer = TcpListener::bind(config.programmer_addr()).await?;
    let control = TcpListener::bind(config.control_addr()).await?;
    tracing::info!(
        "Listening: programmer on {}, control on {}",
        config.programmer_addr(),
        config.control_addr()
    );

    tokio::select! {
        result = serve(programmer, control, handle, translator) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted; shutting down");
            Ok(())
        }
    }
}
