use crate::assignment::AssignmentInfo;
use crate::dinput::{DeviceClass, DeviceGuid, DeviceInstance};
use crate::error::DirectInputError;
use crate::input::DeviceInputs;
use crate::protocol::*;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tracing::debug;

mod device;

pub use device::RemoteDevice;

pub(crate) struct ClientInner {
    stream: Mutex<BufReader<UnixStream>>,
}

impl ClientInner {
    /// Send a command and wait for its response
    pub(crate) async fn send_command(&self, command: ControlCommand) -> Result<ControlResult> {
        let id = ulid::Ulid::new().to_string();
        let message = ControlMessage { id: id.clone(), command };

        let mut message_json = serde_json::to_string(&message)?;
        message_json.push('\n');

        let mut stream = self.stream.lock().await;
        stream.get_mut().write_all(message_json.as_bytes()).await?;

        let mut response_line = String::new();
        if stream.read_line(&mut response_line).await? == 0 {
            anyhow::bail!("Manager closed the connection");
        }

        let response: ControlResponse = serde_json::from_str(&response_line)
            .with_context(|| format!("Failed to parse response: {}", response_line))?;

        if response.id != id {
            anyhow::bail!("Response ID mismatch: expected {}, got {}", id, response.id);
        }

        Ok(response.result)
    }
}

/// Turn a protocol level failure into an error. [`DirectInputError`]s are
/// kept intact so callers can downcast to them.
pub(crate) fn unexpected(result: ControlResult, request: &str) -> anyhow::Error {
    match result {
        ControlResult::Error(e) => anyhow::Error::new(e).context(format!("{} failed", request)),
        ControlResult::Failure { message } => anyhow::anyhow!("{} failed: {}", request, message),
        other => anyhow::anyhow!("Unexpected response to {}: {:?}", request, other),
    }
}

/// Find the [`DirectInputError`] behind a client error, if any
pub fn direct_input_error(error: &anyhow::Error) -> Option<&DirectInputError> {
    error.downcast_ref::<DirectInputError>()
}

/// Client for communicating with the vpad manager
#[derive(Clone)]
pub struct VpadClient {
    inner: Arc<ClientInner>,
}

impl VpadClient {
    /// Connect to a vpad manager instance
    pub async fn connect(socket_path: impl AsRef<Path>) -> Result<Self> {
        let socket_path = socket_path.as_ref();

        let stream = UnixStream::connect(socket_path)
            .await
            .with_context(|| format!("Failed to connect to manager at {}", socket_path.display()))?;

        debug!("Connected to vpad manager at {}", socket_path.display());

        Ok(Self {
            inner: Arc::new(ClientInner {
                stream: Mutex::new(BufReader::new(stream)),
            }),
        })
    }

    /// Connect to the default manager instance of the current user
    pub async fn connect_default() -> Result<Self> {
        Self::connect(default_socket_path(0)).await
    }

    /// Ping the manager to check if it's alive
    pub async fn ping(&self) -> Result<()> {
        match self.inner.send_command(ControlCommand::Ping).await? {
            ControlResult::Pong => Ok(()),
            other => Err(unexpected(other, "Ping")),
        }
    }

    pub async fn enum_devices(&self, class: DeviceClass, flags: u32) -> Result<Vec<DeviceInstance>> {
        match self.inner.send_command(ControlCommand::EnumDevices { class, flags }).await? {
            ControlResult::Devices(devices) => Ok(devices),
            other => Err(unexpected(other, "EnumDevices")),
        }
    }

    /// Open a session on a device. The session ends when the handle drops.
    pub async fn create_device(&self, guid: DeviceGuid) -> Result<RemoteDevice> {
        match self.inner.send_command(ControlCommand::CreateDevice { guid }).await? {
            ControlResult::DeviceCreated { session } => {
                debug!("Opened {:?} as session {}", guid, session);
                Ok(RemoteDevice::new(Arc::clone(&self.inner), session))
            }
            other => Err(unexpected(other, "CreateDevice")),
        }
    }

    /// Feed a virtual device, when the manager runs on the feed source
    pub async fn submit_inputs(&self, index: usize, inputs: DeviceInputs) -> Result<()> {
        match self.inner.send_command(ControlCommand::SubmitInputs { index, inputs }).await? {
            ControlResult::Ok => Ok(()),
            other => Err(unexpected(other, "SubmitInputs")),
        }
    }

    pub async fn list_assignments(&self) -> Result<Vec<AssignmentInfo>> {
        match self.inner.send_command(ControlCommand::ListAssignments).await? {
            ControlResult::Assignments(assignments) => Ok(assignments),
            other => Err(unexpected(other, "ListAssignments")),
        }
    }

    /// Send a raw command to the manager and wait for response
    pub async fn send_command(&self, command: ControlCommand) -> Result<ControlResult> {
        self.inner.send_command(command).await
    }
}

/// `/run/user/<uid>/vpad-<instance>`
pub fn default_socket_path(instance: u32) -> std::path::PathBuf {
    let uid = unsafe { libc::getuid() };
    std::path::PathBuf::from(format!("/run/user/{}/vpad-{}", uid, instance))
}
