use crate::assignment::AssignmentManager;
use crate::dinput::{EmulatedDevice, EmulatedInput};
use crate::error::DirectInputError;
use crate::input::FeedSource;
use crate::protocol::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, trace, warn};

mod lock;

pub use lock::LockFile;

/// Where the virtual devices get their input from
#[derive(Clone)]
pub enum SourceHandle {
    /// Inputs submitted by clients
    Feed(Arc<FeedSource>),
    /// Physical controllers bound by the assignment manager
    Physical(Arc<AssignmentManager>),
}

/// State shared by every connection
struct Shared {
    input: EmulatedInput,
    source: SourceHandle,
    next_session: AtomicU64,
}

/// Devices created on one connection. Dropped, and so destroyed, when the
/// connection closes.
type Sessions = HashMap<SessionId, EmulatedDevice>;

pub struct Manager {
    /// Socket path for control commands
    control_socket_path: PathBuf,
    /// Lock file to prevent multiple managers with same instance
    _lock_file: LockFile,
    shared: Arc<Shared>,
}
impl Manager {
    /// Create a new manager instance
    pub fn new(socket_path: impl AsRef<Path>, input: EmulatedInput, source: SourceHandle) -> anyhow::Result<Self> {
        let socket_path = socket_path.as_ref();

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Acquire lock file
        let lock_path = socket_path.with_extension("lock");
        let lock_file = LockFile::acquire(&lock_path)?;

        info!(
            "Manager initialized at {} with {} virtual devices",
            socket_path.display(),
            input.device_count()
        );

        Ok(Self {
            control_socket_path: socket_path.to_path_buf(),
            _lock_file: lock_file,
            shared: Arc::new(Shared {
                input,
                source,
                next_session: AtomicU64::new(1),
            }),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.control_socket_path
    }

    /// Run the manager main loop
    pub async fn run(&self) -> anyhow::Result<()> {
        // Remove existing socket if present
        let _ = std::fs::remove_file(&self.control_socket_path);

        // Bind control socket
        let listener = UnixListener::bind(&self.control_socket_path)?;

        // Set socket permissions to allow all users in container
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.control_socket_path, std::fs::Permissions::from_mode(0o666))?;
        }

        info!("Manager listening on {}", self.control_socket_path.display());

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let shared = Arc::clone(&self.shared);
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_client(stream, shared).await {
                            error!("Client handler error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(stream: UnixStream, shared: Arc<Shared>) -> anyhow::Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        let mut sessions = Sessions::new();

        debug!("Client connected");

        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    // Connection closed cleanly
                    break;
                }
                Ok(_) => {
                    let message: ControlMessage = match serde_json::from_str(&line) {
                        Ok(msg) => msg,
                        Err(e) => {
                            warn!("Failed to parse message: {}", e);
                            continue;
                        }
                    };

                    trace!("Received command: {:?}", message.command);

                    let result = Self::process_command(message.command, &shared, &mut sessions);
                    let response = ControlResponse { id: message.id, result };
                    let mut response_json = serde_json::to_string(&response)?;
                    response_json.push('\n');

                    // Try to write response, but don't error on broken pipe
                    if let Err(e) = writer.write_all(response_json.as_bytes()).await {
                        if e.kind() == std::io::ErrorKind::BrokenPipe {
                            break;
                        }
                        return Err(e.into());
                    }
                }
                Err(e) => {
                    if e.kind() != std::io::ErrorKind::UnexpectedEof {
                        error!("Error reading from client: {}", e);
                    }
                    break;
                }
            }
        }

        if !sessions.is_empty() {
            info!("Client disconnected, destroying {} devices", sessions.len());
        }
        Ok(())
    }

    /// Process a control command
    fn process_command(command: ControlCommand, shared: &Shared, sessions: &mut Sessions) -> ControlResult {
        match command {
            ControlCommand::Ping => ControlResult::Pong,
            ControlCommand::EnumDevices { class, flags } => {
                into_result(shared.input.enum_devices(class, flags), ControlResult::Devices)
            }
            ControlCommand::CreateDevice { guid } => match shared.input.create_device(guid) {
                Ok(device) => {
                    let session = shared.next_session.fetch_add(1, Ordering::Relaxed);
                    info!("Created session {} for virtual device {}", session, device.index());
                    sessions.insert(session, device);
                    ControlResult::DeviceCreated { session }
                }
                Err(e) => ControlResult::Error(e),
            },
            ControlCommand::DestroyDevice { session } => match sessions.remove(&session) {
                Some(device) => {
                    info!("Destroyed session {} (virtual device {})", session, device.index());
                    ControlResult::DeviceDestroyed
                }
                None => unknown_session(session),
            },
            ControlCommand::GetCapabilities { session } => {
                with_device(sessions, session, |device| Ok(ControlResult::Capabilities(device.capabilities())))
            }
            ControlCommand::GetDeviceInfo { session } => {
                with_device(sessions, session, |device| Ok(ControlResult::DeviceInfo(device.device_info())))
            }
            ControlCommand::EnumObjects { session, filter } => with_device(sessions, session, |device| {
                Ok(ControlResult::Objects(device.enum_objects(filter)))
            }),
            ControlCommand::SetDataFormat { session, format } => with_device(sessions, session, |device| {
                device.set_data_format(&format).map(|()| ControlResult::Ok)
            }),
            ControlCommand::SetCooperativeLevel { session, flags } => with_device(sessions, session, |device| {
                device.set_cooperative_level(flags).map(|()| ControlResult::Ok)
            }),
            ControlCommand::Acquire { session } => {
                with_device(sessions, session, |device| device.acquire().map(|()| ControlResult::Ok))
            }
            ControlCommand::Unacquire { session } => {
                with_device(sessions, session, |device| device.unacquire().map(|()| ControlResult::Ok))
            }
            ControlCommand::GetProperty {
                session,
                property,
                target,
            } => with_device(sessions, session, |device| {
                device.get_property(property, target).map(ControlResult::Property)
            }),
            ControlCommand::SetProperty {
                session,
                property,
                target,
                value,
            } => with_device(sessions, session, |device| {
                device.set_property(property, target, value).map(|()| ControlResult::Ok)
            }),
            ControlCommand::Poll { session } => {
                with_device(sessions, session, |device| device.poll().map(|()| ControlResult::Ok))
            }
            ControlCommand::GetDeviceState { session, size } => {
                with_device(sessions, session, |device| device.read_state(size).map(ControlResult::State))
            }
            ControlCommand::SubmitInputs { index, inputs } => match &shared.source {
                SourceHandle::Feed(feed) => into_result(feed.submit(index, inputs), |()| ControlResult::Ok),
                SourceHandle::Physical(_) => ControlResult::Failure {
                    message: "Inputs come from physical devices".to_string(),
                },
            },
            ControlCommand::ListAssignments => match &shared.source {
                SourceHandle::Physical(assignments) => ControlResult::Assignments(assignments.assignments()),
                SourceHandle::Feed(_) => ControlResult::Assignments(Vec::new()),
            },
        }
    }
}

fn into_result<T>(result: crate::error::Result<T>, ok: impl FnOnce(T) -> ControlResult) -> ControlResult {
    match result {
        Ok(value) => ok(value),
        Err(e) => {
            debug!("Request failed: {}", e);
            ControlResult::Error(e)
        }
    }
}

fn unknown_session(session: SessionId) -> ControlResult {
    ControlResult::Failure {
        message: format!("Session {} not found", session),
    }
}

fn with_device(
    sessions: &mut Sessions,
    session: SessionId,
    f: impl FnOnce(&mut EmulatedDevice) -> Result<ControlResult, DirectInputError>,
) -> ControlResult {
    match sessions.get_mut(&session) {
        Some(device) => into_result(f(device), |result| result),
        None => unknown_session(session),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dinput::{Charset, DataFormat, DeviceGuid};
    use crate::input::{AxisType, DeviceInputs, InputFilter};

    fn shared(count: usize) -> (Arc<FeedSource>, Shared) {
        let feed = Arc::new(FeedSource::new(count));
        let input = EmulatedInput::new(Charset::Wide, feed.clone(), InputFilter::default());
        let shared = Shared {
            input,
            source: SourceHandle::Feed(Arc::clone(&feed)),
            next_session: AtomicU64::new(1),
        };
        (feed, shared)
    }

    fn create(shared: &Shared, sessions: &mut Sessions, index: usize) -> SessionId {
        let command = ControlCommand::CreateDevice {
            guid: DeviceGuid::Virtual(index),
        };
        match Manager::process_command(command, shared, sessions) {
            ControlResult::DeviceCreated { session } => session,
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_session_lifecycle() {
        let (_, shared) = shared(2);
        let mut sessions = Sessions::new();
        let first = create(&shared, &mut sessions, 0);
        let second = create(&shared, &mut sessions, 1);
        assert_ne!(first, second);

        let result = Manager::process_command(ControlCommand::DestroyDevice { session: first }, &shared, &mut sessions);
        assert!(matches!(result, ControlResult::DeviceDestroyed));
        let result = Manager::process_command(ControlCommand::Acquire { session: first }, &shared, &mut sessions);
        assert!(matches!(result, ControlResult::Failure { .. }));
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn test_errors_are_forwarded() {
        let (_, shared) = shared(1);
        let mut sessions = Sessions::new();
        let result = Manager::process_command(
            ControlCommand::CreateDevice {
                guid: DeviceGuid::Virtual(3),
            },
            &shared,
            &mut sessions,
        );
        assert!(matches!(result, ControlResult::Error(DirectInputError::DeviceNotRegistered(_))));

        let session = create(&shared, &mut sessions, 0);
        let result =
            Manager::process_command(ControlCommand::GetDeviceState { session, size: 80 }, &shared, &mut sessions);
        assert!(matches!(result, ControlResult::Error(DirectInputError::InvalidParam(_))));

        let format = ControlCommand::SetDataFormat {
            session,
            format: DataFormat::joystick(),
        };
        assert!(matches!(Manager::process_command(format, &shared, &mut sessions), ControlResult::Ok));
        for size in [usize::MAX, 1 << 40] {
            let result =
                Manager::process_command(ControlCommand::GetDeviceState { session, size }, &shared, &mut sessions);
            assert!(matches!(result, ControlResult::Error(DirectInputError::InvalidParam(_))));
        }
    }

    #[test]
    fn test_submitted_inputs_reach_state() {
        let (_, shared) = shared(1);
        let mut sessions = Sessions::new();
        let session = create(&shared, &mut sessions, 0);

        let commands = [
            ControlCommand::SetDataFormat {
                session,
                format: DataFormat::joystick(),
            },
            ControlCommand::Acquire { session },
            ControlCommand::SubmitInputs {
                index: 0,
                inputs: DeviceInputs::default().with_axis(AxisType::LeftStickX, 1.0),
            },
            ControlCommand::Poll { session },
        ];
        for command in commands {
            let result = Manager::process_command(command, &shared, &mut sessions);
            assert!(matches!(result, ControlResult::Ok), "{:?}", result);
        }

        let result =
            Manager::process_command(ControlCommand::GetDeviceState { session, size: 80 }, &shared, &mut sessions);
        let ControlResult::State(state) = result else {
            panic!("unexpected result {:?}", result);
        };
        assert_eq!(&state[0..4], &65535i32.to_le_bytes());
    }
}
