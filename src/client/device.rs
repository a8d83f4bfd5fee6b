use crate::client::{ClientInner, unexpected};
use crate::dinput::{DataFormat, DeviceCaps, DeviceInstance, ObjectInstance, Property, PropertyTarget, PropertyValue};
use crate::protocol::*;
use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

/// Session on a virtual device held by the manager.
///
/// Mirrors the device calls of the emulated API. The session is destroyed
/// when this handle is dropped.
pub struct RemoteDevice {
    client: Arc<ClientInner>,
    session: SessionId,
}

impl RemoteDevice {
    pub(crate) fn new(client: Arc<ClientInner>, session: SessionId) -> Self {
        Self { client, session }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    async fn expect_ok(&self, command: ControlCommand, request: &str) -> Result<()> {
        match self.client.send_command(command).await? {
            ControlResult::Ok => Ok(()),
            other => Err(unexpected(other, request)),
        }
    }

    pub async fn capabilities(&self) -> Result<DeviceCaps> {
        let session = self.session;
        match self.client.send_command(ControlCommand::GetCapabilities { session }).await? {
            ControlResult::Capabilities(caps) => Ok(caps),
            other => Err(unexpected(other, "GetCapabilities")),
        }
    }

    pub async fn device_info(&self) -> Result<DeviceInstance> {
        let session = self.session;
        match self.client.send_command(ControlCommand::GetDeviceInfo { session }).await? {
            ControlResult::DeviceInfo(info) => Ok(info),
            other => Err(unexpected(other, "GetDeviceInfo")),
        }
    }

    pub async fn enum_objects(&self, filter: u32) -> Result<Vec<ObjectInstance>> {
        let session = self.session;
        match self.client.send_command(ControlCommand::EnumObjects { session, filter }).await? {
            ControlResult::Objects(objects) => Ok(objects),
            other => Err(unexpected(other, "EnumObjects")),
        }
    }

    pub async fn set_data_format(&self, format: DataFormat) -> Result<()> {
        let session = self.session;
        self.expect_ok(ControlCommand::SetDataFormat { session, format }, "SetDataFormat")
            .await
    }

    pub async fn set_cooperative_level(&self, flags: u32) -> Result<()> {
        let session = self.session;
        self.expect_ok(ControlCommand::SetCooperativeLevel { session, flags }, "SetCooperativeLevel")
            .await
    }

    pub async fn acquire(&self) -> Result<()> {
        self.expect_ok(ControlCommand::Acquire { session: self.session }, "Acquire")
            .await
    }

    pub async fn unacquire(&self) -> Result<()> {
        self.expect_ok(ControlCommand::Unacquire { session: self.session }, "Unacquire")
            .await
    }

    pub async fn get_property(&self, property: Property, target: PropertyTarget) -> Result<PropertyValue> {
        let command = ControlCommand::GetProperty {
            session: self.session,
            property,
            target,
        };
        match self.client.send_command(command).await? {
            ControlResult::Property(value) => Ok(value),
            other => Err(unexpected(other, "GetProperty")),
        }
    }

    pub async fn set_property(&self, property: Property, target: PropertyTarget, value: PropertyValue) -> Result<()> {
        let command = ControlCommand::SetProperty {
            session: self.session,
            property,
            target,
            value,
        };
        self.expect_ok(command, "SetProperty").await
    }

    pub async fn poll(&self) -> Result<()> {
        self.expect_ok(ControlCommand::Poll { session: self.session }, "Poll")
            .await
    }

    /// Current state rendered into a `size` byte buffer
    pub async fn get_device_state(&self, size: usize) -> Result<Vec<u8>> {
        let session = self.session;
        match self.client.send_command(ControlCommand::GetDeviceState { session, size }).await? {
            ControlResult::State(state) => Ok(state),
            other => Err(unexpected(other, "GetDeviceState")),
        }
    }
}

impl Drop for RemoteDevice {
    fn drop(&mut self) {
        let client = Arc::clone(&self.client);
        let session = self.session;

        // Without a runtime the connection is going away anyway, and the
        // manager drops the session with it.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        handle.spawn(async move {
            let _ = client.send_command(ControlCommand::DestroyDevice { session }).await;
            debug!("Session {} destroyed", session);
        });
    }
}
