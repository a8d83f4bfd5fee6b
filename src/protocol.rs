//! Line-delimited JSON messages exchanged over the control socket.

use crate::assignment::AssignmentInfo;
use crate::dinput::{
    DataFormat, DeviceCaps, DeviceClass, DeviceGuid, DeviceInstance, ObjectInstance, Property, PropertyTarget,
    PropertyValue,
};
use crate::error::DirectInputError;
use crate::input::DeviceInputs;
use serde::{Deserialize, Serialize};

/// Identifies a device created on one connection
pub type SessionId = u64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ControlCommand {
    Ping,
    EnumDevices {
        class: DeviceClass,
        flags: u32,
    },
    CreateDevice {
        guid: DeviceGuid,
    },
    DestroyDevice {
        session: SessionId,
    },
    GetCapabilities {
        session: SessionId,
    },
    GetDeviceInfo {
        session: SessionId,
    },
    EnumObjects {
        session: SessionId,
        filter: u32,
    },
    SetDataFormat {
        session: SessionId,
        format: DataFormat,
    },
    SetCooperativeLevel {
        session: SessionId,
        flags: u32,
    },
    Acquire {
        session: SessionId,
    },
    Unacquire {
        session: SessionId,
    },
    GetProperty {
        session: SessionId,
        property: Property,
        target: PropertyTarget,
    },
    SetProperty {
        session: SessionId,
        property: Property,
        target: PropertyTarget,
        value: PropertyValue,
    },
    Poll {
        session: SessionId,
    },
    GetDeviceState {
        session: SessionId,
        size: usize,
    },
    /// Feed source only
    SubmitInputs {
        index: usize,
        inputs: DeviceInputs,
    },
    /// Physical source only
    ListAssignments,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ControlResult {
    Pong,
    Devices(Vec<DeviceInstance>),
    DeviceCreated { session: SessionId },
    DeviceDestroyed,
    Capabilities(DeviceCaps),
    DeviceInfo(DeviceInstance),
    Objects(Vec<ObjectInstance>),
    Ok,
    Property(PropertyValue),
    State(Vec<u8>),
    Assignments(Vec<AssignmentInfo>),
    /// The emulated call failed the way the API reports it
    Error(DirectInputError),
    /// The request could not be served at all
    Failure { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlMessage {
    pub id: String,
    pub command: ControlCommand,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlResponse {
    pub id: String,
    pub result: ControlResult,
}
