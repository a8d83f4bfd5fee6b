//! vpad - DirectInput style virtual gamepads
//!
//! Serves a fixed pool of emulated game controllers through a DirectInput
//! shaped API: device and object enumeration, data format negotiation,
//! per-object properties and rendering of state into caller layouts. Input
//! comes either from physical controllers bound to the virtual devices or
//! from clients feeding state over the control socket.

pub mod assignment;
pub mod client;
pub mod config;
pub mod dinput;
pub mod error;
pub mod input;
pub mod manager;
pub mod physical;
pub mod protocol;
pub mod templates;

// Re-export commonly used types
pub use assignment::{AssignmentError, AssignmentInfo, AssignmentManager, RefreshOutcome, spawn_scanner};
pub use client::{RemoteDevice, VpadClient};
pub use config::Config;
pub use dinput::{
    Charset, DataFormat, DeviceClass, DeviceGuid, EmulatedDevice, EmulatedInput, Property, PropertyTarget,
    PropertyValue,
};
pub use error::DirectInputError;
pub use input::{AxisType, ButtonType, DeviceInputs, FeedSource, Hat, HatType, InputFilter, InputSource};
pub use manager::{Manager, SourceHandle};
pub use templates::{CatalogBuilder, CatalogTemplates, DeviceKind};
