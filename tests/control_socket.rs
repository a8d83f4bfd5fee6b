use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use vpad::client::direct_input_error;
use vpad::dinput::{ObjectGuid, didft};
use vpad::{
    AxisType, ButtonType, Charset, DataFormat, DeviceClass, DeviceGuid, DeviceInputs, DirectInputError, EmulatedInput,
    FeedSource, Hat, HatType, InputFilter, Manager, Property, PropertyTarget, PropertyValue, SourceHandle, VpadClient,
};

fn socket_path() -> PathBuf {
    std::env::temp_dir().join(format!("vpad-test-{}", ulid::Ulid::new()))
}

async fn start_manager(device_count: usize) -> (PathBuf, tokio::task::JoinHandle<()>) {
    let path = socket_path();
    let feed = Arc::new(FeedSource::new(device_count));
    let input = EmulatedInput::new(Charset::Wide, feed.clone(), InputFilter::default());
    let manager = Manager::new(&path, input, SourceHandle::Feed(feed)).unwrap();
    let task = tokio::spawn(async move {
        let _ = manager.run().await;
    });
    (path, task)
}

async fn connect(path: &PathBuf) -> VpadClient {
    for _ in 0..100 {
        if let Ok(client) = VpadClient::connect(path).await {
            return client;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("manager did not come up at {}", path.display());
}

#[tokio::test]
async fn test_feed_to_rendered_state() {
    let (path, task) = start_manager(2).await;
    let client = connect(&path).await;
    client.ping().await.unwrap();

    let pads = client.enum_devices(DeviceClass::GameController, 0).await.unwrap();
    assert_eq!(pads.len(), 2);
    assert_eq!(pads[1].instance_name.decode(), "VPad P2");

    let device = client.create_device(pads[1].instance).await.unwrap();
    let caps = device.capabilities().await.unwrap();
    assert_eq!((caps.axes, caps.buttons, caps.povs), (6, 14, 1));

    device.set_data_format(DataFormat::joystick()).await.unwrap();
    device.acquire().await.unwrap();

    let inputs = DeviceInputs::default()
        .with_axis(AxisType::LeftStickX, 0.75)
        .with_button(ButtonType::West, true)
        .with_hat(HatType::DPad, Hat::East);
    client.submit_inputs(1, inputs).await.unwrap();
    device.poll().await.unwrap();

    let state = device.get_device_state(80).await.unwrap();
    assert_eq!(state.len(), 80);
    assert_eq!(i32::from_le_bytes(state[0..4].try_into().unwrap()), 49151);
    assert_eq!(u32::from_le_bytes(state[32..36].try_into().unwrap()), 9000);
    assert_eq!(u32::from_le_bytes(state[36..40].try_into().unwrap()), 0xFFFF_FFFF);
    assert_eq!(state[48], 0x80);
    assert_eq!(state[49], 0);

    drop(device);
    task.abort();
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_errors_cross_the_socket() {
    let (path, task) = start_manager(1).await;
    let client = connect(&path).await;

    let Err(error) = client.create_device(DeviceGuid::Virtual(4)).await else {
        panic!("created a device past the end of the pool");
    };
    assert!(matches!(
        direct_input_error(&error),
        Some(DirectInputError::DeviceNotRegistered(_))
    ));

    let device = client.create_device(DeviceGuid::Virtual(0)).await.unwrap();
    let error = device.get_device_state(80).await.unwrap_err();
    assert!(matches!(direct_input_error(&error), Some(DirectInputError::InvalidParam(_))));

    let mut format = DataFormat::joystick();
    format.objects[0].guid = Some(ObjectGuid::Key);
    format.objects[0].type_bits = didft::BUTTON | didft::ANYINSTANCE;
    let error = device.set_data_format(format).await.unwrap_err();
    assert!(matches!(direct_input_error(&error), Some(DirectInputError::ObjectNotFound(_))));

    device.set_data_format(DataFormat::joystick()).await.unwrap();
    device
        .set_property(Property::DeadZone, PropertyTarget::ByOffset(0), PropertyValue::Dword(2500))
        .await
        .unwrap();
    let value = device
        .get_property(Property::DeadZone, PropertyTarget::ByOffset(0))
        .await
        .unwrap();
    assert_eq!(value, PropertyValue::Dword(2500));

    task.abort();
    let _ = std::fs::remove_file(&path);
}
