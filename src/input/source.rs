use super::{AxisType, ButtonType, DeviceInputs, Hat, HatType};
use crate::error::{DirectInputError, Result};
use parking_lot::{Mutex, RwLock};
use tracing::trace;

/// Provider of normalized gamepad state, indexed by virtual device
pub trait InputSource: Send + Sync {
    /// Number of virtual devices this source serves
    fn device_count(&self) -> usize;

    /// Refresh every device's snapshot
    fn update(&self);

    /// Refresh one device's snapshot, leaving the others untouched
    fn update_device(&self, index: usize) {
        let _ = index;
        self.update();
    }

    /// Latest snapshot for a device, `None` when the index is out of range
    fn inputs(&self, index: usize) -> Option<DeviceInputs>;

    /// Report, once, that the device's physical input went away since the
    /// last call.
    fn take_input_lost(&self, _index: usize) -> bool {
        false
    }

    fn axis(&self, index: usize, axis: AxisType) -> f32 {
        self.inputs(index).unwrap_or_default().axis(axis)
    }

    fn button(&self, index: usize, button: ButtonType) -> bool {
        self.inputs(index).unwrap_or_default().button(button)
    }

    fn hat(&self, index: usize, hat: HatType) -> Hat {
        self.inputs(index).unwrap_or_default().hat(hat)
    }
}

/// Source fed by clients over the control socket.
///
/// Submitted frames are staged and only become visible on the next
/// [`InputSource::update`], so a session sees a stable snapshot between
/// polls.
pub struct FeedSource {
    staged: Mutex<Vec<DeviceInputs>>,
    published: RwLock<Vec<DeviceInputs>>,
}

impl FeedSource {
    pub fn new(device_count: usize) -> Self {
        Self {
            staged: Mutex::new(vec![DeviceInputs::default(); device_count]),
            published: RwLock::new(vec![DeviceInputs::default(); device_count]),
        }
    }

    pub fn submit(&self, index: usize, inputs: DeviceInputs) -> Result<()> {
        let mut staged = self.staged.lock();
        let slot = staged.get_mut(index).ok_or_else(|| {
            DirectInputError::DeviceNotRegistered(format!("virtual device {}", index))
        })?;
        *slot = inputs;
        trace!("Staged inputs for device {}", index);
        Ok(())
    }
}

impl InputSource for FeedSource {
    fn device_count(&self) -> usize {
        self.staged.lock().len()
    }

    fn update(&self) {
        let staged = self.staged.lock().clone();
        *self.published.write() = staged;
    }

    fn update_device(&self, index: usize) {
        let Some(staged) = self.staged.lock().get(index).copied() else {
            return;
        };
        if let Some(slot) = self.published.write().get_mut(index) {
            *slot = staged;
        }
    }

    fn inputs(&self, index: usize) -> Option<DeviceInputs> {
        self.published.read().get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_publishes_on_update() {
        let feed = FeedSource::new(2);
        let frame = DeviceInputs::default().with_button(ButtonType::South, true);
        feed.submit(1, frame).unwrap();

        assert!(!feed.button(1, ButtonType::South));
        feed.update();
        assert!(feed.button(1, ButtonType::South));
        assert!(!feed.button(0, ButtonType::South));
    }

    #[test]
    fn test_feed_publishes_single_device() {
        let feed = FeedSource::new(2);
        let frame = DeviceInputs::default().with_button(ButtonType::North, true);
        feed.submit(0, frame).unwrap();
        feed.submit(1, frame).unwrap();

        feed.update_device(1);
        assert!(feed.button(1, ButtonType::North));
        assert!(!feed.button(0, ButtonType::North));
        feed.update_device(7);
    }

    #[test]
    fn test_feed_rejects_unknown_device() {
        let feed = FeedSource::new(1);
        let err = feed.submit(3, DeviceInputs::default()).unwrap_err();
        assert!(matches!(err, DirectInputError::DeviceNotRegistered(_)));
        assert_eq!(feed.inputs(3), None);
        assert_eq!(feed.axis(3, AxisType::LeftStickX), 0.5);
    }
}
