use crate::cache::{CacheError, ModelKey, RenderModelCache};
use crate::gpu::GpuBackend;
use rigview_common::{DeviceIndex, MAX_TRACKED_DEVICES};
use rigview_runtime::{DeviceEvent, DeviceProperty, ModelLoader, TrackingSystem};

/// Fixed-size per-device slot table: which render model represents each
/// tracked device, and whether the device is currently render-eligible.
///
/// A slot is populated only after a successful load. Several slots may hold
/// the same [`ModelKey`] when devices share a model.
#[derive(Debug)]
pub struct DeviceModels {
    slots: [Option<ModelKey>; MAX_TRACKED_DEVICES],
    visible: [bool; MAX_TRACKED_DEVICES],
}

impl Default for DeviceModels {
    fn default() -> Self {
        Self {
            slots: [None; MAX_TRACKED_DEVICES],
            visible: [false; MAX_TRACKED_DEVICES],
        }
    }
}

impl DeviceModels {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache key assigned to a device, if its model loaded.
    pub fn model_for(&self, device: DeviceIndex) -> Option<ModelKey> {
        if !device.in_bounds() {
            return None;
        }
        self.slots[device.as_usize()]
    }

    pub fn is_visible(&self, device: DeviceIndex) -> bool {
        device.in_bounds() && self.visible[device.as_usize()]
    }

    /// Devices that currently have a model and are visible, in index order.
    pub fn renderable(&self) -> impl Iterator<Item = (DeviceIndex, ModelKey)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(move |(i, slot)| {
                let key = (*slot)?;
                self.visible[i].then_some((DeviceIndex(i as u32), key))
            })
    }

    /// Look up the device's render-model name and bind the loaded model to
    /// its slot. Invoked for every connected device at startup and again on
    /// each activation event.
    ///
    /// Out-of-range indices are a no-op. Load failures leave the slot empty
    /// and are logged with the device's tracking-system name; the device is
    /// simply not rendered this session. Only a fatal cache error (capacity
    /// exhaustion) is returned to the caller.
    pub fn assign(
        &mut self,
        device: DeviceIndex,
        system: &dyn TrackingSystem,
        cache: &mut RenderModelCache,
        loader: &mut dyn ModelLoader,
        gpu: &mut dyn GpuBackend,
    ) -> Result<(), CacheError> {
        if !device.in_bounds() {
            tracing::debug!(%device, "ignoring out-of-range device index");
            return Ok(());
        }

        let model_name = match system.device_property(device, DeviceProperty::RenderModelName) {
            Ok(name) => name,
            Err(err) => {
                tracing::warn!(%device, error = %err, "device has no render model name");
                return Ok(());
            }
        };

        match cache.find_or_load(&model_name, loader, gpu) {
            Ok(key) => {
                self.slots[device.as_usize()] = Some(key);
                self.visible[device.as_usize()] = true;
                tracing::debug!(%device, model = %model_name, "render model assigned");
                Ok(())
            }
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                let tracking_system = system
                    .device_property(device, DeviceProperty::TrackingSystemName)
                    .unwrap_or_else(|_| "unknown".to_owned());
                tracing::warn!(
                    %device,
                    model = %model_name,
                    tracking_system = %tracking_system,
                    error = %err,
                    "unable to load render model for tracked device"
                );
                Ok(())
            }
        }
    }

    /// Startup sweep: assign every already-connected device. The HMD slot is
    /// skipped; it has no visible model of its own.
    pub fn setup_all(
        &mut self,
        system: &dyn TrackingSystem,
        cache: &mut RenderModelCache,
        loader: &mut dyn ModelLoader,
        gpu: &mut dyn GpuBackend,
    ) -> Result<(), CacheError> {
        for i in 1..MAX_TRACKED_DEVICES {
            let device = DeviceIndex(i as u32);
            if !system.is_device_connected(device) {
                continue;
            }
            self.assign(device, system, cache, loader, gpu)?;
        }
        Ok(())
    }

    /// React to one device lifecycle event. Activation triggers a fresh
    /// assignment; deactivation and update are logged only.
    pub fn handle_event(
        &mut self,
        event: DeviceEvent,
        system: &dyn TrackingSystem,
        cache: &mut RenderModelCache,
        loader: &mut dyn ModelLoader,
        gpu: &mut dyn GpuBackend,
    ) -> Result<(), CacheError> {
        match event {
            DeviceEvent::Activated(device) => {
                tracing::info!(%device, "device attached, setting up render model");
                self.assign(device, system, cache, loader, gpu)
            }
            DeviceEvent::Deactivated(device) => {
                tracing::info!(%device, "device detached");
                Ok(())
            }
            DeviceEvent::Updated(device) => {
                tracing::debug!(%device, "device updated");
                Ok(())
            }
        }
    }

    /// Per-frame input sweep: a controller with any button held is hidden
    /// for the frame.
    pub fn refresh_visibility(&mut self, system: &dyn TrackingSystem) {
        for i in 0..MAX_TRACKED_DEVICES {
            if let Some(state) = system.controller_state(DeviceIndex(i as u32)) {
                self.visible[i] = self.slots[i].is_some() && !state.any_button_held();
            }
        }
    }
}
