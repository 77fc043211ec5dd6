//! The device: owner of the native driver, the state registries, the frame
//! lifecycle and the ordered registry of outstanding deferred command lists.
//!
//! Threading model in one paragraph: any number of threads may record into
//! their own deferred lists concurrently; each recording holds the
//! submission gate in shared mode between `begin()` and `end()`. The flush
//! in [`Device::end_frame`] takes the gate exclusively, so it can never
//! observe a half-recorded list, then replays every finished buffer onto the
//! immediate queue in ascending draw order. Registry mutation (`insert` /
//! `remove`) is serialized by its own short-lived mutex and is independent
//! of the gate.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};

use tracing::{debug, info, warn};

use vitric_driver::{
    DriverCreateOptions, DriverDevice, DriverError, DriverFactory, FeatureTier,
};

use crate::command_list::{CommandList, CommandListDesc, DrawOrder};
use crate::error::{RenderError, RenderResult};
use crate::state::{
    BlendPreset, DepthStencilPreset, RasterizerPreset, SamplerPreset, StateRegistry,
};
use crate::stats::DeviceStats;
use crate::upload::ScratchArena;

/// Scratch arena budget per device. Reservations are per-frame; see
/// `upload.rs`.
const SCRATCH_CAPACITY: u64 = 4 * 1024 * 1024;

/// Driver validation verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugLevel {
    #[default]
    None,
    Normal,
    Max,
}

/// Device-init configuration.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub minimum_feature_tier: FeatureTier,
    pub debug_level: DebugLevel,
    /// Request deferred-context support from the driver.
    pub multithreaded: bool,
    pub use_software_emulation: bool,
    pub debug_name: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            minimum_feature_tier: FeatureTier::Level10_0,
            debug_level: DebugLevel::None,
            multithreaded: true,
            use_software_emulation: false,
            debug_name: String::from("vitric-device"),
        }
    }
}

/// Capability snapshot taken at creation; immutable afterwards.
#[derive(Debug, Clone, Copy)]
pub struct DeviceCaps {
    pub feature_tier: FeatureTier,
    /// Deferred contexts available AND requested.
    pub deferred_contexts: bool,
    pub software_emulation: bool,
    pub debug_layer: bool,
}

/// The frame-window lock: many concurrent recorders XOR one exclusive flush.
///
/// A pending flush blocks new recorders, so a steady stream of recordings
/// cannot starve `end_frame`.
#[derive(Debug, Default)]
pub(crate) struct SubmissionGate {
    state: Mutex<GateState>,
    cond: Condvar,
}

#[derive(Debug, Default)]
struct GateState {
    active_recorders: u32,
    flush_pending: bool,
    flushing: bool,
}

impl SubmissionGate {
    /// Shared acquire: admit a recorder once no flush is running or queued.
    pub(crate) fn block_submission(&self) {
        let mut state = self.state.lock().unwrap();
        while state.flushing || state.flush_pending {
            state = self.cond.wait(state).unwrap();
        }
        state.active_recorders += 1;
    }

    /// Shared release.
    pub(crate) fn unblock_submission(&self) {
        let mut state = self.state.lock().unwrap();
        debug_assert!(state.active_recorders > 0);
        state.active_recorders = state.active_recorders.saturating_sub(1);
        self.cond.notify_all();
    }

    /// Exclusive acquire: wait out active recorders, then hold the window.
    pub(crate) fn begin_flush(&self) {
        let mut state = self.state.lock().unwrap();
        while state.flushing || state.flush_pending {
            state = self.cond.wait(state).unwrap();
        }
        state.flush_pending = true;
        while state.active_recorders > 0 {
            state = self.cond.wait(state).unwrap();
        }
        state.flush_pending = false;
        state.flushing = true;
    }

    /// Exclusive release.
    pub(crate) fn end_flush(&self) {
        let mut state = self.state.lock().unwrap();
        state.flushing = false;
        self.cond.notify_all();
    }
}

/// State shared between the device, its command lists and its resources.
pub(crate) struct DeviceShared {
    pub(crate) driver: Arc<dyn DriverDevice>,
    pub(crate) caps: DeviceCaps,
    pub(crate) name: String,
    pub(crate) frame_id: AtomicU64,
    pub(crate) gate: SubmissionGate,
    /// Outstanding deferred lists, kept sorted by ascending draw order.
    pub(crate) registry: Mutex<Vec<Weak<CommandList>>>,
    pub(crate) stats: DeviceStats,
    pub(crate) scratch: ScratchArena,
    /// Windows currently bound to a presentation surface.
    pub(crate) bound_windows: Mutex<HashSet<u64>>,
    pub(crate) blend: StateRegistry<BlendPreset>,
    pub(crate) rasterizer: StateRegistry<RasterizerPreset>,
    pub(crate) depth_stencil: StateRegistry<DepthStencilPreset>,
    pub(crate) samplers: StateRegistry<SamplerPreset>,
}

impl Drop for DeviceShared {
    fn drop(&mut self) {
        let driver = Arc::clone(&self.driver);
        self.blend.deinitialize(driver.as_ref());
        self.rasterizer.deinitialize(driver.as_ref());
        self.depth_stencil.deinitialize(driver.as_ref());
        self.samplers.deinitialize(driver.as_ref());
    }
}

/// The rendering device. Sole owner of the native driver context.
///
/// Dependent resources hold shared references into the device; tear them
/// down before the device, in reverse dependency order.
pub struct Device {
    shared: Arc<DeviceShared>,
    immediate: Arc<CommandList>,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.shared.name)
            .field("caps", &self.shared.caps)
            .finish_non_exhaustive()
    }
}

impl Device {
    /// Create a device through `factory` per `config`.
    ///
    /// A debug-layer failure degrades to a non-debug device with a warning;
    /// a capability tier below `config.minimum_feature_tier` is an error.
    pub fn create(factory: &dyn DriverFactory, config: &DeviceConfig) -> RenderResult<Device> {
        let mut options = DriverCreateOptions {
            debug: config.debug_level != DebugLevel::None,
            multithreaded: config.multithreaded,
            software: config.use_software_emulation,
            debug_name: config.debug_name.clone(),
        };

        let driver = match factory.create_device(&options) {
            Ok(driver) => driver,
            Err(DriverError::DebugLayerUnavailable) if options.debug => {
                warn!(
                    device = %config.debug_name,
                    "debug layer unavailable; continuing without driver validation"
                );
                options.debug = false;
                factory.create_device(&options)?
            }
            Err(err) => return Err(err.into()),
        };

        let tier = driver.feature_tier();
        if tier < config.minimum_feature_tier {
            return Err(RenderError::NotSupported(format!(
                "device tier {tier:?} is below the configured minimum {:?}",
                config.minimum_feature_tier
            )));
        }

        let caps = DeviceCaps {
            feature_tier: tier,
            deferred_contexts: config.multithreaded && driver.supports_deferred_contexts(),
            software_emulation: driver.is_software(),
            debug_layer: driver.debug_layer_enabled(),
        };

        let blend = StateRegistry::initialize(driver.as_ref())?;
        let rasterizer = StateRegistry::initialize(driver.as_ref())?;
        let depth_stencil = StateRegistry::initialize(driver.as_ref())?;
        let samplers = StateRegistry::initialize(driver.as_ref())?;

        let immediate_ctx = driver.take_immediate_context()?;

        let shared = Arc::new(DeviceShared {
            driver,
            caps,
            name: config.debug_name.clone(),
            frame_id: AtomicU64::new(0),
            gate: SubmissionGate::default(),
            registry: Mutex::new(Vec::new()),
            stats: DeviceStats::new(),
            scratch: ScratchArena::new(SCRATCH_CAPACITY),
            bound_windows: Mutex::new(HashSet::new()),
            blend,
            rasterizer,
            depth_stencil,
            samplers,
        });

        let immediate = CommandList::new(
            format!("{}/immediate", config.debug_name),
            DrawOrder::IMMEDIATE,
            Arc::clone(&shared),
            immediate_ctx,
        );

        info!(
            device = %config.debug_name,
            tier = ?caps.feature_tier,
            deferred = caps.deferred_contexts,
            software = caps.software_emulation,
            debug = caps.debug_layer,
            "device created"
        );
        Ok(Device { shared, immediate })
    }

    pub(crate) fn shared(&self) -> &Arc<DeviceShared> {
        &self.shared
    }

    pub fn caps(&self) -> DeviceCaps {
        self.shared.caps
    }

    pub fn stats(&self) -> &DeviceStats {
        &self.shared.stats
    }

    pub fn frame_id(&self) -> u64 {
        self.shared.frame_id.load(Ordering::Acquire)
    }

    /// The scratch arena for per-frame staged writes.
    pub fn scratch(&self) -> &ScratchArena {
        &self.shared.scratch
    }

    /// The one list that issues straight into the hardware queue. Drive it
    /// from the presentation thread only.
    pub fn immediate_command_list(&self) -> &Arc<CommandList> {
        &self.immediate
    }

    /// Create a deferred command list with the given name and draw order.
    /// The list is not registered for submission until [`Device::insert`].
    pub fn create_command_list(&self, desc: &CommandListDesc) -> RenderResult<Arc<CommandList>> {
        if desc.draw_order.is_immediate() {
            return Err(RenderError::InvalidArgument(format!(
                "draw order {} is reserved for the immediate list",
                desc.draw_order.0
            )));
        }
        if !self.shared.caps.deferred_contexts {
            return Err(RenderError::NotSupported(
                "deferred command lists are unavailable (driver support missing or \
                 multithreading not requested)"
                    .into(),
            ));
        }
        let ctx = self.shared.driver.create_deferred_context()?;
        debug!(list = %desc.name, order = desc.draw_order.0, "deferred command list created");
        Ok(CommandList::new(
            desc.name.clone(),
            desc.draw_order,
            Arc::clone(&self.shared),
            ctx,
        ))
    }

    /// Register `list` for replay at `end_frame`.
    ///
    /// Fails without mutating the registry when another registered list
    /// already carries the same draw order.
    pub fn insert(&self, list: &Arc<CommandList>) -> RenderResult<()> {
        if list.is_immediate() {
            return Err(RenderError::OperationNotPermitted(
                "the immediate list is always submitted; it cannot be registered".into(),
            ));
        }
        if !Arc::ptr_eq(&list.device, &self.shared) {
            return Err(RenderError::OperationNotPermitted(format!(
                "command list '{}' belongs to a different device",
                list.name()
            )));
        }

        let mut registry = self.shared.registry.lock().unwrap();
        // Entries whose owner dropped the list without removing it are dead
        // weight; clear them while we hold the lock anyway.
        registry.retain(|entry| entry.strong_count() > 0);

        let order = list.draw_order();
        let probe = registry.binary_search_by(|entry| match entry.upgrade() {
            Some(existing) => existing.draw_order().cmp(&order),
            None => std::cmp::Ordering::Less,
        });
        match probe {
            Ok(position) => {
                let holder = registry[position]
                    .upgrade()
                    .map(|l| l.name().to_string())
                    .unwrap_or_default();
                Err(RenderError::OperationNotPermitted(format!(
                    "duplicate draw order {}: already registered by '{holder}'",
                    order.0
                )))
            }
            Err(position) => {
                registry.insert(position, Arc::downgrade(list));
                Ok(())
            }
        }
    }

    /// Remove `list` from the registry by identity. Unregistered lists are
    /// ignored.
    pub fn remove(&self, list: &Arc<CommandList>) {
        let mut registry = self.shared.registry.lock().unwrap();
        registry.retain(|entry| {
            entry
                .upgrade()
                .map(|existing| !Arc::ptr_eq(&existing, list))
                .unwrap_or(false)
        });
    }

    /// Registered lists in replay order, for inspection and tests.
    pub fn registered_draw_orders(&self) -> Vec<DrawOrder> {
        let registry = self.shared.registry.lock().unwrap();
        registry
            .iter()
            .filter_map(|entry| entry.upgrade())
            .map(|list| list.draw_order())
            .collect()
    }

    /// Open the frame window: bump the frame id and recycle per-frame
    /// scratch.
    pub fn begin_frame(&self) -> RenderResult<u64> {
        let frame = self.shared.frame_id.fetch_add(1, Ordering::AcqRel) + 1;
        self.shared.scratch.reset();
        self.shared.stats.inc_frames_begun();
        Ok(frame)
    }

    /// Close the frame: replay every finished deferred list onto the
    /// immediate queue in ascending draw order.
    ///
    /// Lists still recording are waited out (the gate), lists without a
    /// finished buffer this frame are skipped, and each finished buffer is
    /// replayed exactly once.
    pub fn end_frame(&self) -> RenderResult<()> {
        self.shared.gate.begin_flush();
        let result = self.flush_locked();
        self.shared.gate.end_flush();
        if result.is_ok() {
            self.shared.stats.inc_frames_completed();
        }
        result
    }

    fn flush_locked(&self) -> RenderResult<()> {
        let lists: Vec<Arc<CommandList>> = {
            let registry = self.shared.registry.lock().unwrap();
            registry.iter().filter_map(|entry| entry.upgrade()).collect()
        };

        let mut replayed = 0u64;
        for list in lists {
            let Some(buffer) = list.take_finished() else {
                continue;
            };
            let mut ctx = self.immediate.ctx.lock().unwrap();
            ctx.execute(&buffer).map_err(RenderError::from)?;
            replayed += 1;
        }
        if replayed > 0 {
            self.shared.stats.add_deferred_replays(replayed);
            debug!(
                device = %self.shared.name,
                replayed,
                frame = self.frame_id(),
                "deferred lists replayed"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn gate_flush_waits_for_active_recorders() {
        let gate = Arc::new(SubmissionGate::default());
        gate.block_submission();

        let (tx, rx) = mpsc::channel();
        let flusher = {
            let gate = Arc::clone(&gate);
            std::thread::spawn(move || {
                gate.begin_flush();
                tx.send(()).unwrap();
                gate.end_flush();
            })
        };

        // The flush cannot start while a recorder holds the gate.
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        gate.unblock_submission();
        rx.recv_timeout(Duration::from_secs(5))
            .expect("flush proceeds once recorders drain");
        flusher.join().unwrap();
    }

    #[test]
    fn gate_pending_flush_blocks_new_recorders() {
        let gate = Arc::new(SubmissionGate::default());
        gate.block_submission();

        let flusher = {
            let gate = Arc::clone(&gate);
            std::thread::spawn(move || {
                gate.begin_flush();
                gate.end_flush();
            })
        };

        // Give the flusher time to queue up, then try to join as a second
        // recorder: we must wait until the flush completes.
        std::thread::sleep(Duration::from_millis(50));
        let recorder = {
            let gate = Arc::clone(&gate);
            std::thread::spawn(move || {
                gate.block_submission();
                gate.unblock_submission();
            })
        };

        gate.unblock_submission();
        flusher.join().unwrap();
        recorder.join().unwrap();
    }
}
