//!
//! In-process display controller.
//!
//! `SoftVideoOut` models the parts of a console video-out stack the engine
//! depends on:
//! - one open port per bus
//! - a bounded direct-memory pool with alignment rules and host-backed mappings
//! - batched scan-out buffer registration validated against live mappings
//! - a FIFO of submitted flips retired on vblank according to the flip rate
//! - flip-completion events fanned out to every registered event queue
//!
//! The vblank clock is either driven manually with [`SoftVideoOut::vblank`]
//! or by a background thread started with [`SoftVideoOut::with_vsync`].
//! Any single step can be made to fail once with
//! [`SoftVideoOut::fail_next`].
//!

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use super::{
    BufferAttribute, DirectMemoryOffset, FaultStage, FlipEvent, FlipMode, FlipQueueId,
    FlipStatus, MappedMemory, VideoBus, VideoHandle, VideoOut, VideoOutError, VideoOutResult,
};

/// Default direct-memory budget.
pub const DEFAULT_DIRECT_MEMORY_SIZE: usize = 0x4000_0000;

/// Registration status codes.
pub const STATUS_OK: i32 = 0;
pub const STATUS_INVALID_VALUE: i32 = -1;
pub const STATUS_INVALID_ADDRESS: i32 = -2;
pub const STATUS_SLOT_OCCUPIED: i32 = -3;
pub const STATUS_INVALID_HANDLE: i32 = -4;
pub const STATUS_FAULT: i32 = -5;

const VIRTUAL_BASE: u64 = 0x0002_0000_0000;

/// A flip as recorded at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedFlip {
    pub handle: VideoHandle,
    pub buffer_index: usize,
    pub flip_arg: i64,
}

#[derive(Debug)]
struct Port {
    bus: VideoBus,
    slots: BTreeMap<usize, u64>,
    flip_rate: u32,
    last_flip_vblank: Option<u64>,
    pending: VecDeque<(usize, i64)>,
    status: FlipStatus,
    queues: Vec<FlipQueueId>,
}

impl Port {
    fn new(bus: VideoBus) -> Self {
        Self {
            bus,
            slots: BTreeMap::new(),
            flip_rate: 0,
            last_flip_vblank: None,
            pending: VecDeque::new(),
            status: FlipStatus::default(),
            queues: Vec::new(),
        }
    }

    fn ready_for_flip(&self, vblank: u64) -> bool {
        match self.last_flip_vblank {
            Some(last) => vblank - last > u64::from(self.flip_rate),
            None => true,
        }
    }
}

#[derive(Debug)]
struct Queue {
    sender: Sender<FlipEvent>,
    receiver: Receiver<FlipEvent>,
}

#[derive(Debug, Clone, Copy)]
struct Mapping {
    base: u64,
    size: usize,
}

#[derive(Debug)]
struct DeviceState {
    next_handle: i32,
    next_queue: u32,
    next_mapping: u64,
    next_physical: u64,
    next_virtual: u64,
    direct_memory_size: usize,
    direct_memory_used: usize,
    ports: HashMap<i32, Port>,
    queues: HashMap<u32, Queue>,
    reservations: BTreeMap<u64, usize>,
    mappings: HashMap<u64, Mapping>,
    faults: HashSet<FaultStage>,
    submitted: Vec<SubmittedFlip>,
    vblank_count: u64,
}

impl DeviceState {
    fn new(direct_memory_size: usize) -> Self {
        Self {
            next_handle: 1,
            next_queue: 1,
            next_mapping: 1,
            next_physical: 0,
            next_virtual: VIRTUAL_BASE,
            direct_memory_size,
            direct_memory_used: 0,
            ports: HashMap::new(),
            queues: HashMap::new(),
            reservations: BTreeMap::new(),
            mappings: HashMap::new(),
            faults: HashSet::new(),
            submitted: Vec::new(),
            vblank_count: 0,
        }
    }

    fn take_fault(&mut self, stage: FaultStage) -> VideoOutResult<()> {
        if self.faults.remove(&stage) {
            log::debug!("soft video-out: injected fault at {:?}", stage);
            return Err(VideoOutError::Fault(stage));
        }
        Ok(())
    }

    fn port_mut(&mut self, handle: VideoHandle) -> VideoOutResult<&mut Port> {
        self.ports
            .get_mut(&handle.0)
            .ok_or(VideoOutError::InvalidHandle(handle))
    }

    fn address_is_mapped(&self, address: u64, len: usize) -> bool {
        self.mappings.values().any(|m| {
            address >= m.base
                && address
                    .checked_add(len as u64)
                    .is_some_and(|end| end <= m.base + m.size as u64)
        })
    }

    fn vblank(&mut self) {
        self.vblank_count += 1;
        let now = self.vblank_count;
        let mut events = Vec::new();

        for (&raw, port) in self.ports.iter_mut() {
            if port.pending.is_empty() || !port.ready_for_flip(now) {
                continue;
            }
            if let Some((buffer_index, flip_arg)) = port.pending.pop_front() {
                port.last_flip_vblank = Some(now);
                port.status.count += 1;
                port.status.flip_arg = flip_arg;
                port.status.current_buffer = Some(buffer_index);
                port.status.pending = port.pending.len();
                let event = FlipEvent {
                    handle: VideoHandle(raw),
                    flip_arg: Some(flip_arg),
                };
                events.extend(port.queues.iter().map(|q| (*q, event)));
            }
        }

        for (queue, event) in events {
            if let Some(q) = self.queues.get(&queue.0) {
                // Unbounded, and the queue holds its own receiver.
                let _ = q.sender.send(event);
            }
        }
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<DeviceState>,
}

/// Host memory standing in for a direct-memory mapping.
struct SoftMapping {
    id: u64,
    base: u64,
    bytes: Vec<u8>,
    device: Weak<Shared>,
}

impl MappedMemory for SoftMapping {
    fn base_address(&self) -> u64 {
        self.base
    }

    fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl Drop for SoftMapping {
    fn drop(&mut self) {
        if let Some(shared) = self.device.upgrade() {
            shared.state.lock().mappings.remove(&self.id);
        }
    }
}

struct VsyncTicker {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for VsyncTicker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// In-process display controller.
pub struct SoftVideoOut {
    shared: Arc<Shared>,
    ticker: Option<VsyncTicker>,
}

impl Default for SoftVideoOut {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftVideoOut {
    /// Controller with a manual vblank clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_direct_memory_size(DEFAULT_DIRECT_MEMORY_SIZE)
    }

    /// Controller with a manual vblank clock and a custom direct-memory budget.
    #[must_use]
    pub fn with_direct_memory_size(size: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(DeviceState::new(size)),
            }),
            ticker: None,
        }
    }

    /// Controller whose vblank fires every `period` on a background thread.
    ///
    /// # Errors
    /// Returns an error if the clock thread cannot be spawned.
    pub fn with_vsync(period: Duration) -> std::io::Result<Self> {
        let mut device = Self::new();
        device.start_vsync(period)?;
        Ok(device)
    }

    /// Start the background vblank clock. Replaces a running one.
    ///
    /// # Errors
    /// Returns an error if the clock thread cannot be spawned.
    pub fn start_vsync(&mut self, period: Duration) -> std::io::Result<()> {
        self.ticker = None;
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let weak = Arc::downgrade(&self.shared);

        let thread = thread::Builder::new()
            .name("soft-vsync".to_string())
            .spawn(move || {
                while !thread_stop.load(Ordering::Acquire) {
                    thread::sleep(period);
                    match weak.upgrade() {
                        Some(shared) => shared.state.lock().vblank(),
                        None => break,
                    }
                }
            })?;

        self.ticker = Some(VsyncTicker {
            stop,
            thread: Some(thread),
        });
        Ok(())
    }

    /// Advance the clock by one vertical blank.
    pub fn vblank(&self) {
        self.shared.state.lock().vblank();
    }

    /// Make the next call at `stage` fail.
    pub fn fail_next(&self, stage: FaultStage) {
        self.shared.state.lock().faults.insert(stage);
    }

    /// Post an event unrelated to any flip.
    pub fn inject_event(&self, queue: FlipQueueId) -> VideoOutResult<()> {
        let state = self.shared.state.lock();
        let q = state
            .queues
            .get(&queue.0)
            .ok_or(VideoOutError::InvalidQueue(queue))?;
        q.sender
            .send(FlipEvent {
                handle: VideoHandle(0),
                flip_arg: None,
            })
            .map_err(|_| VideoOutError::Disconnected)
    }

    #[must_use]
    pub fn submitted_flips(&self) -> Vec<SubmittedFlip> {
        self.shared.state.lock().submitted.clone()
    }

    #[must_use]
    pub fn vblank_count(&self) -> u64 {
        self.shared.state.lock().vblank_count
    }

    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.shared.state.lock().ports.len()
    }

    #[must_use]
    pub fn live_queues(&self) -> usize {
        self.shared.state.lock().queues.len()
    }

    #[must_use]
    pub fn live_reservations(&self) -> usize {
        self.shared.state.lock().reservations.len()
    }

    #[must_use]
    pub fn live_mappings(&self) -> usize {
        self.shared.state.lock().mappings.len()
    }

    /// Bytes of direct memory currently reserved.
    #[must_use]
    pub fn direct_memory_used(&self) -> usize {
        self.shared.state.lock().direct_memory_used
    }

    /// Registered buffer addresses by slot for `handle`.
    #[must_use]
    pub fn registered_buffers(&self, handle: VideoHandle) -> Vec<u64> {
        self.shared
            .state
            .lock()
            .ports
            .get(&handle.0)
            .map(|p| p.slots.values().copied().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn flip_rate(&self, handle: VideoHandle) -> Option<u32> {
        self.shared
            .state
            .lock()
            .ports
            .get(&handle.0)
            .map(|p| p.flip_rate)
    }

    #[must_use]
    pub fn pending_flips(&self, handle: VideoHandle) -> usize {
        self.shared
            .state
            .lock()
            .ports
            .get(&handle.0)
            .map_or(0, |p| p.pending.len())
    }
}

impl VideoOut for SoftVideoOut {
    fn open(&self, bus: VideoBus) -> VideoOutResult<VideoHandle> {
        let mut state = self.shared.state.lock();
        state.take_fault(FaultStage::Open)?;
        if state.ports.values().any(|p| p.bus == bus) {
            return Err(VideoOutError::Busy);
        }
        let raw = state.next_handle;
        state.next_handle += 1;
        state.ports.insert(raw, Port::new(bus));
        log::debug!("soft video-out: opened {:?} as handle {}", bus, raw);
        Ok(VideoHandle(raw))
    }

    fn close(&self, handle: VideoHandle) {
        let mut state = self.shared.state.lock();
        match state.ports.remove(&handle.0) {
            Some(port) if !port.pending.is_empty() => log::warn!(
                "soft video-out: closing handle {} with {} pending flips",
                handle.0,
                port.pending.len()
            ),
            Some(_) => {}
            None => log::warn!("soft video-out: close of unknown handle {}", handle.0),
        }
    }

    fn create_flip_queue(&self, name: &str) -> VideoOutResult<FlipQueueId> {
        let mut state = self.shared.state.lock();
        state.take_fault(FaultStage::CreateQueue)?;
        let id = state.next_queue;
        state.next_queue += 1;
        let (sender, receiver) = channel::unbounded();
        state.queues.insert(id, Queue { sender, receiver });
        log::debug!("soft video-out: created queue {} ({})", id, name);
        Ok(FlipQueueId(id))
    }

    fn delete_flip_queue(&self, queue: FlipQueueId) {
        let mut state = self.shared.state.lock();
        state.queues.remove(&queue.0);
        for port in state.ports.values_mut() {
            port.queues.retain(|q| *q != queue);
        }
    }

    fn add_flip_event(&self, queue: FlipQueueId, handle: VideoHandle) -> VideoOutResult<()> {
        let mut state = self.shared.state.lock();
        state.take_fault(FaultStage::AddFlipEvent)?;
        if !state.queues.contains_key(&queue.0) {
            return Err(VideoOutError::InvalidQueue(queue));
        }
        let port = state.port_mut(handle)?;
        if !port.queues.contains(&queue) {
            port.queues.push(queue);
        }
        Ok(())
    }

    fn reserve_direct_memory(
        &self,
        size: usize,
        alignment: usize,
    ) -> VideoOutResult<DirectMemoryOffset> {
        let mut state = self.shared.state.lock();
        state.take_fault(FaultStage::ReserveMemory)?;
        if !alignment.is_power_of_two() {
            return Err(VideoOutError::InvalidAlignment(alignment));
        }
        let available = state.direct_memory_size - state.direct_memory_used;
        if size == 0 || size > available {
            return Err(VideoOutError::OutOfDirectMemory {
                requested: size,
                available,
            });
        }

        let align = alignment as u64;
        let offset = (state.next_physical + align - 1) & !(align - 1);
        state.next_physical = offset + size as u64;
        state.direct_memory_used += size;
        state.reservations.insert(offset, size);
        Ok(DirectMemoryOffset(offset))
    }

    fn map_direct_memory(
        &self,
        offset: DirectMemoryOffset,
        size: usize,
        alignment: usize,
    ) -> VideoOutResult<Box<dyn MappedMemory>> {
        let mut state = self.shared.state.lock();
        state.take_fault(FaultStage::MapMemory)?;
        if !alignment.is_power_of_two() {
            return Err(VideoOutError::InvalidAlignment(alignment));
        }
        let reserved = *state
            .reservations
            .get(&offset.0)
            .ok_or(VideoOutError::UnknownReservation(offset))?;
        if size > reserved {
            return Err(VideoOutError::MapFailed { size });
        }

        let align = alignment as u64;
        let base = (state.next_virtual + align - 1) & !(align - 1);
        state.next_virtual = base + size as u64;
        let id = state.next_mapping;
        state.next_mapping += 1;
        state.mappings.insert(id, Mapping { base, size });

        Ok(Box::new(SoftMapping {
            id,
            base,
            bytes: vec![0; size],
            device: Arc::downgrade(&self.shared),
        }))
    }

    fn release_direct_memory(&self, offset: DirectMemoryOffset, size: usize) {
        let mut state = self.shared.state.lock();
        match state.reservations.remove(&offset.0) {
            Some(reserved) => {
                if reserved != size {
                    log::warn!(
                        "soft video-out: release size {:#x} differs from reservation {:#x}",
                        size,
                        reserved
                    );
                }
                state.direct_memory_used -= reserved;
            }
            None => log::warn!("soft video-out: release of unknown reservation {:?}", offset),
        }
    }

    fn register_buffers(
        &self,
        handle: VideoHandle,
        start_index: usize,
        addresses: &[u64],
        attribute: &BufferAttribute,
    ) -> i32 {
        let mut state = self.shared.state.lock();
        if state.take_fault(FaultStage::RegisterBuffers).is_err() {
            return STATUS_FAULT;
        }
        if addresses.is_empty()
            || attribute.width == 0
            || attribute.height == 0
            || attribute.pitch_in_pixels < attribute.width
        {
            return STATUS_INVALID_VALUE;
        }

        let buffer_len = attribute.pitch_in_pixels as usize * attribute.height as usize * 4;
        if !addresses
            .iter()
            .all(|&a| state.address_is_mapped(a, buffer_len))
        {
            return STATUS_INVALID_ADDRESS;
        }

        let Some(port) = state.ports.get_mut(&handle.0) else {
            return STATUS_INVALID_HANDLE;
        };
        let slots = start_index..start_index + addresses.len();
        if slots.clone().any(|slot| port.slots.contains_key(&slot)) {
            return STATUS_SLOT_OCCUPIED;
        }
        for (slot, &address) in slots.zip(addresses) {
            port.slots.insert(slot, address);
        }
        STATUS_OK
    }

    fn unregister_buffers(&self, handle: VideoHandle, start_index: usize) {
        let mut state = self.shared.state.lock();
        if let Some(port) = state.ports.get_mut(&handle.0) {
            let _ = port.slots.split_off(&start_index);
        }
    }

    fn set_flip_rate(&self, handle: VideoHandle, rate: u32) -> VideoOutResult<()> {
        let mut state = self.shared.state.lock();
        if rate > 2 {
            log::warn!("soft video-out: flip rate {} clamped to 2", rate);
        }
        state.port_mut(handle)?.flip_rate = rate.min(2);
        Ok(())
    }

    fn submit_flip(
        &self,
        handle: VideoHandle,
        buffer_index: usize,
        mode: FlipMode,
        flip_arg: i64,
    ) -> VideoOutResult<()> {
        let mut state = self.shared.state.lock();
        state.take_fault(FaultStage::SubmitFlip)?;
        let port = state.port_mut(handle)?;
        if !port.slots.contains_key(&buffer_index) {
            return Err(VideoOutError::InvalidBuffer(buffer_index));
        }
        match mode {
            FlipMode::Vsync => port.pending.push_back((buffer_index, flip_arg)),
        }
        port.status.pending = port.pending.len();
        state.submitted.push(SubmittedFlip {
            handle,
            buffer_index,
            flip_arg,
        });
        Ok(())
    }

    fn flip_status(&self, handle: VideoHandle) -> VideoOutResult<FlipStatus> {
        let mut state = self.shared.state.lock();
        state.take_fault(FaultStage::FlipStatus)?;
        Ok(state.port_mut(handle)?.status)
    }

    fn wait_flip_event(&self, queue: FlipQueueId) -> VideoOutResult<FlipEvent> {
        let receiver = {
            let mut state = self.shared.state.lock();
            state.take_fault(FaultStage::WaitEvent)?;
            state
                .queues
                .get(&queue.0)
                .map(|q| q.receiver.clone())
                .ok_or(VideoOutError::InvalidQueue(queue))?
        };
        // Lock released: the vblank clock needs it to post the event.
        receiver.recv().map_err(|_| VideoOutError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_with_queue(dev: &SoftVideoOut) -> (VideoHandle, FlipQueueId) {
        let handle = dev.open(VideoBus::Main).unwrap();
        let queue = dev.create_flip_queue("test").unwrap();
        dev.add_flip_event(queue, handle).unwrap();
        (handle, queue)
    }

    fn register_two(dev: &SoftVideoOut, handle: VideoHandle) -> Box<dyn MappedMemory> {
        let offset = dev.reserve_direct_memory(0x1000, 0x1000).unwrap();
        let map = dev.map_direct_memory(offset, 0x1000, 0x1000).unwrap();
        let base = map.base_address();
        let attr = BufferAttribute::srgb(4, 4);
        assert_eq!(dev.register_buffers(handle, 0, &[base, base + 64], &attr), 0);
        map
    }

    #[test]
    fn test_second_open_on_same_bus_is_busy() {
        let dev = SoftVideoOut::new();
        let handle = dev.open(VideoBus::Main).unwrap();
        assert_eq!(dev.open(VideoBus::Main), Err(VideoOutError::Busy));
        assert!(dev.open(VideoBus::Aux).is_ok());
        dev.close(handle);
        assert!(dev.open(VideoBus::Main).is_ok());
    }

    #[test]
    fn test_reserve_rejects_bad_alignment_and_overrun() {
        let dev = SoftVideoOut::with_direct_memory_size(0x4000);
        assert_eq!(
            dev.reserve_direct_memory(0x1000, 3),
            Err(VideoOutError::InvalidAlignment(3))
        );
        assert!(matches!(
            dev.reserve_direct_memory(0x8000, 0x1000),
            Err(VideoOutError::OutOfDirectMemory { .. })
        ));
        let off = dev.reserve_direct_memory(0x4000, 0x1000).unwrap();
        assert_eq!(dev.direct_memory_used(), 0x4000);
        dev.release_direct_memory(off, 0x4000);
        assert_eq!(dev.direct_memory_used(), 0);
        assert_eq!(dev.live_reservations(), 0);
    }

    #[test]
    fn test_mapping_is_aligned_and_unmapped_on_drop() {
        let dev = SoftVideoOut::new();
        let off = dev.reserve_direct_memory(0x20_0000, 0x20_0000).unwrap();
        let map = dev.map_direct_memory(off, 0x20_0000, 0x20_0000).unwrap();
        assert_eq!(map.base_address() % 0x20_0000, 0);
        assert_eq!(map.len(), 0x20_0000);
        assert!(map.as_slice().iter().all(|&b| b == 0));
        assert_eq!(dev.live_mappings(), 1);
        drop(map);
        assert_eq!(dev.live_mappings(), 0);
    }

    #[test]
    fn test_register_rejects_unmapped_address() {
        let dev = SoftVideoOut::new();
        let handle = dev.open(VideoBus::Main).unwrap();
        let attr = BufferAttribute::srgb(4, 4);
        assert_eq!(
            dev.register_buffers(handle, 0, &[0xdead_0000], &attr),
            STATUS_INVALID_ADDRESS
        );
        assert!(dev.registered_buffers(handle).is_empty());
    }

    #[test]
    fn test_register_rejects_address_at_top_of_range() {
        let dev = SoftVideoOut::new();
        let handle = dev.open(VideoBus::Main).unwrap();
        let off = dev.reserve_direct_memory(0x1000, 0x1000).unwrap();
        let _map = dev.map_direct_memory(off, 0x1000, 0x1000).unwrap();
        let attr = BufferAttribute::srgb(4, 4);
        assert_eq!(
            dev.register_buffers(handle, 0, &[u64::MAX - 8], &attr),
            STATUS_INVALID_ADDRESS
        );
        assert!(dev.registered_buffers(handle).is_empty());
    }

    #[test]
    fn test_register_fault_leaves_nothing_registered() {
        let dev = SoftVideoOut::new();
        let handle = dev.open(VideoBus::Main).unwrap();
        let off = dev.reserve_direct_memory(0x1000, 0x1000).unwrap();
        let map = dev.map_direct_memory(off, 0x1000, 0x1000).unwrap();
        dev.fail_next(FaultStage::RegisterBuffers);
        let attr = BufferAttribute::srgb(4, 4);
        assert_eq!(
            dev.register_buffers(handle, 0, &[map.base_address()], &attr),
            STATUS_FAULT
        );
        assert!(dev.registered_buffers(handle).is_empty());
    }

    #[test]
    fn test_register_slot_collision() {
        let dev = SoftVideoOut::new();
        let handle = dev.open(VideoBus::Main).unwrap();
        let map = register_two(&dev, handle);
        let attr = BufferAttribute::srgb(4, 4);
        assert_eq!(
            dev.register_buffers(handle, 1, &[map.base_address()], &attr),
            STATUS_SLOT_OCCUPIED
        );
        dev.unregister_buffers(handle, 0);
        assert!(dev.registered_buffers(handle).is_empty());
    }

    #[test]
    fn test_flip_retires_on_vblank_and_notifies_queue() {
        let dev = SoftVideoOut::new();
        let (handle, queue) = open_with_queue(&dev);
        let _map = register_two(&dev, handle);

        dev.submit_flip(handle, 1, FlipMode::Vsync, 7).unwrap();
        let status = dev.flip_status(handle).unwrap();
        assert_eq!(status.pending, 1);
        assert_eq!(status.count, 0);

        dev.vblank();
        let status = dev.flip_status(handle).unwrap();
        assert_eq!(status.flip_arg, 7);
        assert_eq!(status.current_buffer, Some(1));
        assert_eq!(status.pending, 0);

        let event = dev.wait_flip_event(queue).unwrap();
        assert_eq!(event.flip_arg, Some(7));
        assert_eq!(event.handle, handle);
    }

    #[test]
    fn test_flip_rate_spaces_out_flips() {
        let dev = SoftVideoOut::new();
        let (handle, _queue) = open_with_queue(&dev);
        let _map = register_two(&dev, handle);
        dev.set_flip_rate(handle, 1).unwrap();

        dev.submit_flip(handle, 0, FlipMode::Vsync, 1).unwrap();
        dev.submit_flip(handle, 1, FlipMode::Vsync, 2).unwrap();
        dev.vblank();
        assert_eq!(dev.flip_status(handle).unwrap().flip_arg, 1);
        dev.vblank();
        assert_eq!(dev.flip_status(handle).unwrap().flip_arg, 1);
        dev.vblank();
        assert_eq!(dev.flip_status(handle).unwrap().flip_arg, 2);
    }

    #[test]
    fn test_submit_unregistered_buffer_fails() {
        let dev = SoftVideoOut::new();
        let (handle, _queue) = open_with_queue(&dev);
        assert_eq!(
            dev.submit_flip(handle, 0, FlipMode::Vsync, 1),
            Err(VideoOutError::InvalidBuffer(0))
        );
    }

    #[test]
    fn test_inject_event_wakes_waiter() {
        let dev = SoftVideoOut::new();
        let (_handle, queue) = open_with_queue(&dev);
        dev.inject_event(queue).unwrap();
        assert_eq!(dev.wait_flip_event(queue).unwrap().flip_arg, None);
    }

    #[test]
    fn test_deleted_queue_reports_invalid() {
        let dev = SoftVideoOut::new();
        let (_handle, queue) = open_with_queue(&dev);
        dev.delete_flip_queue(queue);
        assert_eq!(dev.live_queues(), 0);
        assert_eq!(
            dev.wait_flip_event(queue),
            Err(VideoOutError::InvalidQueue(queue))
        );
    }

    #[test]
    fn test_vsync_thread_drives_flips() {
        let dev = SoftVideoOut::with_vsync(Duration::from_millis(1)).unwrap();
        let (handle, queue) = open_with_queue(&dev);
        let _map = register_two(&dev, handle);
        dev.submit_flip(handle, 0, FlipMode::Vsync, 3).unwrap();
        let event = dev.wait_flip_event(queue).unwrap();
        assert_eq!(event.flip_arg, Some(3));
        assert!(dev.vblank_count() >= 1);
    }
}
