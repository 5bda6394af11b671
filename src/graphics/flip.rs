//! Flip submission and completion tracking.
//!
//! A flip moves through two states only: submitted, then displayed once the
//! controller retires it at a vertical blank. There is no cancellation and
//! no timeout. `wait` polls the controller status and sleeps on the flip
//! event queue between polls; a wakeup that does not complete the awaited
//! flip just leads to another poll.

use std::sync::Arc;

use crate::graphics::error::{InitStage, SceneError, SceneResult};
use crate::graphics::videoout::{
    FlipMode, FlipQueueId, FlipStatus, VideoBus, VideoHandle, VideoOut, VideoOutError,
};

/// Name given to the flip event queue.
pub const FLIP_QUEUE_NAME: &str = "orbis2d flip queue";

/// Owner of the video-out handle and its flip event queue.
pub struct FlipController {
    device: Arc<dyn VideoOut>,
    handle: Option<VideoHandle>,
    queue: Option<FlipQueueId>,
    last_status: FlipStatus,
    wakeups: u64,
}

impl std::fmt::Debug for FlipController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlipController")
            .field("handle", &self.handle)
            .field("queue", &self.queue)
            .field("last_status", &self.last_status)
            .field("wakeups", &self.wakeups)
            .finish()
    }
}

impl FlipController {
    /// Open the main video-out port, create the flip queue and route flip
    /// events into it.
    ///
    /// # Errors
    /// `DeviceUnavailable` naming the failed step. Whatever was acquired
    /// before the failure is released again.
    pub fn open(device: Arc<dyn VideoOut>) -> SceneResult<Self> {
        let handle = device
            .open(VideoBus::Main)
            .map_err(|e| SceneError::unavailable(InitStage::OpenVideoOut, e))?;

        let queue = match device.create_flip_queue(FLIP_QUEUE_NAME) {
            Ok(queue) => queue,
            Err(e) => {
                device.close(handle);
                return Err(SceneError::unavailable(InitStage::CreateFlipQueue, e));
            }
        };

        if let Err(e) = device.add_flip_event(queue, handle) {
            device.delete_flip_queue(queue);
            device.close(handle);
            return Err(SceneError::unavailable(InitStage::AddFlipEvent, e));
        }

        log::debug!("flip controller: handle {} queue {}", handle.0, queue.0);
        Ok(Self {
            device,
            handle: Some(handle),
            queue: Some(queue),
            last_status: FlipStatus::default(),
            wakeups: 0,
        })
    }

    /// The open video-out handle, `None` once closed.
    #[must_use]
    pub const fn handle(&self) -> Option<VideoHandle> {
        self.handle
    }

    /// Status seen by the most recent poll.
    #[must_use]
    pub const fn last_status(&self) -> FlipStatus {
        self.last_status
    }

    /// Queue wakeups observed by `wait` so far, including unrelated ones.
    #[must_use]
    pub const fn wakeups(&self) -> u64 {
        self.wakeups
    }

    /// # Errors
    /// `DeviceLost` if the controller rejects the rate or the handle is closed.
    pub fn set_flip_rate(&self, rate: u32) -> SceneResult<()> {
        let handle = self.open_handle()?;
        self.device
            .set_flip_rate(handle, rate)
            .map_err(SceneError::DeviceLost)
    }

    /// Queue `buffer_index` for presentation at the next vsync, tagged with
    /// `flip_id`. Returns without waiting.
    ///
    /// # Errors
    /// `DeviceLost` if the controller refuses the flip.
    pub fn submit(&self, buffer_index: usize, flip_id: i64) -> SceneResult<()> {
        let handle = self.open_handle()?;
        log::trace!("submit flip {} for buffer {}", flip_id, buffer_index);
        self.device
            .submit_flip(handle, buffer_index, FlipMode::Vsync, flip_id)
            .map_err(SceneError::DeviceLost)
    }

    /// Block until the controller reports `flip_id` (or a later flip) as
    /// displayed. Returns at once if the handle is not open.
    ///
    /// # Errors
    /// `DeviceLost` if the status query or the queue wait fails.
    pub fn wait(&mut self, flip_id: i64) -> SceneResult<()> {
        let (Some(handle), Some(queue)) = (self.handle, self.queue) else {
            log::debug!("wait for flip {} without an open handle", flip_id);
            return Ok(());
        };

        loop {
            let status = self
                .device
                .flip_status(handle)
                .map_err(SceneError::DeviceLost)?;
            self.last_status = status;
            if status.flip_arg >= flip_id {
                return Ok(());
            }

            let event = self
                .device
                .wait_flip_event(queue)
                .map_err(SceneError::DeviceLost)?;
            self.wakeups += 1;
            if event.flip_arg != Some(flip_id) {
                log::trace!("flip {} still pending after {:?}", flip_id, event);
            }
        }
    }

    /// Delete the queue and close the handle.
    pub fn close(&mut self) {
        if let Some(queue) = self.queue.take() {
            self.device.delete_flip_queue(queue);
        }
        if let Some(handle) = self.handle.take() {
            self.device.close(handle);
            log::debug!("flip controller: closed handle {}", handle.0);
        }
    }

    fn open_handle(&self) -> SceneResult<VideoHandle> {
        self.handle
            .ok_or(SceneError::DeviceLost(VideoOutError::InvalidHandle(VideoHandle(0))))
    }
}

impl Drop for FlipController {
    fn drop(&mut self) {
        self.close();
    }
}
