use crate::SystemControl;

/// Start timings a DMA channel can wait on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaOccasion {
    HBlank,
    VBlank,
    /// Video capture transfers (DMA3 special timing), lines 2..=161
    Video,
}

/// The DMA engine as seen from the PPU. Requests are delivered the moment
/// they are raised; servicing them is up to the implementor.
pub trait DmaDevice {
    fn request(&mut self, occasion: DmaOccasion);

    /// Video capture ends once line 162 is reached
    fn stop_video_transfer(&mut self);
}

/// Ignores every request, for running without a DMA engine
impl DmaDevice for () {
    fn request(&mut self, _occasion: DmaOccasion) {}

    fn stop_video_transfer(&mut self) {}
}

/// Records occasions in the order they were raised, for an engine that
/// drains them between calls to `Gba::run`.
pub struct DmaRequests {
    requests: Vec<DmaOccasion>,
    video_transfer_stopped: bool,
}

impl SystemControl for DmaRequests {
    fn reset(&mut self) {
        self.requests.clear();
        self.video_transfer_stopped = false;
    }
}

impl DmaDevice for DmaRequests {
    fn request(&mut self, occasion: DmaOccasion) {
        if occasion == DmaOccasion::Video {
            self.video_transfer_stopped = false;
        }

        self.requests.push(occasion);
    }

    fn stop_video_transfer(&mut self) {
        log::trace!("stopping video transfer DMA");
        self.video_transfer_stopped = true;
    }
}

impl DmaRequests {
    pub fn new() -> Self {
        Self {
            requests: Vec::new(),
            video_transfer_stopped: false,
        }
    }

    pub fn video_transfer_stopped(&self) -> bool {
        self.video_transfer_stopped
    }

    /// Hands all outstanding requests over to the DMA engine
    pub fn take(&mut self) -> Vec<DmaOccasion> {
        std::mem::take(&mut self.requests)
    }

    pub fn peek(&self) -> &[DmaOccasion] {
        &self.requests
    }
}
