use crate::bus::SystemBus;
use crate::dma::DmaDevice;
use crate::ppu::Ppu;
use crate::scheduler::{Event, Scheduler};
use crate::video::VideoDevice;
use crate::SystemControl;

/// Display, timer and interrupt hardware on one timeline. The CPU core lives
/// outside and accesses memory through `cpu_*`; DMA occasions go straight to `dma`.
pub struct Gba<V: VideoDevice, D: DmaDevice> {
    scheduler: Scheduler,
    bus: SystemBus,
    ppu: Ppu,
    video: V,
    dma: D,
}

impl<V: VideoDevice, D: DmaDevice> SystemControl for Gba<V, D> {
    fn reset(&mut self) {
        log::debug!("resetting at cycle {}", self.scheduler.now());

        self.bus.reset();
        self.ppu.reset();
        self.ppu.start(&mut self.scheduler);
    }
}

impl<V: VideoDevice, D: DmaDevice> Gba<V, D> {
    pub fn new(video: V, dma: D) -> Self {
        let mut scheduler = Scheduler::new();
        let mut ppu = Ppu::new();
        ppu.start(&mut scheduler);

        Self {
            scheduler,
            bus: SystemBus::new(),
            ppu,
            video,
            dma,
        }
    }

    /// Moves the timeline forward by `cycles`, stopping at every due event
    /// so that each one fires on its exact cycle.
    pub fn run(&mut self, cycles: u32) {
        let mut remaining = cycles as u64;

        while remaining > 0 {
            let step = self
                .scheduler
                .cycles_until_next()
                .unwrap_or(remaining)
                .min(remaining);

            self.scheduler.advance(step as u32);
            self.bus.timers.run(step as u32, &mut self.bus.interrupts);
            self.dispatch();

            remaining -= step;
        }
    }

    fn dispatch(&mut self) {
        while let Some((event, late)) = self.scheduler.pop_due() {
            match event {
                Event::Ppu(phase) => self.ppu.handle_phase(
                    phase,
                    late,
                    &mut self.bus,
                    &mut self.scheduler,
                    &mut self.video,
                    &mut self.dma,
                ),
            }
        }
    }

    pub fn cpu_read_byte(&self, addr: u32) -> Option<u8> {
        self.bus.cpu_read_byte(addr)
    }

    pub fn cpu_read_half(&self, addr: u32) -> Option<u16> {
        self.bus.cpu_read_half(addr)
    }

    pub fn cpu_write_byte(&mut self, addr: u32, byte: u8) -> bool {
        self.bus.cpu_write_byte(addr, byte)
    }

    pub fn cpu_write_half(&mut self, addr: u32, half: u16) -> bool {
        self.bus.cpu_write_half(addr, half)
    }

    /// Master cycle count
    pub fn cycles(&self) -> u64 {
        self.scheduler.now()
    }

    pub fn bus(&self) -> &SystemBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut SystemBus {
        &mut self.bus
    }

    pub fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    pub fn video(&self) -> &V {
        &self.video
    }

    pub fn video_mut(&mut self) -> &mut V {
        &mut self.video
    }

    pub fn dma(&self) -> &D {
        &self.dma
    }

    pub fn dma_mut(&mut self) -> &mut D {
        &mut self.dma
    }
}
