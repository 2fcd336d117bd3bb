#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate bitflags;

mod bus;
mod dma;
mod gba;
mod interrupt;
mod ppu;
mod scheduler;
mod timer;
mod video;

pub use bus::SystemBus;
pub use dma::{DmaDevice, DmaOccasion, DmaRequests};
pub use gba::Gba;
pub use interrupt::{Interrupt, InterruptController};
pub use ppu::{Phase, Ppu, PpuBus};
pub use scheduler::{Event, Scheduler};
pub use timer::{Timer, TimerController};
pub use video::VideoDevice;

pub const DISPLAY_WIDTH: usize = 240;
pub const DISPLAY_HEIGHT: usize = 160;

/// Total number of scanlines, including the 68 lines of VBLANK
pub const TOTAL_SCANLINES: u32 = 228;

pub const CYCLES_PER_SCANLINE: u32 = 1232;
pub const CYCLES_PER_FRAME: u32 = CYCLES_PER_SCANLINE * TOTAL_SCANLINES;

pub trait SystemControl {
    fn reset(&mut self);
}
