use crate::interrupt::{InterruptController, REG_IE, REG_IF, REG_IME};
use crate::ppu::{PpuBus, PPU_REG_END, PPU_REG_START};
use crate::timer::{TimerController, TIMER_REG_END, TIMER_REG_START};
use crate::SystemControl;

// top byte of the address selects the region
const IO_REGION: u32 = 0x04;
const PRAM_REGION: u32 = 0x05;
const VRAM_REGION: u32 = 0x06;
const OAM_REGION: u32 = 0x07;

const REGION_OFFSET_MASK: u32 = 0x00FF_FFFF;

// IE and IF are adjacent halfwords; IME stands alone
const IRQ_REG_END: usize = REG_IF + 1;
const IME_REG_END: usize = REG_IME + 1;

/// Memory map of the display, timer and interrupt hardware as the CPU sees it.
/// Addresses not handled here are left to the caller.
pub struct SystemBus {
    pub ppu_bus: PpuBus,
    pub interrupts: InterruptController,
    pub timers: TimerController,
}

impl SystemControl for SystemBus {
    fn reset(&mut self) {
        self.ppu_bus.reset();
        self.interrupts.reset();
        self.timers.reset();
    }
}

impl SystemBus {
    pub fn new() -> Self {
        Self {
            ppu_bus: PpuBus::new(),
            interrupts: InterruptController::new(),
            timers: TimerController::new(),
        }
    }

    fn io_read(&self, offset: usize) -> Option<u8> {
        match offset {
            PPU_REG_START..=PPU_REG_END => Some(self.ppu_bus.read_register(offset)),
            TIMER_REG_START..=TIMER_REG_END => Some(self.timers.read_register(offset)),
            REG_IE..=IRQ_REG_END | REG_IME..=IME_REG_END => Some(self.interrupts.read_register(offset)),
            _ => None
        }
    }

    fn io_write(&mut self, offset: usize, byte: u8) -> bool {
        match offset {
            PPU_REG_START..=PPU_REG_END => self.ppu_bus.write_register(offset, byte),
            TIMER_REG_START..=TIMER_REG_END => self.timers.write_register(offset, byte),
            REG_IE..=IRQ_REG_END | REG_IME..=IME_REG_END => self.interrupts.write_register(offset, byte),
            _ => return false
        }

        true
    }

    pub fn cpu_read_byte(&self, addr: u32) -> Option<u8> {
        let offset = (addr & REGION_OFFSET_MASK) as usize;

        match addr >> 24 {
            IO_REGION => self.io_read(offset),
            PRAM_REGION => Some(self.ppu_bus.read_pram(offset)),
            VRAM_REGION => Some(self.ppu_bus.read_vram(offset)),
            OAM_REGION => Some(self.ppu_bus.read_oam(offset)),
            _ => None
        }
    }

    pub fn cpu_read_half(&self, addr: u32) -> Option<u16> {
        let addr = addr & !0x01;
        let lo = self.cpu_read_byte(addr)?;
        let hi = self.cpu_read_byte(addr + 1)?;

        Some(u16::from_le_bytes([lo, hi]))
    }

    pub fn cpu_write_byte(&mut self, addr: u32, byte: u8) -> bool {
        let offset = (addr & REGION_OFFSET_MASK) as usize;

        match addr >> 24 {
            IO_REGION => return self.io_write(offset, byte),
            PRAM_REGION => self.ppu_bus.write_pram_byte(offset, byte),
            VRAM_REGION => self.ppu_bus.write_vram_byte(offset, byte),
            OAM_REGION => self.ppu_bus.write_oam_byte(offset, byte),
            _ => return false
        }

        true
    }

    pub fn cpu_write_half(&mut self, addr: u32, half: u16) -> bool {
        let addr = addr & !0x01;
        let offset = (addr & REGION_OFFSET_MASK) as usize;

        match addr >> 24 {
            IO_REGION => {
                let [lo, hi] = half.to_le_bytes();
                let lo_written = self.io_write(offset, lo);
                let hi_written = self.io_write(offset + 1, hi);
                return lo_written || hi_written;
            },
            PRAM_REGION => self.ppu_bus.write_pram_half(offset, half),
            VRAM_REGION => self.ppu_bus.write_vram_half(offset, half),
            OAM_REGION => self.ppu_bus.write_oam_half(offset, half),
            _ => return false
        }

        true
    }
}
