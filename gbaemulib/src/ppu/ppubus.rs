use crate::interrupt::{Interrupt, InterruptController};
use crate::SystemControl;

use super::registers::{
    AffineParameters, BackgroundControl, BlendControl, DisplayControl, DisplayStatus, Mosaic,
    ReferencePoint, WindowRange,
};

pub const PPU_REG_START: usize = 0x000;
pub const PPU_REG_END: usize = 0x055;

pub const PRAM_SIZE: usize = 0x400;
pub const OAM_SIZE: usize = 0x400;
pub const VRAM_SIZE: usize = 0x18000;

/// Object palettes live in the upper half of palette RAM
pub const OBJ_PALETTE_START: usize = 0x200;

/// Object tiles live from here to the end of VRAM
pub const OBJ_VRAM_START: usize = 0x10000;

/// In bitmap modes the frame buffers also occupy the first OBJ tile block
pub const OBJ_VRAM_START_BITMAP: usize = 0x14000;

const VRAM_MIRROR_MASK: usize = 0x1FFFF;

#[inline]
fn write_i16_byte(value: &mut i16, index: usize, byte: u8) {
    let raw = *value as u16;
    *value = match index {
        0 => ((raw & 0xFF00) | byte as u16) as i16,
        _ => ((raw & 0x00FF) | ((byte as u16) << 8)) as i16,
    };
}

#[inline]
fn write_u16_byte(value: &mut u16, index: usize, byte: u8) {
    *value = match index {
        0 => (*value & 0xFF00) | byte as u16,
        _ => (*value & 0x00FF) | ((byte as u16) << 8),
    };
}

/// Display register bank plus palette RAM, VRAM and OAM, as seen by both the
/// CPU and the renderer.
pub struct PpuBus {
    pram: Vec<u8>,
    vram: Vec<u8>,
    oam: Vec<u8>,

    pub dispcnt: DisplayControl,
    pub green_swap: u16,
    pub dispstat: DisplayStatus,
    pub vcount: u16,

    pub bgcnt: [BackgroundControl; 4],
    pub bghofs: [u16; 4],
    pub bgvofs: [u16; 4],

    // affine state for BG2 and BG3
    pub bgx: [ReferencePoint; 2],
    pub bgy: [ReferencePoint; 2],
    pub affine: [AffineParameters; 2],

    pub winh: [WindowRange; 2],
    pub winv: [WindowRange; 2],
    /// Layer masks inside window 0 and window 1
    pub winin: [u8; 2],
    /// Layer masks outside all windows and inside the object window
    pub winout: [u8; 2],

    pub mosaic: Mosaic,

    pub bldcnt: BlendControl,
    pub eva: u8,
    pub evb: u8,
    pub evy: u8,
}

impl SystemControl for PpuBus {
    fn reset(&mut self) {
        self.pram.fill(0);
        self.vram.fill(0);
        self.oam.fill(0);

        self.dispcnt = DisplayControl::empty();
        self.green_swap = 0;
        self.dispstat = DisplayStatus::empty();
        self.vcount = 0;

        self.bgcnt = [BackgroundControl::default(); 4];
        self.bghofs = [0; 4];
        self.bgvofs = [0; 4];

        self.bgx = [ReferencePoint::default(); 2];
        self.bgy = [ReferencePoint::default(); 2];
        self.affine = [AffineParameters::default(); 2];

        self.winh = [WindowRange::default(); 2];
        self.winv = [WindowRange::default(); 2];
        self.winin = [0; 2];
        self.winout = [0; 2];

        self.mosaic = Mosaic::default();

        self.bldcnt = BlendControl::default();
        self.eva = 0;
        self.evb = 0;
        self.evy = 0;
    }
}

impl PpuBus {
    pub fn new() -> Self {
        Self {
            pram: vec![0; PRAM_SIZE],
            vram: vec![0; VRAM_SIZE],
            oam: vec![0; OAM_SIZE],

            dispcnt: DisplayControl::empty(),
            green_swap: 0,
            dispstat: DisplayStatus::empty(),
            vcount: 0,

            bgcnt: [BackgroundControl::default(); 4],
            bghofs: [0; 4],
            bgvofs: [0; 4],

            bgx: [ReferencePoint::default(); 2],
            bgy: [ReferencePoint::default(); 2],
            affine: [AffineParameters::default(); 2],

            winh: [WindowRange::default(); 2],
            winv: [WindowRange::default(); 2],
            winin: [0; 2],
            winout: [0; 2],

            mosaic: Mosaic::default(),

            bldcnt: BlendControl::default(),
            eva: 0,
            evb: 0,
            evy: 0,
        }
    }

    pub fn read_register(&self, addr: usize) -> u8 {
        let hi = addr & 0x01 != 0;
        let half = |value: u16| if hi { (value >> 8) as u8 } else { value as u8 };

        match addr {
            0x00..=0x01 => half(self.dispcnt.bits()),
            0x02..=0x03 => half(self.green_swap),
            0x04..=0x05 => half(self.dispstat.bits()),
            0x06..=0x07 => half(self.vcount),
            0x08..=0x0F => half(self.bgcnt[(addr - 0x08) >> 1].0),
            0x48..=0x49 => self.winin[addr & 0x01],
            0x4A..=0x4B => self.winout[addr & 0x01],
            0x50..=0x51 => self.bldcnt.read_byte(addr & 0x01),
            0x52 => self.eva,
            0x53 => self.evb,
            _ => 0 // write-only or unused
        }
    }

    pub fn write_register(&mut self, addr: usize, byte: u8) {
        let index = addr & 0x01;

        match addr {
            0x00..=0x01 => {
                let mut bits = self.dispcnt.bits();
                write_u16_byte(&mut bits, index, byte);

                // the CGB mode bit can only be set by the BIOS
                bits = (bits & !DisplayControl::CGB_MODE.bits())
                    | (self.dispcnt.bits() & DisplayControl::CGB_MODE.bits());

                self.write_display_control(DisplayControl::from_bits_retain(bits));
            },
            0x02..=0x03 => write_u16_byte(&mut self.green_swap, index, byte),
            0x04..=0x05 => {
                let mut bits = self.dispstat.bits();
                write_u16_byte(&mut bits, index, byte);

                let bits = (bits & DisplayStatus::CPU_WRITABLE)
                    | (self.dispstat.bits() & !DisplayStatus::CPU_WRITABLE);
                self.dispstat = DisplayStatus::from_bits_retain(bits);
            },
            0x06..=0x07 => log::trace!("ignoring write to VCOUNT: {:02X}", byte),
            0x08..=0x0F => {
                let bgcnt = &mut self.bgcnt[(addr - 0x08) >> 1];
                write_u16_byte(&mut bgcnt.0, index, byte);
                bgcnt.0 &= BackgroundControl::WRITABLE;
            },
            0x10..=0x1F => {
                let layer = (addr - 0x10) >> 2;
                let offset = if addr & 0x02 == 0 {
                    &mut self.bghofs[layer]
                } else {
                    &mut self.bgvofs[layer]
                };

                write_u16_byte(offset, index, byte);
                *offset &= 0x1FF;
            },
            0x20..=0x3F => {
                let layer = (addr - 0x20) >> 4;
                let params = &mut self.affine[layer];

                match addr & 0x0F {
                    0x0..=0x1 => write_i16_byte(&mut params.pa, index, byte),
                    0x2..=0x3 => write_i16_byte(&mut params.pb, index, byte),
                    0x4..=0x5 => write_i16_byte(&mut params.pc, index, byte),
                    0x6..=0x7 => write_i16_byte(&mut params.pd, index, byte),
                    0x8..=0xB => self.bgx[layer].write_byte(addr & 0x03, byte),
                    _ => self.bgy[layer].write_byte(addr & 0x03, byte),
                }
            },
            0x40..=0x47 => {
                let window = (addr >> 1) & 0x01;
                let range = if addr < 0x44 {
                    &mut self.winh[window]
                } else {
                    &mut self.winv[window]
                };

                // low byte is the end, high byte the start
                if index == 0 {
                    range.max = byte;
                } else {
                    range.min = byte;
                }
            },
            0x48..=0x49 => self.winin[index] = byte & 0x3F,
            0x4A..=0x4B => self.winout[index] = byte & 0x3F,
            0x4C..=0x4D => self.mosaic.write_byte(index, byte),
            0x50..=0x51 => self.bldcnt.write_byte(index, byte),
            0x52 => self.eva = byte & 0x1F,
            0x53 => self.evb = byte & 0x1F,
            0x54 => self.evy = byte & 0x1F,
            _ => {}
        }
    }

    fn write_display_control(&mut self, dispcnt: DisplayControl) {
        let mode_changed = dispcnt.mode() != self.dispcnt.mode();
        self.dispcnt = dispcnt;

        if mode_changed {
            log::debug!("display mode {}", dispcnt.mode());

            if dispcnt.uses_affine() {
                self.reload_affine();
            }
        }
    }

    /// Restarts both affine layers from their programmed reference points
    pub fn reload_affine(&mut self) {
        for layer in 0..2 {
            self.bgx[layer].reload();
            self.bgy[layer].reload();
        }
    }

    /// Steps the affine accumulators down one line, taking vertical BG mosaic
    /// into account. Expects the mosaic counter to have been advanced already.
    pub fn advance_affine(&mut self) {
        for layer in 0..2 {
            let params = self.affine[layer];

            if self.bgcnt[2 + layer].mosaic() {
                if self.mosaic.bg.counter_y == 0 {
                    let lines = self.mosaic.bg.size_y as i32;
                    self.bgx[layer].internal += params.pb as i32 * lines;
                    self.bgy[layer].internal += params.pd as i32 * lines;
                }
            } else {
                self.bgx[layer].internal += params.pb as i32;
                self.bgy[layer].internal += params.pd as i32;
            }
        }
    }

    /// Latches the V-count match flag, raising an interrupt only when a match begins
    pub fn check_vcount_irq(&mut self, irq: &mut InterruptController) {
        let matched = self.dispstat.vcount_setting() == self.vcount;

        if self.dispstat.contains(DisplayStatus::VCOUNT_IRQ)
            && !self.dispstat.contains(DisplayStatus::VCOUNT_FLAG)
            && matched
        {
            irq.raise(Interrupt::VCOUNT);
        }

        self.dispstat.set(DisplayStatus::VCOUNT_FLAG, matched);
    }

    #[inline]
    fn vram_index(addr: usize) -> usize {
        let index = addr & VRAM_MIRROR_MASK;

        // the last 32 KiB are mirrored into the gap up to 128 KiB
        if index >= VRAM_SIZE {
            index - 0x8000
        } else {
            index
        }
    }

    /// End of the region byte writes are allowed to hit
    #[inline]
    fn bg_vram_end(&self) -> usize {
        if self.dispcnt.mode() >= 3 {
            OBJ_VRAM_START_BITMAP
        } else {
            OBJ_VRAM_START
        }
    }

    pub fn read_pram(&self, addr: usize) -> u8 {
        self.pram[addr & (PRAM_SIZE - 1)]
    }

    pub fn read_vram(&self, addr: usize) -> u8 {
        self.vram[PpuBus::vram_index(addr)]
    }

    pub fn read_oam(&self, addr: usize) -> u8 {
        self.oam[addr & (OAM_SIZE - 1)]
    }

    pub fn write_pram_half(&mut self, addr: usize, half: u16) {
        let index = addr & (PRAM_SIZE - 2);
        self.pram[index] = half as u8;
        self.pram[index + 1] = (half >> 8) as u8;
    }

    pub fn write_vram_half(&mut self, addr: usize, half: u16) {
        let index = PpuBus::vram_index(addr) & !0x01;
        self.vram[index] = half as u8;
        self.vram[index + 1] = (half >> 8) as u8;
    }

    pub fn write_oam_half(&mut self, addr: usize, half: u16) {
        let index = addr & (OAM_SIZE - 2);
        self.oam[index] = half as u8;
        self.oam[index + 1] = (half >> 8) as u8;
    }

    /// Byte writes land in both halves of the addressed halfword
    pub fn write_pram_byte(&mut self, addr: usize, byte: u8) {
        self.write_pram_half(addr, u16::from_le_bytes([byte, byte]));
    }

    /// Byte writes to BG memory behave like palette RAM; OBJ memory ignores them
    pub fn write_vram_byte(&mut self, addr: usize, byte: u8) {
        if PpuBus::vram_index(addr) < self.bg_vram_end() {
            self.write_vram_half(addr, u16::from_le_bytes([byte, byte]));
        } else {
            log::trace!("ignoring byte write to OBJ VRAM: {:05X}", addr);
        }
    }

    pub fn write_oam_byte(&mut self, addr: usize, byte: u8) {
        log::trace!("ignoring byte write to OAM: {:03X} <- {:02X}", addr, byte);
    }

    /// BGR555 colour `index` (0-511) from palette RAM
    #[inline]
    pub fn palette_colour(&self, index: usize) -> u16 {
        let addr = index << 1;
        u16::from_le_bytes([self.pram[addr], self.pram[addr + 1]]) & 0x7FFF
    }

    #[inline]
    pub fn vram_byte(&self, index: usize) -> u8 {
        self.vram[index]
    }

    #[inline]
    pub fn vram_half(&self, index: usize) -> u16 {
        u16::from_le_bytes([self.vram[index], self.vram[index + 1]])
    }

    #[inline]
    pub fn oam_half(&self, index: usize) -> u16 {
        u16::from_le_bytes([self.oam[index], self.oam[index + 1]])
    }
}
