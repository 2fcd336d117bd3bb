use crate::SystemControl;

pub const REG_IE: usize = 0x200;
pub const REG_IF: usize = 0x202;
pub const REG_IME: usize = 0x208;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Interrupt: u16 {
        const VBLANK  = 0b0000_0000_0000_0001;
        const HBLANK  = 0b0000_0000_0000_0010;
        const VCOUNT  = 0b0000_0000_0000_0100;
        const TIMER0  = 0b0000_0000_0000_1000;
        const TIMER1  = 0b0000_0000_0001_0000;
        const TIMER2  = 0b0000_0000_0010_0000;
        const TIMER3  = 0b0000_0000_0100_0000;
        const SERIAL  = 0b0000_0000_1000_0000;
        const DMA0    = 0b0000_0001_0000_0000;
        const DMA1    = 0b0000_0010_0000_0000;
        const DMA2    = 0b0000_0100_0000_0000;
        const DMA3    = 0b0000_1000_0000_0000;
        const KEYPAD  = 0b0001_0000_0000_0000;
        const GAMEPAK = 0b0010_0000_0000_0000;
    }
}

impl Interrupt {
    /// Interrupt source for overflow of timer `id`
    #[inline]
    pub fn timer(id: usize) -> Interrupt {
        assert!(id < 4, "no such timer: {}", id);
        Interrupt::from_bits_truncate(Interrupt::TIMER0.bits() << id)
    }
}

/// Latches raised interrupt sources until the CPU acknowledges them through IF.
pub struct InterruptController {
    pub enable: Interrupt,
    pub pending: Interrupt,
    pub master_enable: bool,
}

impl SystemControl for InterruptController {
    fn reset(&mut self) {
        self.enable = Interrupt::empty();
        self.pending = Interrupt::empty();
        self.master_enable = false;
    }
}

impl InterruptController {
    pub fn new() -> Self {
        Self {
            enable: Interrupt::empty(),
            pending: Interrupt::empty(),
            master_enable: false,
        }
    }

    #[inline]
    pub fn raise(&mut self, source: Interrupt) {
        self.pending.insert(source);
    }

    /// True if the CPU should take an interrupt
    #[inline]
    pub fn irq_active(&self) -> bool {
        self.master_enable && self.enable.intersects(self.pending)
    }

    pub fn read_register(&self, addr: usize) -> u8 {
        match addr {
            0x200 => self.enable.bits() as u8,
            0x201 => (self.enable.bits() >> 8) as u8,
            0x202 => self.pending.bits() as u8,
            0x203 => (self.pending.bits() >> 8) as u8,
            0x208 => self.master_enable as u8,
            _ => 0,
        }
    }

    pub fn write_register(&mut self, addr: usize, byte: u8) {
        match addr {
            0x200 => {
                let bits = (self.enable.bits() & 0xFF00) | byte as u16;
                self.enable = Interrupt::from_bits_truncate(bits);
            }
            0x201 => {
                let bits = (self.enable.bits() & 0x00FF) | ((byte as u16) << 8);
                self.enable = Interrupt::from_bits_truncate(bits);
            }
            // writing 1 acknowledges
            0x202 => self.pending.remove(Interrupt::from_bits_truncate(byte as u16)),
            0x203 => self.pending.remove(Interrupt::from_bits_truncate((byte as u16) << 8)),
            0x208 => self.master_enable = byte & 0x01 != 0,
            _ => {}
        }
    }
}
