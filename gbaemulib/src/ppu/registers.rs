bitflags! {
    /// DISPCNT. Bits 0-2 hold the display mode and are kept alongside the flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DisplayControl: u16 {
        const MODE              = 0b0000000000000111;
        const CGB_MODE          = 0b0000000000001000;
        const FRAME_SELECT      = 0b0000000000010000;
        const HBLANK_OAM_ACCESS = 0b0000000000100000;
        const OBJ_MAPPING_1D    = 0b0000000001000000;
        const FORCED_BLANK      = 0b0000000010000000;
        const BG0               = 0b0000000100000000;
        const BG1               = 0b0000001000000000;
        const BG2               = 0b0000010000000000;
        const BG3               = 0b0000100000000000;
        const OBJ               = 0b0001000000000000;
        const WIN0              = 0b0010000000000000;
        const WIN1              = 0b0100000000000000;
        const OBJ_WIN           = 0b1000000000000000;
    }

    /// DISPSTAT. Bits 8-15 hold the V-count match setting.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DisplayStatus: u16 {
        const VBLANK_FLAG    = 0b0000000000000001;
        const HBLANK_FLAG    = 0b0000000000000010;
        const VCOUNT_FLAG    = 0b0000000000000100;
        const VBLANK_IRQ     = 0b0000000000001000;
        const HBLANK_IRQ     = 0b0000000000010000;
        const VCOUNT_IRQ     = 0b0000000000100000;
        const VCOUNT_SETTING = 0b1111111100000000;
    }
}

impl DisplayControl {
    #[inline]
    pub fn mode(&self) -> u16 {
        self.bits() & DisplayControl::MODE.bits()
    }

    #[inline]
    pub fn bg_enabled(&self, id: usize) -> bool {
        self.bits() & (DisplayControl::BG0.bits() << id) != 0
    }

    #[inline]
    pub fn any_window(&self) -> bool {
        self.intersects(DisplayControl::WIN0 | DisplayControl::WIN1 | DisplayControl::OBJ_WIN)
    }

    /// Modes where BG2 (and BG3 in mode 2) are drawn through the affine accumulators
    #[inline]
    pub fn uses_affine(&self) -> bool {
        matches!(self.mode(), 1..=5)
    }
}

impl DisplayStatus {
    // the three status flags are owned by the PPU, not by the CPU
    pub const CPU_WRITABLE: u16 = 0b1111111100111000;

    #[inline]
    pub fn vcount_setting(&self) -> u16 {
        self.bits() >> 8
    }
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackgroundControl(pub u16);

impl BackgroundControl {
    pub const PRIORITY: u16    = 0b0000000000000011;
    pub const CHAR_BASE: u16   = 0b0000000000001100;
    pub const MOSAIC: u16      = 0b0000000001000000;
    pub const FULL_PALETTE: u16 = 0b0000000010000000;
    pub const SCREEN_BASE: u16 = 0b0001111100000000;
    pub const WRAPAROUND: u16  = 0b0010000000000000;
    pub const SIZE: u16        = 0b1100000000000000;

    // bits 4-5 are unused
    pub const WRITABLE: u16 = 0b1111111111001111;

    #[inline]
    pub fn priority(&self) -> u8 {
        self.get_mask(BackgroundControl::PRIORITY) as u8
    }

    /// Byte offset of tile graphics in VRAM (16 KiB blocks)
    #[inline]
    pub fn char_base(&self) -> usize {
        (self.get_mask(BackgroundControl::CHAR_BASE) as usize) << 14
    }

    #[inline]
    pub fn mosaic(&self) -> bool {
        self.get_mask(BackgroundControl::MOSAIC) != 0
    }

    /// 8bpp tiles sharing one 256 colour palette, as opposed to 16 palettes of 16
    #[inline]
    pub fn full_palette(&self) -> bool {
        self.get_mask(BackgroundControl::FULL_PALETTE) != 0
    }

    /// Byte offset of the tile map in VRAM (2 KiB blocks)
    #[inline]
    pub fn screen_base(&self) -> usize {
        (self.get_mask(BackgroundControl::SCREEN_BASE) as usize) << 11
    }

    #[inline]
    pub fn wraparound(&self) -> bool {
        self.get_mask(BackgroundControl::WRAPAROUND) != 0
    }

    #[inline]
    pub fn size(&self) -> u16 {
        self.get_mask(BackgroundControl::SIZE)
    }

    /// Width and height in pixels of a text layer
    #[inline]
    pub fn text_dimensions(&self) -> (usize, usize) {
        match self.size() {
            0 => (256, 256),
            1 => (512, 256),
            2 => (256, 512),
            _ => (512, 512),
        }
    }

    /// Side length in pixels of an affine layer
    #[inline]
    pub fn affine_dimension(&self) -> usize {
        128 << self.size()
    }

    #[inline]
    pub fn get_mask(&self, mask: u16) -> u16 {
        (self.0 & mask) >> mask.trailing_zeros()
    }
}

/// BG2X/BG2Y style 28-bit signed 20.8 fixed point reference point
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReferencePoint {
    /// Value programmed by the CPU
    pub initial: i32,
    /// Running accumulator the renderer samples from
    pub internal: i32,
}

impl ReferencePoint {
    /// Replaces byte `index` (0-3) of the initial value
    pub fn write_byte(&mut self, index: usize, byte: u8) {
        let shift = index * 8;
        let raw = (self.initial as u32 & !(0xFF << shift)) | ((byte as u32) << shift);

        // sign extend from bit 27
        self.initial = ((raw << 4) as i32) >> 4;
    }

    #[inline]
    pub fn reload(&mut self) {
        self.internal = self.initial;
    }
}

/// Four signed 8.8 fixed point matrix coefficients
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AffineParameters {
    pub pa: i16,
    pub pb: i16,
    pub pc: i16,
    pub pd: i16,
}

impl Default for AffineParameters {
    fn default() -> Self {
        Self { pa: 0x100, pb: 0, pc: 0, pd: 0x100 }
    }
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowRange {
    /// First pixel inside the window
    pub min: u8,
    /// First pixel past the window
    pub max: u8,
}

impl WindowRange {
    /// Windows whose start lies past their end wrap around the screen edge;
    /// an end beyond `limit` is clamped to it.
    #[inline]
    pub fn contains(&self, pos: u16, limit: u16) -> bool {
        let min = self.min as u16;
        let max = (self.max as u16).min(limit);

        if min <= max {
            pos >= min && pos < max
        } else {
            pos >= min || pos < max
        }
    }
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct MosaicSize {
    /// Horizontal block size in pixels (1-16)
    pub size_x: u8,
    /// Vertical block size in lines (1-16)
    pub size_y: u8,
    /// Lines into the current vertical block
    pub counter_y: u8,
}

impl MosaicSize {
    fn write_nibbles(&mut self, byte: u8) {
        self.size_x = (byte & 0x0F) + 1;
        self.size_y = (byte >> 4) + 1;
    }

    #[inline]
    pub fn advance(&mut self) {
        self.counter_y += 1;
        if self.counter_y == self.size_y {
            self.counter_y = 0;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mosaic {
    pub bg: MosaicSize,
    pub obj: MosaicSize,
}

impl Default for Mosaic {
    fn default() -> Self {
        let size = MosaicSize { size_x: 1, size_y: 1, counter_y: 0 };
        Self { bg: size, obj: size }
    }
}

impl Mosaic {
    pub fn write_byte(&mut self, index: usize, byte: u8) {
        match index {
            0 => self.bg.write_nibbles(byte),
            _ => self.obj.write_nibbles(byte),
        }

        // a shrunk block must not leave a counter that never wraps
        if self.bg.counter_y >= self.bg.size_y {
            self.bg.counter_y = 0;
        }
        if self.obj.counter_y >= self.obj.size_y {
            self.obj.counter_y = 0;
        }
    }

    pub fn reset_counters(&mut self) {
        self.bg.counter_y = 0;
        self.obj.counter_y = 0;
    }
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendMode {
    #[default]
    Off,
    Alpha,
    Brighten,
    Darken,
}

impl BlendMode {
    fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0 => BlendMode::Off,
            1 => BlendMode::Alpha,
            2 => BlendMode::Brighten,
            _ => BlendMode::Darken,
        }
    }

    fn bits(&self) -> u16 {
        match self {
            BlendMode::Off => 0,
            BlendMode::Alpha => 1,
            BlendMode::Brighten => 2,
            BlendMode::Darken => 3,
        }
    }
}

/// BLDCNT: first and second target layer masks (BG0-3, OBJ, backdrop) and effect
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlendControl {
    pub targets: [u8; 2],
    pub mode: BlendMode,
}

impl BlendControl {
    pub fn write_byte(&mut self, index: usize, byte: u8) {
        match index {
            0 => {
                self.targets[0] = byte & 0x3F;
                self.mode = BlendMode::from_bits((byte >> 6) as u16);
            }
            _ => self.targets[1] = byte & 0x3F,
        }
    }

    pub fn read_byte(&self, index: usize) -> u8 {
        match index {
            0 => self.targets[0] | ((self.mode.bits() as u8) << 6),
            _ => self.targets[1],
        }
    }

    #[inline]
    pub fn is_target(&self, target: usize, layer: usize) -> bool {
        self.targets[target] & (1 << layer) != 0
    }
}
