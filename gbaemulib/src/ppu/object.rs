use crate::DISPLAY_WIDTH;

use super::palette::TRANSPARENT;
use super::ppubus::{PpuBus, OBJ_PALETTE_START, OBJ_VRAM_START};
use super::registers::DisplayControl;

const OAM_ENTRIES: usize = 128;
const OAM_ENTRY_BYTES: usize = 8;

// an affine parameter group is spread over the unused fourth halfword of four entries
const AFFINE_GROUP_BYTES: usize = 32;

const TILE_BYTES: usize = 32;

/// OBJ tiles below this are used by the frame buffer in bitmap modes
const BITMAP_MODE_FIRST_TILE: usize = 512;

// 2D mapping lays OBJ tiles out as a 32x32 tile sheet
const TILE_SHEET_ROW_BYTES: usize = 32 * TILE_BYTES;

/// Width and height in pixels, by shape then size
const OBJ_SIZES: [[(i32, i32); 4]; 3] = [
    [(8, 8), (16, 16), (32, 32), (64, 64)],
    [(16, 8), (32, 8), (32, 16), (64, 32)],
    [(8, 16), (8, 32), (16, 32), (32, 64)],
];

/// One pixel of the object line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjPixel {
    pub colour: u16,
    pub priority: u8,
    /// Drawn by a semi-transparent object
    pub alpha: bool,
    /// Inside the object window
    pub window: bool,
}

impl ObjPixel {
    pub const EMPTY: ObjPixel = ObjPixel {
        colour: TRANSPARENT,
        priority: 4,
        alpha: false,
        window: false,
    };
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ObjMode {
    Normal,
    SemiTransparent,
    Window,
}

/// The three attribute halfwords of an OAM entry
#[derive(Clone, Copy)]
struct OamEntry {
    attr0: u16,
    attr1: u16,
    attr2: u16,
}

impl OamEntry {
    fn read(bus: &PpuBus, index: usize) -> Self {
        let base = index * OAM_ENTRY_BYTES;
        Self {
            attr0: bus.oam_half(base),
            attr1: bus.oam_half(base + 2),
            attr2: bus.oam_half(base + 4),
        }
    }

    fn affine(&self) -> bool {
        self.attr0 & 0x0100 != 0
    }

    /// Doubles the bounding box of affine objects; hides regular ones
    fn double_size_or_hidden(&self) -> bool {
        self.attr0 & 0x0200 != 0
    }

    fn mode(&self) -> Option<ObjMode> {
        match (self.attr0 >> 10) & 0x03 {
            0 => Some(ObjMode::Normal),
            1 => Some(ObjMode::SemiTransparent),
            2 => Some(ObjMode::Window),
            _ => None,
        }
    }

    fn mosaic(&self) -> bool {
        self.attr0 & 0x1000 != 0
    }

    fn full_palette(&self) -> bool {
        self.attr0 & 0x2000 != 0
    }

    fn size(&self) -> Option<(i32, i32)> {
        let shape = (self.attr0 >> 14) as usize;
        let size = (self.attr1 >> 14) as usize;
        OBJ_SIZES.get(shape).map(|sizes| sizes[size])
    }

    fn y(&self) -> i32 {
        (self.attr0 & 0xFF) as i32
    }

    fn x(&self) -> i32 {
        let x = (self.attr1 & 0x1FF) as i32;
        if x >= 256 { x - 512 } else { x }
    }

    fn affine_group(&self) -> usize {
        ((self.attr1 >> 9) & 0x1F) as usize
    }

    fn h_flip(&self) -> bool {
        self.attr1 & 0x1000 != 0
    }

    fn v_flip(&self) -> bool {
        self.attr1 & 0x2000 != 0
    }

    fn tile(&self) -> usize {
        (self.attr2 & 0x3FF) as usize
    }

    fn priority(&self) -> u8 {
        ((self.attr2 >> 10) & 0x03) as u8
    }

    fn palette(&self) -> usize {
        (self.attr2 >> 12) as usize
    }
}

/// Reads the PA, PB, PC, PD matrix of affine group `group`
fn affine_matrix(bus: &PpuBus, group: usize) -> [i32; 4] {
    let base = group * AFFINE_GROUP_BYTES + 6;
    [0, 1, 2, 3].map(|n| bus.oam_half(base + n * OAM_ENTRY_BYTES) as i16 as i32)
}

/// Colour index of texel (x, y) of an object, 0 being transparent
fn texel(bus: &PpuBus, entry: &OamEntry, width: i32, mapping_1d: bool, x: i32, y: i32) -> usize {
    let (x, y) = (x as usize, y as usize);
    let full_palette = entry.full_palette();
    let tile_bytes = if full_palette { TILE_BYTES * 2 } else { TILE_BYTES };

    let row_bytes = if mapping_1d {
        (width as usize >> 3) * tile_bytes
    } else {
        TILE_SHEET_ROW_BYTES
    };

    let tile_offset = entry.tile() * TILE_BYTES + (y >> 3) * row_bytes + (x >> 3) * tile_bytes;
    let pixel_offset = if full_palette {
        (y & 0x07) * 8 + (x & 0x07)
    } else {
        (y & 0x07) * 4 + ((x & 0x07) >> 1)
    };

    // OBJ VRAM is 32 KiB and addressing wraps within it
    let byte = bus.vram_byte(OBJ_VRAM_START + ((tile_offset + pixel_offset) & 0x7FFF));

    if full_palette {
        byte as usize
    } else {
        ((byte >> ((x & 0x01) * 4)) & 0x0F) as usize
    }
}

/// Draws every object crossing the current scanline into `line`. Returns true
/// if a semi-transparent object left a pixel on the line.
pub fn render(bus: &PpuBus, line: &mut [ObjPixel; DISPLAY_WIDTH]) -> bool {
    let dispcnt = bus.dispcnt;
    let draw_objects = dispcnt.contains(DisplayControl::OBJ);
    let draw_window = dispcnt.contains(DisplayControl::OBJ_WIN);
    let mapping_1d = dispcnt.contains(DisplayControl::OBJ_MAPPING_1D);
    let bitmap_mode = dispcnt.mode() >= 3;

    let vcount = bus.vcount as i32;
    let mosaic = bus.mosaic.obj;

    for index in 0..OAM_ENTRIES {
        let entry = OamEntry::read(bus, index);

        let affine = entry.affine();
        if !affine && entry.double_size_or_hidden() {
            continue;
        }

        let (mode, (width, height)) = match (entry.mode(), entry.size()) {
            (Some(mode), Some(size)) => (mode, size),
            _ => continue,
        };

        match mode {
            ObjMode::Window if !draw_window => continue,
            ObjMode::Normal | ObjMode::SemiTransparent if !draw_objects => continue,
            _ => {}
        }

        if bitmap_mode && entry.tile() < BITMAP_MODE_FIRST_TILE {
            continue;
        }

        let (box_width, box_height) = if affine && entry.double_size_or_hidden() {
            (width * 2, height * 2)
        } else {
            (width, height)
        };

        // boxes running past line 255 wrap around to the top
        let mut local_y = (vcount - entry.y()) & 0xFF;
        if local_y >= box_height {
            continue;
        }

        if entry.mosaic() {
            local_y = (local_y - mosaic.counter_y as i32).max(0);
        }

        let left = entry.x();
        let matrix = if affine { Some(affine_matrix(bus, entry.affine_group())) } else { None };

        let start = left.max(0);
        let end = (left + box_width).min(DISPLAY_WIDTH as i32);

        for screen_x in start..end {
            let mut local_x = screen_x - left;
            if entry.mosaic() {
                local_x = (local_x - screen_x % mosaic.size_x as i32).max(0);
            }

            let (tex_x, tex_y) = match matrix {
                Some([pa, pb, pc, pd]) => {
                    let dx = local_x - box_width / 2;
                    let dy = local_y - box_height / 2;
                    let tex_x = ((pa * dx + pb * dy) >> 8) + width / 2;
                    let tex_y = ((pc * dx + pd * dy) >> 8) + height / 2;

                    if tex_x < 0 || tex_x >= width || tex_y < 0 || tex_y >= height {
                        continue;
                    }
                    (tex_x, tex_y)
                }
                None => {
                    let tex_x = if entry.h_flip() { width - 1 - local_x } else { local_x };
                    let tex_y = if entry.v_flip() { height - 1 - local_y } else { local_y };
                    (tex_x, tex_y)
                }
            };

            let colour_index = texel(bus, &entry, width, mapping_1d, tex_x, tex_y);
            if colour_index == 0 {
                continue;
            }

            let pixel = &mut line[screen_x as usize];

            if mode == ObjMode::Window {
                pixel.window = true;
                continue;
            }

            // earlier entries keep the pixel unless outranked
            if pixel.colour != TRANSPARENT && entry.priority() >= pixel.priority {
                continue;
            }

            let palette_index = if entry.full_palette() {
                colour_index
            } else {
                entry.palette() * 16 + colour_index
            };

            pixel.colour = bus.palette_colour(OBJ_PALETTE_START / 2 + palette_index);
            pixel.priority = entry.priority();
            pixel.alpha = mode == ObjMode::SemiTransparent;
        }
    }

    line.iter().any(|pixel| pixel.alpha && pixel.colour != TRANSPARENT)
}
