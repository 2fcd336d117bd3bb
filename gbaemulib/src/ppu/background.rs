use crate::{DISPLAY_HEIGHT, DISPLAY_WIDTH};

use super::palette::TRANSPARENT;
use super::ppubus::{PpuBus, OBJ_VRAM_START};
use super::registers::DisplayControl;

// bytes per 32x32 tile screen block
const SCREEN_BLOCK_BYTES: usize = 0x800;

const TILE_BYTES_4BPP: usize = 32;
const TILE_BYTES_8BPP: usize = 64;

/// Second frame buffer of modes 4 and 5
const BITMAP_FRAME_OFFSET: usize = 0xA000;

const MODE5_WIDTH: i32 = 160;
const MODE5_HEIGHT: i32 = 128;

/// Fills `line` with BG layer `id` for the current scanline, in the way the
/// display mode draws that layer.
pub fn render(bus: &PpuBus, id: usize, line: &mut [u16; DISPLAY_WIDTH]) {
    match (bus.dispcnt.mode(), id) {
        (0, _) | (1, 0..=1) => render_text(bus, id, line),
        (1, 2) | (2, 2..=3) => render_affine(bus, id, line),
        (3..=5, 2) => render_bitmap(bus, line),
        _ => unreachable!("BG{} is not drawn in mode {}", id, bus.dispcnt.mode()),
    }
}

/// Looks up one pixel of a tile. Colour index 0 is transparent in every palette.
fn tile_pixel(bus: &PpuBus, tile_addr: usize, x: usize, y: usize, full_palette: bool, palette: usize) -> u16 {
    if full_palette {
        let addr = tile_addr + y * 8 + x;
        if addr >= OBJ_VRAM_START {
            return TRANSPARENT;
        }

        match bus.vram_byte(addr) {
            0 => TRANSPARENT,
            index => bus.palette_colour(index as usize),
        }
    } else {
        let addr = tile_addr + y * 4 + (x >> 1);
        if addr >= OBJ_VRAM_START {
            return TRANSPARENT;
        }

        match (bus.vram_byte(addr) >> ((x & 0x01) * 4)) & 0x0F {
            0 => TRANSPARENT,
            index => bus.palette_colour(palette * 16 + index as usize),
        }
    }
}

fn render_text(bus: &PpuBus, id: usize, line: &mut [u16; DISPLAY_WIDTH]) {
    let bgcnt = bus.bgcnt[id];
    let (width, height) = bgcnt.text_dimensions();
    let mosaic = bus.mosaic.bg;

    let mut y = bus.vcount as usize;
    if bgcnt.mosaic() {
        y = y.saturating_sub(mosaic.counter_y as usize);
    }
    let y = (y + bus.bgvofs[id] as usize) % height;
    let tile_y = y >> 3;

    let char_base = bgcnt.char_base();
    let screen_base = bgcnt.screen_base();
    let full_palette = bgcnt.full_palette();

    for (screen_x, pixel) in line.iter_mut().enumerate() {
        let mut x = screen_x;
        if bgcnt.mosaic() {
            x -= x % mosaic.size_x as usize;
        }
        let x = (x + bus.bghofs[id] as usize) % width;
        let tile_x = x >> 3;

        let block = (tile_x >> 5) + (tile_y >> 5) * (width >> 8);
        let entry_addr = screen_base + block * SCREEN_BLOCK_BYTES + (((tile_y & 0x1F) << 5) + (tile_x & 0x1F)) * 2;
        let entry = bus.vram_half(entry_addr);

        let tile = (entry & 0x3FF) as usize;
        let mut fine_x = x & 0x07;
        let mut fine_y = y & 0x07;
        if entry & 0x0400 != 0 {
            fine_x = 7 - fine_x;
        }
        if entry & 0x0800 != 0 {
            fine_y = 7 - fine_y;
        }

        let tile_bytes = if full_palette { TILE_BYTES_8BPP } else { TILE_BYTES_4BPP };
        let palette = (entry >> 12) as usize;

        *pixel = tile_pixel(bus, char_base + tile * tile_bytes, fine_x, fine_y, full_palette, palette);
    }
}

/// Calls `plot` with the texture coordinate of each pixel on the line, taken
/// from the running reference point of affine layer `id`.
fn for_each_affine<F>(bus: &PpuBus, id: usize, line: &mut [u16; DISPLAY_WIDTH], mut plot: F)
where
    F: FnMut(i32, i32) -> u16,
{
    let index = id - 2;
    let params = bus.affine[index];
    let origin_x = bus.bgx[index].internal;
    let origin_y = bus.bgy[index].internal;

    let mosaic = bus.bgcnt[id].mosaic();
    let size_x = bus.mosaic.bg.size_x as usize;

    for (screen_x, pixel) in line.iter_mut().enumerate() {
        let mut x = screen_x;
        if mosaic {
            x -= x % size_x;
        }

        let tex_x = (origin_x + params.pa as i32 * x as i32) >> 8;
        let tex_y = (origin_y + params.pc as i32 * x as i32) >> 8;

        *pixel = plot(tex_x, tex_y);
    }
}

fn render_affine(bus: &PpuBus, id: usize, line: &mut [u16; DISPLAY_WIDTH]) {
    let bgcnt = bus.bgcnt[id];
    let size = bgcnt.affine_dimension() as i32;
    let tiles_per_row = (size >> 3) as usize;

    let char_base = bgcnt.char_base();
    let screen_base = bgcnt.screen_base();

    for_each_affine(bus, id, line, |mut x, mut y| {
        if bgcnt.wraparound() {
            x = x.rem_euclid(size);
            y = y.rem_euclid(size);
        } else if x < 0 || x >= size || y < 0 || y >= size {
            return TRANSPARENT;
        }

        let (x, y) = (x as usize, y as usize);
        let tile = bus.vram_byte(screen_base + (y >> 3) * tiles_per_row + (x >> 3)) as usize;

        tile_pixel(bus, char_base + tile * TILE_BYTES_8BPP, x & 0x07, y & 0x07, true, 0)
    });
}

fn render_bitmap(bus: &PpuBus, line: &mut [u16; DISPLAY_WIDTH]) {
    let mode = bus.dispcnt.mode();
    let frame_base = if bus.dispcnt.contains(DisplayControl::FRAME_SELECT) {
        BITMAP_FRAME_OFFSET
    } else {
        0
    };

    let (width, height) = match mode {
        5 => (MODE5_WIDTH, MODE5_HEIGHT),
        _ => (DISPLAY_WIDTH as i32, DISPLAY_HEIGHT as i32),
    };

    for_each_affine(bus, 2, line, |x, y| {
        if x < 0 || x >= width || y < 0 || y >= height {
            return TRANSPARENT;
        }

        let offset = (y * width + x) as usize;
        match mode {
            3 => bus.vram_half(offset * 2) & 0x7FFF,
            4 => match bus.vram_byte(frame_base + offset) {
                0 => TRANSPARENT,
                index => bus.palette_colour(index as usize),
            },
            _ => bus.vram_half(frame_base + offset * 2) & 0x7FFF,
        }
    });
}
