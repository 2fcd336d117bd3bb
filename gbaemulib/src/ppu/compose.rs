use crate::{DISPLAY_HEIGHT, DISPLAY_WIDTH};

use super::object::ObjPixel;
use super::palette::{blend, brighten, darken, to_argb, TRANSPARENT};
use super::ppubus::PpuBus;
use super::registers::{BlendMode, DisplayControl};

// layer numbering shared by window masks and blend targets
const LAYER_OBJ: usize = 4;
const LAYER_BACKDROP: usize = 5;

/// Bit of a window mask enabling colour effects
const EFFECTS_ENABLE: u8 = 0x20;

const ALL_LAYERS: u8 = 0x3F;

/// True if BG `id` is switched on and exists in the current display mode
pub fn bg_active(dispcnt: DisplayControl, id: usize) -> bool {
    let in_mode = match dispcnt.mode() {
        0 => true,
        1 => id <= 2,
        2 => id >= 2,
        3..=5 => id == 2,
        _ => false,
    };

    in_mode && dispcnt.bg_enabled(id)
}

/// Marks which pixels of the line fall inside window 0 and window 1
pub fn render_windows(bus: &PpuBus, masks: &mut [[bool; DISPLAY_WIDTH]; 2]) {
    let enabled = [
        bus.dispcnt.contains(DisplayControl::WIN0),
        bus.dispcnt.contains(DisplayControl::WIN1),
    ];

    for window in 0..2 {
        let inside_v = enabled[window]
            && bus.winv[window].contains(bus.vcount, DISPLAY_HEIGHT as u16);

        for (x, inside) in masks[window].iter_mut().enumerate() {
            *inside = inside_v && bus.winh[window].contains(x as u16, DISPLAY_WIDTH as u16);
        }
    }
}

/// Layer mask in effect at pixel `x`. Window 0 takes precedence over window 1,
/// which takes precedence over the object window.
#[inline]
fn window_mask(bus: &PpuBus, masks: &[[bool; DISPLAY_WIDTH]; 2], obj: &ObjPixel, x: usize) -> u8 {
    if !bus.dispcnt.any_window() {
        ALL_LAYERS
    } else if masks[0][x] {
        bus.winin[0]
    } else if masks[1][x] {
        bus.winin[1]
    } else if bus.dispcnt.contains(DisplayControl::OBJ_WIN) && obj.window {
        bus.winout[1]
    } else {
        bus.winout[0]
    }
}

/// Picks the two frontmost visible layers at pixel `x` as (colour, layer) pairs,
/// falling back to the backdrop.
fn top_layers(
    bus: &PpuBus,
    bg_lines: &[[u16; DISPLAY_WIDTH]; 4],
    obj: &ObjPixel,
    mask: u8,
    x: usize,
) -> [(u16, usize); 2] {
    let backdrop = (bus.palette_colour(0), LAYER_BACKDROP);
    let mut layers = [backdrop; 2];
    let mut found = 0;

    let obj_visible = bus.dispcnt.contains(DisplayControl::OBJ)
        && obj.colour != TRANSPARENT
        && mask & (1 << LAYER_OBJ) != 0;

    for priority in 0..4 {
        if obj_visible && obj.priority == priority {
            layers[found] = (obj.colour, LAYER_OBJ);
            found += 1;
            if found == 2 {
                return layers;
            }
        }

        for id in 0..4 {
            if bus.bgcnt[id].priority() != priority
                || !bg_active(bus.dispcnt, id)
                || mask & (1 << id) == 0
            {
                continue;
            }

            let colour = bg_lines[id][x];
            if colour == TRANSPARENT {
                continue;
            }

            layers[found] = (colour, id);
            found += 1;
            if found == 2 {
                return layers;
            }
        }
    }

    layers
}

/// Resolves every pixel of the line and writes it to `row` as ARGB8888.
pub fn compose(
    bus: &PpuBus,
    bg_lines: &[[u16; DISPLAY_WIDTH]; 4],
    obj_line: &[ObjPixel; DISPLAY_WIDTH],
    win_masks: &[[bool; DISPLAY_WIDTH]; 2],
    line_has_alpha_objs: bool,
    row: &mut [u32],
) {
    let bldcnt = bus.bldcnt;

    for (x, out) in row.iter_mut().enumerate() {
        let obj = &obj_line[x];
        let mask = window_mask(bus, win_masks, obj, x);
        let [(top, top_layer), (bottom, bottom_layer)] = top_layers(bus, bg_lines, obj, mask, x);

        let effects = mask & EFFECTS_ENABLE != 0;
        let colour = if !effects {
            top
        } else if line_has_alpha_objs
            && top_layer == LAYER_OBJ
            && obj.alpha
            && bldcnt.is_target(1, bottom_layer)
        {
            // semi-transparent objects blend whatever the selected effect
            blend(top, bottom, bus.eva, bus.evb)
        } else if bldcnt.is_target(0, top_layer) {
            match bldcnt.mode {
                BlendMode::Alpha if bldcnt.is_target(1, bottom_layer) => {
                    blend(top, bottom, bus.eva, bus.evb)
                }
                BlendMode::Brighten => brighten(top, bus.evy),
                BlendMode::Darken => darken(top, bus.evy),
                _ => top,
            }
        } else {
            top
        };

        *out = to_argb(colour);
    }
}
