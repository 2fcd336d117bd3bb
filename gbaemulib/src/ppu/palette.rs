/// Marks a layer pixel with nothing drawn; palette colours only use 15 bits.
pub const TRANSPARENT: u16 = 0x8000;

/// Shown on every pixel while forced blank is on
pub const FORCED_BLANK_COLOUR: u16 = 0x7FFF;

// blend coefficients saturate at 16/16
const MAX_COEFFICIENT: usize = 16;
const CHANNEL_VALUES: usize = 32;

#[inline]
fn blend_index(eva: usize, evb: usize, a: usize, b: usize) -> usize {
    ((eva * (MAX_COEFFICIENT + 1) + evb) * CHANNEL_VALUES + a) * CHANNEL_VALUES + b
}

lazy_static! {
    /// BGR555 to ARGB8888, spreading the top channel bits into the low ones
    static ref COLOUR_LUT: Vec<u32> = (0..0x8000u32).map(|colour| {
        let expand = |channel: u32| (channel << 3) | (channel >> 2);

        let r = expand(colour & 0x1F);
        let g = expand((colour >> 5) & 0x1F);
        let b = expand((colour >> 10) & 0x1F);

        0xFF000000 | (r << 16) | (g << 8) | b
    }).collect();

    /// (EVA, EVB, A, B) -> min(31, (A * EVA + B * EVB) / 16) for one 5-bit channel
    static ref BLEND_TABLE: Vec<u8> = {
        let mut table = vec![0; (MAX_COEFFICIENT + 1).pow(2) * CHANNEL_VALUES.pow(2)];

        for eva in 0..=MAX_COEFFICIENT {
            for evb in 0..=MAX_COEFFICIENT {
                for a in 0..CHANNEL_VALUES {
                    for b in 0..CHANNEL_VALUES {
                        let value = (a * eva + b * evb) >> 4;
                        table[blend_index(eva, evb, a, b)] = value.min(CHANNEL_VALUES - 1) as u8;
                    }
                }
            }
        }

        table
    };
}

#[inline]
pub fn to_argb(colour: u16) -> u32 {
    COLOUR_LUT[(colour & 0x7FFF) as usize]
}

/// Weighted sum of two BGR555 colours, coefficients in sixteenths
pub fn blend(a: u16, b: u16, eva: u8, evb: u8) -> u16 {
    let eva = (eva as usize).min(MAX_COEFFICIENT);
    let evb = (evb as usize).min(MAX_COEFFICIENT);

    let mut result = 0;
    for shift in [0, 5, 10] {
        let channel_a = ((a >> shift) & 0x1F) as usize;
        let channel_b = ((b >> shift) & 0x1F) as usize;

        result |= (BLEND_TABLE[blend_index(eva, evb, channel_a, channel_b)] as u16) << shift;
    }

    result
}

/// Moves `colour` evy/16 of the way towards white
#[inline]
pub fn brighten(colour: u16, evy: u8) -> u16 {
    let evy = evy.min(MAX_COEFFICIENT as u8);
    blend(colour, 0x7FFF, MAX_COEFFICIENT as u8 - evy, evy)
}

/// Moves `colour` evy/16 of the way towards black; the amount taken off
/// each channel rounds down
pub fn darken(colour: u16, evy: u8) -> u16 {
    let evy = evy.min(MAX_COEFFICIENT as u8) as u16;

    let mut result = 0;
    for shift in [0, 5, 10] {
        let channel = (colour >> shift) & 0x1F;
        result |= (channel - ((channel * evy) >> 4)) << shift;
    }

    result
}
