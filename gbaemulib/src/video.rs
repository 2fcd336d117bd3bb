/// Receives every completed frame. Pixels are ARGB8888, `DISPLAY_WIDTH` per row.
///
/// The frame is only lent for the duration of the call; a device that presents
/// asynchronously has to copy it.
pub trait VideoDevice {
    fn draw_frame(&mut self, frame: &[u32]);
}

/// Discards frames, for running headless
impl VideoDevice for () {
    fn draw_frame(&mut self, _frame: &[u32]) {}
}
