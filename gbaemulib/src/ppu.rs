mod background;
mod compose;
mod object;
mod palette;
mod ppubus;
mod registers;

pub use ppubus::{PpuBus, PPU_REG_END, PPU_REG_START};

use crate::bus::SystemBus;
use crate::dma::{DmaDevice, DmaOccasion};
use crate::interrupt::Interrupt;
use crate::scheduler::{Event, Scheduler};
use crate::video::VideoDevice;
use crate::{SystemControl, DISPLAY_HEIGHT, DISPLAY_WIDTH};

use self::object::ObjPixel;
use self::palette::{to_argb, FORCED_BLANK_COLOUR, TRANSPARENT};
use self::registers::{DisplayControl, DisplayStatus};

/// Last scanline of the frame
const S_FRAME_END: u16 = 227;

/// First line that requests video capture DMA
const S_VIDEO_DMA_START: u16 = 2;

/// Video capture DMA is stopped when this line is reached
const S_VIDEO_DMA_END: u16 = 162;

/// VBLANK flag is cleared on the last line, not when the next frame starts
const S_VBLANK_FLAG_END: u16 = 226;

/// Timed sections of a scanline. Each variant is scheduled to fire when
/// that section ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Visible pixels being drawn
    Scanline,
    /// Start of HBLANK, before the HBLANK flag is raised
    HBlankSearch,
    HBlank,
    /// Drawing period of a line inside VBLANK
    VBlankScanline,
    VBlankHBlank,
}

impl Phase {
    /// Length of the phase in cycles
    pub const fn cycles(&self) -> i32 {
        match self {
            Phase::Scanline => 960,
            Phase::HBlankSearch => 46,
            Phase::HBlank => 226,
            Phase::VBlankScanline => 1006,
            Phase::VBlankHBlank => 226,
        }
    }
}

/// Scanline timing and renderer. Registers and memories live in `PpuBus`;
/// this holds the per-line layer buffers and the frame under construction.
pub struct Ppu {
    frame: Vec<u32>,
    frame_count: u64,

    bg_lines: [[u16; DISPLAY_WIDTH]; 4],
    obj_line: [ObjPixel; DISPLAY_WIDTH],
    // inside window 0 / window 1 per pixel
    win_masks: [[bool; DISPLAY_WIDTH]; 2],
    line_has_alpha_objs: bool,
}

impl SystemControl for Ppu {
    fn reset(&mut self) {
        self.frame.fill(to_argb(0));
        self.frame_count = 0;

        self.bg_lines = [[TRANSPARENT; DISPLAY_WIDTH]; 4];
        self.obj_line = [ObjPixel::EMPTY; DISPLAY_WIDTH];
        self.win_masks = [[false; DISPLAY_WIDTH]; 2];
        self.line_has_alpha_objs = false;
    }
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            frame: vec![to_argb(0); DISPLAY_WIDTH * DISPLAY_HEIGHT],
            frame_count: 0,

            bg_lines: [[TRANSPARENT; DISPLAY_WIDTH]; 4],
            obj_line: [ObjPixel::EMPTY; DISPLAY_WIDTH],
            win_masks: [[false; DISPLAY_WIDTH]; 2],
            line_has_alpha_objs: false,
        }
    }

    /// Drops any PPU events still queued and starts timing from the top of line 0
    pub fn start(&mut self, scheduler: &mut Scheduler) {
        scheduler.cancel(|event| matches!(event, Event::Ppu(_)));
        scheduler.add(Phase::Scanline.cycles(), Event::Ppu(Phase::Scanline));
    }

    /// Frames handed to the video device so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Frame under construction; rows above the current line are complete
    pub fn frame(&self) -> &[u32] {
        &self.frame
    }

    #[inline]
    fn schedule(scheduler: &mut Scheduler, next: Phase, late: i32) {
        scheduler.add(next.cycles() - late, Event::Ppu(next));
    }

    /// Runs the side effects of `phase` ending `late` cycles ago and queues the next phase.
    pub fn handle_phase<V, D>(
        &mut self,
        phase: Phase,
        late: i32,
        bus: &mut SystemBus,
        scheduler: &mut Scheduler,
        video: &mut V,
        dma: &mut D,
    ) where
        V: VideoDevice + ?Sized,
        D: DmaDevice + ?Sized,
    {
        match phase {
            Phase::Scanline => self.scanline_end(late, bus, scheduler),
            Phase::HBlankSearch => self.hblank_search_end(late, bus, scheduler, dma),
            Phase::HBlank => self.hblank_end(late, bus, scheduler, video, dma),
            Phase::VBlankScanline => self.vblank_scanline_end(late, bus, scheduler, dma),
            Phase::VBlankHBlank => self.vblank_hblank_end(late, bus, scheduler),
        }
    }

    fn scanline_end(&mut self, late: i32, bus: &mut SystemBus, scheduler: &mut Scheduler) {
        Ppu::schedule(scheduler, Phase::HBlankSearch, late);

        if bus.ppu_bus.dispstat.contains(DisplayStatus::HBLANK_IRQ) {
            bus.interrupts.raise(Interrupt::HBLANK);
        }

        self.render_scanline(&bus.ppu_bus);
    }

    fn hblank_search_end<D>(&mut self, late: i32, bus: &mut SystemBus, scheduler: &mut Scheduler, dma: &mut D)
    where
        D: DmaDevice + ?Sized,
    {
        Ppu::schedule(scheduler, Phase::HBlank, late);

        dma.request(DmaOccasion::HBlank);
        if bus.ppu_bus.vcount >= S_VIDEO_DMA_START {
            dma.request(DmaOccasion::Video);
        }

        bus.ppu_bus.dispstat.insert(DisplayStatus::HBLANK_FLAG);
    }

    fn hblank_end<V, D>(
        &mut self,
        late: i32,
        bus: &mut SystemBus,
        scheduler: &mut Scheduler,
        video: &mut V,
        dma: &mut D,
    ) where
        V: VideoDevice + ?Sized,
        D: DmaDevice + ?Sized,
    {
        let ppu_bus = &mut bus.ppu_bus;
        ppu_bus.dispstat.remove(DisplayStatus::HBLANK_FLAG);
        ppu_bus.vcount += 1;
        ppu_bus.check_vcount_irq(&mut bus.interrupts);

        if ppu_bus.vcount as usize == DISPLAY_HEIGHT {
            self.frame_count += 1;
            log::trace!("frame {} complete", self.frame_count);
            video.draw_frame(&self.frame);

            Ppu::schedule(scheduler, Phase::VBlankScanline, late);
            dma.request(DmaOccasion::VBlank);

            ppu_bus.dispstat.insert(DisplayStatus::VBLANK_FLAG);
            if ppu_bus.dispstat.contains(DisplayStatus::VBLANK_IRQ) {
                bus.interrupts.raise(Interrupt::VBLANK);
            }

            ppu_bus.mosaic.reset_counters();
            ppu_bus.reload_affine();
        } else {
            ppu_bus.mosaic.bg.advance();
            ppu_bus.mosaic.obj.advance();

            Ppu::schedule(scheduler, Phase::Scanline, late);
            ppu_bus.advance_affine();
        }
    }

    fn vblank_scanline_end<D>(&mut self, late: i32, bus: &mut SystemBus, scheduler: &mut Scheduler, dma: &mut D)
    where
        D: DmaDevice + ?Sized,
    {
        Ppu::schedule(scheduler, Phase::VBlankHBlank, late);

        bus.ppu_bus.dispstat.insert(DisplayStatus::HBLANK_FLAG);

        if bus.ppu_bus.vcount < S_VIDEO_DMA_END {
            dma.request(DmaOccasion::Video);
        } else if bus.ppu_bus.vcount == S_VIDEO_DMA_END {
            dma.stop_video_transfer();
        }

        if bus.ppu_bus.dispstat.contains(DisplayStatus::HBLANK_IRQ) {
            bus.interrupts.raise(Interrupt::HBLANK);
        }
    }

    fn vblank_hblank_end(&mut self, late: i32, bus: &mut SystemBus, scheduler: &mut Scheduler) {
        let ppu_bus = &mut bus.ppu_bus;
        ppu_bus.dispstat.remove(DisplayStatus::HBLANK_FLAG);

        if ppu_bus.vcount == S_FRAME_END {
            ppu_bus.vcount = 0;
            Ppu::schedule(scheduler, Phase::Scanline, late);
        } else {
            Ppu::schedule(scheduler, Phase::VBlankScanline, late);

            if ppu_bus.vcount == S_VBLANK_FLAG_END {
                ppu_bus.dispstat.remove(DisplayStatus::VBLANK_FLAG);
            }
            ppu_bus.vcount += 1;
        }

        ppu_bus.check_vcount_irq(&mut bus.interrupts);
    }

    /// Draws line `vcount` of the frame
    pub fn render_scanline(&mut self, bus: &PpuBus) {
        let line = bus.vcount as usize;
        if line >= DISPLAY_HEIGHT {
            return;
        }

        let row = line * DISPLAY_WIDTH;
        let dispcnt = bus.dispcnt;

        if dispcnt.contains(DisplayControl::FORCED_BLANK) {
            self.frame[row..row + DISPLAY_WIDTH].fill(to_argb(FORCED_BLANK_COLOUR));
            return;
        }

        for id in 0..4 {
            self.bg_lines[id].fill(TRANSPARENT);
        }
        self.obj_line.fill(ObjPixel::EMPTY);
        self.line_has_alpha_objs = false;

        if dispcnt.mode() <= 5 {
            for id in 0..4 {
                if compose::bg_active(dispcnt, id) {
                    background::render(bus, id, &mut self.bg_lines[id]);
                }
            }

            if dispcnt.intersects(DisplayControl::OBJ | DisplayControl::OBJ_WIN) {
                self.line_has_alpha_objs = object::render(bus, &mut self.obj_line);
            }
        }

        compose::render_windows(bus, &mut self.win_masks);
        compose::compose(
            bus,
            &self.bg_lines,
            &self.obj_line,
            &self.win_masks,
            self.line_has_alpha_objs,
            &mut self.frame[row..row + DISPLAY_WIDTH],
        );
    }
}

#[cfg(test)]
impl Ppu {
    /// Hands every due PPU event to the PPU until `cycles` have passed
    pub fn test_run(
        &mut self,
        cycles: u64,
        bus: &mut SystemBus,
        scheduler: &mut Scheduler,
        video: &mut dyn VideoDevice,
        dma: &mut dyn DmaDevice,
    ) {
        let end = scheduler.now() + cycles;

        while scheduler.now() < end {
            let step = scheduler
                .cycles_until_next()
                .unwrap_or(u64::MAX)
                .min(end - scheduler.now());
            scheduler.advance(step as u32);

            while let Some((Event::Ppu(phase), late)) = scheduler.pop_due() {
                self.handle_phase(phase, late, bus, scheduler, video, dma);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Phase, Ppu};
    use crate::bus::SystemBus;
    use crate::dma::{DmaOccasion, DmaRequests};
    use crate::interrupt::Interrupt;
    use crate::scheduler::{Event, Scheduler};
    use crate::video::VideoDevice;
    use crate::{CYCLES_PER_FRAME, CYCLES_PER_SCANLINE, DISPLAY_WIDTH};

    struct FrameCounter {
        frames: u32,
        first_pixel: u32,
    }

    impl VideoDevice for FrameCounter {
        fn draw_frame(&mut self, frame: &[u32]) {
            self.frames += 1;
            self.first_pixel = frame[0];
        }
    }

    fn setup() -> (Ppu, SystemBus, Scheduler, DmaRequests) {
        let mut ppu = Ppu::new();
        let bus = SystemBus::new();
        let mut scheduler = Scheduler::new();
        ppu.start(&mut scheduler);
        (ppu, bus, scheduler, DmaRequests::new())
    }

    #[test]
    pub fn test_phase_durations_add_up_to_frame() {
        let line = Phase::Scanline.cycles() + Phase::HBlankSearch.cycles() + Phase::HBlank.cycles();
        let vblank_line = Phase::VBlankScanline.cycles() + Phase::VBlankHBlank.cycles();
        assert_eq!(line as u32, CYCLES_PER_SCANLINE);
        assert_eq!(vblank_line as u32, CYCLES_PER_SCANLINE);
        assert_eq!((160 * line + 68 * vblank_line) as u32, CYCLES_PER_FRAME);

        // one full frame puts us back at the start of line 0
        let (mut ppu, mut bus, mut scheduler, mut dma) = setup();
        let mut video = ();
        ppu.test_run(CYCLES_PER_FRAME as u64, &mut bus, &mut scheduler, &mut video, &mut dma);

        assert_eq!(bus.ppu_bus.vcount, 0);
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.cycles_until_next(), Some(Phase::Scanline.cycles() as u64));
    }

    #[test]
    pub fn test_full_frame_draws_once() {
        let (mut ppu, mut bus, mut scheduler, mut dma) = setup();
        let mut video = FrameCounter { frames: 0, first_pixel: 0 };

        // enable VBLANK IRQ
        bus.ppu_bus.write_register(0x04, 0x08);

        // the hand-off happens at the end of line 159's HBLANK
        ppu.test_run(160 * CYCLES_PER_SCANLINE as u64 - 1, &mut bus, &mut scheduler, &mut video, &mut dma);
        assert_eq!(video.frames, 0);
        assert!(bus.interrupts.pending.is_empty());

        ppu.test_run(1, &mut bus, &mut scheduler, &mut video, &mut dma);
        assert_eq!(video.frames, 1);
        assert_eq!(bus.ppu_bus.vcount, 160);
        assert_eq!(bus.interrupts.pending, Interrupt::VBLANK);
        assert_eq!(bus.ppu_bus.read_register(0x04) & 0x01, 0x01);

        bus.interrupts.pending = Interrupt::empty();
        ppu.test_run(CYCLES_PER_FRAME as u64, &mut bus, &mut scheduler, &mut video, &mut dma);
        assert_eq!(video.frames, 2);
        assert_eq!(ppu.frame_count(), 2);
        assert_eq!(bus.interrupts.pending, Interrupt::VBLANK);
    }

    #[test]
    pub fn test_vblank_flag_clears_on_line_227() {
        let (mut ppu, mut bus, mut scheduler, mut dma) = setup();
        let mut video = ();

        ppu.test_run(227 * CYCLES_PER_SCANLINE as u64, &mut bus, &mut scheduler, &mut video, &mut dma);
        assert_eq!(bus.ppu_bus.vcount, 227);
        assert_eq!(bus.ppu_bus.read_register(0x04) & 0x01, 0x00);
    }

    #[test]
    pub fn test_hblank_irq_and_flag() {
        let (mut ppu, mut bus, mut scheduler, mut dma) = setup();
        let mut video = ();
        bus.ppu_bus.write_register(0x04, 0x10);

        // the interrupt fires when drawing stops, before the flag goes up
        ppu.test_run(Phase::Scanline.cycles() as u64, &mut bus, &mut scheduler, &mut video, &mut dma);
        assert_eq!(bus.interrupts.pending, Interrupt::HBLANK);
        assert_eq!(bus.ppu_bus.read_register(0x04) & 0x02, 0x00);

        ppu.test_run(Phase::HBlankSearch.cycles() as u64, &mut bus, &mut scheduler, &mut video, &mut dma);
        assert_eq!(bus.ppu_bus.read_register(0x04) & 0x02, 0x02);

        ppu.test_run(Phase::HBlank.cycles() as u64, &mut bus, &mut scheduler, &mut video, &mut dma);
        assert_eq!(bus.ppu_bus.read_register(0x04) & 0x02, 0x00);
        assert_eq!(bus.ppu_bus.vcount, 1);
    }

    #[test]
    pub fn test_vcount_irq_once_per_frame() {
        let (mut ppu, mut bus, mut scheduler, mut dma) = setup();
        let mut video = ();

        // V-count IRQ on line 100
        bus.ppu_bus.write_register(0x04, 0x20);
        bus.ppu_bus.write_register(0x05, 100);

        ppu.test_run(100 * CYCLES_PER_SCANLINE as u64, &mut bus, &mut scheduler, &mut video, &mut dma);
        assert_eq!(bus.interrupts.pending, Interrupt::VCOUNT);
        assert_eq!(bus.ppu_bus.read_register(0x04) & 0x04, 0x04);

        bus.interrupts.pending = Interrupt::empty();
        ppu.test_run(CYCLES_PER_SCANLINE as u64 - 1, &mut bus, &mut scheduler, &mut video, &mut dma);
        assert!(bus.interrupts.pending.is_empty());

        ppu.test_run(CYCLES_PER_FRAME as u64, &mut bus, &mut scheduler, &mut video, &mut dma);
        assert_eq!(bus.interrupts.pending, Interrupt::VCOUNT);
    }

    #[test]
    pub fn test_dma_request_order() {
        let (mut ppu, mut bus, mut scheduler, mut dma) = setup();
        let mut video = ();

        ppu.test_run(2 * CYCLES_PER_SCANLINE as u64, &mut bus, &mut scheduler, &mut video, &mut dma);
        assert_eq!(dma.take(), vec![DmaOccasion::HBlank, DmaOccasion::HBlank]);

        ppu.test_run(CYCLES_PER_SCANLINE as u64, &mut bus, &mut scheduler, &mut video, &mut dma);
        assert_eq!(dma.take(), vec![DmaOccasion::HBlank, DmaOccasion::Video]);

        // up to the start of VBLANK
        ppu.test_run(157 * CYCLES_PER_SCANLINE as u64, &mut bus, &mut scheduler, &mut video, &mut dma);
        let requests = dma.take();
        assert_eq!(requests.last(), Some(&DmaOccasion::VBlank));

        // lines 160 and 161 still capture, 162 stops
        ppu.test_run(3 * CYCLES_PER_SCANLINE as u64, &mut bus, &mut scheduler, &mut video, &mut dma);
        assert_eq!(dma.take(), vec![DmaOccasion::Video, DmaOccasion::Video]);
        assert!(dma.video_transfer_stopped());

        ppu.test_run(CYCLES_PER_SCANLINE as u64, &mut bus, &mut scheduler, &mut video, &mut dma);
        assert!(dma.peek().is_empty());
    }

    #[test]
    pub fn test_affine_reload_and_accumulation() {
        let (mut ppu, mut bus, mut scheduler, mut dma) = setup();
        let mut video = ();

        // BG2X = 0x100, PB = 0x20, PD = 0x80
        bus.ppu_bus.write_register(0x29, 0x01);
        bus.ppu_bus.write_register(0x22, 0x20);
        bus.ppu_bus.write_register(0x26, 0x80);
        bus.ppu_bus.write_register(0x27, 0x00);
        bus.ppu_bus.write_register(0x00, 0x02);
        assert_eq!(bus.ppu_bus.bgx[0].internal, 0x100);

        ppu.test_run(3 * CYCLES_PER_SCANLINE as u64, &mut bus, &mut scheduler, &mut video, &mut dma);
        assert_eq!(bus.ppu_bus.bgx[0].internal, 0x100 + 3 * 0x20);
        assert_eq!(bus.ppu_bus.bgy[0].internal, 3 * 0x80);

        // writes are not picked up mid-frame
        bus.ppu_bus.write_register(0x29, 0x02);
        ppu.test_run(CYCLES_PER_SCANLINE as u64, &mut bus, &mut scheduler, &mut video, &mut dma);
        assert_eq!(bus.ppu_bus.bgx[0].internal, 0x100 + 4 * 0x20);

        ppu.test_run(156 * CYCLES_PER_SCANLINE as u64, &mut bus, &mut scheduler, &mut video, &mut dma);
        assert_eq!(bus.ppu_bus.vcount, 160);
        assert_eq!(bus.ppu_bus.bgx[0].internal, 0x200);
        assert_eq!(bus.ppu_bus.bgy[0].internal, 0);
    }

    #[test]
    pub fn test_affine_accumulation_under_mosaic() {
        let (mut ppu, mut bus, mut scheduler, mut dma) = setup();
        let mut video = ();

        // BG2 mosaic, 3 line blocks, PD = 0x100
        bus.ppu_bus.write_register(0x0C, 0x40);
        bus.ppu_bus.write_register(0x4C, 0x20);
        bus.ppu_bus.write_register(0x00, 0x02);

        let mut seen = Vec::new();
        for _ in 0..6 {
            ppu.test_run(CYCLES_PER_SCANLINE as u64, &mut bus, &mut scheduler, &mut video, &mut dma);
            seen.push(bus.ppu_bus.bgy[0].internal);
        }

        assert_eq!(seen, vec![0, 0, 0x300, 0x300, 0x300, 0x600]);
    }

    #[test]
    pub fn test_mode3_pixel_reaches_frame() {
        let (mut ppu, mut bus, mut scheduler, mut dma) = setup();
        let mut video = FrameCounter { frames: 0, first_pixel: 0 };

        // mode 3, BG2 on, red at (0, 0)
        bus.ppu_bus.write_register(0x00, 0x03);
        bus.ppu_bus.write_register(0x01, 0x04);
        bus.ppu_bus.write_vram_half(0, 0x001F);

        ppu.test_run(160 * CYCLES_PER_SCANLINE as u64, &mut bus, &mut scheduler, &mut video, &mut dma);
        assert_eq!(video.frames, 1);
        assert_eq!(video.first_pixel, 0xFFFF0000);
        assert!(ppu.frame()[1..DISPLAY_WIDTH].iter().all(|&pixel| pixel == 0xFF000000));
    }

    #[test]
    pub fn test_start_cancels_stale_events() {
        let (mut ppu, _, mut scheduler, _) = setup();
        scheduler.add(5, Event::Ppu(Phase::HBlank));

        ppu.start(&mut scheduler);
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.cycles_until_next(), Some(Phase::Scanline.cycles() as u64));
    }
}
