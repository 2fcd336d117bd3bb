use crate::interrupt::{Interrupt, InterruptController};
use crate::SystemControl;

pub const TIMER_REG_START: usize = 0x100;
pub const TIMER_REG_END: usize = 0x10F;

const TIMER_COUNT: usize = 4;

// prescaler selection -> (cycles per tick as a shift, leftover cycle mask)
const TICKS_SHIFT: [u32; 4] = [0, 6, 8, 10];
const TICKS_MASK: [u32; 4] = [0, 0x3F, 0xFF, 0x3FF];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TimerControl {
    /// 2-bit prescaler selection: 1, 64, 256 or 1024 cycles per tick
    pub frequency: u8,
    pub cascade: bool,
    pub interrupt: bool,
    pub enable: bool,
}

impl TimerControl {
    pub const CASCADE: u8   = 0b00000100;
    pub const INTERRUPT: u8 = 0b01000000;
    pub const ENABLE: u8    = 0b10000000;

    fn from_byte(byte: u8) -> Self {
        Self {
            frequency: byte & 0b11,
            cascade: byte & TimerControl::CASCADE != 0,
            interrupt: byte & TimerControl::INTERRUPT != 0,
            enable: byte & TimerControl::ENABLE != 0,
        }
    }

    fn to_byte(&self) -> u8 {
        self.frequency
            | if self.cascade { TimerControl::CASCADE } else { 0 }
            | if self.interrupt { TimerControl::INTERRUPT } else { 0 }
            | if self.enable { TimerControl::ENABLE } else { 0 }
    }
}

pub struct Timer {
    pub id: usize,
    pub counter: u16,
    pub reload: u16,
    pub control: TimerControl,

    /// Set during the step in which the counter wrapped; consumed by the
    /// timer above when it is cascading
    pub overflow: bool,

    // cycles not yet worth a full tick
    cycles: u32,
    shift: u32,
    mask: u32,

    // wraps during the most recent step, for the sound FIFOs
    overflows: u32,
}

impl SystemControl for Timer {
    fn reset(&mut self) {
        self.counter = 0;
        self.reload = 0;
        self.control = TimerControl::default();
        self.overflow = false;
        self.cycles = 0;
        self.shift = TICKS_SHIFT[0];
        self.mask = TICKS_MASK[0];
        self.overflows = 0;
    }
}

impl Timer {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            counter: 0,
            reload: 0,
            control: TimerControl::default(),
            overflow: false,
            cycles: 0,
            shift: TICKS_SHIFT[0],
            mask: TICKS_MASK[0],
            overflows: 0,
        }
    }

    /// Number of times the counter wrapped during the last `run`
    #[inline]
    pub fn overflows(&self) -> u32 {
        self.overflows
    }

    fn write_control(&mut self, byte: u8) {
        let was_enabled = self.control.enable;

        self.control = TimerControl::from_byte(byte);
        self.shift = TICKS_SHIFT[self.control.frequency as usize];
        self.mask = TICKS_MASK[self.control.frequency as usize];

        if !was_enabled && self.control.enable {
            log::debug!("timer {} enabled, reload {:04X}", self.id, self.reload);
            self.counter = self.reload;
        } else if was_enabled && !self.control.enable {
            log::debug!("timer {} disabled at {:04X}", self.id, self.counter);
        }
    }

    fn run_prescaled(&mut self, cycles: u32, irq: &mut InterruptController) {
        let mut available = self.cycles + cycles;
        let mut increments = available >> self.shift;
        let mut to_overflow = 0x10000 - self.counter as u32;

        self.overflow = false;

        if increments >= to_overflow {
            self.counter = self.reload;
            self.overflow = true;
            self.overflows = 1;
            increments -= to_overflow;

            to_overflow = 0x10000 - self.reload as u32;
            if increments >= to_overflow {
                self.overflows += increments / to_overflow;
                increments %= to_overflow;
            }
        }

        self.counter += increments as u16;
        available &= self.mask;
        self.cycles = available;

        if self.overflow && self.control.interrupt {
            irq.raise(Interrupt::timer(self.id));
        }
    }

    fn run_cascaded(&mut self, lower: &mut Timer, irq: &mut InterruptController) {
        if !lower.overflow {
            return;
        }

        self.overflow = false;

        if self.counter != 0xFFFF {
            self.counter += 1;
        } else {
            self.counter = self.reload;
            self.overflow = true;
            self.overflows = 1;

            if self.control.interrupt {
                irq.raise(Interrupt::timer(self.id));
            }
        }

        lower.overflow = false;
    }
}

pub struct TimerController {
    timers: [Timer; TIMER_COUNT],
}

impl SystemControl for TimerController {
    fn reset(&mut self) {
        for timer in self.timers.iter_mut() {
            timer.reset();
        }
    }
}

impl TimerController {
    pub fn new() -> Self {
        Self {
            timers: [Timer::new(0), Timer::new(1), Timer::new(2), Timer::new(3)],
        }
    }

    #[inline]
    pub fn timer(&self, id: usize) -> &Timer {
        &self.timers[id]
    }

    /// Advances all enabled timers by `cycles`, lowest id first so that
    /// cascading timers see this step's overflow from the timer below.
    pub fn run(&mut self, cycles: u32, irq: &mut InterruptController) {
        for id in 0..TIMER_COUNT {
            let (lower, upper) = self.timers.split_at_mut(id);
            let timer = &mut upper[0];

            if !timer.control.enable {
                continue;
            }

            timer.overflows = 0;

            if timer.control.cascade {
                if let Some(lower) = lower.last_mut() {
                    timer.run_cascaded(lower, irq);
                }
            } else {
                timer.run_prescaled(cycles, irq);
            }
        }
    }

    pub fn read_register(&self, addr: usize) -> u8 {
        let timer = &self.timers[(addr - TIMER_REG_START) >> 2];

        match addr & 0x03 {
            0 => timer.counter as u8,
            1 => (timer.counter >> 8) as u8,
            2 => timer.control.to_byte(),
            _ => 0,
        }
    }

    pub fn write_register(&mut self, addr: usize, byte: u8) {
        let timer = &mut self.timers[(addr - TIMER_REG_START) >> 2];

        match addr & 0x03 {
            0 => timer.reload = (timer.reload & 0xFF00) | byte as u16,
            1 => timer.reload = (timer.reload & 0x00FF) | ((byte as u16) << 8),
            2 => timer.write_control(byte),
            _ => {}
        }
    }
}

#[cfg(test)]
impl TimerController {
    pub fn start(&mut self, id: usize, reload: u16, control: u8) {
        let base = TIMER_REG_START + id * 4;
        self.write_register(base, reload as u8);
        self.write_register(base + 1, (reload >> 8) as u8);
        self.write_register(base + 2, control);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::{TimerControl, TimerController, TIMER_REG_START};
    use crate::interrupt::{Interrupt, InterruptController};

    const ENABLE_IRQ: u8 = TimerControl::ENABLE | TimerControl::INTERRUPT;

    // frequency, reload, cycles -> counter after the batch, wraps within the batch
    const PRESCALER_CASES: &str = r#"[
        { "frequency": 1, "reload": 65534, "cycles": 128,  "counter": 65534, "overflows": 1 },
        { "frequency": 0, "reload": 0,     "cycles": 100,  "counter": 100,   "overflows": 0 },
        { "frequency": 1, "reload": 0,     "cycles": 100,  "counter": 1,     "overflows": 0 },
        { "frequency": 2, "reload": 0,     "cycles": 1024, "counter": 4,     "overflows": 0 },
        { "frequency": 3, "reload": 65535, "cycles": 3072, "counter": 65535, "overflows": 3 },
        { "frequency": 0, "reload": 65280, "cycles": 768,  "counter": 65280, "overflows": 3 },
        { "frequency": 0, "reload": 65280, "cycles": 300,  "counter": 65324, "overflows": 1 }
    ]"#;

    #[test]
    pub fn test_prescaler_cases() {
        let cases: Vec<Value> = serde_json::from_str(PRESCALER_CASES).unwrap();

        for case in &cases {
            let frequency = case.get("frequency").unwrap().as_u64().unwrap() as u8;
            let reload = case.get("reload").unwrap().as_u64().unwrap() as u16;
            let cycles = case.get("cycles").unwrap().as_u64().unwrap() as u32;

            let mut timers = TimerController::new();
            let mut irq = InterruptController::new();
            timers.start(0, reload, TimerControl::ENABLE | frequency);
            timers.run(cycles, &mut irq);

            assert_eq!(timers.timer(0).counter as u64, case.get("counter").unwrap().as_u64().unwrap(), "FAILED: {}", case);
            assert_eq!(timers.timer(0).overflows() as u64, case.get("overflows").unwrap().as_u64().unwrap(), "FAILED: {}", case);
        }
    }

    #[test]
    pub fn test_one_increment_per_divider() {
        for (frequency, divider) in [(0u8, 1u32), (1, 64), (2, 256), (3, 1024)] {
            for id in 0..4 {
                let mut timers = TimerController::new();
                let mut irq = InterruptController::new();
                timers.start(id, 0x1000, TimerControl::ENABLE | frequency);

                // fed one cycle at a time, the leftover cycles must carry over
                for _ in 0..(divider - 1) {
                    timers.run(1, &mut irq);
                }
                assert_eq!(timers.timer(id).counter, 0x1000, "timer {} ticked early", id);

                timers.run(1, &mut irq);
                assert_eq!(timers.timer(id).counter, 0x1001);

                timers.run(divider * 3, &mut irq);
                assert_eq!(timers.timer(id).counter, 0x1004);
            }
        }
    }

    #[test]
    pub fn test_overflow_reloads_and_raises_irq() {
        let mut timers = TimerController::new();
        let mut irq = InterruptController::new();
        timers.start(0, 0xFFFE, ENABLE_IRQ | 1);

        timers.run(128, &mut irq);

        assert_eq!(timers.timer(0).overflows(), 1);
        assert_eq!(timers.timer(0).counter, 0xFFFE);
        assert_eq!(irq.pending, Interrupt::TIMER0);
    }

    #[test]
    pub fn test_overflow_without_irq_enabled() {
        for id in 0..4 {
            let mut timers = TimerController::new();
            let mut irq = InterruptController::new();
            timers.start(id, 0xFFF0, TimerControl::ENABLE);

            timers.run(0x20, &mut irq);
            assert_eq!(timers.timer(id).counter, 0xFFF0);
            assert!(timers.timer(id).overflow);
            assert!(irq.pending.is_empty());

            let mut timers = TimerController::new();
            timers.start(id, 0xFFF0, ENABLE_IRQ);
            timers.run(0x10, &mut irq);
            assert_eq!(irq.pending, Interrupt::timer(id));
            irq.pending = Interrupt::empty();
        }
    }

    #[test]
    pub fn test_cascade_counts_once_per_batch() {
        let mut timers = TimerController::new();
        let mut irq = InterruptController::new();
        timers.start(0, 0xFFFF, TimerControl::ENABLE);
        timers.start(1, 0, ENABLE_IRQ | TimerControl::CASCADE);

        // large enough for timer 0 to wrap twice
        timers.run(2, &mut irq);
        assert_eq!(timers.timer(0).overflows(), 2);
        assert_eq!(timers.timer(1).counter, 1);
        assert!(!timers.timer(0).overflow, "cascade step must consume the lower overflow");

        timers.run(1, &mut irq);
        assert_eq!(timers.timer(1).counter, 2);
        assert!(irq.pending.is_empty());
    }

    #[test]
    pub fn test_cascade_wraps_into_next_timer() {
        let mut timers = TimerController::new();
        let mut irq = InterruptController::new();
        timers.start(0, 0xFFFF, TimerControl::ENABLE);
        timers.start(1, 0xFFFE, ENABLE_IRQ | TimerControl::CASCADE);
        timers.start(2, 0x0000, TimerControl::ENABLE | TimerControl::CASCADE);

        timers.run(1, &mut irq);
        assert_eq!(timers.timer(1).counter, 0xFFFF);
        assert_eq!(timers.timer(2).counter, 0);

        timers.run(1, &mut irq);
        assert_eq!(timers.timer(1).counter, 0xFFFE);
        assert_eq!(timers.timer(2).counter, 1);
        assert_eq!(irq.pending, Interrupt::TIMER1);
    }

    #[test]
    pub fn test_cascade_ignored_on_timer0() {
        let mut timers = TimerController::new();
        let mut irq = InterruptController::new();
        timers.start(0, 0x0010, TimerControl::ENABLE | TimerControl::CASCADE);

        timers.run(1000, &mut irq);
        assert_eq!(timers.timer(0).counter, 0x0010);
    }

    #[test]
    pub fn test_enable_transition_reloads() {
        let mut timers = TimerController::new();
        let mut irq = InterruptController::new();
        timers.start(2, 0x8000, TimerControl::ENABLE);
        timers.run(5, &mut irq);
        assert_eq!(timers.timer(2).counter, 0x8005);

        // still enabled: no reload
        timers.write_register(TIMER_REG_START + 8 + 2, TimerControl::ENABLE);
        assert_eq!(timers.timer(2).counter, 0x8005);

        // disabling keeps the count, re-enabling reloads it
        timers.write_register(TIMER_REG_START + 8 + 2, 0);
        assert_eq!(timers.timer(2).counter, 0x8005);
        timers.write_register(TIMER_REG_START + 8 + 2, TimerControl::ENABLE);
        assert_eq!(timers.timer(2).counter, 0x8000);
    }

    #[test]
    pub fn test_register_io() {
        let mut timers = TimerController::new();
        timers.start(3, 0xABCD, ENABLE_IRQ | TimerControl::CASCADE | 0b1111_1011);

        assert_eq!(timers.read_register(TIMER_REG_START + 12), 0xCD);
        assert_eq!(timers.read_register(TIMER_REG_START + 13), 0xAB);
        // reserved bits read back as zero
        assert_eq!(timers.read_register(TIMER_REG_START + 14), 0b1100_0111);
        assert_eq!(timers.read_register(TIMER_REG_START + 15), 0);
    }
}
