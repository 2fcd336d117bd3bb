use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::ppu::Phase;
use crate::SystemControl;

/// Something that can be due at a point on the timeline. Owners pop their
/// own events back out of the scheduler and dispatch them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The given PPU phase has run to completion
    Ppu(Phase),
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    fire_cycle: u64,
    // insertion order, breaks ties between events due on the same cycle
    sequence: u64,
    event: Event,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.fire_cycle, self.sequence).cmp(&(other.fire_cycle, other.sequence))
    }
}

pub struct Scheduler {
    now: u64,
    next_sequence: u64,
    queue: BinaryHeap<Reverse<Entry>>,
}

impl SystemControl for Scheduler {
    fn reset(&mut self) {
        self.now = 0;
        self.next_sequence = 0;
        self.queue.clear();
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            now: 0,
            next_sequence: 0,
            queue: BinaryHeap::new(),
        }
    }

    /// Current position of the master cycle counter
    #[inline]
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Queues `event` to become due `delay` cycles from now.
    pub fn add(&mut self, delay: i32, event: Event) {
        assert!(delay >= 0, "cannot schedule {:?} {} cycles in the past", event, -delay);

        let entry = Entry {
            fire_cycle: self.now + delay as u64,
            sequence: self.next_sequence,
            event,
        };

        self.next_sequence += 1;
        self.queue.push(Reverse(entry));
    }

    /// Moves the master cycle counter forward. Events that become due are
    /// handed out by `pop_due`.
    pub fn advance(&mut self, cycles: u32) {
        self.now += cycles as u64;
    }

    /// Some contains the earliest due event and how many cycles late it is firing;
    /// None means nothing is due yet.
    pub fn pop_due(&mut self) -> Option<(Event, i32)> {
        match self.queue.peek() {
            Some(Reverse(entry)) if entry.fire_cycle <= self.now => {
                let Reverse(entry) = self.queue.pop()?;
                Some((entry.event, (self.now - entry.fire_cycle) as i32))
            }
            _ => None,
        }
    }

    /// Cycles until the earliest pending event, if any
    pub fn cycles_until_next(&self) -> Option<u64> {
        self.queue
            .peek()
            .map(|Reverse(entry)| entry.fire_cycle.saturating_sub(self.now))
    }

    /// Drops every pending event for which `filter` returns true.
    pub fn cancel<F>(&mut self, mut filter: F)
    where
        F: FnMut(&Event) -> bool,
    {
        self.queue.retain(|Reverse(entry)| !filter(&entry.event));
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{Event, Scheduler};
    use crate::ppu::Phase;
    use crate::SystemControl;

    #[test]
    pub fn test_fires_in_cycle_order() {
        let mut scheduler = Scheduler::new();
        scheduler.add(50, Event::Ppu(Phase::HBlank));
        scheduler.add(10, Event::Ppu(Phase::Scanline));
        scheduler.add(30, Event::Ppu(Phase::HBlankSearch));

        assert_eq!(scheduler.pop_due(), None);

        scheduler.advance(100);
        assert_eq!(scheduler.pop_due(), Some((Event::Ppu(Phase::Scanline), 90)));
        assert_eq!(scheduler.pop_due(), Some((Event::Ppu(Phase::HBlankSearch), 70)));
        assert_eq!(scheduler.pop_due(), Some((Event::Ppu(Phase::HBlank), 50)));
        assert_eq!(scheduler.pop_due(), None);
    }

    #[test]
    pub fn test_ties_are_fifo() {
        let mut scheduler = Scheduler::new();
        scheduler.add(8, Event::Ppu(Phase::VBlankHBlank));
        scheduler.add(8, Event::Ppu(Phase::Scanline));
        scheduler.add(8, Event::Ppu(Phase::VBlankScanline));

        scheduler.advance(8);
        assert_eq!(scheduler.pop_due(), Some((Event::Ppu(Phase::VBlankHBlank), 0)));
        assert_eq!(scheduler.pop_due(), Some((Event::Ppu(Phase::Scanline), 0)));
        assert_eq!(scheduler.pop_due(), Some((Event::Ppu(Phase::VBlankScanline), 0)));
    }

    #[test]
    pub fn test_not_due_until_fire_cycle() {
        let mut scheduler = Scheduler::new();
        scheduler.add(960, Event::Ppu(Phase::Scanline));

        scheduler.advance(959);
        assert_eq!(scheduler.pop_due(), None);
        assert_eq!(scheduler.cycles_until_next(), Some(1));

        scheduler.advance(1);
        assert_eq!(scheduler.pop_due(), Some((Event::Ppu(Phase::Scanline), 0)));
        assert_eq!(scheduler.cycles_until_next(), None);
    }

    #[test]
    pub fn test_late_compensation_keeps_cadence() {
        let mut scheduler = Scheduler::new();
        scheduler.add(10, Event::Ppu(Phase::Scanline));
        scheduler.advance(25);

        let (_, late) = scheduler.pop_due().unwrap();
        assert_eq!(late, 15);

        // due on cycle 10 + 16, regardless of when the first event was noticed
        scheduler.add(16 - late, Event::Ppu(Phase::HBlankSearch));
        assert_eq!(scheduler.pop_due(), None);

        scheduler.advance(1);
        assert_eq!(scheduler.pop_due(), Some((Event::Ppu(Phase::HBlankSearch), 0)));
    }

    #[test]
    #[should_panic]
    pub fn test_negative_delay_panics() {
        let mut scheduler = Scheduler::new();
        scheduler.add(-1, Event::Ppu(Phase::Scanline));
    }

    #[test]
    pub fn test_cancel_and_reset() {
        let mut scheduler = Scheduler::new();
        scheduler.add(1, Event::Ppu(Phase::Scanline));
        scheduler.add(2, Event::Ppu(Phase::HBlank));
        scheduler.cancel(|event| *event == Event::Ppu(Phase::Scanline));
        assert_eq!(scheduler.pending(), 1);

        scheduler.advance(100);
        scheduler.reset();
        assert_eq!(scheduler.now(), 0);
        assert_eq!(scheduler.pending(), 0);
    }
}
