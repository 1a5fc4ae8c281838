use std::collections::BTreeSet;

use tracing::info;

use crate::core::{Error, Result, SECONDS_PER_CYCLE};

/// TDMA schedule of the local node
///
/// Each minute is cut into windows of `slot_duration` seconds, assigned to
/// slots `0, 1, .., slot_count - 1` in turn and repeating. Seconds left over
/// when the duration does not divide the minute belong to no slot.
#[derive(Debug, Clone)]
pub struct TdmaSchedule {
    slot_count: u32,
    slot_number: u32,
    slot_duration: u32,
    /// First second of each window assigned to this node
    starts: BTreeSet<u32>,
}

impl TdmaSchedule {
    /// Builds the schedule, rejecting an undefined configuration
    pub fn configure(slot_count: u32, slot_number: u32, slot_duration: u32) -> Result<Self> {
        let mut schedule = TdmaSchedule {
            slot_count: 0,
            slot_number: 0,
            slot_duration: 0,
            starts: BTreeSet::new(),
        };
        schedule.reconfigure(slot_count, slot_number, slot_duration)?;
        Ok(schedule)
    }

    /// Replaces the slot configuration and recomputes the active windows
    ///
    /// On error the previous schedule is kept.
    pub fn reconfigure(&mut self, slot_count: u32, slot_number: u32, slot_duration: u32) -> Result<()> {
        if slot_count == 0 {
            return Err(Error::config("Slot count must be at least 1"));
        }

        if slot_number >= slot_count {
            return Err(Error::config(format!(
                "Slot number {} out of range for {} slots",
                slot_number, slot_count
            )));
        }

        if slot_duration == 0 || slot_duration > SECONDS_PER_CYCLE {
            return Err(Error::config(format!(
                "Slot duration must be within 1..={} seconds, got {}",
                SECONDS_PER_CYCLE, slot_duration
            )));
        }

        let mut starts = BTreeSet::new();
        let mut step = 0;
        while (step + 1) * slot_duration <= SECONDS_PER_CYCLE {
            let start = step * slot_duration;
            if step % slot_count == slot_number {
                info!("slot second {}", start);
                starts.insert(start);
            }
            step += 1;
        }

        self.slot_count = slot_count;
        self.slot_number = slot_number;
        self.slot_duration = slot_duration;
        self.starts = starts;
        Ok(())
    }

    /// Whether this node may transmit during `second` of the minute
    pub fn is_my_turn(&self, second: u32) -> bool {
        self.slot_start(second).is_some()
    }

    /// First second of this node's window containing `second`, if any
    pub fn slot_start(&self, second: u32) -> Option<u32> {
        if second >= SECONDS_PER_CYCLE {
            return None;
        }

        let start = second - second % self.slot_duration;
        self.starts.contains(&start).then_some(start)
    }

    /// Every second of the minute during which this node may transmit
    pub fn active_seconds(&self) -> impl Iterator<Item = u32> + '_ {
        self.starts
            .iter()
            .flat_map(move |&start| start..start + self.slot_duration)
    }

    pub fn slot_count(&self) -> u32 {
        self.slot_count
    }

    pub fn slot_number(&self) -> u32 {
        self.slot_number
    }

    pub fn slot_duration(&self) -> u32 {
        self.slot_duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_slots_of_ten_seconds() {
        let schedule = TdmaSchedule::configure(3, 1, 10).unwrap();

        let active: Vec<u32> = schedule.active_seconds().collect();
        let expected: Vec<u32> = (10..20).chain(40..50).collect();
        assert_eq!(active, expected);

        assert!(schedule.is_my_turn(15));
        assert!(!schedule.is_my_turn(25));
        assert!(schedule.is_my_turn(10));
        assert!(!schedule.is_my_turn(20));
        assert_eq!(schedule.slot_start(47), Some(40));
    }

    #[test]
    fn test_leftover_seconds_are_unassigned() {
        // 60 / 7 leaves seconds 56..59 outside any slot
        let schedule = TdmaSchedule::configure(2, 0, 7).unwrap();
        let active: Vec<u32> = schedule.active_seconds().collect();
        let expected: Vec<u32> = (0..7).chain(14..21).chain(28..35).chain(42..49).collect();
        assert_eq!(active, expected);
        assert!(!schedule.is_my_turn(57));

        let last = TdmaSchedule::configure(2, 1, 7).unwrap();
        assert!(last.is_my_turn(49));
        assert!(!last.is_my_turn(56));
    }

    #[test]
    fn test_single_slot_owns_the_minute() {
        let schedule = TdmaSchedule::configure(1, 0, 60).unwrap();
        assert!((0..60).all(|s| schedule.is_my_turn(s)));
        assert!(!schedule.is_my_turn(60));
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(matches!(TdmaSchedule::configure(3, 3, 10), Err(Error::Config(_))));
        assert!(TdmaSchedule::configure(0, 0, 10).is_err());
        assert!(TdmaSchedule::configure(2, 0, 0).is_err());
        assert!(TdmaSchedule::configure(2, 0, 61).is_err());
    }

    #[test]
    fn test_failed_reconfigure_keeps_schedule() {
        let mut schedule = TdmaSchedule::configure(3, 1, 10).unwrap();
        assert!(schedule.reconfigure(3, 5, 10).is_err());
        assert!(schedule.is_my_turn(15));

        schedule.reconfigure(2, 1, 5).unwrap();
        assert!(schedule.is_my_turn(7));
        assert!(!schedule.is_my_turn(15));
        assert_eq!(schedule.slot_duration(), 5);
    }
}
