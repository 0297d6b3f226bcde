//! Named bits of the 32-bit `extras` field.

use std::fmt;

bitflags::bitflags! {
    /// Flag bits reported by the digitiser alongside each record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ExtraFlags: u32 {
        /// First event after a dead time occurrence
        const DEAD_TIME_FIRST = 0x1;
        /// Time tag rollover
        const TIME_TAG_ROLLOVER = 0x2;
        /// Time tag reset
        const TIME_TAG_RESET = 0x4;
        /// Fake event; with zero energy this is a frame marker
        const FAKE_EVENT = 0x8;
        /// Event energy saturated
        const ENERGY_SATURATED = 0x80;
        /// Input dynamics saturated
        const INPUT_SATURATED = 0x400;
        /// Pile-up event
        const PILE_UP = 0x8000;
        /// Dead time calculation event
        const DEAD_TIME_CALC = 0x1_0000;
        /// Energy outside the SCA interval
        const OUTSIDE_SCA = 0x2_0000;
        /// Event occurred during saturation inhibit
        const SATURATION_INHIBIT = 0x4_0000;
    }
}

const DESCRIPTIONS: [(ExtraFlags, &str); 10] = [
    (ExtraFlags::DEAD_TIME_FIRST, "first event after dead time"),
    (ExtraFlags::TIME_TAG_ROLLOVER, "time tag rollover"),
    (ExtraFlags::TIME_TAG_RESET, "time tag reset"),
    (ExtraFlags::FAKE_EVENT, "fake event"),
    (ExtraFlags::ENERGY_SATURATED, "energy saturated"),
    (ExtraFlags::INPUT_SATURATED, "input dynamics saturated"),
    (ExtraFlags::PILE_UP, "pile up"),
    (ExtraFlags::DEAD_TIME_CALC, "dead time calculation"),
    (ExtraFlags::OUTSIDE_SCA, "outside SCA interval"),
    (ExtraFlags::SATURATION_INHIBIT, "during saturation inhibit"),
];

impl ExtraFlags {
    /// Renders a comma-separated description of the set bits in `raw`.
    ///
    /// Bits outside the known set are reported once as "unknown flag".
    pub fn describe(raw: u32) -> String {
        Describe(raw).to_string()
    }
}

/// Display adapter for a raw `extras` value.
#[derive(Debug, Clone, Copy)]
pub struct Describe(pub u32);

impl fmt::Display for Describe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = ExtraFlags::from_bits_retain(self.0);
        let mut first = true;
        for (flag, text) in DESCRIPTIONS {
            if flags.contains(flag) {
                if !first {
                    f.write_str(", ")?;
                }
                f.write_str(text)?;
                first = false;
            }
        }
        if self.0 & !ExtraFlags::all().bits() != 0 {
            if !first {
                f.write_str(", ")?;
            }
            f.write_str("unknown flag")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_empty() {
        assert_eq!(ExtraFlags::describe(0), "");
    }

    #[test]
    fn test_describe_marker() {
        assert_eq!(ExtraFlags::describe(0x8), "fake event");
    }

    #[test]
    fn test_describe_multiple_and_unknown() {
        assert_eq!(
            ExtraFlags::describe(0x1 | 0x8000 | 0x100),
            "first event after dead time, pile up, unknown flag"
        );
        assert_eq!(ExtraFlags::describe(0x8000_0000), "unknown flag");
    }

    #[test]
    fn test_marker_bit_matches_constant() {
        assert_eq!(ExtraFlags::FAKE_EVENT.bits(), crate::types::FRAME_MARKER_FLAG);
    }
}
