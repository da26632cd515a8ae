bitflags::bitflags! {
    /// Compilation progress recorded on a node.
    ///
    /// Only [`CompileStates::PERSISTENT`] bits are written to binaries; the
    /// extra states are scratch flags owned by later compilation stages.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CompileStates: u32 {
        const PROCESSED = 1 << 0;
        const VALIDATED = 1 << 1;
        const EXTRA_STATE_1 = 1 << 8;
        const EXTRA_STATE_2 = 1 << 9;
        const EXTRA_STATE_3 = 1 << 10;
        const EXTRA_STATE_4 = 1 << 11;

        const PERSISTENT = Self::PROCESSED.bits() | Self::VALIDATED.bits();
    }
}

impl CompileStates {
    /// Bits as written to a binary, with extra states removed.
    pub fn to_persistent_bits(self) -> i32 {
        (self & Self::PERSISTENT).bits() as i32
    }

    /// Inverse of [`CompileStates::to_persistent_bits`]. Unknown and extra
    /// bits are dropped.
    pub fn from_persistent_bits(bits: i32) -> Self {
        Self::from_bits_truncate(bits as u32) & Self::PERSISTENT
    }
}
