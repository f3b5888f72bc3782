//! Operation flags.
//!
//! Integer types are sign-agnostic, so every operation whose result depends
//! on signedness (division, remainder, right shift, ordered comparison,
//! widening conversion) carries it explicitly.

use bitflags::bitflags;

bitflags! {
    /// Modifiers for arithmetic and comparison values.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct ArithmeticFlags: u8 {
        /// Treat integer operands as unsigned.
        const UNSIGNED = 1 << 0;
        /// Float comparisons are true when either operand is NaN.
        const UNORDERED = 1 << 1;
    }
}

bitflags! {
    /// Modifiers for conversion values.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct ConvertFlags: u8 {
        /// The source integer is unsigned (zero-extend, unsigned int-to-float).
        const SOURCE_UNSIGNED = 1 << 0;
        /// The target integer is unsigned (float-to-unsigned).
        const TARGET_UNSIGNED = 1 << 1;
    }
}
