//! MIPS/SPIM assembly text emission (§4.6): the final, mechanical
//! expansion from RTL mnemonics to `.s` source.

pub mod emit;

/// A whole program's assembly text, already laid out as `.data` followed
/// by one `.text` block per function (§6 Output Formats).
pub struct Program {
    pub text: String,
}
