use thiserror::Error;

/// Every failure mode this crate can produce, from parsing the textual
/// front-end through encoding to mapping the executable page.
#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("Syntax Error: {0}")]
    PestError(#[from] pest::error::Error<crate::parser::Rule>),

    #[error("Syntax Error: {reason}")]
    Syntax { reason: String },

    #[error("invalid effective address: {reason}")]
    Pointer { reason: String },

    #[error("no `{mnemonic}` recipe matches operands {operands}")]
    NoMatchingSignature { mnemonic: String, operands: String },

    #[error("unknown mnemonic `{0}`")]
    UnknownMnemonic(String),

    #[error("label `{0}` defined more than once")]
    DuplicateLabel(String),

    #[error("undefined symbol `{0}`")]
    UndefinedSymbol(String),

    #[error("immediate value {value} does not fit in {width} bits")]
    ImmediateOutOfRange { value: i64, width: u32 },

    #[error("failed to allocate executable memory: {reason}")]
    PageAllocation { reason: String },

    #[error("assembled code does not fit in the reserved region ({needed} > {capacity} bytes)")]
    RegionOverflow { needed: usize, capacity: usize },

    #[error("{text}")]
    AtLine {
        line: usize,
        text: String,
        #[source]
        source: Box<AssemblyError>,
    },
}

impl AssemblyError {
    /// Wraps an error with the source line it was raised while processing,
    /// mirroring the teacher's `StructuralError`/`SemanticError` line
    /// tagging but composable over any inner variant.
    pub fn at_line(self, line: usize) -> Self {
        AssemblyError::AtLine { line, text: self.to_string(), source: Box::new(self) }
    }
}
