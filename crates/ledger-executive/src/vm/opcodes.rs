//! # Instruction Set
//!
//! Decoded instructions for the shipped interpreter. Unmapped bytes fault
//! with `BadInstruction`.

/// A decoded instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    /// Halt execution (0x00).
    Stop,
    /// Addition (0x01).
    Add,
    /// Multiplication (0x02).
    Mul,
    /// Subtraction (0x03).
    Sub,
    /// Integer division; division by zero yields zero (0x04).
    Div,
    /// Less-than comparison (0x10).
    Lt,
    /// Greater-than comparison (0x11).
    Gt,
    /// Equality comparison (0x14).
    Eq,
    /// Is-zero test (0x15).
    IsZero,
    /// Bitwise and (0x16).
    And,
    /// Bitwise or (0x17).
    Or,
    /// Bitwise not (0x19).
    Not,
    /// Frame address (0x30).
    Address,
    /// Balance of an address (0x31).
    Balance,
    /// Transaction origin (0x32).
    Origin,
    /// Frame sender (0x33).
    Caller,
    /// Value transferred to the frame (0x34).
    CallValue,
    /// Load a word of input data (0x35).
    CallDataLoad,
    /// Input data length (0x36).
    CallDataSize,
    /// Gas price of the transaction (0x3A).
    GasPrice,
    /// Discard the top of the stack (0x50).
    Pop,
    /// Load a word from memory (0x51).
    MLoad,
    /// Store a word to memory (0x52).
    MStore,
    /// Load a storage slot (0x54).
    SLoad,
    /// Write a storage slot (0x55).
    SStore,
    /// Unconditional jump (0x56).
    Jump,
    /// Conditional jump (0x57).
    JumpI,
    /// Program counter (0x58).
    Pc,
    /// Remaining gas (0x5A).
    Gas,
    /// Valid jump target marker (0x5B).
    JumpDest,
    /// Push the following 1..=32 code bytes (0x60..=0x7F).
    Push(u8),
    /// Duplicate the stack element at depth 1..=16 (0x80..=0x8F).
    Dup(u8),
    /// Swap the top with the element at depth 1..=16 (0x90..=0x9F).
    Swap(u8),
    /// Emit a log with 0..=4 topics (0xA0..=0xA4).
    Log(u8),
    /// Create a contract from memory (0xF0).
    Create,
    /// Message call into an account (0xF1).
    Call,
    /// Halt returning memory contents (0xF3).
    Return,
    /// Mark the frame's account for destruction (0xFF).
    SelfDestruct,
}

impl Opcode {
    /// Decodes an instruction byte.
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Stop),
            0x01 => Some(Self::Add),
            0x02 => Some(Self::Mul),
            0x03 => Some(Self::Sub),
            0x04 => Some(Self::Div),
            0x10 => Some(Self::Lt),
            0x11 => Some(Self::Gt),
            0x14 => Some(Self::Eq),
            0x15 => Some(Self::IsZero),
            0x16 => Some(Self::And),
            0x17 => Some(Self::Or),
            0x19 => Some(Self::Not),
            0x30 => Some(Self::Address),
            0x31 => Some(Self::Balance),
            0x32 => Some(Self::Origin),
            0x33 => Some(Self::Caller),
            0x34 => Some(Self::CallValue),
            0x35 => Some(Self::CallDataLoad),
            0x36 => Some(Self::CallDataSize),
            0x3A => Some(Self::GasPrice),
            0x50 => Some(Self::Pop),
            0x51 => Some(Self::MLoad),
            0x52 => Some(Self::MStore),
            0x54 => Some(Self::SLoad),
            0x55 => Some(Self::SStore),
            0x56 => Some(Self::Jump),
            0x57 => Some(Self::JumpI),
            0x58 => Some(Self::Pc),
            0x5A => Some(Self::Gas),
            0x5B => Some(Self::JumpDest),
            0x60..=0x7F => Some(Self::Push(byte - 0x5F)),
            0x80..=0x8F => Some(Self::Dup(byte - 0x7F)),
            0x90..=0x9F => Some(Self::Swap(byte - 0x8F)),
            0xA0..=0xA4 => Some(Self::Log(byte - 0xA0)),
            0xF0 => Some(Self::Create),
            0xF1 => Some(Self::Call),
            0xF3 => Some(Self::Return),
            0xFF => Some(Self::SelfDestruct),
            _ => None,
        }
    }

    /// Number of immediate code bytes following the instruction.
    #[must_use]
    pub fn immediate_len(&self) -> usize {
        match self {
            Self::Push(n) => *n as usize,
            _ => 0,
        }
    }

    /// Instruction mnemonic for traces.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stop => "STOP",
            Self::Add => "ADD",
            Self::Mul => "MUL",
            Self::Sub => "SUB",
            Self::Div => "DIV",
            Self::Lt => "LT",
            Self::Gt => "GT",
            Self::Eq => "EQ",
            Self::IsZero => "ISZERO",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            Self::Address => "ADDRESS",
            Self::Balance => "BALANCE",
            Self::Origin => "ORIGIN",
            Self::Caller => "CALLER",
            Self::CallValue => "CALLVALUE",
            Self::CallDataLoad => "CALLDATALOAD",
            Self::CallDataSize => "CALLDATASIZE",
            Self::GasPrice => "GASPRICE",
            Self::Pop => "POP",
            Self::MLoad => "MLOAD",
            Self::MStore => "MSTORE",
            Self::SLoad => "SLOAD",
            Self::SStore => "SSTORE",
            Self::Jump => "JUMP",
            Self::JumpI => "JUMPI",
            Self::Pc => "PC",
            Self::Gas => "GAS",
            Self::JumpDest => "JUMPDEST",
            Self::Push(_) => "PUSH",
            Self::Dup(_) => "DUP",
            Self::Swap(_) => "SWAP",
            Self::Log(_) => "LOG",
            Self::Create => "CREATE",
            Self::Call => "CALL",
            Self::Return => "RETURN",
            Self::SelfDestruct => "SELFDESTRUCT",
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_basics() {
        assert_eq!(Opcode::from_byte(0x00), Some(Opcode::Stop));
        assert_eq!(Opcode::from_byte(0x01), Some(Opcode::Add));
        assert_eq!(Opcode::from_byte(0xFF), Some(Opcode::SelfDestruct));
        assert_eq!(Opcode::from_byte(0xFE), None);
        assert_eq!(Opcode::from_byte(0x20), None);
    }

    #[test]
    fn test_decode_push_range() {
        assert_eq!(Opcode::from_byte(0x60), Some(Opcode::Push(1)));
        assert_eq!(Opcode::from_byte(0x7F), Some(Opcode::Push(32)));
        assert_eq!(Opcode::Push(5).immediate_len(), 5);
    }

    #[test]
    fn test_decode_dup_swap_log() {
        assert_eq!(Opcode::from_byte(0x80), Some(Opcode::Dup(1)));
        assert_eq!(Opcode::from_byte(0x8F), Some(Opcode::Dup(16)));
        assert_eq!(Opcode::from_byte(0x90), Some(Opcode::Swap(1)));
        assert_eq!(Opcode::from_byte(0xA0), Some(Opcode::Log(0)));
        assert_eq!(Opcode::from_byte(0xA4), Some(Opcode::Log(4)));
        assert_eq!(Opcode::from_byte(0xA5), None);
    }
}
