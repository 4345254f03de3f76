//! EVM opcode identifiers.
//!
//! Per-opcode *semantics* are an external collaborator; this engine only
//! needs an opcode identity to key hook registrations and to drive the CFG
//! decision table. Trimmed to the identifiers this crate actually branches
//! on plus the full byte space so hooks can be registered against any
//! opcode.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Opcode {
    Stop,
    Jump,
    Jumpi,
    Jumpdest,
    Sload,
    Sstore,
    Return,
    Revert,
    Call,
    CallCode,
    DelegateCall,
    StaticCall,
    Create,
    Create2,
    SelfDestruct,
    /// Any opcode not named above, keyed by its raw byte (arithmetic,
    /// bitwise, environment, push/dup/swap/log opcodes, ...).
    Other(u8),
}

impl Opcode {
    pub fn as_byte(self) -> u8 {
        match self {
            Opcode::Stop => 0x00,
            Opcode::Jump => 0x56,
            Opcode::Jumpi => 0x57,
            Opcode::Jumpdest => 0x5B,
            Opcode::Sload => 0x54,
            Opcode::Sstore => 0x55,
            Opcode::Return => 0xF3,
            Opcode::Revert => 0xFD,
            Opcode::Call => 0xF1,
            Opcode::CallCode => 0xF2,
            Opcode::DelegateCall => 0xF4,
            Opcode::StaticCall => 0xFA,
            Opcode::Create => 0xF0,
            Opcode::Create2 => 0xF5,
            Opcode::SelfDestruct => 0xFF,
            Opcode::Other(byte) => byte,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Opcode::Stop => "STOP",
            Opcode::Jump => "JUMP",
            Opcode::Jumpi => "JUMPI",
            Opcode::Jumpdest => "JUMPDEST",
            Opcode::Sload => "SLOAD",
            Opcode::Sstore => "SSTORE",
            Opcode::Return => "RETURN",
            Opcode::Revert => "REVERT",
            Opcode::Call => "CALL",
            Opcode::CallCode => "CALLCODE",
            Opcode::DelegateCall => "DELEGATECALL",
            Opcode::StaticCall => "STATICCALL",
            Opcode::Create => "CREATE",
            Opcode::Create2 => "CREATE2",
            Opcode::SelfDestruct => "SELFDESTRUCT",
            Opcode::Other(_) => "OTHER",
        }
    }
}

impl From<u8> for Opcode {
    fn from(byte: u8) -> Self {
        match byte {
            0x00 => Opcode::Stop,
            0x56 => Opcode::Jump,
            0x57 => Opcode::Jumpi,
            0x5B => Opcode::Jumpdest,
            0x54 => Opcode::Sload,
            0x55 => Opcode::Sstore,
            0xF3 => Opcode::Return,
            0xFD => Opcode::Revert,
            0xF1 => Opcode::Call,
            0xF2 => Opcode::CallCode,
            0xF4 => Opcode::DelegateCall,
            0xFA => Opcode::StaticCall,
            0xF0 => Opcode::Create,
            0xF5 => Opcode::Create2,
            0xFF => Opcode::SelfDestruct,
            other => Opcode::Other(other),
        }
    }
}
