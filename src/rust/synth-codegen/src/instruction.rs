// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Binary instruction encoding of the sequencer.
//!
//! Every instruction is a 64-bit record. The two low-order bits of the final
//! byte select the instruction type:
//!
//! | opcode | instruction       | bytes `[0:4)`  | bytes `[4:6)`      | byte 6            |
//! |--------|-------------------|----------------|--------------------|-------------------|
//! | `00`   | channel update    | data           | address            | `slot << 4 \| ch` |
//! | `01`   | set register      | value          | register           | 0                 |
//! | `10`   | conditional jump  | 0              | counter register   | 0                 |
//! | `11`   | jump              | 0              | address            | 0                 |
//!
//! All multi-byte fields are little endian.
use synth_sequence::{ChannelKind, Timestamp, Update};
use synth_units::{amplitude_to_atw, duration_to_ticks, frequency_to_ftw, phase_to_ptw};

use crate::ir::Address;
use crate::{Error, Result};

pub const INSTRUCTION_SIZE: usize = 8;
pub const INSTRUCTION_ADDRESS_BITS: u32 = 14;
pub const MAX_ADDRESS: Address = (1 << INSTRUCTION_ADDRESS_BITS) - 1;
/// Number of hardware loop counters.
pub const COUNTER_COUNT: u8 = 8;

/// Holds the remaining trip count of the loop using counter `n` at `0x00 + n`.
pub const COUNT_REGISTER_BASE: u16 = 0x00;
/// Holds the address after the loop, or the return address of a subroutine.
pub const EXIT_REGISTER_BASE: u16 = 0x10;
/// Holds the first address of the loop body.
pub const START_REGISTER_BASE: u16 = 0x20;

const OPCODE_MASK: u8 = 0b11;
const OPCODE_CHANNEL_UPDATE: u8 = 0b00;
const OPCODE_SET_REGISTER: u8 = 0b01;
const OPCODE_CONDITIONAL_JUMP: u8 = 0b10;
const OPCODE_JUMP: u8 = 0b11;
const CHANNEL_UPDATE_MARKER: u8 = 0xA0;

/// Memory written by a channel update record.
///
/// Each timestamp is spread over four memories that share one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MemorySlot {
    /// Low 32 bits of the duration in ticks.
    TicksLow = 0,
    /// High 16 bits of the duration, digital outputs and trigger flag.
    TicksHighDigital = 1,
    /// Frequency tuning word.
    Frequency = 2,
    /// Phase and amplitude tuning words and the RF enable bits.
    PhaseAmplitude = 3,
}

impl MemorySlot {
    const ALL: [MemorySlot; 4] = [
        MemorySlot::TicksLow,
        MemorySlot::TicksHighDigital,
        MemorySlot::Frequency,
        MemorySlot::PhaseAmplitude,
    ];

    fn from_index(index: u8) -> Result<Self> {
        Self::ALL
            .get(index as usize)
            .copied()
            .ok_or_else(|| Error::new(format!("Invalid memory slot {index}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    ChannelUpdate {
        channel: u8,
        slot: MemorySlot,
        address: Address,
        data: u32,
    },
    SetRegister {
        register: u16,
        value: u32,
    },
    /// If the counter register is nonzero it is decremented, and the
    /// sequencer jumps to the loop start while it stays nonzero. Otherwise
    /// execution continues at the address in the exit register.
    ///
    /// The jump is taken after the decrement, so a count of `n` plays the
    /// body `n` times: the body runs once before the first check and the
    /// jump back is taken `n - 1` times. A counter written as 0 falls
    /// through immediately, which is how a subroutine body returns.
    ConditionalJump {
        counter: u8,
    },
    Jump {
        address: Address,
    },
}

impl Instruction {
    pub fn to_bytes(&self) -> [u8; INSTRUCTION_SIZE] {
        let mut bytes = [0u8; INSTRUCTION_SIZE];
        match *self {
            Instruction::ChannelUpdate {
                channel,
                slot,
                address,
                data,
            } => {
                bytes[0..4].copy_from_slice(&data.to_le_bytes());
                bytes[4..6].copy_from_slice(&address.to_le_bytes());
                bytes[6] = ((slot as u8) << 4) | channel;
                bytes[7] = CHANNEL_UPDATE_MARKER | OPCODE_CHANNEL_UPDATE;
            }
            Instruction::SetRegister { register, value } => {
                bytes[0..4].copy_from_slice(&value.to_le_bytes());
                bytes[4..6].copy_from_slice(&register.to_le_bytes());
                bytes[7] = OPCODE_SET_REGISTER;
            }
            Instruction::ConditionalJump { counter } => {
                bytes[4..6].copy_from_slice(&register(COUNT_REGISTER_BASE, counter).to_le_bytes());
                bytes[7] = OPCODE_CONDITIONAL_JUMP;
            }
            Instruction::Jump { address } => {
                bytes[4..6].copy_from_slice(&address.to_le_bytes());
                bytes[7] = OPCODE_JUMP;
            }
        }
        bytes
    }

    pub fn from_bytes(bytes: [u8; INSTRUCTION_SIZE]) -> Result<Self> {
        let low = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let mid = u16::from_le_bytes([bytes[4], bytes[5]]);
        let instruction = match bytes[7] & OPCODE_MASK {
            OPCODE_CHANNEL_UPDATE => Instruction::ChannelUpdate {
                channel: bytes[6] & 0x0F,
                slot: MemorySlot::from_index(bytes[6] >> 4)?,
                address: mid,
                data: low,
            },
            OPCODE_SET_REGISTER => Instruction::SetRegister {
                register: mid,
                value: low,
            },
            OPCODE_CONDITIONAL_JUMP => Instruction::ConditionalJump {
                counter: u8::try_from(mid.wrapping_sub(COUNT_REGISTER_BASE))
                    .map_err(|_| Error::new(format!("Invalid counter register {mid:#x}")))?,
            },
            _ => Instruction::Jump { address: mid },
        };
        Ok(instruction)
    }
}

/// Register `base + counter` of a loop counter.
fn register(base: u16, counter: u8) -> u16 {
    base + counter as u16
}

fn check_address(address: usize) -> Result<Address> {
    if address > MAX_ADDRESS as usize {
        return Err(Error::new(format!(
            "Instruction address {address} exceeds the maximum address {MAX_ADDRESS}"
        )));
    }
    Ok(address as Address)
}

fn check_counter(counter: u8) -> Result<()> {
    if counter >= COUNTER_COUNT {
        return Err(Error::new(format!(
            "Loop counter {counter} out of range, the sequencer has {COUNTER_COUNT} counters"
        )));
    }
    Ok(())
}

pub fn set_register(register: u16, value: u32) -> Instruction {
    Instruction::SetRegister { register, value }
}

pub fn jump(address: Address) -> Result<Instruction> {
    Ok(Instruction::Jump {
        address: check_address(address as usize)?,
    })
}

pub fn conditional_jump(counter: u8) -> Result<Instruction> {
    check_counter(counter)?;
    Ok(Instruction::ConditionalJump { counter })
}

/// Control instructions of a loop whose first instruction is at `start`.
///
/// The first three instructions are the preamble at `start..start + 3`
/// writing the trip count, the address following the loop and the first
/// address of the body. The last one closes the body at
/// `start + 3 + body_length`.
///
/// The loop occupies `body_length + 4` addresses. The start register holds
/// `start + 3`, the first body address, because jumping to `start` would run
/// the preamble again and reload the count on every pass. The exit register
/// holds `start + body_length + 4`, the first address after the closing
/// jump; `start + body_length + 3` is the closing jump itself. See
/// [`Instruction::ConditionalJump`] for how `n` maps to the number of
/// passes.
pub fn compile_loop(
    start: Address,
    body_length: usize,
    n: u32,
    counter: u8,
) -> Result<[Instruction; 4]> {
    if n == 0 {
        return Err(Error::new("A hardware loop must run at least once"));
    }
    check_counter(counter)?;
    let body_start = check_address(start as usize + 3)?;
    let exit = check_address(start as usize + body_length + 4)?;
    Ok([
        set_register(register(COUNT_REGISTER_BASE, counter), n),
        set_register(register(EXIT_REGISTER_BASE, counter), exit as u32),
        set_register(register(START_REGISTER_BASE, counter), body_start as u32),
        Instruction::ConditionalJump { counter },
    ])
}

/// Instructions of a subroutine call site at `start`.
///
/// The call resets the counter so the closing conditional jump of the body
/// falls through to the return address stored in the exit register.
pub fn compile_subroutine(
    start: Address,
    subroutine_start: Address,
    counter: u8,
) -> Result<[Instruction; 3]> {
    check_counter(counter)?;
    let return_address = check_address(start as usize + 3)?;
    Ok([
        set_register(register(COUNT_REGISTER_BASE, counter), 0),
        set_register(register(EXIT_REGISTER_BASE, counter), return_address as u32),
        jump(subroutine_start)?,
    ])
}

/// Quantized content of one timestamp for an RF channel and the digital outputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimestampWord {
    pub ticks: u64,
    /// Bit `i` set when digital output `i` is updated.
    pub digital_mask: u8,
    pub digital_levels: u8,
    pub wait_for_trigger: bool,
    pub ftw: Option<u32>,
    pub ptw: Option<u16>,
    pub atw: Option<u16>,
}

impl TimestampWord {
    /// Quantize `timestamp` for the board driving RF channel `rf_channel`.
    pub fn new(timestamp: &Timestamp, rf_channel: u8) -> Result<Self> {
        let mut word = TimestampWord {
            ticks: duration_to_ticks(timestamp.duration())?,
            ..Default::default()
        };
        for (&channel, update) in timestamp.update() {
            let index = channel.index();
            match (channel.kind(), update) {
                (ChannelKind::Digital, Update::Digital(digital)) => {
                    if let Some(level) = digital.value {
                        word.digital_mask |= 1 << index;
                        word.digital_levels |= (level as u8) << index;
                    }
                }
                (ChannelKind::Rf, Update::Analog(analog)) if index == rf_channel => {
                    word.ftw = analog
                        .intermediate_frequency()
                        .map(frequency_to_ftw)
                        .transpose()?;
                    word.ptw = analog.phase().map(phase_to_ptw).transpose()?;
                    word.atw = analog.amplitude().map(amplitude_to_atw).transpose()?;
                }
                _ => {
                    return Err(Error::new(format!(
                        "Timestamp updates channel {channel} which is not driven by RF{rf_channel}"
                    )));
                }
            }
        }
        Ok(word)
    }

    /// Channel update records writing the word to `address`, one per memory slot.
    pub fn to_instructions(&self, rf_channel: u8, address: Address) -> [Instruction; 4] {
        let ticks_high = ((self.ticks >> 32) & 0xFFFF) as u32;
        let slot_data = |slot| match slot {
            MemorySlot::TicksLow => self.ticks as u32,
            MemorySlot::TicksHighDigital => {
                ticks_high
                    | (self.digital_mask as u32) << 16
                    | (self.digital_levels as u32) << 24
                    | (self.wait_for_trigger as u32) << 31
            }
            MemorySlot::Frequency => self.ftw.unwrap_or(0),
            MemorySlot::PhaseAmplitude => {
                self.ptw.unwrap_or(0) as u32
                    | (self.atw.unwrap_or(0) as u32) << 12
                    | (self.ftw.is_some() as u32) << 28
                    | (self.ptw.is_some() as u32) << 29
                    | (self.atw.is_some() as u32) << 30
            }
        };
        MemorySlot::ALL.map(|slot| Instruction::ChannelUpdate {
            channel: rf_channel,
            slot,
            address,
            data: slot_data(slot),
        })
    }
}
