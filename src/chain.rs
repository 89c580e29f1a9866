//! Selection of the configuration or data chain behind the TAP.
//!
//! The TAP has a 4-bit instruction register.  CHAIN_SELECT connects a 1-bit chain select register
//! to TDI/TDO; the value shifted through it picks the chain, and EXTEST then connects that chain.
//! Nothing remembers which chain was selected last: any other scan on the TAP may have changed
//! it, so every transaction selects its chain again.
use crate::bits::ScanPayload;
use crate::error::TransportError;
use crate::transport::ScanTransport;

pub const IR_LEN: usize = 4;
/// Width of the chain select register
pub const SELECT_LEN: usize = 1;

pub const CHAIN_SELECT: u8 = 0x3;
pub const EXTEST: u8 = 0x0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Chain {
    Config = 0,
    Data = 1,
}

/// Instruction opcodes used for chain selection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Opcodes {
    pub chain_select: u8,
    pub extest: u8,
}

impl Default for Opcodes {
    fn default() -> Self {
        Self {
            chain_select: CHAIN_SELECT,
            extest: EXTEST,
        }
    }
}

/// Queue the three scans that select `chain` and run them.  A failure leaves the selected chain
/// unknown; the next transaction starts over from the CHAIN_SELECT instruction.
pub fn select_chain<S>(tap: &mut S, opcodes: Opcodes, chain: Chain) -> Result<(), TransportError>
    where S: ScanTransport + ?Sized
{
    log::debug!("selecting {:?} chain", chain);
    tap.ir_scan(&ScanPayload::from_value(IR_LEN, opcodes.chain_select as u32));
    tap.dr_scan(SELECT_LEN, Some(&ScanPayload::from_value(SELECT_LEN, chain as u32)), false);
    tap.ir_scan(&ScanPayload::from_value(IR_LEN, opcodes.extest as u32));
    tap.execute_queue().map(|_| ())
}
