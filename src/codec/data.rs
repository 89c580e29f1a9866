//! Data chain: output values go in, input values come out, in the same scan.
//!
//! The remote register can't be read without also being written, so every exchange drives the
//! last commanded outputs again.  Values for pins configured as inputs are shifted too; the
//! device ignores them.
use crate::chain::{select_chain, Chain, Opcodes};
use crate::error::TransportError;
use crate::pins::{Pending, PinBank};
use crate::transport::ScanTransport;

use super::{decode, encode, single_capture};

/// Drive the cached outputs, commit them and sample every pin's input.
pub fn exchange<S>(tap: &mut S, opcodes: Opcodes, bank: &mut PinBank) -> Result<(), TransportError>
    where S: ScanTransport + ?Sized
{
    let payload = encode(bank, |pin| pin.output);

    select_chain(tap, opcodes, Chain::Data)?;
    tap.dr_scan(payload.width(), Some(&payload), true);
    let captured = single_capture(tap.execute_queue()?)?;
    log::trace!("data out {:?} in {:?}", payload, captured);

    decode(bank, &captured, |pin, bit| pin.input = bit);
    bank.clear_pending(Pending::OUTPUT);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::write_config;
    use crate::pins::Direction;
    use crate::sim::{Recorded, SimTap};

    #[test]
    fn outputs_go_out_with_commit_bit() {
        let mut tap = SimTap::new(3);
        let mut bank = PinBank::new(3).unwrap();
        let p1 = bank.index(1).unwrap();
        bank.set_output(p1, true);
        exchange(&mut tap, Opcodes::default(), &mut bank).unwrap();

        let Some(Recorded::Dr(payload)) = tap.history().last() else {
            panic!("no data scan recorded");
        };
        assert_eq!(payload.as_bytes(), &[0b1010]);
        assert_eq!(tap.outputs(), 0b010);
        assert!(!bank.any_pending(Pending::OUTPUT));
    }

    #[test]
    fn inputs_refresh_regardless_of_direction() {
        let mut tap = SimTap::new(3);
        tap.set_inputs(0b101);
        let mut bank = PinBank::new(3).unwrap();
        let p0 = bank.index(0).unwrap();
        bank.set_direction(p0, Direction::Output);
        write_config(&mut tap, Opcodes::default(), &mut bank).unwrap();

        exchange(&mut tap, Opcodes::default(), &mut bank).unwrap();
        assert_eq!(bank.input_mask(), 0b101);
    }

    #[test]
    fn loopback_reads_back_outputs() {
        let mut tap = SimTap::new(3).with_loopback(true);
        let mut bank = PinBank::new(3).unwrap();
        for i in 0..3 {
            let idx = bank.index(i).unwrap();
            bank.set_direction(idx, Direction::Output);
        }
        write_config(&mut tap, Opcodes::default(), &mut bank).unwrap();

        let p2 = bank.index(2).unwrap();
        bank.set_output(p2, true);
        exchange(&mut tap, Opcodes::default(), &mut bank).unwrap();
        // captured before the new outputs were latched
        assert_eq!(bank.input_mask(), 0b000);

        exchange(&mut tap, Opcodes::default(), &mut bank).unwrap();
        assert_eq!(bank.input_mask(), 0b100);
    }

    #[test]
    fn transport_failure_leaves_bank_untouched() {
        let mut tap = SimTap::new(3);
        tap.set_inputs(0b111);
        let mut bank = PinBank::new(3).unwrap();
        let p0 = bank.index(0).unwrap();
        bank.set_output(p0, true);

        tap.fail_next(1);
        let err = exchange(&mut tap, Opcodes::default(), &mut bank).unwrap_err();
        assert!(matches!(err, TransportError::Simulated));
        assert_eq!(bank.input_mask(), 0);
        assert!(bank.any_pending(Pending::OUTPUT));
    }

    #[test]
    fn failed_payload_after_selection_keeps_pending() {
        let mut tap = SimTap::new(3);
        tap.set_inputs(0b110);
        let mut bank = PinBank::new(3).unwrap();
        let p2 = bank.index(2).unwrap();
        bank.set_output(p2, true);

        tap.fail_nth(1);
        let err = exchange(&mut tap, Opcodes::default(), &mut bank).unwrap_err();
        assert!(matches!(err, TransportError::Simulated));
        assert_eq!(tap.executions(), 2);
        assert_eq!(tap.selected(), Some(Chain::Data));
        assert_eq!(tap.outputs(), 0);
        assert_eq!(bank.input_mask(), 0);
        assert!(bank.any_pending(Pending::OUTPUT));

        exchange(&mut tap, Opcodes::default(), &mut bank).unwrap();
        assert_eq!(tap.outputs(), 0b100);
        assert_eq!(bank.input_mask(), 0b110);
        assert!(!bank.any_pending(Pending::OUTPUT));
    }
}
