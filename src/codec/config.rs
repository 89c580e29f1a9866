//! Configuration chain: one direction bit per pin, 1 for output.
use crate::chain::{select_chain, Chain, Opcodes};
use crate::error::TransportError;
use crate::pins::{Direction, Pending, PinBank};
use crate::transport::ScanTransport;

use super::{decode, encode, scan_len, single_capture};

/// Read the directions the device currently has latched into `bank`.
///
/// Zeros are shifted in, so the apply bit stays clear and the device configuration is left alone.
pub fn read_config<S>(tap: &mut S, opcodes: Opcodes, bank: &mut PinBank) -> Result<(), TransportError>
    where S: ScanTransport + ?Sized
{
    select_chain(tap, opcodes, Chain::Config)?;
    tap.dr_scan(scan_len(bank), None, true);
    let captured = single_capture(tap.execute_queue()?)?;
    log::trace!("config read {:?}", captured);

    decode(bank, &captured, |pin, bit| pin.direction = Direction::from_bit(bit));
    bank.clear_pending(Pending::DIRECTION);
    Ok(())
}

/// Send the directions in `bank` to the device and latch them.
pub fn write_config<S>(tap: &mut S, opcodes: Opcodes, bank: &mut PinBank) -> Result<(), TransportError>
    where S: ScanTransport + ?Sized
{
    let payload = encode(bank, |pin| pin.direction.bit());
    log::trace!("config write {:?}", payload);

    select_chain(tap, opcodes, Chain::Config)?;
    tap.dr_scan(payload.width(), Some(&payload), false);
    tap.execute_queue()?;

    bank.clear_pending(Pending::DIRECTION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::ScanPayload;
    use crate::sim::{Recorded, SimTap};

    fn bank_with(directions: &[Direction]) -> PinBank {
        let mut bank = PinBank::new(directions.len()).unwrap();
        for (i, d) in directions.iter().enumerate() {
            let idx = bank.index(i as u32).unwrap();
            bank.set_direction(idx, *d);
        }
        bank
    }

    #[test]
    fn write_packs_pin_zero_into_bit_zero() {
        let mut tap = SimTap::new(3);
        let mut bank = bank_with(&[Direction::Output, Direction::Input, Direction::Output]);
        write_config(&mut tap, Opcodes::default(), &mut bank).unwrap();

        let Some(Recorded::Dr(payload)) = tap.history().last() else {
            panic!("no config scan recorded");
        };
        assert_eq!(payload.width(), 4);
        assert_eq!(payload.as_bytes(), &[0b1101]);
        assert_eq!(tap.directions(), 0b101);
        assert!(!bank.any_pending(Pending::DIRECTION));
    }

    #[test]
    fn read_shifts_zeros_and_decodes() {
        let mut tap = SimTap::new(3);
        tap.set_directions(0b110);
        let mut bank = PinBank::new(3).unwrap();
        read_config(&mut tap, Opcodes::default(), &mut bank).unwrap();

        let dirs: alloc::vec::Vec<_> = bank.iter().map(|p| p.direction).collect();
        assert_eq!(dirs, [Direction::Input, Direction::Output, Direction::Output]);
        assert_eq!(tap.history().last(), Some(&Recorded::Dr(ScanPayload::zeros(4))));
        // nothing latched by the read
        assert_eq!(tap.directions(), 0b110);
    }

    #[test]
    fn round_trip_every_assignment() {
        for mask in 0u32..16 {
            let mut tap = SimTap::new(4);
            let mut bank = PinBank::new(4).unwrap();
            for i in 0..4 {
                let idx = bank.index(i).unwrap();
                bank.set_direction(idx, Direction::from_bit(mask & (1 << i) != 0));
            }
            write_config(&mut tap, Opcodes::default(), &mut bank).unwrap();

            let mut readback = PinBank::new(4).unwrap();
            read_config(&mut tap, Opcodes::default(), &mut readback).unwrap();
            assert_eq!(readback.direction_mask(), mask);
        }
    }

    #[test]
    fn failed_write_keeps_pending() {
        let mut tap = SimTap::new(3);
        let mut bank = bank_with(&[Direction::Output, Direction::Input, Direction::Input]);
        tap.fail_next(1);
        assert!(write_config(&mut tap, Opcodes::default(), &mut bank).is_err());
        assert!(bank.any_pending(Pending::DIRECTION));
        assert_eq!(tap.directions(), 0);
    }

    #[test]
    fn failed_payload_after_selection_keeps_pending() {
        let mut tap = SimTap::new(3);
        let mut bank = bank_with(&[Direction::Output, Direction::Input, Direction::Output]);
        tap.fail_nth(1);
        let err = write_config(&mut tap, Opcodes::default(), &mut bank).unwrap_err();
        assert!(matches!(err, TransportError::Simulated));
        assert_eq!(tap.executions(), 2);
        assert_eq!(tap.selected(), Some(Chain::Config));
        assert_eq!(tap.directions(), 0);
        assert!(bank.any_pending(Pending::DIRECTION));
        assert_eq!(bank.direction_mask(), 0b101);

        write_config(&mut tap, Opcodes::default(), &mut bank).unwrap();
        assert_eq!(tap.directions(), 0b101);
        assert!(!bank.any_pending(Pending::DIRECTION));
    }
}
