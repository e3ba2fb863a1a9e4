//! Property-based tests for the bit stream layer using `proptest`.

use proptest::prelude::*;
use tilbc::bytecode::{BitStreamReader, BitStreamWriter};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// A value paired with a width that can hold it.
fn arb_width_value() -> impl Strategy<Value = (u64, u32)> {
    (1u32..=64).prop_flat_map(|nbits| {
        let mask = if nbits == 64 {
            u64::MAX
        } else {
            (1u64 << nbits) - 1
        };
        (0..=mask).prop_map(move |value| (value, nbits))
    })
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn vbr_u32_round_trips(value: u32) {
        let mut w = BitStreamWriter::new(Vec::new());
        w.write_u32_vbr(value).expect("write");
        w.flush().expect("flush");
        let bytes = w.finish().expect("finish");

        let mut r = BitStreamReader::new(bytes.as_slice()).expect("reader");
        prop_assert_eq!(r.read_u32_vbr().expect("read"), value);
    }

    #[test]
    fn vbr_u64_round_trips(value: u64) {
        let mut w = BitStreamWriter::new(Vec::new());
        w.write_u64_vbr(value).expect("write");
        w.flush().expect("flush");
        let bytes = w.finish().expect("finish");

        let mut r = BitStreamReader::new(bytes.as_slice()).expect("reader");
        prop_assert_eq!(r.read_u64_vbr().expect("read"), value);
    }

    #[test]
    fn heterogeneous_bit_sequences_round_trip(
        sequence in prop::collection::vec(arb_width_value(), 1..64)
    ) {
        let mut w = BitStreamWriter::new(Vec::new());
        for &(value, nbits) in &sequence {
            w.write_bits64(value, nbits).expect("write");
        }
        w.flush().expect("flush");
        let bytes = w.finish().expect("finish");

        let mut r = BitStreamReader::new(bytes.as_slice()).expect("reader");
        for &(value, nbits) in &sequence {
            prop_assert_eq!(r.read_bits64(nbits).expect("read"), value);
        }
    }

    #[test]
    fn strings_round_trip(value in ".{0,64}") {
        let mut w = BitStreamWriter::new(Vec::new());
        w.write_str(&value).expect("write");
        w.flush().expect("flush");
        let bytes = w.finish().expect("finish");

        let mut r = BitStreamReader::new(bytes.as_slice()).expect("reader");
        prop_assert_eq!(r.read_string().expect("read"), value);
    }

    #[test]
    fn atom_boundaries_preserve_values(values in prop::collection::vec(any::<u64>(), 1..32)) {
        let mut w = BitStreamWriter::new(Vec::new());
        for &value in &values {
            w.write_u64_vbr(value).expect("write");
            w.end_atom().expect("end atom");
        }
        w.flush().expect("flush");
        let bytes = w.finish().expect("finish");

        let mut r = BitStreamReader::new(bytes.as_slice()).expect("reader");
        for &value in &values {
            prop_assert_eq!(r.read_u64_vbr().expect("read"), value);
            r.end_atom().expect("end atom");
        }
        prop_assert!(r.empty());
    }
}
