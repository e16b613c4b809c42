//! GBA RLE Compression
//!
//! The payload is a sequence of runs, each introduced by one header byte:
//! * bit 7 clear: `(h & 0x7f) + 1` literal bytes follow, 1 to 128
//! * bit 7 set: the next byte is repeated `(h & 0x7f) + 3` times, 3 to 130
//!
//! Since a repeat run costs 2 bytes, runs shorter than 3 are folded into literal runs.

use crate::tools::bit_cursor::ByteCursor;
use crate::Error;

const MIN_REPEAT: usize = 3;
const MAX_REPEAT: usize = 0x7f + MIN_REPEAT;
const MAX_LITERAL: usize = 0x80;
const REPEAT_FLAG: u8 = 0x80;

fn flush_literals(literals: &mut Vec<u8>,ans: &mut Vec<u8>) {
    for chunk in literals.chunks(MAX_LITERAL) {
        log::trace!("literal run of {}",chunk.len());
        ans.push((chunk.len() - 1) as u8);
        ans.extend_from_slice(chunk);
    }
    literals.clear();
}

/// Produce the RLE payload (no header) for `ibuf`
pub fn encode(ibuf: &[u8]) -> Vec<u8> {
    let mut ans = Vec::with_capacity(ibuf.len() + ibuf.len()/MAX_LITERAL + 2);
    let mut literals: Vec<u8> = Vec::with_capacity(MAX_LITERAL);
    let mut ptr = 0;
    while ptr < ibuf.len() {
        let c = ibuf[ptr];
        let mut run = 1;
        while ptr + run < ibuf.len() && run < MAX_REPEAT && ibuf[ptr + run] == c {
            run += 1;
        }
        if run >= MIN_REPEAT {
            flush_literals(&mut literals,&mut ans);
            log::trace!("repeat {} x {}",c,run);
            ans.push(REPEAT_FLAG | (run - MIN_REPEAT) as u8);
            ans.push(c);
            ptr += run;
        } else {
            literals.push(c);
            ptr += 1;
            if literals.len() == MAX_LITERAL {
                flush_literals(&mut literals,&mut ans);
            }
        }
    }
    flush_literals(&mut literals,&mut ans);
    ans
}

/// Expand an RLE payload (no header) into `expanded_size` bytes.
/// A run reaching past `expanded_size` is cut short, the BIOS would write the extra bytes
/// into whatever follows the destination.
pub fn decode(payload: &[u8],expanded_size: usize) -> Result<Vec<u8>,Error> {
    let mut ans = Vec::with_capacity(expanded_size);
    let mut cursor = ByteCursor::new(payload);
    while ans.len() < expanded_size {
        let header = cursor.read_u8()?;
        let remaining = expanded_size - ans.len();
        if header & REPEAT_FLAG > 0 {
            let count = (header & !REPEAT_FLAG) as usize + MIN_REPEAT;
            let c = cursor.read_u8()?;
            ans.resize(ans.len() + usize::min(count,remaining),c);
        } else {
            let count = header as usize + 1;
            let run = cursor.read_slice(count)?;
            ans.extend_from_slice(&run[0..usize::min(count,remaining)]);
        }
    }
    Ok(ans)
}

#[test]
fn compression_works() {
    let test_data = "ABCDDDDDE".as_bytes();
    let rle_str = "02 41 42 43 82 44 00 45";
    assert_eq!(encode(test_data),hex::decode(rle_str.replace(" ","")).unwrap());

    let test_data = "ABABABABABABABAB".as_bytes();
    let rle_str = "0F 41 42 41 42 41 42 41 42 41 42 41 42 41 42 41 42";
    assert_eq!(encode(test_data),hex::decode(rle_str.replace(" ","")).unwrap());
}

#[test]
fn maximum_repeat() {
    // exactly 128 identical bytes is a single repeat token
    assert_eq!(encode(&[0x41;128]),vec![0xfd,0x41]);
    assert_eq!(encode(&[0x41;130]),vec![0xff,0x41]);
    // one past the longest repeat spills into a literal
    assert_eq!(encode(&[0x41;131]),vec![0xff,0x41,0x00,0x41]);
    assert_eq!(encode(&[0x41;133]),vec![0xff,0x41,0x80,0x41]);
}

#[test]
fn maximum_literal() {
    let test_data: Vec<u8> = (0..200).map(|x| x as u8).collect();
    let compressed = encode(&test_data);
    assert_eq!(compressed.len(),202);
    assert_eq!(compressed[0],0x7f);
    assert_eq!(compressed[129],71);
    assert_eq!(decode(&compressed,200).expect("expansion failed"),test_data);
}

#[test]
fn short_runs_stay_literal() {
    assert_eq!(encode("AABBA".as_bytes()),vec![0x04,0x41,0x41,0x42,0x42,0x41]);
}

#[test]
fn invertibility() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let expanded = decode(&encode(test_data),test_data.len()).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);

    let mut test_data = vec![0;300];
    test_data.extend_from_slice("xyzzy".as_bytes());
    test_data.extend_from_slice(&[7;4]);
    let expanded = decode(&encode(&test_data),test_data.len()).expect("expansion failed");
    assert_eq!(test_data,expanded);
}

#[test]
fn corrupt_runs() {
    // literal run claims 4 bytes, only 2 present
    assert!(matches!(decode(&[0x03,1,2],4),Err(Error::CorruptStream)));
    // repeat run is missing its value
    assert!(matches!(decode(&[0x85],8),Err(Error::CorruptStream)));
    // payload ends before the declared size
    assert!(matches!(decode(&[0x80,9],4),Err(Error::CorruptStream)));
    // overlong run is clipped
    assert_eq!(decode(&[0x85,9],4).expect("expansion failed"),vec![9;4]);
}
