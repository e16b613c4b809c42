//! GBA LZ77 Compression
//!
//! This is the LZSS variant understood by the BIOS routines `LZ77UnCompWram` and `LZ77UnCompVram`.
//!
//! * Tokens come in groups of 8, each group is preceded by a flag byte read from the most significant bit
//! * A clear flag means one literal byte follows
//! * A set flag means 2 bytes follow, big endian, 4 bits of `length-3` and 12 bits of `distance-1`
//!
//! So matches are 3 to 18 bytes long and reach back at most 4096 bytes.
//! The VRAM routine writes 16 bits at a time, so a reference to the immediately preceding byte
//! would read a byte that is not in memory yet.  Unless `Options::vram_safe` is turned off,
//! the encoder never produces distance 1.
//!
//! Matches are found with hash chains: every position is linked to the previous position whose
//! first 3 bytes hash the same, and the chain is walked nearest first.  The longest match wins,
//! among equal lengths the nearest wins.

use crate::tools::bit_cursor::{ByteCursor,FlagGroupWriter,unpack_reference};
use crate::tools::ring_buffer::RingBuffer;
use crate::{Error,Options};

// LZSS coding constants

const WIN_SIZE: usize = 4096; // sliding window
const MAX_MATCH: usize = 18; // longest match that can be tokenized
const THRESHOLD: usize = 2; // minimum string length that will be tokenized is THRESHOLD+1
const HASH_BITS: u32 = 15;
const NIL: usize = usize::MAX;

/// Structure to find the matches in the window behind the current position.
/// `head` maps a hash to the latest position with that hash, `chain` links each position
/// inside the window to the one before it with the same hash.
struct MatchFinder<'a> {
    ibuf: &'a [u8],
    head: Vec<usize>,
    chain: RingBuffer<usize>,
    min_distance: usize
}

impl <'a> MatchFinder<'a> {
    fn new(ibuf: &'a [u8],opt: &Options) -> Self {
        Self {
            ibuf,
            head: vec![NIL;1 << HASH_BITS],
            chain: RingBuffer::create(NIL,WIN_SIZE),
            min_distance: match opt.vram_safe {
                true => 2,
                false => 1
            }
        }
    }
    fn hash(&self,pos: usize) -> usize {
        let key = u32::from_be_bytes([0,self.ibuf[pos],self.ibuf[pos+1],self.ibuf[pos+2]]);
        (key.wrapping_mul(0x9E37_79B1) >> (32 - HASH_BITS)) as usize
    }
    /// Index the string starting at `pos`, positions must be inserted in order.
    fn insert(&mut self,pos: usize) {
        if pos + THRESHOLD >= self.ibuf.len() {
            return;
        }
        let h = self.hash(pos);
        self.chain.set_abs(pos,self.head[h]);
        self.head[h] = pos;
    }
    /// Find the best match for the string at `pos`, returns (length,distance).
    /// Length is 0 if there is nothing worth tokenizing.
    /// Every position before `pos` must have been inserted, `pos` itself must not be.
    fn find(&self,pos: usize) -> (usize,usize) {
        let max_len = usize::min(MAX_MATCH,self.ibuf.len() - pos);
        if max_len <= THRESHOLD {
            return (0,0);
        }
        let mut match_length = 0;
        let mut match_distance = 0;
        let mut curs = self.head[self.hash(pos)];
        while curs != NIL && curs < pos && pos - curs <= WIN_SIZE {
            let distance = pos - curs;
            if distance >= self.min_distance {
                let mut i = 0;
                while i < max_len && self.ibuf[curs + i] == self.ibuf[pos + i] {
                    i += 1;
                }
                // chain is nearest first, so only a strictly longer match replaces the current one
                if i > match_length {
                    match_length = i;
                    match_distance = distance;
                    if match_length == max_len {
                        break;
                    }
                }
            }
            let next = self.chain.get_abs(curs);
            if next >= curs {
                // slot was reused by a later position
                break;
            }
            curs = next;
        }
        match match_length > THRESHOLD {
            true => (match_length,match_distance),
            false => (0,0)
        }
    }
}

/// Produce the LZ77 payload (no header) for `ibuf`
pub fn encode(ibuf: &[u8],opt: &Options) -> Vec<u8> {
    let mut ans = FlagGroupWriter::with_capacity(ibuf.len() + ibuf.len()/8 + 1);
    let mut finder = MatchFinder::new(ibuf,opt);
    let mut ptr = 0;
    let mut refs = 0;
    while ptr < ibuf.len() {
        let (match_length,match_distance) = finder.find(ptr);
        let advance = match match_length {
            0 => {
                ans.put_literal(ibuf[ptr]);
                1
            },
            _ => {
                log::trace!("match {} at distance {}",match_length,match_distance);
                ans.put_reference(match_length,match_distance);
                refs += 1;
                match_length
            }
        };
        for i in 0..advance {
            finder.insert(ptr + i);
        }
        ptr += advance;
    }
    log::debug!("LZ77 used {} back-references",refs);
    ans.into_bytes()
}

/// Expand an LZ77 payload (no header) into `expanded_size` bytes.
/// Expansion stops as soon as `expanded_size` is reached, even inside a group or a back-reference.
pub fn decode(payload: &[u8],expanded_size: usize) -> Result<Vec<u8>,Error> {
    let mut ans: Vec<u8> = Vec::with_capacity(expanded_size);
    let mut cursor = ByteCursor::new(payload);
    while ans.len() < expanded_size {
        let flags = cursor.read_u8()?;
        for bit in (0..8).rev() {
            if ans.len() >= expanded_size {
                break;
            }
            if flags & (1 << bit) == 0 {
                ans.push(cursor.read_u8()?);
                continue;
            }
            let (length,distance) = unpack_reference(cursor.read_u16_be()?);
            if distance > ans.len() {
                log::error!("back-reference to {} bytes behind with only {} expanded",distance,ans.len());
                return Err(Error::CorruptStream);
            }
            // byte by byte, source and destination overlap when distance < length
            for _k in 0..length {
                if ans.len() >= expanded_size {
                    break;
                }
                let c = ans[ans.len() - distance];
                ans.push(c);
            }
        }
    }
    Ok(ans)
}

#[cfg(test)]
use crate::STD_OPTIONS;

#[test]
fn compression_works() {
    let test_data = "ABABABABABABABAB".as_bytes();
    let lz_str = "20 41 42 B0 01";
    assert_eq!(encode(test_data,&STD_OPTIONS),hex::decode(lz_str.replace(" ","")).unwrap());

    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let lz_str = "00 49 20 61 6d 20 53 61 6d 54 2e 10 04 20 10 0d 2e 00 05 64 6f 00 20 6e 6f 74 20 6c 69 6b 02 65 20 74 68 69 73 70 1c 0a";
    assert_eq!(encode(test_data,&STD_OPTIONS),hex::decode(lz_str.replace(" ","")).unwrap());
}

#[test]
fn vram_safety() {
    // with VRAM safety the second byte must be a literal, then distance 2 takes over
    let test_data = [0x41;64];
    let lz_str = "3c 41 41 f0 01 f0 01 f0 01 50 01";
    assert_eq!(encode(&test_data,&STD_OPTIONS),hex::decode(lz_str.replace(" ","")).unwrap());
    let mut opt = STD_OPTIONS;
    opt.vram_safe = false;
    let lz_str = "78 41 f0 00 f0 00 f0 00 60 00";
    assert_eq!(encode(&test_data,&opt),hex::decode(lz_str.replace(" ","")).unwrap());
    assert_eq!(decode(&encode(&test_data,&opt),64).expect("expansion failed"),test_data.to_vec());
}

#[test]
fn overlapping_copy() {
    let test_data = "ABABABABABABABAB".as_bytes();
    let expanded = decode(&[0x20,0x41,0x42,0xb0,0x01],16).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);
}

#[test]
fn far_and_near() {
    // a match 4096 back is reachable, and the nearest of equal matches is taken
    let mut test_data: Vec<u8> = "XYZW".as_bytes().to_vec();
    for i in 0..4092 {
        test_data.push((i % 251) as u8 | 0x80);
    }
    test_data.extend_from_slice("XYZW".as_bytes());
    let compressed = encode(&test_data,&STD_OPTIONS);
    assert_eq!(decode(&compressed,test_data.len()).expect("expansion failed"),test_data);
    let tail = &compressed[compressed.len()-2..];
    assert_eq!(unpack_reference(u16::from_be_bytes([tail[0],tail[1]])),(4,4096));

    let test_data = "abcXabcYabc".as_bytes();
    let compressed = encode(test_data,&STD_OPTIONS);
    let tail = &compressed[compressed.len()-2..];
    assert_eq!(unpack_reference(u16::from_be_bytes([tail[0],tail[1]])),(3,4));
}

#[test]
fn invertibility() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let compressed = encode(test_data,&STD_OPTIONS);
    let expanded = decode(&compressed,test_data.len()).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);

    let test_data = "1234567".as_bytes();
    let compressed = encode(test_data,&STD_OPTIONS);
    let expanded = decode(&compressed,test_data.len()).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);
}

#[test]
fn corrupt_references() {
    // reference reaches before the start of the output
    assert!(matches!(decode(&[0x40,0x41,0x00,0x04],8),Err(Error::CorruptStream)));
    // payload ends in the middle of a group
    assert!(matches!(decode(&[0x00,0x41,0x42],4),Err(Error::CorruptStream)));
    // payload ends in the middle of a reference
    assert!(matches!(decode(&[0x40,0x41,0x00],4),Err(Error::CorruptStream)));
}
