//! Byte and bit level cursors
//!
//! * `ByteCursor` reads a payload and turns running off the end into `Error::CorruptStream`
//! * `FlagGroupWriter` produces the LZ77 layout of one flag byte per 8 tokens
//! * `WordBitWriter` and `WordBitReader` handle the Huffman bitstream, which is a sequence
//!   of 32 bit little endian words, each consumed starting from its most significant bit.
//!
//! The `bit_vec` crate only handles MSB first byte order, so words are byte swapped on the way in and out.

use bit_vec::BitVec;
use crate::Error;

pub struct ByteCursor<'a> {
    buf: &'a [u8],
    ptr: usize
}

impl <'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            ptr: 0
        }
    }
    pub fn read_u8(&mut self) -> Result<u8,Error> {
        match self.buf.get(self.ptr) {
            Some(val) => {
                self.ptr += 1;
                Ok(*val)
            },
            None => {
                log::error!("payload ended at offset {}",self.ptr);
                Err(Error::CorruptStream)
            }
        }
    }
    pub fn read_slice(&mut self,len: usize) -> Result<&'a [u8],Error> {
        if self.ptr + len > self.buf.len() {
            log::error!("need {} bytes at offset {}, payload has {}",len,self.ptr,self.buf.len());
            return Err(Error::CorruptStream);
        }
        let ans = &self.buf[self.ptr..self.ptr+len];
        self.ptr += len;
        Ok(ans)
    }
    pub fn read_u16_be(&mut self) -> Result<u16,Error> {
        let hi = self.read_u8()?;
        let lo = self.read_u8()?;
        Ok(u16::from_be_bytes([hi,lo]))
    }
}

/// Pack an LZ77 back-reference, 4 bits of `length-3` then 12 bits of `distance-1`, big endian.
/// Caller is responsible for the ranges, length in [3,18], distance in [1,4096].
pub fn pack_reference(length: usize,distance: usize) -> [u8;2] {
    let code = (((length - 3) << 12) | (distance - 1)) as u16;
    code.to_be_bytes()
}

/// Inverse of `pack_reference`, returns (length,distance)
pub fn unpack_reference(code: u16) -> (usize,usize) {
    ((code >> 12) as usize + 3,(code & 0xfff) as usize + 1)
}

/// Accumulates LZ77 tokens.  A flag byte is reserved ahead of every group of 8 tokens,
/// and its bits are set from the most significant end as back-references arrive.
pub struct FlagGroupWriter {
    out: Vec<u8>,
    flag_ptr: usize,
    mask: u8
}

impl FlagGroupWriter {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            out: Vec::with_capacity(cap),
            flag_ptr: 0,
            mask: 0
        }
    }
    fn next_token(&mut self) {
        self.mask >>= 1;
        if self.mask == 0 {
            self.flag_ptr = self.out.len();
            self.out.push(0);
            self.mask = 0x80;
        }
    }
    pub fn put_literal(&mut self,val: u8) {
        self.next_token();
        self.out.push(val);
    }
    pub fn put_reference(&mut self,length: usize,distance: usize) {
        self.next_token();
        self.out[self.flag_ptr] |= self.mask;
        self.out.extend_from_slice(&pack_reference(length,distance));
    }
    pub fn into_bytes(self) -> Vec<u8> {
        self.out
    }
}

/// Split bytes into 4 bit symbols, low nibble first, as the BIOS writes them back.
pub fn split_nibbles(data: &[u8]) -> Vec<u8> {
    let mut ans = Vec::with_capacity(data.len()*2);
    for val in data {
        ans.push(val & 0x0f);
        ans.push(val >> 4);
    }
    ans
}

pub struct WordBitWriter {
    bits: BitVec
}

impl WordBitWriter {
    pub fn new() -> Self {
        Self {
            bits: BitVec::new()
        }
    }
    pub fn put_code(&mut self,code: &BitVec) {
        for bit in code.iter() {
            self.bits.push(bit);
        }
    }
    /// Pad to a whole word and produce the little endian words
    pub fn into_bytes(mut self) -> Vec<u8> {
        while self.bits.len() % 32 > 0 {
            self.bits.push(false);
        }
        let mut ans = self.bits.to_bytes();
        for word in ans.chunks_mut(4) {
            word.reverse();
        }
        ans
    }
}

pub struct WordBitReader {
    bits: BitVec,
    ptr: usize
}

impl WordBitReader {
    /// A trailing partial word is read as if padded with zeros
    pub fn new(buf: &[u8]) -> Self {
        let mut msb_first = Vec::with_capacity(buf.len() + 3);
        for word in buf.chunks(4) {
            let mut val: [u8;4] = [0;4];
            val[0..word.len()].copy_from_slice(word);
            val.reverse();
            msb_first.extend_from_slice(&val);
        }
        Self {
            bits: BitVec::from_bytes(&msb_first),
            ptr: 0
        }
    }
    /// Get the next bit, or None if the stream is exhausted
    pub fn get_bit(&mut self) -> Option<bool> {
        let ans = self.bits.get(self.ptr)?;
        self.ptr += 1;
        Some(ans)
    }
}

#[test]
fn reference_packing() {
    assert_eq!(pack_reference(18,2),[0xf0,0x01]);
    assert_eq!(pack_reference(3,4096),[0x0f,0xff]);
    assert_eq!(unpack_reference(0xb001),(14,2));
}

#[test]
fn flag_groups() {
    let mut writer = FlagGroupWriter::with_capacity(16);
    for i in 0..8 {
        writer.put_literal(i);
    }
    writer.put_reference(3,1);
    writer.put_literal(9);
    assert_eq!(writer.into_bytes(),vec![0,0,1,2,3,4,5,6,7,0x80,0x00,0x00,9]);
}

#[test]
fn word_order() {
    let mut writer = WordBitWriter::new();
    let mut code = BitVec::new();
    code.push(true);
    code.push(false);
    code.push(true);
    writer.put_code(&code);
    assert_eq!(writer.into_bytes(),vec![0,0,0,0xa0]);
    let mut reader = WordBitReader::new(&[0,0,0,0xa0,0x01]);
    let mut bits = Vec::new();
    while let Some(bit) = reader.get_bit() {
        bits.push(bit);
    }
    assert_eq!(bits.len(),64);
    assert_eq!(bits[0..4].to_vec(),vec![true,false,true,false]);
    // partial word 01 00 00 00 is the value 1
    assert!(bits[63]);
    assert_eq!(bits[32..63].iter().filter(|b| **b).count(),0);
}

#[test]
fn nibbles() {
    assert_eq!(split_nibbles(&[0x41,0xf0]),vec![1,4,0,0xf]);
}

#[test]
fn cursor_bounds() {
    let mut cursor = ByteCursor::new(&[1,2,3]);
    assert_eq!(cursor.read_u8().unwrap(),1);
    assert_eq!(cursor.read_u16_be().unwrap(),0x0203);
    assert!(matches!(cursor.read_u8(),Err(Error::CorruptStream)));
    let mut cursor = ByteCursor::new(&[1,2,3]);
    assert!(cursor.read_slice(4).is_err());
    assert_eq!(cursor.read_slice(3).unwrap().to_vec(),vec![1,2,3]);
}
