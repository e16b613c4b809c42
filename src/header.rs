//! Compression header
//!
//! All four formats share a 4 byte header: the method tag, followed by the size of the
//! expanded data as a 24 bit little endian integer.  This is the same word the BIOS
//! reads before dispatching to its decompression routine.

use crate::{Error,Method};

pub const HEADER_LEN: usize = 4;
/// largest expanded size the header can describe
pub const MAX_SIZE: usize = 0x00FF_FFFF;

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct Header {
    pub method: Method,
    /// size of the expanded data
    pub size: u32
}

impl Header {
    /// Header for compressing `len` bytes, fails if `len` cannot be represented
    pub fn create(method: Method, len: usize) -> Result<Self,Error> {
        if len > MAX_SIZE {
            log::error!("{} bytes cannot be described by the header",len);
            return Err(Error::InputTooLarge(len));
        }
        Ok(Self {
            method,
            size: len as u32
        })
    }
    /// Parse the header at the start of a compressed stream
    pub fn parse(stream: &[u8]) -> Result<Self,Error> {
        if stream.len() < HEADER_LEN {
            log::error!("stream of {} bytes is too short for a header",stream.len());
            return Err(Error::UnexpectedError);
        }
        let method = Method::from_tag(stream[0])?;
        let size = u32::from_le_bytes([stream[1],stream[2],stream[3],0]);
        Ok(Self {
            method,
            size
        })
    }
    pub fn to_bytes(&self) -> [u8;HEADER_LEN] {
        let [b0,b1,b2,_] = self.size.to_le_bytes();
        [self.method.tag(),b0,b1,b2]
    }
}

#[test]
fn header_layout() {
    let header = Header::create(Method::Huffman8,0x123456).expect("header failed");
    assert_eq!(header.to_bytes(),[0x28,0x56,0x34,0x12]);
    assert_eq!(Header::parse(&[0x28,0x56,0x34,0x12,0xff]).unwrap(),header);
}

#[test]
fn header_limits() {
    assert!(Header::create(Method::Rle,MAX_SIZE).is_ok());
    assert!(matches!(Header::create(Method::Rle,MAX_SIZE+1),Err(Error::InputTooLarge(_))));
    assert!(matches!(Header::parse(&[0x24,0,0]),Err(Error::UnexpectedError)));
    assert!(matches!(Header::parse(&[0x2c,0,0,0]),Err(Error::UnknownMethod(0x2c))));
}
