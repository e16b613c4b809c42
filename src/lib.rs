//! # GBA BIOS Compression
//!
//! Compress and expand buffers using the four formats the Game Boy Advance BIOS
//! can decompress on its own: RLE, LZ77 (LZSS), and 4 or 8 bit Huffman.
//!
//! Every compressed stream starts with the same 4 byte header, the method tag followed
//! by the 24 bit little endian size of the expanded data, so `decompress` does not
//! need to be told the method.
//!
//! ```
//! let data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
//! let compressed = gbacomp::compress(gbacomp::Method::Lz77, data).expect("compression failed");
//! let expanded = gbacomp::decompress(&compressed).expect("expansion failed");
//! assert_eq!(data.to_vec(), expanded);
//! ```
//!
//! The `stream` module wraps these functions for `Read` and `Write` objects.

mod tools;
pub mod header;
pub mod rle;
pub mod lz77;
pub mod huffman;
pub mod stream;

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
pub use header::{Header, HEADER_LEN, MAX_SIZE};

type DYNERR = Box<dyn std::error::Error>;

/// Compression Errors
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("input of {0} bytes exceeds the 24 bit size field")]
    InputTooLarge(usize),
    #[error("unknown compression method {0:#04x}")]
    UnknownMethod(u8),
    #[error("unexpected error")]
    UnexpectedError,
    #[error("corrupt stream")]
    CorruptStream,
    #[error("huffman tree could not be laid out")]
    TreeLayout,
    #[error("file format mismatch")]
    FileFormatMismatch
}

/// Compression methods, the discriminant is the tag byte written to the header.
/// For Huffman the low nibble of the tag is the symbol width in bits.
#[derive(FromPrimitive,Clone,Copy,Debug,PartialEq,Eq)]
pub enum Method {
    Lz77 = 0x10,
    Huffman4 = 0x24,
    Huffman8 = 0x28,
    Rle = 0x30
}

impl Method {
    /// Map a header tag byte to a method
    pub fn from_tag(tag: u8) -> Result<Self,Error> {
        match Method::from_u8(tag) {
            Some(m) => Ok(m),
            None => Err(Error::UnknownMethod(tag))
        }
    }
    pub fn tag(&self) -> u8 {
        *self as u8
    }
    /// Map a short name such as used on the command line to a method
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "rle" => Some(Self::Rle),
            "lz77" => Some(Self::Lz77),
            "huff4" => Some(Self::Huffman4),
            "huff8" => Some(Self::Huffman8),
            _ => None
        }
    }
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rle => "rle",
            Self::Lz77 => "lz77",
            Self::Huffman4 => "huff4",
            Self::Huffman8 => "huff8"
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Rle => write!(f,"RLE"),
            Self::Lz77 => write!(f,"LZ77"),
            Self::Huffman4 => write!(f,"Huffman4"),
            Self::Huffman8 => write!(f,"Huffman8")
        }
    }
}

/// Options controlling compression
#[derive(Clone)]
pub struct Options {
    /// never emit an LZ77 reference to the immediately preceding byte,
    /// the BIOS VRAM routine writes 16 bits at a time and would read a byte it has not written yet
    pub vram_safe: bool,
    /// pad the compressed stream with zeros to a multiple of 4 bytes
    pub word_align: bool
}

pub const STD_OPTIONS: Options = Options {
    vram_safe: true,
    word_align: true
};

/// Compress `data` with `method` using the standard options.
pub fn compress(method: Method, data: &[u8]) -> Result<Vec<u8>,Error> {
    compress_with(method,data,&STD_OPTIONS)
}

/// Compress `data` with `method`, returning header + payload (+ padding).
pub fn compress_with(method: Method, data: &[u8], opt: &Options) -> Result<Vec<u8>,Error> {
    let header = Header::create(method,data.len())?;
    let mut ans = header.to_bytes().to_vec();
    if data.len() > 0 {
        let mut payload = match method {
            Method::Rle => rle::encode(data),
            Method::Lz77 => lz77::encode(data,opt),
            Method::Huffman4 => huffman::encode(data,huffman::SymbolWidth::Nibble)?,
            Method::Huffman8 => huffman::encode(data,huffman::SymbolWidth::Byte)?
        };
        ans.append(&mut payload);
    }
    if opt.word_align {
        while ans.len() % 4 > 0 {
            ans.push(0);
        }
    }
    log::debug!("{} compressed {} into {}",method,data.len(),ans.len());
    Ok(ans)
}

/// Decompress a stream, the method is taken from its header.
pub fn decompress(stream: &[u8]) -> Result<Vec<u8>,Error> {
    let header = Header::parse(stream)?;
    let expected = header.size as usize;
    if expected == 0 {
        return Ok(Vec::new());
    }
    let payload = &stream[HEADER_LEN..];
    let ans = match header.method {
        Method::Rle => rle::decode(payload,expected)?,
        Method::Lz77 => lz77::decode(payload,expected)?,
        Method::Huffman4 => huffman::decode(payload,expected,huffman::SymbolWidth::Nibble)?,
        Method::Huffman8 => huffman::decode(payload,expected,huffman::SymbolWidth::Byte)?
    };
    let ans = verify_length(&header,ans)?;
    log::debug!("{} expanded {} into {}",header.method,stream.len(),ans.len());
    Ok(ans)
}

/// The codecs stop at the declared size, this makes sure none of them stopped short or ran over
fn verify_length(header: &Header,ans: Vec<u8>) -> Result<Vec<u8>,Error> {
    if ans.len() != header.size as usize {
        log::error!("{} produced {} bytes, header declared {}",header.method,ans.len(),header.size);
        return Err(Error::UnexpectedError);
    }
    Ok(ans)
}

/// Get the method of a compressed stream without decoding it
pub fn peek_method(stream: &[u8]) -> Result<Method,Error> {
    Ok(Header::parse(stream)?.method)
}

// *************** TESTS *****************

#[cfg(test)]
const ALL_METHODS: [Method;4] = [Method::Rle,Method::Lz77,Method::Huffman4,Method::Huffman8];

#[cfg(test)]
fn pseudo_random(len: usize,seed: u32) -> Vec<u8> {
    // xorshift, only needs to be repeatable
    let mut x = seed.max(1);
    let mut ans = Vec::with_capacity(len);
    for _i in 0..len {
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        ans.push((x >> 24) as u8);
    }
    ans
}

#[test]
fn invertibility() {
    let mut samples: Vec<Vec<u8>> = vec![
        "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes().to_vec(),
        "1234567".as_bytes().to_vec(),
        vec![0x41],
        vec![0x41,0x42],
        (0..=255).collect(),
        pseudo_random(5000,7),
        pseudo_random(300,11).repeat(20)
    ];
    samples.push(pseudo_random(5000,3).iter().map(|x| b'a' + x % 3).collect());
    for method in ALL_METHODS {
        for test_data in &samples {
            let compressed = compress(method,test_data).expect("compression failed");
            assert_eq!(compressed.len() % 4, 0);
            assert_eq!(compressed[0], method.tag());
            let expanded = decompress(&compressed).expect("expansion failed");
            assert_eq!(*test_data,expanded,"{} failed round trip",method);
        }
    }
}

#[test]
fn empty_buffer() {
    for method in ALL_METHODS {
        let compressed = compress(method,&[]).expect("compression failed");
        assert_eq!(compressed,vec![method.tag(),0,0,0]);
        assert_eq!(decompress(&compressed).expect("expansion failed"),Vec::<u8>::new());
    }
}

#[test]
fn too_large() {
    let big = vec![0;MAX_SIZE+1];
    for method in ALL_METHODS {
        match compress(method,&big) {
            Err(Error::InputTooLarge(n)) => assert_eq!(n,MAX_SIZE+1),
            _ => panic!("expected InputTooLarge")
        }
    }
}

#[test]
fn unknown_method() {
    for tag in [0x00,0x11,0x20,0x22,0x31,0x81,0xff] {
        match decompress(&[tag,4,0,0,0,0,0,0]) {
            Err(Error::UnknownMethod(t)) => assert_eq!(t,tag),
            _ => panic!("expected UnknownMethod for {:#04x}",tag)
        }
    }
}

#[test]
fn missing_header() {
    assert!(matches!(decompress(&[]),Err(Error::UnexpectedError)));
    assert!(matches!(decompress(&[0x10,1,0]),Err(Error::UnexpectedError)));
}

#[test]
fn truncated_payload() {
    for method in ALL_METHODS {
        let test_data = pseudo_random(200,5);
        let compressed = compress(method,&test_data).expect("compression failed");
        assert!(decompress(&compressed[0..8]).is_err(),"{} accepted truncated stream",method);
    }
}

#[test]
fn without_alignment() {
    let mut opt = STD_OPTIONS;
    opt.word_align = false;
    let test_data = "ABCDDDDD".as_bytes();
    let compressed = compress_with(Method::Rle,test_data,&opt).expect("compression failed");
    assert_eq!(compressed,hex::decode("30 08 00 00 02 41 42 43 82 44".replace(" ","")).unwrap());
    assert_eq!(decompress(&compressed).expect("expansion failed"),test_data.to_vec());
}

#[test]
fn length_check() {
    let header = Header::create(Method::Lz77,4).expect("header failed");
    assert_eq!(verify_length(&header,vec![1,2,3,4]).expect("length check failed"),vec![1,2,3,4]);
    assert!(matches!(verify_length(&header,vec![1,2,3]),Err(Error::UnexpectedError)));
    assert!(matches!(verify_length(&header,vec![1,2,3,4,5]),Err(Error::UnexpectedError)));
}

#[test]
fn method_names() {
    for method in ALL_METHODS {
        assert_eq!(Method::from_name(method.name()),Some(method));
        assert_eq!(Method::from_tag(method.tag()).unwrap(),method);
    }
    assert_eq!(Method::from_name("lzss"),None);
}
