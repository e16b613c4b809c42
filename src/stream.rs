//! Stream Adapters
//!
//! The BIOS formats declare the expanded size up front, so the codecs work on whole buffers.
//! These adapters let `Read` and `Write` objects be used with them, e.g. files in the CLI.

use std::io::{Cursor,Read,Write,BufReader,BufWriter};
use crate::{Method,Options,DYNERR};

/// Reader that serves the expansion of a compressed stream.
/// The whole inner stream is read and expanded when the reader is created.
pub struct DecompressReader<R: Read> {
    expanded: Cursor<Vec<u8>>,
    method: Method,
    inner: R
}

impl <R: Read> DecompressReader<R> {
    pub fn new(mut inner: R) -> Result<Self,DYNERR> {
        let mut compressed: Vec<u8> = Vec::new();
        inner.read_to_end(&mut compressed)?;
        let method = crate::peek_method(&compressed)?;
        let expanded = crate::decompress(&compressed)?;
        Ok(Self {
            expanded: Cursor::new(expanded),
            method,
            inner
        })
    }
    /// method found in the header
    pub fn method(&self) -> Method {
        self.method
    }
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl <R: Read> Read for DecompressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.expanded.read(buf)
    }
}

/// Writer that collects expanded data, which is compressed when `finish` is called.
/// Dropping the writer without calling `finish` discards the data.
pub struct CompressWriter<W: Write> {
    expanded: Vec<u8>,
    method: Method,
    opt: Options,
    inner: W
}

impl <W: Write> CompressWriter<W> {
    pub fn new(inner: W,method: Method,opt: &Options) -> Self {
        Self {
            expanded: Vec::new(),
            method,
            opt: opt.clone(),
            inner
        }
    }
    /// Compress everything written so far into the inner writer, and give it back
    pub fn finish(mut self) -> Result<W,DYNERR> {
        let compressed = crate::compress_with(self.method,&self.expanded,&self.opt)?;
        self.inner.write_all(&compressed)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl <W: Write> Write for CompressWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.expanded.extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Main compression function.
/// `expanded_in` is an object with `Read` trait, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`
/// `compressed_out` is an object with `Write` trait, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`
/// Returns (in_size,out_size) or error
pub fn compress<R,W>(expanded_in: &mut R, compressed_out: &mut W, method: Method, opt: &Options) -> Result<(u64,u64),DYNERR>
where R: Read, W: Write {
    let mut reader = BufReader::new(expanded_in);
    let mut expanded: Vec<u8> = Vec::new();
    reader.read_to_end(&mut expanded)?;
    let compressed = crate::compress_with(method,&expanded,opt)?;
    let mut writer = BufWriter::new(compressed_out);
    writer.write_all(&compressed)?;
    writer.flush()?;
    Ok((expanded.len() as u64,compressed.len() as u64))
}

/// Main expansion function, the method is taken from the header.
/// `compressed_in` is an object with `Read` trait, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`
/// `expanded_out` is an object with `Write` trait, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`
/// Returns (in_size,out_size) or error
pub fn expand<R,W>(compressed_in: &mut R, expanded_out: &mut W) -> Result<(u64,u64),DYNERR>
where R: Read, W: Write {
    let mut reader = BufReader::new(compressed_in);
    let mut compressed: Vec<u8> = Vec::new();
    reader.read_to_end(&mut compressed)?;
    let expanded = crate::decompress(&compressed)?;
    let mut writer = BufWriter::new(expanded_out);
    writer.write_all(&expanded)?;
    writer.flush()?;
    Ok((compressed.len() as u64,expanded.len() as u64))
}

/// Convenience function, calls `compress` with a slice returning a Vec
pub fn compress_slice(slice: &[u8],method: Method,opt: &Options) -> Result<Vec<u8>,DYNERR> {
    let mut src = Cursor::new(slice);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    compress(&mut src,&mut ans,method,opt)?;
    Ok(ans.into_inner())
}

/// Convenience function, calls `expand` with a slice returning a Vec
pub fn expand_slice(slice: &[u8]) -> Result<Vec<u8>,DYNERR> {
    let mut src = Cursor::new(slice);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    expand(&mut src,&mut ans)?;
    Ok(ans.into_inner())
}

#[cfg(test)]
use crate::STD_OPTIONS;

#[test]
fn slices() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let compressed = compress_slice(test_data,Method::Rle,&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed[0..5],[0x30,0x31,0x00,0x00,0x30]);
    assert_eq!(compressed.len(),56);
    assert_eq!(expand_slice(&compressed).expect("expansion failed"),test_data.to_vec());
}

#[test]
fn sizes() {
    let test_data = [0x41;64];
    let mut src = Cursor::new(&test_data[..]);
    let mut dst: Vec<u8> = Vec::new();
    let (in_size,out_size) = compress(&mut src,&mut dst,Method::Rle,&STD_OPTIONS).expect("compression failed");
    assert_eq!((in_size,out_size),(64,8));
    assert_eq!(dst,vec![0x30,0x40,0x00,0x00,0xbd,0x41,0x00,0x00]);
    let mut src = Cursor::new(&dst[..]);
    let mut expanded: Vec<u8> = Vec::new();
    assert_eq!(expand(&mut src,&mut expanded).expect("expansion failed"),(8,64));
    assert_eq!(expanded,test_data.to_vec());
}

#[test]
fn reader_and_writer() {
    let mut writer = CompressWriter::new(Vec::new(),Method::Huffman8,&STD_OPTIONS);
    writer.write_all("ABABABAB".as_bytes()).expect("write failed");
    writer.write_all("ABABABAB".as_bytes()).expect("write failed");
    let compressed = writer.finish().expect("compression failed");
    assert_eq!(compressed,hex::decode("28 10 00 00 01 c0 41 42 00 00 55 55".replace(" ","")).unwrap());

    let mut reader = DecompressReader::new(Cursor::new(compressed)).expect("expansion failed");
    assert_eq!(reader.method(),Method::Huffman8);
    let mut expanded = String::new();
    reader.read_to_string(&mut expanded).expect("read failed");
    assert_eq!(expanded,"ABABABABABABABAB");
}

#[test]
fn bad_streams() {
    assert!(expand_slice(&[0x10,0x01]).is_err());
    assert!(expand_slice(&[0x44,0x01,0x00,0x00,0x00]).is_err());
    assert!(DecompressReader::new(Cursor::new(vec![0x30,0x10,0x00,0x00,0x85])).is_err());
    let writer = CompressWriter::new(Vec::new(),Method::Lz77,&STD_OPTIONS);
    assert_eq!(writer.finish().expect("compression failed"),vec![0x10,0,0,0]);
}
