//! GBA Huffman Compression
//!
//! Symbols are either nibbles (4 bit) or bytes (8 bit).  Nibbles are taken low nibble first.
//! The payload is the tree table followed by the bitstream.
//!
//! The tree table:
//! * byte 0 is `table_len/2 - 1`, table length is a multiple of 4
//! * byte 1 is the root node
//! * a node byte holds the child offset in bits 0-5, bit 7 is set if the left child is a leaf,
//!   bit 6 is set if the right child is a leaf
//! * children of the node at address `a` are at `(a & !1) + (offset+1)*2`, left then right
//! * a leaf is just the symbol value
//!
//! The bitstream is a sequence of 32 bit little endian words, each consumed from the most
//! significant bit, 0 selects the left child.
//!
//! Since the offset is only 6 bits, the order in which nodes are placed in the table matters.
//! The placement is the one used by the common GBA tools, so that 8 bit output is identical to theirs:
//! subtrees of up to 64 leaves are laid out breadth first, larger subtrees are split between
//! their children (smaller child first), and finally any node still out of reach has its
//! child pair moved closer.

use bit_vec::BitVec;
use crate::tools::bit_cursor::{ByteCursor,WordBitWriter,WordBitReader,split_nibbles};
use crate::{Error,Method};

const ROOT_ADDR: usize = 1;
const MAX_OFFSET: usize = 0x3f;
const LEFT_LEAF: u8 = 0x80;
const RIGHT_LEAF: u8 = 0x40;

/// Size of the Huffman symbols
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum SymbolWidth {
    Nibble,
    Byte
}

impl SymbolWidth {
    /// Width used by a method, None if the method is not Huffman
    pub fn from_method(method: Method) -> Option<Self> {
        match method {
            Method::Huffman4 => Some(Self::Nibble),
            Method::Huffman8 => Some(Self::Byte),
            _ => None
        }
    }
    pub fn bits(&self) -> usize {
        match self {
            Self::Nibble => 4,
            Self::Byte => 8
        }
    }
    fn num_symbols(&self) -> usize {
        1 << self.bits()
    }
}

#[derive(Clone,Copy,Debug)]
enum TreeEntry {
    Leaf(u8),
    Node{left: usize, right: usize}
}

struct TreeNode {
    weight: usize,
    leaves: usize,
    entry: TreeEntry,
    has_parent: bool
}

/// One byte of the table while it is being laid out.
/// For a node `val` is the offset, which may temporarily be too large.
#[derive(Clone,Copy,Default)]
struct Slot {
    val: usize,
    leaf: bool,
    flags: u8
}

/// Huffman tree kept in an arena, leaves come first in ascending symbol order,
/// and each merged node is appended after its children.
struct HuffmanTree {
    nodes: Vec<TreeNode>,
    root: usize
}

impl HuffmanTree {
    /// Remove the lightest node from the free set, ties go to the lower index
    fn take_lightest(nodes: &mut [TreeNode]) -> Option<usize> {
        let ans = nodes.iter().enumerate()
            .filter(|(_,n)| !n.has_parent)
            .min_by_key(|(i,n)| (n.weight,*i))
            .map(|(i,_)| i)?;
        nodes[ans].has_parent = true;
        Some(ans)
    }
    fn from_frequencies(freq: &[usize]) -> Self {
        let mut nodes: Vec<TreeNode> = freq.iter().enumerate()
            .filter(|(_,f)| **f > 0)
            .map(|(sym,f)| TreeNode {
                weight: *f,
                leaves: 1,
                entry: TreeEntry::Leaf(sym as u8),
                has_parent: false
            }).collect();
        if nodes.len() < 2 {
            // the table needs a root node, so a lone symbol hangs on both sides
            let (sym,weight) = match nodes.first() {
                Some(TreeNode { entry: TreeEntry::Leaf(s), weight, .. }) => (*s,*weight),
                _ => (0,0)
            };
            log::debug!("single symbol {:#04x}",sym);
            return Self {
                nodes: vec![
                    TreeNode { weight, leaves: 1, entry: TreeEntry::Leaf(sym), has_parent: true },
                    TreeNode { weight, leaves: 2, entry: TreeEntry::Node{left: 0, right: 0}, has_parent: false }
                ],
                root: 1
            };
        }
        loop {
            let left = Self::take_lightest(&mut nodes);
            let right = Self::take_lightest(&mut nodes);
            match (left,right) {
                (Some(l),Some(r)) => {
                    let weight = nodes[l].weight + nodes[r].weight;
                    let leaves = nodes[l].leaves + nodes[r].leaves;
                    nodes.push(TreeNode { weight, leaves, entry: TreeEntry::Node{left: l, right: r}, has_parent: false });
                },
                _ => break
            }
        }
        let root = nodes.len() - 1;
        Self { nodes, root }
    }
    /// Codes indexed by symbol, None for symbols that do not occur.
    fn codes(&self,num_symbols: usize) -> Vec<Option<BitVec>> {
        let mut ans: Vec<Option<BitVec>> = vec![None;num_symbols];
        let mut stack: Vec<(usize,BitVec)> = vec![(self.root,BitVec::new())];
        while let Some((idx,code)) = stack.pop() {
            match self.nodes[idx].entry {
                TreeEntry::Leaf(sym) => {
                    // lone symbol is reached twice, keep the 0 branch
                    if ans[sym as usize].is_none() {
                        ans[sym as usize] = Some(code);
                    }
                },
                TreeEntry::Node{left,right} => {
                    let mut rcode = code.clone();
                    rcode.push(true);
                    stack.push((right,rcode));
                    let mut lcode = code;
                    lcode.push(false);
                    stack.push((left,lcode));
                }
            }
        }
        ans
    }
    fn slot(&self,idx: usize) -> Slot {
        match self.nodes[idx].entry {
            TreeEntry::Leaf(sym) => Slot { val: sym as usize, leaf: true, flags: 0 },
            TreeEntry::Node{left,right} => {
                let mut flags = 0;
                if let TreeEntry::Leaf(_) = self.nodes[left].entry {
                    flags |= LEFT_LEAF;
                }
                if let TreeEntry::Leaf(_) = self.nodes[right].entry {
                    flags |= RIGHT_LEAF;
                }
                Slot { val: 0, leaf: false, flags }
            }
        }
    }
    /// Place the subtree at `idx`, its root goes to address `p` and the rest from address `q` on.
    /// Returns the number of leaves placed.
    fn place_branch(&self,slots: &mut [Slot],idx: usize,p: usize,mut q: usize) -> usize {
        let node = &self.nodes[idx];
        match node.entry {
            TreeEntry::Node{left,right} if node.leaves > MAX_OFFSET + 1 => {
                slots[p] = self.slot(idx);
                if self.nodes[left].leaves <= self.nodes[right].leaves {
                    let left_leaves = self.place_branch(slots,left,q,q+2);
                    self.place_branch(slots,right,q+1,q+left_leaves*2);
                    slots[q+1].val = left_leaves - 1;
                } else {
                    let right_leaves = self.place_branch(slots,right,q+1,q+2);
                    self.place_branch(slots,left,q,q+right_leaves*2);
                    slots[q].val = right_leaves - 1;
                }
            },
            _ => {
                // breadth first, the children of each node are the next free pair
                let mut queue: Vec<usize> = vec![idx];
                let mut ptr = 0;
                while ptr < queue.len() {
                    let curr = queue[ptr];
                    ptr += 1;
                    let mut slot = self.slot(curr);
                    if let TreeEntry::Node{left,right} = self.nodes[curr].entry {
                        slot.val = (queue.len() - ptr) >> 1;
                        queue.push(left);
                        queue.push(right);
                    }
                    if ptr == 1 {
                        slots[p] = slot;
                    } else {
                        slots[q] = slot;
                        q += 1;
                    }
                }
            }
        }
        node.leaves
    }
    /// Bring every offset down to 6 bits by moving child pairs toward their parent.
    fn repair_offsets(slots: &mut [Slot]) -> Result<(),Error> {
        let mut moves = 0;
        let mut i = 1;
        while i < slots.len() {
            if slots[i].leaf || slots[i].val <= MAX_OFFSET {
                i += 1;
                continue;
            }
            moves += 1;
            if moves > slots.len() * slots.len() {
                log::error!("offsets still out of reach after {} moves",moves);
                return Err(Error::TreeLayout);
            }
            // a sibling node one pair short of the limit is moved first
            let sibling = i ^ 1;
            let inc = if i & 1 == 1 && !slots[sibling].leaf && slots[sibling].val == MAX_OFFSET {
                i -= 1;
                1
            } else if i & 1 == 0 && !slots[sibling].leaf && slots[sibling].val == MAX_OFFSET {
                i += 1;
                1
            } else {
                slots[i].val - MAX_OFFSET
            };
            let to = (i >> 1) + 1 + slots[i].val;
            let from = to - inc;
            if to * 2 + 2 > slots.len() {
                log::error!("node at {} points outside the table",i);
                return Err(Error::TreeLayout);
            }
            log::trace!("moving pair {} to {}",to,from);
            slots[from*2..to*2+2].rotate_right(2);
            slots[i].val -= inc;
            for j in i+1..from*2 {
                let k = (j >> 1) + 1 + slots[j].val;
                if !slots[j].leaf && k >= from && k < to {
                    slots[j].val += 1;
                }
            }
            for j in from*2..from*2+2 {
                if !slots[j].leaf {
                    slots[j].val += inc;
                }
            }
            for j in from*2+2..to*2+2 {
                let k = (j >> 1) + 1 + slots[j].val;
                if !slots[j].leaf && k > to {
                    slots[j].val = slots[j].val.saturating_sub(1);
                }
            }
            // rescan from the pair before the one that changed
            i = (i | 1).saturating_sub(2) + 1;
        }
        Ok(())
    }
    /// Lay out the node table, including the size byte and padding
    fn to_table(&self) -> Result<Vec<u8>,Error> {
        let size_byte = (self.nodes[self.root].leaves - 1) | 1;
        let mut slots = vec![Slot::default();(size_byte + 1) * 2];
        self.place_branch(&mut slots,self.root,ROOT_ADDR,ROOT_ADDR+1);
        Self::repair_offsets(&mut slots)?;
        let mut table: Vec<u8> = Vec::with_capacity(slots.len());
        table.push(size_byte as u8);
        for (addr,slot) in slots.iter().enumerate().skip(ROOT_ADDR) {
            if slot.leaf {
                table.push(slot.val as u8);
            } else if slot.val > MAX_OFFSET {
                log::error!("node at {} needs offset {}",addr,slot.val);
                return Err(Error::TreeLayout);
            } else {
                table.push(slot.val as u8 | slot.flags);
            }
        }
        log::trace!("tree table uses {} bytes",table.len());
        Ok(table)
    }
}

/// Produce the Huffman payload (no header) for `ibuf`
pub fn encode(ibuf: &[u8],width: SymbolWidth) -> Result<Vec<u8>,Error> {
    let nibbles: Vec<u8>;
    let symbols: &[u8] = match width {
        SymbolWidth::Nibble => {
            nibbles = split_nibbles(ibuf);
            &nibbles
        },
        SymbolWidth::Byte => ibuf
    };
    let mut freq = vec![0;width.num_symbols()];
    for sym in symbols {
        freq[*sym as usize] += 1;
    }
    let tree = HuffmanTree::from_frequencies(&freq);
    let codes = tree.codes(width.num_symbols());
    let mut ans = tree.to_table()?;
    let mut writer = WordBitWriter::new();
    for sym in symbols {
        match &codes[*sym as usize] {
            Some(code) => writer.put_code(code),
            None => return Err(Error::UnexpectedError)
        }
    }
    ans.append(&mut writer.into_bytes());
    log::debug!("Huffman {} bit symbols, {} distinct",width.bits(),codes.iter().filter(|c| c.is_some()).count());
    Ok(ans)
}

/// Expand a Huffman payload (no header) into `expanded_size` bytes.
pub fn decode(payload: &[u8],expanded_size: usize,width: SymbolWidth) -> Result<Vec<u8>,Error> {
    let mut cursor = ByteCursor::new(payload);
    let table_len = (cursor.read_u8()? as usize + 1) * 2;
    let table = ByteCursor::new(payload).read_slice(table_len)?;
    let mut bits = WordBitReader::new(&payload[table_len..]);
    let mut ans: Vec<u8> = Vec::with_capacity(expanded_size);
    let mut low_nibble: Option<u8> = None;
    let mut addr = ROOT_ADDR;
    while ans.len() < expanded_size {
        let bit = match bits.get_bit() {
            Some(b) => b,
            None => {
                log::error!("bitstream ended after {} bytes",ans.len());
                return Err(Error::CorruptStream);
            }
        };
        let node = table[addr];
        let child = (addr & !1) + ((node & MAX_OFFSET as u8) as usize + 1) * 2 + bit as usize;
        if child >= table_len {
            log::error!("node at {} points outside the table",addr);
            return Err(Error::CorruptStream);
        }
        let leaf_flag = match bit {
            false => LEFT_LEAF,
            true => RIGHT_LEAF
        };
        if node & leaf_flag == 0 {
            addr = child;
            continue;
        }
        addr = ROOT_ADDR;
        let sym = table[child];
        if sym as usize >= width.num_symbols() {
            log::error!("leaf value {:#04x} is too wide",sym);
            return Err(Error::CorruptStream);
        }
        match (width,low_nibble.take()) {
            (SymbolWidth::Byte,_) => ans.push(sym),
            (SymbolWidth::Nibble,None) => low_nibble = Some(sym),
            (SymbolWidth::Nibble,Some(lo)) => ans.push(lo | sym << 4)
        }
    }
    Ok(ans)
}

#[cfg(test)]
use SymbolWidth::{Nibble,Byte};

#[test]
fn symbol_widths() {
    assert_eq!(SymbolWidth::from_method(Method::Huffman4),Some(Nibble));
    assert_eq!(SymbolWidth::from_method(Method::Huffman8),Some(Byte));
    assert_eq!(SymbolWidth::from_method(Method::Rle),None);
    assert_eq!(SymbolWidth::from_method(Method::Lz77),None);
    assert_eq!(Method::Huffman4.tag() & 0x0f,Nibble.bits() as u8);
    assert_eq!(Method::Huffman8.tag() & 0x0f,Byte.bits() as u8);
}

#[test]
fn degenerate_trees() {
    // a lone symbol costs one bit
    let huf_str = "01 c0 41 41 00 00 00 00 00 00 00 00";
    assert_eq!(encode(&[0x41;64],Byte).expect("compression failed"),hex::decode(huf_str.replace(" ","")).unwrap());
    let huf_str = "01 c0 01 04 55 55 55 55 55 55 55 55 55 55 55 55 55 55 55 55";
    assert_eq!(encode(&[0x41;64],Nibble).expect("compression failed"),hex::decode(huf_str.replace(" ","")).unwrap());
    let huf_str = "01 c0 01 01 00 00 00 00";
    assert_eq!(encode(&[0x11;3],Nibble).expect("compression failed"),hex::decode(huf_str.replace(" ","")).unwrap());
    assert_eq!(decode(&hex::decode(huf_str.replace(" ","")).unwrap(),3,Nibble).expect("expansion failed"),vec![0x11;3]);
}

#[test]
fn compression_works() {
    let test_data = "ABABABABABABABAB".as_bytes();
    let huf_str = "01 c0 41 42 00 00 55 55";
    assert_eq!(encode(test_data,Byte).expect("compression failed"),hex::decode(huf_str.replace(" ","")).unwrap());
    let huf_str = "03 80 04 c0 01 02 00 00 9a a6 69 9a 00 00 a6 69";
    assert_eq!(encode(test_data,Nibble).expect("compression failed"),hex::decode(huf_str.replace(" ","")).unwrap());

    // lighter subtree goes left, weight ties go to the earlier node
    let huf_str = "01 c0 62 61 00 00 00 c0";
    assert_eq!(encode("aab".as_bytes(),Byte).expect("compression failed"),hex::decode(huf_str.replace(" ","")).unwrap());

    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let huf_str = "11 00 00 81 01 c2 20 02 02 43 61 6d c2 03 c3 c4 c4 2e 53 49 c3 84 65 68 6b 6c 6e 73 69 6f 74 c0 0a 64 00 00 3b 13 3b d9 ed 4c b6 13 fa 4e ec bf c1 0b 04 1f d9 4e 6c e1 00 00 f8 33";
    assert_eq!(encode(test_data,Byte).expect("compression failed"),hex::decode(huf_str.replace(" ","")).unwrap());
    let huf_str = "0f 00 40 01 01 06 41 42 82 43 c3 00 83 02 0e 83 43 01 09 0d 04 c2 0f c2 c2 07 03 05 08 0a 0b 0c 6f d9 bc 8c 3d 94 cd d6 df b2 d9 fa 87 b2 79 19 44 fc 32 be 2d 9c 08 de ed 90 b0 e4 0e 33 0a bf 6c b6 7e 8b 6c 5e c6 b7 00 a0 c7 a1";
    assert_eq!(encode(test_data,Nibble).expect("compression failed"),hex::decode(huf_str.replace(" ","")).unwrap());
}

#[test]
fn invertibility() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    for width in [Nibble,Byte] {
        let compressed = encode(test_data,width).expect("compression failed");
        let expanded = decode(&compressed,test_data.len(),width).expect("expansion failed");
        assert_eq!(test_data.to_vec(),expanded);
    }
}

#[test]
fn full_alphabet() {
    // uniform weights split the root, the far half starts at the largest offset
    let test_data: Vec<u8> = (0..=255).collect();
    let compressed = encode(&test_data,Byte).expect("compression failed");
    assert_eq!(compressed[0..8].to_vec(),vec![0xff,0x00,0x00,0x3f,0x00,0x3f,0x00,0x01]);
    assert_eq!(compressed.len(),512 + 256);
    assert_eq!(decode(&compressed,256,Byte).expect("expansion failed"),test_data);

    // skewed weights give a deep tree that needs pairs moved
    let mut test_data: Vec<u8> = Vec::new();
    let mut count = 1;
    for sym in 0..20 {
        test_data.append(&mut vec![sym;count]);
        count = count * 3 / 2 + 1;
    }
    let compressed = encode(&test_data,Byte).expect("compression failed");
    let huf_str = "13 00 40 41 41 12 41 13 41 10 41 11 41 0e 41 0f 41 0c 41 0d 41 0a 41 0b 81 08 c1 09 05 81 06 07 04 80 03 40 c0 02 00 01 01 1d c0 01";
    assert_eq!(compressed[0..44].to_vec(),hex::decode(huf_str.replace(" ","")).unwrap());
    assert_eq!(decode(&compressed,test_data.len(),Byte).expect("expansion failed"),test_data);
}

#[test]
fn wide_skewed_alphabet() {
    // every symbol present with weights spread over several orders of magnitude
    let mut test_data: Vec<u8> = Vec::new();
    for sym in 0..=255u8 {
        let count = 1 + (sym as usize * sym as usize * 7) % 97 + (sym as usize % 5) * 40;
        test_data.append(&mut vec![sym;count]);
    }
    for width in [Nibble,Byte] {
        let compressed = encode(&test_data,width).expect("compression failed");
        assert_eq!(decode(&compressed,test_data.len(),width).expect("expansion failed"),test_data);
    }
}

#[test]
fn corrupt_tables() {
    // table length runs past the payload
    assert!(matches!(decode(&[0x07,0xc0,0x41,0x41],4,Byte),Err(Error::CorruptStream)));
    // child offset points past the table
    assert!(matches!(decode(&[0x01,0xc5,0x41,0x41,0,0,0,0],4,Byte),Err(Error::CorruptStream)));
    // leaf is too wide for 4 bit symbols
    assert!(matches!(decode(&[0x01,0xc0,0x41,0x41,0,0,0,0],4,Nibble),Err(Error::CorruptStream)));
    // bitstream runs out
    assert!(matches!(decode(&[0x01,0xc0,0x41,0x41,0,0,0,0],40,Byte),Err(Error::CorruptStream)));
}
