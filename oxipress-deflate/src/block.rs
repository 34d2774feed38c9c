//! Block assembly and emission for the DEFLATE encoder.
//!
//! Matches and literals accumulate in parallel distance/literal arrays
//! while their Huffman symbol frequencies are tallied. When the buffer
//! fills or a flush demands it, the emitter builds the dynamic trees,
//! prices the three block encodings (stored, fixed, dynamic) and writes
//! the cheapest one, transmitting dynamic trees in run-length form over
//! the 19-symbol bit-length alphabet.

use crate::bits::BitSink;
use crate::deflate::{DataType, Strategy};
use crate::huffman::{CodeData, StaticTreeDesc, TreeBuilder, TreeDesc, HEAP_SIZE};
use crate::tables::{
    d_code, static_tables, BL_CODES, BL_ORDER, DYN_TREES, D_CODES, END_BLOCK, EXTRA_DBITS,
    EXTRA_LBITS, LITERALS, L_CODES, REPZ_11_138, REPZ_3_10, REP_3_6, STATIC_TREES, STORED_BLOCK,
};

const D_TREE_SIZE: usize = 2 * D_CODES + 1;
const BL_TREE_SIZE: usize = 2 * BL_CODES + 1;

/// Per-block symbol buffer, frequency trees and emission logic.
#[derive(Debug)]
pub struct BlockEncoder {
    l_desc: TreeDesc<HEAP_SIZE>,
    d_desc: TreeDesc<D_TREE_SIZE>,
    bl_desc: TreeDesc<BL_TREE_SIZE>,
    builder: TreeBuilder,
    /// Match distances, 0 for literals.
    d_buf: Vec<u16>,
    /// Literal bytes, or match lengths biased by MIN_MATCH.
    l_buf: Vec<u8>,
    sym_count: usize,
    lit_bufsize: usize,
    level: u8,
    strategy: Strategy,
    data_type: DataType,
}

impl BlockEncoder {
    /// Create an encoder whose symbol buffer holds `lit_bufsize` entries.
    pub fn new(lit_bufsize: usize, level: u8, strategy: Strategy) -> Self {
        let mut enc = Self {
            l_desc: TreeDesc::new(StaticTreeDesc::literal_length()),
            d_desc: TreeDesc::new(StaticTreeDesc::distance()),
            bl_desc: TreeDesc::new(StaticTreeDesc::bit_length()),
            builder: TreeBuilder::new(),
            d_buf: vec![0; lit_bufsize],
            l_buf: vec![0; lit_bufsize],
            sym_count: 0,
            lit_bufsize,
            level,
            strategy,
            data_type: DataType::Unknown,
        };
        enc.init_block();
        enc
    }

    /// Reset for a new stream.
    pub fn reset(&mut self) {
        self.data_type = DataType::Unknown;
        self.init_block();
    }

    /// Reported input classification, fixed after the first emitted block.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Whether the current block holds any symbols.
    pub fn has_symbols(&self) -> bool {
        self.sym_count != 0
    }

    /// Reinitialize frequencies and the symbol buffer for the next block.
    fn init_block(&mut self) {
        for n in 0..L_CODES {
            self.l_desc.tree[n].set_freq(0);
        }
        for n in 0..D_CODES {
            self.d_desc.tree[n].set_freq(0);
        }
        for n in 0..BL_CODES {
            self.bl_desc.tree[n].set_freq(0);
        }
        // Every Huffman-coded block ends with END_BLOCK, so its code is
        // guaranteed to exist.
        self.l_desc.tree[END_BLOCK].set_freq(1);
        self.builder.opt_len = 0;
        self.builder.static_len = 0;
        self.sym_count = 0;
    }

    /// Record a literal byte. Returns true when the buffer is one entry
    /// short of capacity and the block must be emitted.
    pub fn tally_lit(&mut self, c: u8) -> bool {
        self.d_buf[self.sym_count] = 0;
        self.l_buf[self.sym_count] = c;
        self.sym_count += 1;
        self.l_desc.tree[c as usize].inc_freq();
        self.sym_count == self.lit_bufsize - 1
    }

    /// Record a match of distance `dist` and length `lc + MIN_MATCH`.
    /// Returns true when the block must be emitted.
    pub fn tally_dist(&mut self, dist: u16, lc: u8) -> bool {
        self.d_buf[self.sym_count] = dist;
        self.l_buf[self.sym_count] = lc;
        self.sym_count += 1;
        let t = static_tables();
        let d = dist - 1;
        self.l_desc.tree[t.length_code[lc as usize] as usize + LITERALS + 1].inc_freq();
        self.d_desc.tree[d_code(d) as usize].inc_freq();
        self.sym_count == self.lit_bufsize - 1
    }

    /// Emit the current block, choosing the cheapest encoding.
    ///
    /// `buf` is the window slice covering the block when it is still
    /// resident (a slide may have pushed the block start out of the
    /// window, in which case a stored block is not possible and `buf` is
    /// `None`). `stored_len` is the byte length of the block's input.
    pub fn flush_block(
        &mut self,
        sink: &mut BitSink,
        buf: Option<&[u8]>,
        stored_len: usize,
        last: bool,
    ) {
        let mut opt_lenb;
        let static_lenb;
        let mut max_blindex = 0;

        if self.level > 0 {
            if self.data_type == DataType::Unknown {
                self.data_type = self.detect_data_type();
            }

            self.builder.build_tree(&mut self.l_desc);
            self.builder.build_tree(&mut self.d_desc);
            // The bit-length tree covers both trees above and adds its own
            // transmission overhead to opt_len.
            max_blindex = self.build_bl_tree();

            opt_lenb = (self.builder.opt_len + 3 + 7) >> 3;
            static_lenb = (self.builder.static_len + 3 + 7) >> 3;
            if static_lenb <= opt_lenb || self.strategy == Strategy::Fixed {
                opt_lenb = static_lenb;
            }
        } else {
            opt_lenb = stored_len + 5;
            static_lenb = opt_lenb;
        }

        if stored_len + 4 <= opt_lenb && buf.is_some() {
            // A stored block never costs more than 5 bytes of overhead and
            // transmits no trees; take it whenever it is not larger.
            self.stored_block(sink, buf.unwrap_or(&[]), last);
        } else if static_lenb == opt_lenb {
            sink.send_bits((STATIC_TREES << 1) | last as u16, 3);
            let t = static_tables();
            self.compress_block(sink, &t.static_ltree, &t.static_dtree);
        } else {
            sink.send_bits((DYN_TREES << 1) | last as u16, 3);
            self.send_all_trees(
                sink,
                self.l_desc.max_code + 1,
                self.d_desc.max_code + 1,
                max_blindex + 1,
            );
            self.compress_block(sink, &self.l_desc.tree, &self.d_desc.tree);
        }

        self.init_block();
        if last {
            sink.align_to_byte();
        }
    }

    /// Emit a stored (uncompressed) block, possibly empty.
    pub fn stored_block(&self, sink: &mut BitSink, buf: &[u8], last: bool) {
        sink.send_bits((STORED_BLOCK << 1) | last as u16, 3);
        sink.align_to_byte();
        sink.put_short(buf.len() as u16);
        sink.put_short(!(buf.len() as u16));
        sink.put_bytes(buf);
    }

    /// Flush bits to a byte boundary using an empty fixed-tree block.
    pub fn align(&self, sink: &mut BitSink) {
        sink.send_bits(STATIC_TREES << 1, 3);
        sink.send_code(&static_tables().static_ltree, END_BLOCK);
        sink.flush_bits();
    }

    /// Send the literal and distance trees' code lengths plus the
    /// bit-length tree describing them.
    fn send_all_trees(&self, sink: &mut BitSink, lcodes: usize, dcodes: usize, blcodes: usize) {
        debug_assert!(lcodes >= 257 && dcodes >= 1 && blcodes >= 4);
        debug_assert!(lcodes <= L_CODES && dcodes <= D_CODES && blcodes <= BL_CODES);

        sink.send_bits((lcodes - 257) as u16, 5);
        sink.send_bits((dcodes - 1) as u16, 5);
        sink.send_bits((blcodes - 4) as u16, 4);
        for rank in 0..blcodes {
            sink.send_bits(self.bl_desc.tree[BL_ORDER[rank] as usize].len(), 3);
        }
        self.send_tree(sink, &self.l_desc.tree, lcodes - 1);
        self.send_tree(sink, &self.d_desc.tree, dcodes - 1);
    }

    /// Build the bit-length tree from scans of the two code-length
    /// sequences and return the index of the last bit-length code to send.
    fn build_bl_tree(&mut self) -> usize {
        scan_tree(
            &mut self.bl_desc.tree,
            &mut self.l_desc.tree,
            self.l_desc.max_code,
        );
        scan_tree(
            &mut self.bl_desc.tree,
            &mut self.d_desc.tree,
            self.d_desc.max_code,
        );
        self.builder.build_tree(&mut self.bl_desc);

        // The lengths are sent in bl_order; trailing zero lengths are
        // omitted but at least 4 must be sent.
        let mut max_blindex = BL_CODES - 1;
        while max_blindex >= 3 && self.bl_desc.tree[BL_ORDER[max_blindex] as usize].len() == 0 {
            max_blindex -= 1;
        }
        self.builder.opt_len = self
            .builder
            .opt_len
            .wrapping_add(3 * (max_blindex + 1) + 5 + 5 + 4);
        max_blindex
    }

    /// Emit one tree's code lengths in run-length encoded form.
    fn send_tree(&self, sink: &mut BitSink, tree: &[CodeData], max_code: usize) {
        let bl_tree = &self.bl_desc.tree;
        let mut prevlen: i32 = -1;
        let mut nextlen = tree[0].len();
        let mut count = 0u16;
        let mut max_count = 7u16;
        let mut min_count = 4u16;
        if nextlen == 0 {
            max_count = 138;
            min_count = 3;
        }

        for n in 0..=max_code {
            let curlen = nextlen as i32;
            nextlen = tree[n + 1].len();
            count += 1;
            if count < max_count && curlen == nextlen as i32 {
                continue;
            } else if count < min_count {
                loop {
                    sink.send_code(bl_tree, curlen as usize);
                    count -= 1;
                    if count == 0 {
                        break;
                    }
                }
            } else if curlen != 0 {
                if curlen != prevlen {
                    sink.send_code(bl_tree, curlen as usize);
                    count -= 1;
                }
                sink.send_code(bl_tree, REP_3_6);
                sink.send_bits(count - 3, 2);
            } else if count <= 10 {
                sink.send_code(bl_tree, REPZ_3_10);
                sink.send_bits(count - 3, 3);
            } else {
                sink.send_code(bl_tree, REPZ_11_138);
                sink.send_bits(count - 11, 7);
            }
            count = 0;
            prevlen = curlen;
            if nextlen == 0 {
                max_count = 138;
                min_count = 3;
            } else if curlen == nextlen as i32 {
                max_count = 6;
                min_count = 3;
            } else {
                max_count = 7;
                min_count = 4;
            }
        }
    }

    /// Emit all buffered symbols with the given trees, then END_BLOCK.
    fn compress_block(&self, sink: &mut BitSink, ltree: &[CodeData], dtree: &[CodeData]) {
        let t = static_tables();
        for i in 0..self.sym_count {
            let dist = self.d_buf[i];
            let lc = self.l_buf[i];
            if dist == 0 {
                sink.send_code(ltree, lc as usize);
            } else {
                let code = t.length_code[lc as usize] as usize;
                sink.send_code(ltree, code + LITERALS + 1);
                let extra = EXTRA_LBITS[code];
                if extra != 0 {
                    sink.send_bits(lc as u16 - t.base_length[code], extra);
                }
                let d = dist - 1;
                let code = d_code(d) as usize;
                sink.send_code(dtree, code);
                let extra = EXTRA_DBITS[code];
                if extra != 0 {
                    sink.send_bits(d - t.base_dist[code], extra);
                }
            }
        }
        sink.send_code(ltree, END_BLOCK);
    }

    /// Classify the block's literals as text or binary.
    ///
    /// Control bytes 0-6, 14-25 and 28-31 mark the data binary; 9, 10, 13
    /// and anything from 32 up mark it text; 7, 8, 11, 12, 26 and 27 are
    /// ignored.
    fn detect_data_type(&self) -> DataType {
        let ltree = &self.l_desc.tree;
        let mut black_mask: u32 = 0xf3ff_c07f;
        for n in 0..=31 {
            if (black_mask & 1) != 0 && ltree[n].freq() != 0 {
                return DataType::Binary;
            }
            black_mask >>= 1;
        }
        if ltree[9].freq() != 0 || ltree[10].freq() != 0 || ltree[13].freq() != 0 {
            return DataType::Text;
        }
        for n in 32..LITERALS {
            if ltree[n].freq() != 0 {
                return DataType::Text;
            }
        }
        DataType::Binary
    }
}

/// Tally one tree's code lengths into the bit-length tree frequencies.
///
/// Runs of equal lengths are counted the same way `send_tree` will emit
/// them: up to 7 repeats of a nonzero length (4 minimum to pay off), up to
/// 138 zeros, with the thresholds adjusted mid-run exactly as in emission.
fn scan_tree(bl_tree: &mut [CodeData], tree: &mut [CodeData], max_code: usize) {
    let mut prevlen: i32 = -1;
    let mut nextlen = tree[0].len();
    let mut count = 0u16;
    let mut max_count = 7u16;
    let mut min_count = 4u16;
    if nextlen == 0 {
        max_count = 138;
        min_count = 3;
    }
    // Guard entry so the final run terminates.
    tree[max_code + 1].set_len(0xffff);

    for n in 0..=max_code {
        let curlen = nextlen as i32;
        nextlen = tree[n + 1].len();
        count += 1;
        if count < max_count && curlen == nextlen as i32 {
            continue;
        } else if count < min_count {
            let e = &mut bl_tree[curlen as usize];
            e.set_freq(e.freq() + count);
        } else if curlen != 0 {
            if curlen != prevlen {
                bl_tree[curlen as usize].inc_freq();
            }
            bl_tree[REP_3_6].inc_freq();
        } else if count <= 10 {
            bl_tree[REPZ_3_10].inc_freq();
        } else {
            bl_tree[REPZ_11_138].inc_freq();
        }
        count = 0;
        prevlen = curlen;
        if nextlen == 0 {
            max_count = 138;
            min_count = 3;
        } else if curlen == nextlen as i32 {
            max_count = 6;
            min_count = 3;
        } else {
            max_count = 7;
            min_count = 4;
        }
    }
}
