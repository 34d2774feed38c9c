//! Streaming DEFLATE compression (RFC 1951).
//!
//! [`Deflater`] is the top-level state machine. Each call to
//! [`Compressor::compress`] copies input into the sliding window, runs the
//! per-level strategy loop (store, greedy match, or lazy match), and emits
//! finished blocks through the pending buffer into the caller's output
//! span. The call returns when input drains, the output span fills, or a
//! requested flush completes; no byte of a later call is observable before
//! all bytes of an earlier one.

use crate::bits::BitSink;
use crate::block::BlockEncoder;
use crate::lz77::{MatchConfig, Window, MIN_LOOKAHEAD, NIL};
use crate::tables::{MAX_MATCH, MIN_MATCH};
use oxipress_core::error::{OxiPressError, Result};
use oxipress_core::traits::{CompressStatus, Compressor, FlushMode};

/// Matches this distant at the minimum length cost more than literals.
const TOO_FAR: usize = 4096;

/// Compression strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Lazy matching tuned by the compression level.
    #[default]
    Default,
    /// Accept only matches of length 6 or more; favors data with many
    /// small random variations (e.g. filtered PNG rows).
    Filtered,
    /// Never search for matches; Huffman-code literals only.
    HuffmanOnly,
    /// Restrict matches to distance 1 (run-length encoding).
    Rle,
    /// Force the fixed Huffman trees for every block.
    Fixed,
}

/// Input classification reported after the first block.
///
/// Informational only; the bitstream does not depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataType {
    /// Looks like binary data.
    Binary,
    /// Looks like text.
    Text,
    /// Not yet determined.
    #[default]
    Unknown,
}

/// Validated stream parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeflateConfig {
    /// Compression level 0 (store) to 9 (best).
    pub level: u8,
    /// Window size as a power of two, 9-15.
    pub window_bits: u8,
    /// Memory budget 1-9; sizes the hash table and symbol buffer.
    pub mem_level: u8,
    /// Matching strategy.
    pub strategy: Strategy,
}

impl Default for DeflateConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl DeflateConfig {
    /// Balanced defaults: level 6, 32 KiB window.
    pub const DEFAULT: Self = Self {
        level: 6,
        window_bits: 15,
        mem_level: 8,
        strategy: Strategy::Default,
    };

    /// Fastest compression.
    pub const FAST: Self = Self { level: 1, ..Self::DEFAULT };

    /// Best compression.
    pub const BEST: Self = Self { level: 9, ..Self::DEFAULT };

    /// Stored blocks only.
    pub const STORED: Self = Self { level: 0, ..Self::DEFAULT };

    /// Create a configuration with the given level and defaults otherwise.
    pub fn with_level(level: u8) -> Self {
        Self { level, ..Self::DEFAULT }
    }

    fn validate(&self) -> Result<()> {
        if self.level > 9 {
            return Err(OxiPressError::invalid_config(format!(
                "level {} out of range 0-9",
                self.level
            )));
        }
        if !(9..=15).contains(&self.window_bits) {
            return Err(OxiPressError::invalid_config(format!(
                "window_bits {} out of range 9-15",
                self.window_bits
            )));
        }
        if !(1..=9).contains(&self.mem_level) {
            return Err(OxiPressError::invalid_config(format!(
                "mem_level {} out of range 1-9",
                self.mem_level
            )));
        }
        Ok(())
    }
}

/// Per-level search limits: once a `good` match is found the chain search
/// is halved; matching is deferred one byte (lazy) only while the
/// previous match is shorter than `lazy`; `nice` stops a search outright;
/// `chain` bounds the links walked.
#[derive(Debug, Clone, Copy)]
struct LevelConfig {
    good: u16,
    lazy: u16,
    nice: u16,
    chain: u16,
}

#[rustfmt::skip]
const CONFIGURATION_TABLE: [LevelConfig; 10] = [
    LevelConfig { good: 0,  lazy: 0,   nice: 0,   chain: 0 },    // store only
    LevelConfig { good: 4,  lazy: 4,   nice: 8,   chain: 4 },    // max speed
    LevelConfig { good: 4,  lazy: 5,   nice: 16,  chain: 8 },
    LevelConfig { good: 4,  lazy: 6,   nice: 32,  chain: 32 },
    LevelConfig { good: 4,  lazy: 4,   nice: 16,  chain: 16 },   // lazy from here
    LevelConfig { good: 8,  lazy: 16,  nice: 32,  chain: 32 },
    LevelConfig { good: 8,  lazy: 16,  nice: 128, chain: 128 },
    LevelConfig { good: 8,  lazy: 32,  nice: 128, chain: 256 },
    LevelConfig { good: 32, lazy: 128, nice: 258, chain: 1024 },
    LevelConfig { good: 32, lazy: 258, nice: 258, chain: 4096 }, // max compression
];

/// Outcome of one strategy-loop run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockState {
    /// Block not completed, need more input or more output.
    NeedMore,
    /// Block flush performed.
    BlockDone,
    /// Finish started, need more output to complete.
    FinishStarted,
    /// Finish done, stream complete.
    FinishDone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Busy,
    Finish,
}

/// Flush urgency ordering: a repeated call may only claim progress is
/// possible if it escalates (or finishes).
fn rank(flush: Option<FlushMode>) -> i32 {
    match flush {
        None => -1,
        Some(FlushMode::None) => 0,
        Some(FlushMode::Block) => 1,
        Some(FlushMode::Partial) => 2,
        Some(FlushMode::Sync) => 4,
        Some(FlushMode::Full) => 6,
        Some(FlushMode::Finish) => 8,
    }
}

/// Streaming DEFLATE compressor.
///
/// All working memory is allocated at construction and sized from
/// `window_bits` and `mem_level`; steady-state compression allocates
/// nothing.
#[derive(Debug)]
pub struct Deflater {
    cfg: DeflateConfig,
    window: Window,
    block: BlockEncoder,
    sink: BitSink,

    good_match: usize,
    max_lazy: usize,
    nice_match: usize,
    max_chain: usize,

    match_length: usize,
    prev_length: usize,
    prev_match: usize,
    match_available: bool,

    status: Status,
    /// Flush mode of the previous call; `None` right after a call that
    /// filled the output, so the retry is not mistaken for a stall.
    last_flush: Option<FlushMode>,
    finished: bool,
}

impl Default for Deflater {
    fn default() -> Self {
        Self::new(6).expect("default configuration is valid")
    }
}

impl Deflater {
    /// Create a compressor with the given level and default geometry.
    pub fn new(level: u8) -> Result<Self> {
        Self::with_config(DeflateConfig::with_level(level))
    }

    /// Create a compressor from a full configuration.
    pub fn with_config(cfg: DeflateConfig) -> Result<Self> {
        cfg.validate()?;
        let lc = CONFIGURATION_TABLE[cfg.level as usize];
        let lit_bufsize = 1usize << (cfg.mem_level + 6);
        Ok(Self {
            cfg,
            window: Window::new(cfg.window_bits, cfg.mem_level),
            block: BlockEncoder::new(lit_bufsize, cfg.level, cfg.strategy),
            // The symbol buffer admits lit_bufsize - 1 symbols per block
            // and the emitter never writes a block larger than its stored
            // or fixed-tree form, so four bytes of pending space per
            // symbol slot always suffice.
            sink: BitSink::new(lit_bufsize * 4),
            good_match: lc.good as usize,
            max_lazy: lc.lazy as usize,
            nice_match: lc.nice as usize,
            max_chain: lc.chain as usize,
            match_length: MIN_MATCH - 1,
            prev_length: MIN_MATCH - 1,
            prev_match: 0,
            match_available: false,
            status: Status::Busy,
            last_flush: Some(FlushMode::None),
            finished: false,
        })
    }

    /// The configuration this stream was created with.
    pub fn config(&self) -> &DeflateConfig {
        &self.cfg
    }

    /// Input classification observed so far.
    pub fn data_type(&self) -> DataType {
        self.block.data_type()
    }

    /// Conservative upper bound on the compressed size of `source_len`
    /// input bytes under this configuration.
    pub fn bound(&self, source_len: usize) -> usize {
        if self.cfg.window_bits == 15 && self.cfg.mem_level == 8 {
            source_len + (source_len >> 12) + (source_len >> 14) + (source_len >> 25) + 7
        } else {
            source_len + ((source_len + 7) >> 3) + ((source_len + 63) >> 6) + 5
        }
    }

    /// Preload the sliding window with a dictionary so early matches can
    /// reference it. Returns the dictionary's Adler-32 checksum, by which
    /// decoders identify the dictionary. Only the trailing window-full of
    /// an oversized dictionary is used.
    ///
    /// # Errors
    ///
    /// Fails with an invalid-state error once compression has started.
    pub fn set_dictionary(&mut self, dictionary: &[u8]) -> Result<u32> {
        if self.window.strstart != 0
            || self.window.lookahead != 0
            || self.sink.has_pending()
            || self.block.has_symbols()
            || self.status != Status::Busy
            || self.finished
        {
            return Err(OxiPressError::invalid_state(
                "dictionary must be set before any data is compressed",
            ));
        }
        self.window.load_dictionary(dictionary);
        Ok(adler32(dictionary))
    }

    /// Compress `data` in one call, sizing the output by [`Self::bound`].
    pub fn compress_to_vec(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.bound(data.len()).max(8)];
        let mut in_pos = 0;
        let mut out_pos = 0;
        loop {
            let (consumed, produced, status) =
                self.compress(&data[in_pos..], &mut out[out_pos..], FlushMode::Finish)?;
            in_pos += consumed;
            out_pos += produced;
            if status == CompressStatus::Done {
                break;
            }
        }
        out.truncate(out_pos);
        Ok(out)
    }

    fn match_config(&self) -> MatchConfig {
        MatchConfig {
            good_match: self.good_match,
            nice_match: self.nice_match,
            max_chain: self.max_chain,
        }
    }

    /// Emit the current block and open the next one at `strstart`.
    fn flush_block_only(&mut self, last: bool) {
        let strstart = self.window.strstart;
        let block_start = self.window.block_start;
        if block_start >= 0 {
            let from = block_start as usize;
            self.block.flush_block(
                &mut self.sink,
                Some(self.window.slice(from, strstart)),
                strstart - from,
                last,
            );
        } else {
            // The block slid out of the window; a stored form is no longer
            // possible.
            let stored_len = (strstart as isize - block_start) as usize;
            self.block.flush_block(&mut self.sink, None, stored_len, last);
        }
        self.window.block_start = strstart as isize;
    }

    /// Emit the block and drain it; `Some` short-circuits the strategy
    /// loop when the output span is exhausted.
    fn flush_block_to(
        &mut self,
        output: &mut [u8],
        out_pos: &mut usize,
        last: bool,
    ) -> Option<BlockState> {
        self.flush_block_only(last);
        self.sink.flush_pending(output, out_pos);
        if *out_pos == output.len() {
            return Some(if last {
                BlockState::FinishStarted
            } else {
                BlockState::NeedMore
            });
        }
        None
    }

    /// Level 0: copy input through in stored blocks.
    fn deflate_stored(
        &mut self,
        input: &[u8],
        in_pos: &mut usize,
        output: &mut [u8],
        out_pos: &mut usize,
        flush: FlushMode,
    ) -> BlockState {
        // Block size is limited by the stored-block format and by what the
        // pending buffer can hold behind a slow reader.
        let max_block_size = 0xffff_usize.min(self.sink.capacity() - 5);

        loop {
            if self.window.lookahead <= 1 {
                self.window.fill(input, in_pos);
                if self.window.lookahead == 0 && flush == FlushMode::None {
                    return BlockState::NeedMore;
                }
                if self.window.lookahead == 0 {
                    break;
                }
            }
            self.window.strstart += self.window.lookahead;
            self.window.lookahead = 0;

            let max_start = self.window.block_start as usize + max_block_size;
            if self.window.strstart >= max_start {
                self.window.lookahead = self.window.strstart - max_start;
                self.window.strstart = max_start;
                if let Some(state) = self.flush_block_to(output, out_pos, false) {
                    return state;
                }
            }
            if self.window.strstart - self.window.block_start as usize >= self.window.max_dist() {
                if let Some(state) = self.flush_block_to(output, out_pos, false) {
                    return state;
                }
            }
        }
        self.window.insert = 0;

        if flush == FlushMode::Finish {
            if let Some(state) = self.flush_block_to(output, out_pos, true) {
                return state;
            }
            return BlockState::FinishDone;
        }
        if self.window.strstart as isize > self.window.block_start {
            if let Some(state) = self.flush_block_to(output, out_pos, false) {
                return state;
            }
        }
        BlockState::BlockDone
    }

    /// Levels 1-3: greedy matching, no lazy evaluation.
    fn deflate_fast(
        &mut self,
        input: &[u8],
        in_pos: &mut usize,
        output: &mut [u8],
        out_pos: &mut usize,
        flush: FlushMode,
    ) -> BlockState {
        loop {
            if self.window.lookahead < MIN_LOOKAHEAD {
                self.window.fill(input, in_pos);
                if self.window.lookahead < MIN_LOOKAHEAD && flush == FlushMode::None {
                    return BlockState::NeedMore;
                }
                if self.window.lookahead == 0 {
                    break;
                }
            }

            let mut hash_head = NIL;
            if self.window.lookahead >= MIN_MATCH {
                hash_head = self.window.insert_string(self.window.strstart);
            }

            self.match_length = 0;
            if hash_head != NIL && self.window.strstart - hash_head <= self.window.max_dist() {
                let cfg = self.match_config();
                self.match_length = self.window.longest_match(hash_head, self.prev_length, &cfg);
            }

            let bflush;
            if self.match_length >= MIN_MATCH {
                let dist = self.window.strstart - self.window.match_start;
                bflush = self
                    .block
                    .tally_dist(dist as u16, (self.match_length - MIN_MATCH) as u8);
                self.window.lookahead -= self.match_length;

                // Insert new strings in the hash table only if the match
                // is not too long; saving time is worth losing candidates.
                if self.match_length <= self.max_lazy && self.window.lookahead >= MIN_MATCH {
                    self.match_length -= 1;
                    loop {
                        self.window.strstart += 1;
                        self.window.insert_string(self.window.strstart);
                        self.match_length -= 1;
                        if self.match_length == 0 {
                            break;
                        }
                    }
                    self.window.strstart += 1;
                } else {
                    self.window.strstart += self.match_length;
                    self.match_length = 0;
                    self.window.prime_hash();
                }
            } else {
                bflush = self.block.tally_lit(self.window.byte(self.window.strstart));
                self.window.lookahead -= 1;
                self.window.strstart += 1;
            }
            if bflush {
                if let Some(state) = self.flush_block_to(output, out_pos, false) {
                    return state;
                }
            }
        }

        self.window.insert = self.window.strstart.min(MIN_MATCH - 1);
        if flush == FlushMode::Finish {
            if let Some(state) = self.flush_block_to(output, out_pos, true) {
                return state;
            }
            return BlockState::FinishDone;
        }
        if self.block.has_symbols() {
            if let Some(state) = self.flush_block_to(output, out_pos, false) {
                return state;
            }
        }
        BlockState::BlockDone
    }

    /// Levels 4-9: lazy matching. A found match is held back one byte; if
    /// the next position yields a strictly longer match, the held byte is
    /// emitted as a literal and the longer match wins.
    fn deflate_slow(
        &mut self,
        input: &[u8],
        in_pos: &mut usize,
        output: &mut [u8],
        out_pos: &mut usize,
        flush: FlushMode,
    ) -> BlockState {
        loop {
            if self.window.lookahead < MIN_LOOKAHEAD {
                self.window.fill(input, in_pos);
                if self.window.lookahead < MIN_LOOKAHEAD && flush == FlushMode::None {
                    return BlockState::NeedMore;
                }
                if self.window.lookahead == 0 {
                    break;
                }
            }

            let mut hash_head = NIL;
            if self.window.lookahead >= MIN_MATCH {
                hash_head = self.window.insert_string(self.window.strstart);
            }

            self.prev_length = self.match_length;
            self.prev_match = self.window.match_start;
            self.match_length = MIN_MATCH - 1;

            if hash_head != NIL
                && self.prev_length < self.max_lazy
                && self.window.strstart - hash_head <= self.window.max_dist()
            {
                let cfg = self.match_config();
                self.match_length = self.window.longest_match(hash_head, self.prev_length, &cfg);

                if self.match_length <= 5
                    && (self.cfg.strategy == Strategy::Filtered
                        || (self.match_length == MIN_MATCH
                            && self.window.strstart - self.window.match_start > TOO_FAR))
                {
                    // Drop a marginal match: too short for the filtered
                    // strategy, or minimum-length at a distance where the
                    // code is longer than the literals.
                    self.match_length = MIN_MATCH - 1;
                }
            }

            if self.prev_length >= MIN_MATCH && self.match_length <= self.prev_length {
                let max_insert = self.window.strstart + self.window.lookahead - MIN_MATCH;
                let dist = self.window.strstart - 1 - self.prev_match;
                let bflush = self
                    .block
                    .tally_dist(dist as u16, (self.prev_length - MIN_MATCH) as u8);

                // The match is strstart-1 long; insert the covered
                // positions and step past it.
                self.window.lookahead -= self.prev_length - 1;
                self.prev_length -= 2;
                loop {
                    self.window.strstart += 1;
                    if self.window.strstart <= max_insert {
                        self.window.insert_string(self.window.strstart);
                    }
                    self.prev_length -= 1;
                    if self.prev_length == 0 {
                        break;
                    }
                }
                self.match_available = false;
                self.match_length = MIN_MATCH - 1;
                self.window.strstart += 1;

                if bflush {
                    if let Some(state) = self.flush_block_to(output, out_pos, false) {
                        return state;
                    }
                }
            } else if self.match_available {
                // The previous byte loses to no match at all; emit it as a
                // literal and reconsider at the next position.
                let bflush = self
                    .block
                    .tally_lit(self.window.byte(self.window.strstart - 1));
                if bflush {
                    self.flush_block_only(false);
                    self.sink.flush_pending(output, out_pos);
                }
                self.window.strstart += 1;
                self.window.lookahead -= 1;
                if *out_pos == output.len() {
                    return BlockState::NeedMore;
                }
            } else {
                self.match_available = true;
                self.window.strstart += 1;
                self.window.lookahead -= 1;
            }
        }

        debug_assert!(flush != FlushMode::None, "no flush at end of input");
        if self.match_available {
            let b = self.window.byte(self.window.strstart - 1);
            self.block.tally_lit(b);
            self.match_available = false;
        }
        self.window.insert = self.window.strstart.min(MIN_MATCH - 1);

        if flush == FlushMode::Finish {
            if let Some(state) = self.flush_block_to(output, out_pos, true) {
                return state;
            }
            return BlockState::FinishDone;
        }
        if self.block.has_symbols() {
            if let Some(state) = self.flush_block_to(output, out_pos, false) {
                return state;
            }
        }
        BlockState::BlockDone
    }

    /// RLE strategy: matches only against the immediately preceding byte.
    fn deflate_rle(
        &mut self,
        input: &[u8],
        in_pos: &mut usize,
        output: &mut [u8],
        out_pos: &mut usize,
        flush: FlushMode,
    ) -> BlockState {
        loop {
            // Keep a full match length of lookahead so runs are never cut
            // short artificially.
            if self.window.lookahead <= MAX_MATCH {
                self.window.fill(input, in_pos);
                if self.window.lookahead <= MAX_MATCH && flush == FlushMode::None {
                    return BlockState::NeedMore;
                }
                if self.window.lookahead == 0 {
                    break;
                }
            }

            self.match_length = 0;
            if self.window.lookahead >= MIN_MATCH && self.window.strstart > 0 {
                let s = self.window.strstart;
                let prev = self.window.byte(s - 1);
                if prev == self.window.byte(s)
                    && prev == self.window.byte(s + 1)
                    && prev == self.window.byte(s + 2)
                {
                    let mut len = MIN_MATCH;
                    while len < MAX_MATCH && self.window.byte(s + len) == prev {
                        len += 1;
                    }
                    self.match_length = len.min(self.window.lookahead);
                }
            }

            let bflush;
            if self.match_length >= MIN_MATCH {
                bflush = self
                    .block
                    .tally_dist(1, (self.match_length - MIN_MATCH) as u8);
                self.window.lookahead -= self.match_length;
                self.window.strstart += self.match_length;
                self.match_length = 0;
            } else {
                bflush = self.block.tally_lit(self.window.byte(self.window.strstart));
                self.window.lookahead -= 1;
                self.window.strstart += 1;
            }
            if bflush {
                if let Some(state) = self.flush_block_to(output, out_pos, false) {
                    return state;
                }
            }
        }

        self.window.insert = 0;
        if flush == FlushMode::Finish {
            if let Some(state) = self.flush_block_to(output, out_pos, true) {
                return state;
            }
            return BlockState::FinishDone;
        }
        if self.block.has_symbols() {
            if let Some(state) = self.flush_block_to(output, out_pos, false) {
                return state;
            }
        }
        BlockState::BlockDone
    }

    /// Huffman-only strategy: every byte is a literal.
    fn deflate_huff(
        &mut self,
        input: &[u8],
        in_pos: &mut usize,
        output: &mut [u8],
        out_pos: &mut usize,
        flush: FlushMode,
    ) -> BlockState {
        loop {
            if self.window.lookahead == 0 {
                self.window.fill(input, in_pos);
                if self.window.lookahead == 0 {
                    if flush == FlushMode::None {
                        return BlockState::NeedMore;
                    }
                    break;
                }
            }

            self.match_length = 0;
            let bflush = self.block.tally_lit(self.window.byte(self.window.strstart));
            self.window.lookahead -= 1;
            self.window.strstart += 1;
            if bflush {
                if let Some(state) = self.flush_block_to(output, out_pos, false) {
                    return state;
                }
            }
        }

        self.window.insert = 0;
        if flush == FlushMode::Finish {
            if let Some(state) = self.flush_block_to(output, out_pos, true) {
                return state;
            }
            return BlockState::FinishDone;
        }
        if self.block.has_symbols() {
            if let Some(state) = self.flush_block_to(output, out_pos, false) {
                return state;
            }
        }
        BlockState::BlockDone
    }

    fn run_strategy(
        &mut self,
        input: &[u8],
        in_pos: &mut usize,
        output: &mut [u8],
        out_pos: &mut usize,
        flush: FlushMode,
    ) -> BlockState {
        if self.cfg.level == 0 {
            self.deflate_stored(input, in_pos, output, out_pos, flush)
        } else {
            match self.cfg.strategy {
                Strategy::HuffmanOnly => self.deflate_huff(input, in_pos, output, out_pos, flush),
                Strategy::Rle => self.deflate_rle(input, in_pos, output, out_pos, flush),
                _ if self.cfg.level <= 3 => {
                    self.deflate_fast(input, in_pos, output, out_pos, flush)
                }
                _ => self.deflate_slow(input, in_pos, output, out_pos, flush),
            }
        }
    }
}

impl Compressor for Deflater {
    fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, CompressStatus)> {
        if self.status == Status::Finish && flush != FlushMode::Finish {
            return Err(OxiPressError::invalid_state(
                "stream is finishing; only a Finish flush may follow",
            ));
        }
        if output.is_empty() {
            return Err(OxiPressError::NoProgress);
        }

        let old_flush = self.last_flush;
        self.last_flush = Some(flush);

        let mut in_pos = 0usize;
        let mut out_pos = 0usize;

        if self.sink.has_pending() {
            self.sink.flush_pending(output, &mut out_pos);
            if out_pos == output.len() {
                // Output filled before new work could start; clear the
                // stall detector so the caller's retry is accepted.
                self.last_flush = None;
                return Ok((0, out_pos, CompressStatus::NeedsOutput));
            }
        } else if input.is_empty()
            && rank(Some(flush)) <= rank(old_flush)
            && !matches!(
                flush,
                FlushMode::Partial | FlushMode::Sync | FlushMode::Full | FlushMode::Finish
            )
        {
            // Nothing buffered, nothing to read, and no stronger flush
            // requested than last time: the call cannot make progress.
            return Err(OxiPressError::NoProgress);
        }

        if self.status == Status::Finish && !input.is_empty() {
            // New input after finish is a caller error, but any bytes just
            // drained must still be reported.
            if out_pos > 0 {
                return Ok((0, out_pos, CompressStatus::NeedsOutput));
            }
            return Err(OxiPressError::NoProgress);
        }

        if !input.is_empty()
            || self.window.lookahead != 0
            || (flush != FlushMode::None && self.status != Status::Finish)
        {
            let state = self.run_strategy(input, &mut in_pos, output, &mut out_pos, flush);

            if matches!(state, BlockState::FinishStarted | BlockState::FinishDone) {
                self.status = Status::Finish;
            }
            match state {
                BlockState::NeedMore | BlockState::FinishStarted => {
                    if out_pos == output.len() {
                        self.last_flush = None;
                    }
                    let status = if state == BlockState::FinishStarted || out_pos == output.len() {
                        CompressStatus::NeedsOutput
                    } else {
                        CompressStatus::NeedsInput
                    };
                    return Ok((in_pos, out_pos, status));
                }
                BlockState::BlockDone => {
                    match flush {
                        FlushMode::Partial => self.block.align(&mut self.sink),
                        FlushMode::Sync | FlushMode::Full => {
                            self.block.stored_block(&mut self.sink, &[], false);
                            if flush == FlushMode::Full {
                                self.window.clear_hash();
                                if self.window.lookahead == 0 {
                                    self.window.strstart = 0;
                                    self.window.block_start = 0;
                                    self.window.insert = 0;
                                }
                            }
                        }
                        _ => {}
                    }
                    self.sink.flush_pending(output, &mut out_pos);
                    if out_pos == output.len() {
                        self.last_flush = None;
                        return Ok((in_pos, out_pos, CompressStatus::NeedsOutput));
                    }
                }
                BlockState::FinishDone => {}
            }
        }

        if flush != FlushMode::Finish {
            let status = if flush == FlushMode::Block {
                CompressStatus::BlockEnd
            } else {
                CompressStatus::NeedsInput
            };
            return Ok((in_pos, out_pos, status));
        }

        self.finished = true;
        Ok((in_pos, out_pos, CompressStatus::Done))
    }

    fn reset(&mut self) {
        self.window.reset();
        self.block.reset();
        self.sink.reset();
        self.match_length = MIN_MATCH - 1;
        self.prev_length = MIN_MATCH - 1;
        self.prev_match = 0;
        self.match_available = false;
        self.status = Status::Busy;
        self.last_flush = Some(FlushMode::None);
        self.finished = false;
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Compress `data` at the given level into a fresh buffer.
pub fn deflate(data: &[u8], level: u8) -> Result<Vec<u8>> {
    let mut deflater = Deflater::new(level)?;
    deflater.compress_to_vec(data)
}

/// Adler-32 checksum, used to identify preset dictionaries.
fn adler32(data: &[u8]) -> u32 {
    const MOD_ADLER: u32 = 65521;
    const NMAX: usize = 5552;

    let mut a: u32 = 1;
    let mut b: u32 = 0;
    let mut remaining = data;

    while remaining.len() >= NMAX {
        let (chunk, rest) = remaining.split_at(NMAX);
        remaining = rest;
        for &byte in chunk {
            a += byte as u32;
            b += a;
        }
        a %= MOD_ADLER;
        b %= MOD_ADLER;
    }
    for &byte in remaining {
        a += byte as u32;
        b += a;
    }
    ((b % MOD_ADLER) << 16) | (a % MOD_ADLER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(Deflater::new(10).is_err());
        assert!(Deflater::with_config(DeflateConfig {
            window_bits: 8,
            ..DeflateConfig::DEFAULT
        })
        .is_err());
        assert!(Deflater::with_config(DeflateConfig {
            window_bits: 16,
            ..DeflateConfig::DEFAULT
        })
        .is_err());
        assert!(Deflater::with_config(DeflateConfig {
            mem_level: 0,
            ..DeflateConfig::DEFAULT
        })
        .is_err());
        assert!(Deflater::with_config(DeflateConfig {
            mem_level: 10,
            ..DeflateConfig::DEFAULT
        })
        .is_err());
        for level in 0..=9 {
            assert!(Deflater::new(level).is_ok(), "level {} must be valid", level);
        }
    }

    #[test]
    fn test_empty_input_is_single_static_block() {
        let out = deflate(b"", 6).unwrap();
        assert_eq!(out, vec![0x03, 0x00]);
    }

    #[test]
    fn test_empty_input_level_zero() {
        let out = deflate(b"", 0).unwrap();
        // An empty stored final block: header byte, LEN=0, NLEN=0xFFFF.
        assert_eq!(out, vec![0x01, 0x00, 0x00, 0xFF, 0xFF]);
    }

    #[test]
    fn test_single_literal_static_block() {
        let out = deflate(b"A", 6).unwrap();
        // 3-bit header + 8-bit literal + 7-bit END_BLOCK = 18 bits.
        assert_eq!(out.len(), 3);
        assert_eq!(out[0] & 0x07, 0x03); // BFINAL=1, BTYPE=01
    }

    #[test]
    fn test_highly_compressible_shrinks() {
        let input: Vec<u8> = std::iter::repeat(b"aaaaaaaaaa")
            .take(100)
            .flatten()
            .copied()
            .collect();
        assert_eq!(input.len(), 1000);
        let out = deflate(&input, 6).unwrap();
        assert!(out.len() < 50, "1000 repeated bytes gave {} bytes", out.len());
    }

    #[test]
    fn test_stored_expansion_is_bounded() {
        let mut deflater = Deflater::new(0).unwrap();
        let input = vec![0xA5u8; 100_000];
        let out = deflater.compress_to_vec(&input).unwrap();
        assert!(out.len() <= deflater.bound(input.len()));
        assert!(out.len() > input.len());
    }

    #[test]
    fn test_no_progress_on_empty_output() {
        let mut deflater = Deflater::new(6).unwrap();
        let mut out: [u8; 0] = [];
        let err = deflater.compress(b"abc", &mut out, FlushMode::None);
        assert!(matches!(err, Err(OxiPressError::NoProgress)));
    }

    #[test]
    fn test_no_progress_on_repeated_idle_call() {
        let mut deflater = Deflater::new(6).unwrap();
        let mut out = [0u8; 64];
        let err = deflater.compress(&[], &mut out, FlushMode::None);
        assert!(matches!(err, Err(OxiPressError::NoProgress)));
    }

    #[test]
    fn test_finish_required_after_finish_started() {
        let mut deflater = Deflater::new(6).unwrap();
        // Finish with a one-byte output span: the stream enters its
        // finishing state but cannot complete.
        let input = vec![b'q'; 100_000];
        let mut tiny = [0u8; 1];
        let (_, _, status) = deflater
            .compress(&input, &mut tiny, FlushMode::Finish)
            .unwrap();
        assert_eq!(status, CompressStatus::NeedsOutput);
        let mut out = [0u8; 64];
        let err = deflater.compress(&[], &mut out, FlushMode::Sync);
        assert!(matches!(err, Err(OxiPressError::InvalidState { .. })));
    }

    #[test]
    fn test_finish_completes_and_reports_done() {
        let mut deflater = Deflater::new(6).unwrap();
        let mut out = vec![0u8; 256];
        let (consumed, produced, status) = deflater
            .compress(b"hello world", &mut out, FlushMode::Finish)
            .unwrap();
        assert_eq!(consumed, 11);
        assert!(produced > 0);
        assert_eq!(status, CompressStatus::Done);
        assert!(deflater.is_finished());
    }

    #[test]
    fn test_reset_reuses_stream() {
        let mut deflater = Deflater::new(6).unwrap();
        let first = deflater.compress_to_vec(b"the same input").unwrap();
        deflater.reset();
        assert!(!deflater.is_finished());
        let second = deflater.compress_to_vec(b"the same input").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_sync_flush_emits_marker() {
        let mut deflater = Deflater::new(6).unwrap();
        let mut out = vec![0u8; 256];
        let (consumed, produced, status) = deflater
            .compress(b"hello ", &mut out, FlushMode::Sync)
            .unwrap();
        assert_eq!(consumed, 6);
        assert_eq!(status, CompressStatus::NeedsInput);
        assert!(produced >= 4);
        assert_eq!(&out[produced - 4..produced], &[0x00, 0x00, 0xFF, 0xFF]);
    }

    #[test]
    fn test_consecutive_sync_flushes_are_idempotent() {
        let mut deflater = Deflater::new(6).unwrap();
        let mut out = vec![0u8; 256];
        let (_, p1, _) = deflater.compress(b"x", &mut out, FlushMode::Sync).unwrap();
        assert_eq!(&out[p1 - 4..p1], &[0x00, 0x00, 0xFF, 0xFF]);
        let (_, p2, _) = deflater.compress(&[], &mut out, FlushMode::Sync).unwrap();
        assert_eq!(p2, 4, "a second sync emits exactly one more marker");
        assert_eq!(&out[..4], &[0x00, 0x00, 0xFF, 0xFF]);
    }

    #[test]
    fn test_block_flush_reports_block_end() {
        let mut deflater = Deflater::new(6).unwrap();
        let mut out = vec![0u8; 256];
        let (_, _, status) = deflater
            .compress(b"some data", &mut out, FlushMode::Block)
            .unwrap();
        assert_eq!(status, CompressStatus::BlockEnd);
    }

    #[test]
    fn test_data_type_reporting() {
        let mut deflater = Deflater::new(6).unwrap();
        assert_eq!(deflater.data_type(), DataType::Unknown);
        let _ = deflater.compress_to_vec(b"ordinary prose, nothing fancy").unwrap();
        assert_eq!(deflater.data_type(), DataType::Text);

        let mut deflater = Deflater::new(6).unwrap();
        let _ = deflater.compress_to_vec(&[0u8, 1, 2, 3, 4, 5, 6, 7]).unwrap();
        assert_eq!(deflater.data_type(), DataType::Binary);
    }

    #[test]
    fn test_set_dictionary_rejected_after_start() {
        let mut deflater = Deflater::new(6).unwrap();
        let mut out = vec![0u8; 256];
        deflater.compress(b"data", &mut out, FlushMode::None).unwrap();
        assert!(deflater.set_dictionary(b"dict").is_err());
    }

    #[test]
    fn test_set_dictionary_checksum() {
        let mut deflater = Deflater::new(6).unwrap();
        // Adler-32 of "hello" is well known.
        let adler = deflater.set_dictionary(b"hello").unwrap();
        assert_eq!(adler, 0x062C_0215);
    }

    #[test]
    fn test_adler32_values() {
        assert_eq!(adler32(b""), 1);
        assert_eq!(adler32(b"Wikipedia"), 0x11E6_0398);
        // Chunked reduction must agree on long inputs.
        let long = vec![0xFFu8; 20_000];
        let mut a: u64 = 1;
        let mut b: u64 = 0;
        for &byte in &long {
            a = (a + byte as u64) % 65521;
            b = (b + a) % 65521;
        }
        assert_eq!(adler32(&long), ((b as u32) << 16) | a as u32);
    }

    #[test]
    fn test_bound_is_monotone() {
        let deflater = Deflater::new(6).unwrap();
        let mut prev = 0;
        for len in [0usize, 1, 100, 10_000, 1 << 20] {
            let b = deflater.bound(len);
            assert!(b >= len + 5);
            assert!(b >= prev);
            prev = b;
        }
    }
}
