//! Sliding window, hash index and match search for the DEFLATE encoder.
//!
//! The window holds 2·W bytes of input. `strstart` is the next position to
//! hash and match, `block_start` the beginning of the current block. A
//! chained hash over 3-byte prefixes (`head` per hash, `prev` per window
//! position) supplies match candidates; when the write cursor approaches
//! the end of the window, the upper half slides down by W and every cursor
//! and hash entry is rebased.
//!
//! Position 0 doubles as the NIL chain sentinel, so an occurrence at
//! position 0 cannot be reached through the chains. This loses at most one
//! candidate per hash and keeps the tables in plain `u16`.

use crate::tables::{MAX_MATCH, MIN_MATCH};

/// Chain terminator / empty hash slot.
pub const NIL: usize = 0;

/// Minimum bytes kept beyond `strstart` so a maximal match plus the next
/// hashable prefix always fit in the window.
pub const MIN_LOOKAHEAD: usize = MAX_MATCH + MIN_MATCH + 1;

/// Search limits for one compression level.
#[derive(Debug, Clone, Copy)]
pub struct MatchConfig {
    /// Reduce chain search effort once a match this long is found.
    pub good_match: usize,
    /// Stop the search outright at a match this long.
    pub nice_match: usize,
    /// Upper bound on chain links examined per search.
    pub max_chain: usize,
}

/// Sliding window with chained-hash match search.
#[derive(Debug)]
pub struct Window {
    win: Vec<u8>,
    w_size: usize,
    w_mask: usize,
    head: Vec<u16>,
    prev: Vec<u16>,
    hash_mask: usize,
    hash_shift: u32,
    /// Rolling hash of the MIN_MATCH bytes ending before `strstart`.
    ins_h: usize,
    /// Next byte to hash and match.
    pub strstart: usize,
    /// Window offset of the current block start; negative once the block
    /// has been slid out of the window.
    pub block_start: isize,
    /// Valid bytes beyond `strstart`.
    pub lookahead: usize,
    /// Positions behind `strstart` not yet inserted in the hash, pending
    /// enough lookahead to form their 3-byte prefix.
    pub insert: usize,
    /// Start of the best match found by the last search.
    pub match_start: usize,
}

impl Window {
    /// Create a window of 2^`window_bits` bytes with a hash table sized
    /// from `mem_level`.
    pub fn new(window_bits: u8, mem_level: u8) -> Self {
        let w_size = 1usize << window_bits;
        let hash_bits = mem_level as u32 + 7;
        let hash_size = 1usize << hash_bits;
        Self {
            win: vec![0; 2 * w_size],
            w_size,
            w_mask: w_size - 1,
            head: vec![0; hash_size],
            prev: vec![0; w_size],
            hash_mask: hash_size - 1,
            hash_shift: hash_bits.div_ceil(MIN_MATCH as u32),
            ins_h: 0,
            strstart: 0,
            block_start: 0,
            lookahead: 0,
            insert: 0,
            match_start: 0,
        }
    }

    /// Window half size W.
    #[inline]
    pub fn w_size(&self) -> usize {
        self.w_size
    }

    /// Farthest admissible match distance.
    #[inline]
    pub fn max_dist(&self) -> usize {
        self.w_size - MIN_LOOKAHEAD
    }

    /// Byte at a window position.
    #[inline]
    pub fn byte(&self, pos: usize) -> u8 {
        self.win[pos]
    }

    /// Slice of the window, for stored blocks.
    #[inline]
    pub fn slice(&self, from: usize, to: usize) -> &[u8] {
        &self.win[from..to]
    }

    /// Reset to the idle state without freeing buffers.
    pub fn reset(&mut self) {
        self.clear_hash();
        self.ins_h = 0;
        self.strstart = 0;
        self.block_start = 0;
        self.lookahead = 0;
        self.insert = 0;
        self.match_start = 0;
    }

    /// Forget all hash chains, so no match can reach back past this point.
    pub fn clear_hash(&mut self) {
        self.head.fill(NIL as u16);
    }

    #[inline]
    fn update_hash(&mut self, c: u8) {
        self.ins_h = ((self.ins_h << self.hash_shift) ^ c as usize) & self.hash_mask;
    }

    /// Insert the string at `pos` into the hash chains and return the
    /// previous chain head for its hash.
    #[inline]
    pub fn insert_string(&mut self, pos: usize) -> usize {
        self.update_hash(self.win[pos + MIN_MATCH - 1]);
        let h = self.ins_h;
        let head = self.head[h] as usize;
        self.prev[pos & self.w_mask] = self.head[h];
        self.head[h] = pos as u16;
        head
    }

    /// Re-seed the rolling hash at `strstart` after skipping positions.
    #[inline]
    pub fn prime_hash(&mut self) {
        self.ins_h = self.win[self.strstart] as usize;
        self.update_hash(self.win[self.strstart + 1]);
    }

    /// Copy caller input into the window until the lookahead is
    /// comfortable or the input runs dry, sliding first when needed.
    pub fn fill(&mut self, input: &[u8], in_pos: &mut usize) {
        loop {
            let mut more = self.win.len() - self.lookahead - self.strstart;

            if self.strstart >= self.w_size + self.max_dist() {
                self.win.copy_within(self.w_size..2 * self.w_size, 0);
                if self.match_start >= self.w_size {
                    self.match_start -= self.w_size;
                } else {
                    self.match_start = 0;
                }
                self.strstart -= self.w_size;
                self.block_start -= self.w_size as isize;
                if self.insert > self.strstart {
                    self.insert = self.strstart;
                }
                self.slide_hash();
                more += self.w_size;
            }

            if *in_pos >= input.len() {
                break;
            }

            let n = (input.len() - *in_pos).min(more);
            let dst = self.strstart + self.lookahead;
            self.win[dst..dst + n].copy_from_slice(&input[*in_pos..*in_pos + n]);
            *in_pos += n;
            self.lookahead += n;

            // Hash positions that were waiting for enough lookahead.
            if self.lookahead + self.insert >= MIN_MATCH {
                let mut pos = self.strstart - self.insert;
                self.ins_h = self.win[pos] as usize;
                self.update_hash(self.win[pos + 1]);
                while self.insert > 0 {
                    self.update_hash(self.win[pos + MIN_MATCH - 1]);
                    self.prev[pos & self.w_mask] = self.head[self.ins_h];
                    self.head[self.ins_h] = pos as u16;
                    pos += 1;
                    self.insert -= 1;
                    if self.lookahead + self.insert < MIN_MATCH {
                        break;
                    }
                }
            }

            if self.lookahead >= MIN_LOOKAHEAD {
                break;
            }
        }
    }

    /// Preload the window with dictionary bytes and hash them, so the
    /// first real input can match against the dictionary. Only callable on
    /// an idle window.
    pub fn load_dictionary(&mut self, dict: &[u8]) {
        debug_assert_eq!(self.strstart, 0);
        debug_assert_eq!(self.lookahead, 0);

        let max = self.w_size - MIN_LOOKAHEAD;
        let dict = if dict.len() > max {
            &dict[dict.len() - max..]
        } else {
            dict
        };
        self.win[..dict.len()].copy_from_slice(dict);
        self.strstart = dict.len();
        self.block_start = dict.len() as isize;

        if dict.len() >= MIN_MATCH {
            self.ins_h = self.win[0] as usize;
            self.update_hash(self.win[1]);
            for pos in 0..=dict.len() - MIN_MATCH {
                self.update_hash(self.win[pos + MIN_MATCH - 1]);
                self.prev[pos & self.w_mask] = self.head[self.ins_h];
                self.head[self.ins_h] = pos as u16;
            }
        }
        // The trailing positions lack a full prefix; they are hashed by
        // the catch-up in `fill` once input arrives.
        self.insert = self.strstart.min(MIN_MATCH - 1);
    }

    /// Rebase hash entries after a slide; entries pointing below the slid
    /// region become NIL.
    fn slide_hash(&mut self) {
        let w = self.w_size as u16;
        for h in self.head.iter_mut() {
            *h = if *h >= w { *h - w } else { NIL as u16 };
        }
        for p in self.prev.iter_mut() {
            *p = if *p >= w { *p - w } else { NIL as u16 };
        }
    }

    /// Find the longest match for the string at `strstart`, walking the
    /// chain from `cur_match`.
    ///
    /// Only matches strictly longer than `prev_length` are reported;
    /// `match_start` is updated for the best one. Ties go to the most
    /// recent candidate because chains are searched newest-first. The last
    /// bytes of a candidate are compared first: most chain steps fail, and
    /// they fail fastest at the point the current best match ends.
    pub fn longest_match(
        &mut self,
        mut cur_match: usize,
        prev_length: usize,
        cfg: &MatchConfig,
    ) -> usize {
        let mut chain_length = cfg.max_chain;
        let scan = self.strstart;
        let mut best_len = prev_length;
        if prev_length >= cfg.good_match {
            chain_length >>= 1;
        }
        let nice_match = cfg.nice_match.min(self.lookahead);
        let limit = if self.strstart > self.max_dist() {
            self.strstart - self.max_dist()
        } else {
            NIL
        };

        debug_assert!(
            self.strstart <= 2 * self.w_size - MIN_LOOKAHEAD,
            "need lookahead"
        );
        debug_assert!(cur_match < self.strstart, "no future");

        let win = &self.win;
        let mut best_start = self.match_start;
        let mut scan_end1 = win[scan + best_len - 1];
        let mut scan_end = win[scan + best_len];

        loop {
            if win[cur_match + best_len] == scan_end
                && win[cur_match + best_len - 1] == scan_end1
                && win[cur_match] == win[scan]
                && win[cur_match + 1] == win[scan + 1]
            {
                let mut len = 2;
                while len < MAX_MATCH && win[scan + len] == win[cur_match + len] {
                    len += 1;
                }
                if len > best_len {
                    best_start = cur_match;
                    best_len = len;
                    if len >= nice_match {
                        break;
                    }
                    scan_end1 = win[scan + best_len - 1];
                    scan_end = win[scan + best_len];
                }
            }
            cur_match = self.prev[cur_match & self.w_mask] as usize;
            chain_length -= 1;
            if cur_match <= limit || chain_length == 0 {
                break;
            }
        }

        self.match_start = best_start;
        if best_len <= self.lookahead {
            best_len
        } else {
            self.lookahead
        }
    }
}
