//! Minimal DEFLATE decoder used as a round-trip oracle by the encoder
//! tests. Independent of the encoder's own tables on purpose: it decodes
//! bit by bit from first principles so a shared mistake cannot cancel out.

#![allow(dead_code)]

const MAX_BITS: usize = 15;

const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258,
];
const LENGTH_EXTRA: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];
const DIST_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];
const DIST_EXTRA: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];
const CODE_LENGTH_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    bit: u32,
    nbits: u32,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            bit: 0,
            nbits: 0,
        }
    }

    fn bits(&mut self, need: u32) -> Result<u32, String> {
        while self.nbits < need {
            let byte = *self
                .data
                .get(self.pos)
                .ok_or_else(|| "unexpected end of stream".to_string())?;
            self.bit |= (byte as u32) << self.nbits;
            self.nbits += 8;
            self.pos += 1;
        }
        let val = self.bit & ((1u32 << need) - 1);
        self.bit >>= need;
        self.nbits -= need;
        Ok(val)
    }

    fn align(&mut self) {
        self.bit = 0;
        self.nbits = 0;
    }

    /// Bytes fully consumed (after align).
    fn byte_pos(&self) -> usize {
        self.pos
    }
}

struct Huffman {
    count: [u16; MAX_BITS + 1],
    symbol: Vec<u16>,
}

impl Huffman {
    fn new(lengths: &[u8]) -> Result<Self, String> {
        let mut count = [0u16; MAX_BITS + 1];
        for &len in lengths {
            if len as usize > MAX_BITS {
                return Err(format!("code length {} too long", len));
            }
            count[len as usize] += 1;
        }

        // Over-subscription check.
        let mut left = 1i32;
        for c in count.iter().skip(1) {
            left <<= 1;
            left -= *c as i32;
            if left < 0 {
                return Err("over-subscribed code".to_string());
            }
        }

        let mut offs = [0u16; MAX_BITS + 1];
        for len in 1..MAX_BITS {
            offs[len + 1] = offs[len] + count[len];
        }
        let used: u16 = count.iter().skip(1).sum();
        let mut symbol = vec![0u16; used as usize];
        for (sym, &len) in lengths.iter().enumerate() {
            if len != 0 {
                symbol[offs[len as usize] as usize] = sym as u16;
                offs[len as usize] += 1;
            }
        }
        Ok(Self { count, symbol })
    }

    fn decode(&self, br: &mut BitReader) -> Result<u16, String> {
        let mut code = 0i32;
        let mut first = 0i32;
        let mut index = 0i32;
        for len in 1..=MAX_BITS {
            code |= br.bits(1)? as i32;
            let count = self.count[len] as i32;
            if code - count < first {
                return Ok(self.symbol[(index + (code - first)) as usize]);
            }
            index += count;
            first += count;
            first <<= 1;
            code <<= 1;
        }
        Err("invalid code".to_string())
    }
}

fn fixed_tables() -> (Huffman, Huffman) {
    let mut lit_lens = [0u8; 288];
    for (i, len) in lit_lens.iter_mut().enumerate() {
        *len = match i {
            0..=143 => 8,
            144..=255 => 9,
            256..=279 => 7,
            _ => 8,
        };
    }
    let dist_lens = [5u8; 30];
    (
        Huffman::new(&lit_lens).expect("fixed literal table"),
        Huffman::new(&dist_lens).expect("fixed distance table"),
    )
}

fn inflate_into(data: &[u8], out: &mut Vec<u8>) -> Result<usize, String> {
    let mut br = BitReader::new(data);
    loop {
        let last = br.bits(1)? == 1;
        let btype = br.bits(2)?;
        match btype {
            0 => {
                br.align();
                let p = br.byte_pos();
                if p + 4 > data.len() {
                    return Err("truncated stored header".to_string());
                }
                let len = u16::from_le_bytes([data[p], data[p + 1]]) as usize;
                let nlen = u16::from_le_bytes([data[p + 2], data[p + 3]]);
                if nlen != !(len as u16) {
                    return Err("stored length check failed".to_string());
                }
                if p + 4 + len > data.len() {
                    return Err("truncated stored block".to_string());
                }
                out.extend_from_slice(&data[p + 4..p + 4 + len]);
                br.pos = p + 4 + len;
            }
            1 | 2 => {
                let (lit, dist);
                if btype == 1 {
                    let t = fixed_tables();
                    lit = t.0;
                    dist = t.1;
                } else {
                    let hlit = br.bits(5)? as usize + 257;
                    let hdist = br.bits(5)? as usize + 1;
                    let hclen = br.bits(4)? as usize + 4;
                    if hlit > 286 || hdist > 30 {
                        return Err("bad code counts".to_string());
                    }
                    let mut cl_lens = [0u8; 19];
                    for &idx in CODE_LENGTH_ORDER.iter().take(hclen) {
                        cl_lens[idx] = br.bits(3)? as u8;
                    }
                    let cl = Huffman::new(&cl_lens)?;

                    let mut lens = vec![0u8; hlit + hdist];
                    let mut i = 0;
                    while i < lens.len() {
                        let sym = cl.decode(&mut br)?;
                        match sym {
                            0..=15 => {
                                lens[i] = sym as u8;
                                i += 1;
                            }
                            16 => {
                                if i == 0 {
                                    return Err("repeat with no previous length".to_string());
                                }
                                let prev = lens[i - 1];
                                let n = br.bits(2)? as usize + 3;
                                for _ in 0..n {
                                    if i >= lens.len() {
                                        return Err("length repeat overflow".to_string());
                                    }
                                    lens[i] = prev;
                                    i += 1;
                                }
                            }
                            17 => {
                                let n = br.bits(3)? as usize + 3;
                                if i + n > lens.len() {
                                    return Err("zero repeat overflow".to_string());
                                }
                                i += n;
                            }
                            18 => {
                                let n = br.bits(7)? as usize + 11;
                                if i + n > lens.len() {
                                    return Err("zero repeat overflow".to_string());
                                }
                                i += n;
                            }
                            _ => return Err("bad code-length symbol".to_string()),
                        }
                    }
                    if lens[256] == 0 {
                        return Err("no end-of-block code".to_string());
                    }
                    lit = Huffman::new(&lens[..hlit])?;
                    dist = Huffman::new(&lens[hlit..])?;
                }

                loop {
                    let sym = lit.decode(&mut br)?;
                    match sym {
                        0..=255 => out.push(sym as u8),
                        256 => break,
                        257..=285 => {
                            let idx = sym as usize - 257;
                            let len =
                                LENGTH_BASE[idx] as usize + br.bits(LENGTH_EXTRA[idx] as u32)? as usize;
                            let dsym = dist.decode(&mut br)? as usize;
                            if dsym >= 30 {
                                return Err("bad distance symbol".to_string());
                            }
                            let d =
                                DIST_BASE[dsym] as usize + br.bits(DIST_EXTRA[dsym] as u32)? as usize;
                            if d > out.len() {
                                return Err(format!(
                                    "distance {} exceeds output {}",
                                    d,
                                    out.len()
                                ));
                            }
                            for _ in 0..len {
                                let b = out[out.len() - d];
                                out.push(b);
                            }
                        }
                        _ => return Err("bad literal/length symbol".to_string()),
                    }
                }
            }
            _ => return Err("reserved block type".to_string()),
        }
        if last {
            br.align();
            return Ok(br.byte_pos());
        }
    }
}

/// Decode a complete raw DEFLATE stream.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>, String> {
    let mut out = Vec::new();
    inflate_into(data, &mut out)?;
    Ok(out)
}

/// Decode a stream whose back-references may reach into a preset
/// dictionary.
pub fn inflate_with_dictionary(data: &[u8], dictionary: &[u8]) -> Result<Vec<u8>, String> {
    let mut out = dictionary.to_vec();
    inflate_into(data, &mut out)?;
    Ok(out.split_off(dictionary.len()))
}

/// Decode only up to the end of the first fully flushed segment: all
/// blocks before the empty stored block that a sync flush appends.
/// Returns the decoded bytes and how many input bytes were consumed
/// including the 00 00 FF FF marker.
pub fn inflate_sync_segment(data: &[u8]) -> Result<(Vec<u8>, usize), String> {
    // Locate the sync marker and decode everything before it plus the
    // empty stored block itself by appending a synthetic final marker.
    let pos = data
        .windows(4)
        .position(|w| w == [0x00, 0x00, 0xFF, 0xFF])
        .ok_or_else(|| "no sync marker found".to_string())?;
    let mut segment = data[..pos + 4].to_vec();
    // Replace the non-final empty stored block with a final one so the
    // decoder terminates: flip BFINAL of the empty stored block by
    // appending a final empty stored block instead.
    segment.extend_from_slice(&[0x01, 0x00, 0x00, 0xFF, 0xFF]);
    let out = inflate(&segment)?;
    Ok((out, pos + 4))
}

/// Deterministic pseudo-random bytes for incompressibility tests.
pub fn pseudo_random(len: usize, mut seed: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(len);
    for _ in 0..len {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        data.push((seed >> 32) as u8);
    }
    data
}
