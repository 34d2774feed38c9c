//! # OxiPress Deflate
//!
//! Pure Rust streaming DEFLATE (RFC 1951) encoder.
//!
//! This crate produces raw DEFLATE bitstreams: no zlib or gzip framing, no
//! checksum, no trailer. Any conformant inflate implementation reproduces
//! the input byte for byte. The encoder supports:
//!
//! - **Block types**: stored, fixed-Huffman and dynamic-Huffman blocks,
//!   priced per block and the cheapest chosen
//! - **Compression levels 0-9**: stored only, greedy matching (1-3), and
//!   lazy matching with level-scaled search effort (4-9)
//! - **Strategies**: default, filtered, Huffman-only, RLE and fixed
//! - **Streaming**: chunked input and output with `None`, `Partial`,
//!   `Sync`, `Full`, `Block` and `Finish` flush semantics
//! - **Preset dictionaries** and worst-case output bounds
//!
//! ## Example
//!
//! ```rust
//! use oxipress_deflate::deflate;
//!
//! let compressed = deflate(b"Hello, World! Hello, World!", 6).unwrap();
//! assert!(!compressed.is_empty());
//! ```
//!
//! Streaming with explicit flush control:
//!
//! ```rust
//! use oxipress_core::traits::{Compressor, FlushMode};
//! use oxipress_deflate::Deflater;
//!
//! let mut deflater = Deflater::new(6).unwrap();
//! let mut out = vec![0u8; 256];
//! let (_, n, _) = deflater
//!     .compress(b"hello ", &mut out, FlushMode::Sync)
//!     .unwrap();
//! // A sync flush always ends on the empty stored-block marker.
//! assert_eq!(&out[n - 4..n], &[0x00, 0x00, 0xFF, 0xFF]);
//! ```
//!
//! ## Compression Levels
//!
//! - Level 0: no compression (stored blocks)
//! - Level 1-3: fast greedy matching
//! - Level 4-6: lazy matching, balanced (default is 6)
//! - Level 7-9: best compression (slower)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bits;
pub mod block;
pub mod deflate;
pub mod huffman;
pub mod lz77;
pub mod tables;

// Re-exports
pub use deflate::{deflate, DataType, DeflateConfig, Deflater, Strategy};
pub use oxipress_core::error::{OxiPressError, Result};
pub use oxipress_core::traits::{CompressStatus, Compressor, FlushMode};
