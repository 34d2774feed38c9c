//! Core traits for streaming compression.
//!
//! This module defines the caller-facing contract implemented by the
//! OxiPress encoders: a cooperative, single-threaded streaming interface
//! that processes data in caller-supplied chunks and reports progress
//! through a status value.

use crate::error::Result;

/// Status of a streaming compression operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressStatus {
    /// More input data can be accepted.
    NeedsInput,
    /// More output buffer space is needed.
    NeedsOutput,
    /// A block boundary was reached (`FlushMode::Block`).
    BlockEnd,
    /// Compression is complete; the last block has been emitted.
    Done,
}

/// Flush mode for compression.
///
/// The flush mode passed to [`Compressor::compress`] governs when blocks
/// close and how much output is forced out before the call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushMode {
    /// No flush - buffer data for best compression.
    #[default]
    None,
    /// Emit the pending block if advantageous and flush bits to a byte
    /// boundary, without an alignment marker.
    Partial,
    /// Emit the pending block followed by an empty stored block, aligning
    /// the stream so a decoder can consume all output so far.
    Sync,
    /// As [`FlushMode::Sync`], plus reset the match state so the decoder
    /// can restart from this point without prior history.
    Full,
    /// Stop at the next block boundary without aligning the stream.
    Block,
    /// Emit all pending data and mark the last block.
    Finish,
}

/// A streaming compressor (encoder).
///
/// A single instance is not safe for concurrent access; independent
/// instances are fully isolated. All output bytes of one call are
/// observable before any byte of the next.
pub trait Compressor {
    /// Compress data from input to output.
    ///
    /// # Arguments
    ///
    /// * `input` - Input data to compress
    /// * `output` - Output buffer for compressed data
    /// * `flush` - Flush mode
    ///
    /// # Returns
    ///
    /// A tuple of (bytes consumed from input, bytes written to output, status)
    fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, CompressStatus)>;

    /// Reset the compressor for a new stream without freeing its buffers.
    fn reset(&mut self);

    /// Check if the compressor has emitted its last block.
    fn is_finished(&self) -> bool;

    /// Compress all data at once (convenience method).
    fn compress_all(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let mut input_pos = 0;
        let mut buffer = vec![0u8; 32768];

        loop {
            let flush = if input_pos >= input.len() {
                FlushMode::Finish
            } else {
                FlushMode::None
            };

            let (consumed, produced, status) =
                self.compress(&input[input_pos..], &mut buffer, flush)?;

            input_pos += consumed;
            output.extend_from_slice(&buffer[..produced]);

            match status {
                CompressStatus::Done => break,
                CompressStatus::NeedsInput
                | CompressStatus::NeedsOutput
                | CompressStatus::BlockEnd => continue,
            }
        }

        Ok(output)
    }
}
