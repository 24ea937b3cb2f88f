//! Bounded PCM staging queue between the provider and the audio device.
//!
//! The provider's delivery thread pushes whole [`AudioBlock`]s, the audio
//! pull thread pops them. Every operation takes the same mutex; a full queue
//! rejects deliveries instead of blocking or overwriting.

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::format::{AudioFormat, BLOCK_FRAMES, BLOCK_SAMPLES, CHANNELS, FormatMismatch};

/// One hardware pull period of interleaved stereo i16 samples.
///
/// Always exactly [`BLOCK_SAMPLES`] long; short deliveries are zero-padded.
pub struct AudioBlock {
    samples: Box<[i16]>,
}

impl AudioBlock {
    /// A block of silence.
    pub fn silent() -> Self {
        Self {
            samples: vec![0i16; BLOCK_SAMPLES].into_boxed_slice(),
        }
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }
}

impl std::fmt::Debug for AudioBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioBlock")
            .field("samples", &self.samples.len())
            .finish()
    }
}

/// FIFO of audio blocks with a fixed capacity.
#[derive(Debug)]
pub struct StagingQueue {
    blocks: Mutex<VecDeque<AudioBlock>>,
    capacity: usize,
}

impl StagingQueue {
    /// Create a queue holding at most `capacity` blocks (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            blocks: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Maximum number of queued blocks.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of queued blocks.
    pub fn len(&self) -> usize {
        self.blocks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.lock().is_empty()
    }

    /// Stage `frame_count` interleaved frames from `samples`.
    ///
    /// Returns the number of frames accepted: 0 when `frame_count` is 0 or
    /// the queue is full, otherwise [`BLOCK_FRAMES`] regardless of how many
    /// frames were actually supplied. Providers therefore throttle in whole
    /// blocks and resubmit rejected data later.
    pub fn deliver(
        &self,
        format: &AudioFormat,
        samples: &[i16],
        frame_count: usize,
    ) -> Result<usize, FormatMismatch> {
        if frame_count == 0 {
            return Ok(0);
        }

        format.ensure_supported()?;

        let mut blocks = self.blocks.lock();
        if blocks.len() >= self.capacity {
            tracing::trace!(queued = blocks.len(), "Staging queue full, declining delivery");
            return Ok(0);
        }

        let copy = (frame_count.min(BLOCK_FRAMES) * CHANNELS as usize).min(samples.len());
        let mut block = AudioBlock::silent();
        block.samples[..copy].copy_from_slice(&samples[..copy]);
        blocks.push_back(block);

        Ok(BLOCK_FRAMES)
    }

    /// Remove the front block, or `None` when nothing is staged.
    pub fn pop_or_silence(&self) -> Option<AudioBlock> {
        self.blocks.lock().pop_front()
    }

    /// Discard every staged block.
    pub fn flush(&self) {
        let dropped = {
            let mut blocks = self.blocks.lock();
            let n = blocks.len();
            blocks.clear();
            n
        };
        if dropped > 0 {
            tracing::debug!(dropped, "Flushed staging queue");
        }
    }
}

impl Default for StagingQueue {
    fn default() -> Self {
        Self::new(super::format::DEFAULT_QUEUE_BLOCKS)
    }
}


/// Property-based tests using proptest
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Deliver(usize),
        Pop,
        Flush,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0usize..3000).prop_map(Op::Deliver),
            3 => Just(Op::Pop),
            1 => Just(Op::Flush),
        ]
    }

    proptest! {
        /// No sequence of operations can push the queue past its capacity
        #[test]
        fn length_never_exceeds_capacity(
            capacity in 1usize..32,
            ops in prop::collection::vec(op(), 0..200),
        ) {
            let queue = StagingQueue::new(capacity);
            let data = vec![1i16; 3000 * CHANNELS as usize];

            for op in ops {
                match op {
                    Op::Deliver(n) => {
                        let before = queue.len();
                        let accepted = queue.deliver(&AudioFormat::JUKEBOX, &data, n).unwrap();
                        if n == 0 || before == capacity {
                            prop_assert_eq!(accepted, 0);
                            prop_assert_eq!(queue.len(), before);
                        } else {
                            prop_assert_eq!(accepted, BLOCK_FRAMES);
                            prop_assert_eq!(queue.len(), before + 1);
                        }
                    }
                    Op::Pop => {
                        queue.pop_or_silence();
                    }
                    Op::Flush => queue.flush(),
                }
                prop_assert!(queue.len() <= capacity);
            }
        }
    }
}
