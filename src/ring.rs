//! # Receive ring buffer
//!
//! Single-producer/single-consumer byte queue between the hardware receive path (UART interrupt
//! or DMA idle-line callback) and the blocking driver. Built on [heapless::spsc::Queue], which
//! holds at most `N - 1` bytes. Use a power of two for `N`.
//!
//! A full buffer is never overwritten. Dropped bytes latch an overrun flag, which the consumer
//! reports as error until [Consumer::clear] is called.
//!
//! ## Example
//!
//! ````
//! use esp_at_serial::ring::{RingBuffer, RingError};
//!
//! let mut ring: RingBuffer<8> = RingBuffer::new();
//! let (mut producer, mut consumer) = ring.split();
//!
//! assert_eq!(Ok(7), producer.push_slice(b"AT+RST\n"));
//! assert_eq!(Ok(Some(b'A')), consumer.pop());
//!
//! // Only one slot got freed
//! assert_eq!(Err(RingError::Overrun), producer.push_slice(b"OK"));
//! assert_eq!(Err(RingError::Overrun), consumer.pop());
//!
//! consumer.clear();
//! assert_eq!(Ok(None), consumer.pop());
//! ````
use core::sync::atomic::{AtomicBool, Ordering};
use heapless::spsc;

/// Failure signals of the ring buffer
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RingError {
    /// Producer found the buffer full and had to drop received bytes
    Overrun,

    /// Hardware receive path reported a transport failure
    Fault,
}

/// Fixed capacity byte queue with latched error conditions. Holds `N - 1` bytes.
pub struct RingBuffer<const N: usize> {
    queue: spsc::Queue<u8, N>,

    /// Latched by the producer when a byte got dropped
    overrun: AtomicBool,

    /// Latched by the producer on transport errors
    fault: AtomicBool,
}

impl<const N: usize> RingBuffer<N> {
    /// Creates an empty buffer, usable in statics
    pub const fn new() -> Self {
        Self {
            queue: spsc::Queue::new(),
            overrun: AtomicBool::new(false),
            fault: AtomicBool::new(false),
        }
    }

    /// Splits the buffer in its producer and consumer half. All previous content is discarded.
    pub fn split(&mut self) -> (Producer<'_, N>, Consumer<'_, N>) {
        self.queue = spsc::Queue::new();
        *self.overrun.get_mut() = false;
        *self.fault.get_mut() = false;

        let RingBuffer { queue, overrun, fault } = self;
        let (overrun, fault) = (&*overrun, &*fault);
        let (producer, consumer) = queue.split();

        (
            Producer {
                queue: producer,
                overrun,
                fault,
            },
            Consumer {
                queue: consumer,
                overrun,
                fault,
            },
        )
    }

    /// Total capacity in bytes
    pub const fn capacity(&self) -> usize {
        N - 1
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Writing half, owned by the hardware receive path
pub struct Producer<'a, const N: usize> {
    queue: spsc::Producer<'a, u8, N>,
    overrun: &'a AtomicBool,
    fault: &'a AtomicBool,
}

impl<const N: usize> Producer<'_, N> {
    /// Appends a single byte. Returns [RingError::Overrun] and drops the byte if the buffer is full.
    pub fn push(&mut self, byte: u8) -> Result<(), RingError> {
        self.queue.enqueue(byte).map_err(|_| {
            self.overrun.store(true, Ordering::Release);
            RingError::Overrun
        })
    }

    /// Appends all bytes newly delivered by the hardware and returns the count stored.
    /// Stops at the first byte not fitting and returns [RingError::Overrun] in this case.
    pub fn push_slice(&mut self, data: &[u8]) -> Result<usize, RingError> {
        for byte in data {
            self.push(*byte)?;
        }

        Ok(data.len())
    }

    /// Signals a transport failure (e.g. UART framing or DMA error) to the consumer
    pub fn report_fault(&mut self) {
        self.fault.store(true, Ordering::Release);
    }

    /// Free space in bytes
    pub fn free(&self) -> usize {
        self.queue.capacity() - self.queue.len()
    }
}

/// Reading half, owned by the driver
pub struct Consumer<'a, const N: usize> {
    queue: spsc::Consumer<'a, u8, N>,
    overrun: &'a AtomicBool,
    fault: &'a AtomicBool,
}

impl<const N: usize> Consumer<'_, N> {
    /// Pops the oldest byte. `Ok(None)` if no data is available.
    ///
    /// Latched overrun or fault conditions are returned first, as the byte stream is not
    /// trustworthy anymore.
    pub fn pop(&mut self) -> Result<Option<u8>, RingError> {
        if self.fault.load(Ordering::Acquire) {
            return Err(RingError::Fault);
        }

        if self.overrun.load(Ordering::Acquire) {
            return Err(RingError::Overrun);
        }

        Ok(self.queue.dequeue())
    }

    /// Number of bytes ready to be read
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if no byte is ready to be read
    pub fn is_empty(&self) -> bool {
        !self.queue.ready()
    }

    /// Discards all pending bytes and clears latched overrun and fault conditions.
    /// Used when (re)initializing the driver.
    pub fn clear(&mut self) {
        // Bytes arriving meanwhile are kept
        for _ in 0..self.queue.len() {
            self.queue.dequeue();
        }

        self.overrun.store(false, Ordering::Release);
        self.fault.store(false, Ordering::Release);
    }
}
