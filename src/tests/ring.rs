use crate::ring::{RingBuffer, RingError};
use proptest::prelude::*;

#[test]
fn test_pop_empty() {
    let mut ring: RingBuffer<8> = RingBuffer::new();
    let (_producer, mut consumer) = ring.split();

    assert_eq!(Ok(None), consumer.pop());
    assert!(consumer.is_empty());
}

#[test]
fn test_capacity_one_below_size() {
    let mut ring: RingBuffer<16> = RingBuffer::new();
    assert_eq!(15, ring.capacity());

    let (producer, _consumer) = ring.split();
    assert_eq!(15, producer.free());
}

#[test]
fn test_fifo_order_across_wraparound() {
    let mut ring: RingBuffer<4> = RingBuffer::new();
    let (mut producer, mut consumer) = ring.split();

    for round in 0..10_u8 {
        producer.push_slice(&[round, round + 1, round + 2]).unwrap();
        assert_eq!(3, consumer.len());

        assert_eq!(Ok(Some(round)), consumer.pop());
        assert_eq!(Ok(Some(round + 1)), consumer.pop());
        assert_eq!(Ok(Some(round + 2)), consumer.pop());
        assert_eq!(Ok(None), consumer.pop());
    }
}

#[test]
fn test_full_buffer_latches_overrun() {
    let mut ring: RingBuffer<4> = RingBuffer::new();
    let (mut producer, mut consumer) = ring.split();

    producer.push_slice(b"123").unwrap();
    assert_eq!(0, producer.free());
    assert_eq!(Err(RingError::Overrun), producer.push(b'4'));

    // Stored bytes are not trustworthy anymore, as one got lost
    assert_eq!(Err(RingError::Overrun), consumer.pop());
    assert_eq!(Err(RingError::Overrun), consumer.pop());

    consumer.clear();
    assert_eq!(Ok(None), consumer.pop());
    assert_eq!(3, producer.free());

    producer.push(b'5').unwrap();
    assert_eq!(Ok(Some(b'5')), consumer.pop());
}

#[test]
fn test_fault_reported_before_data() {
    let mut ring: RingBuffer<8> = RingBuffer::new();
    let (mut producer, mut consumer) = ring.split();

    producer.push_slice(b"OK").unwrap();
    producer.report_fault();

    assert_eq!(Err(RingError::Fault), consumer.pop());
    assert_eq!(Err(RingError::Fault), consumer.pop());

    consumer.clear();
    assert_eq!(Ok(None), consumer.pop());
}

#[test]
fn test_split_discards_previous_state() {
    let mut ring: RingBuffer<4> = RingBuffer::new();

    {
        let (mut producer, _consumer) = ring.split();
        producer.push_slice(b"123").unwrap();
        let _ = producer.push(b'4');
    }

    let (_producer, mut consumer) = ring.split();
    assert_eq!(Ok(None), consumer.pop());
}

#[test]
fn test_producer_on_other_thread() {
    let mut ring: RingBuffer<64> = RingBuffer::new();
    let (mut producer, mut consumer) = ring.split();

    std::thread::scope(|scope| {
        scope.spawn(move || {
            for _ in 0..4 {
                for byte in 0..=255_u8 {
                    while producer.free() == 0 {
                        std::thread::yield_now();
                    }

                    producer.push(byte).unwrap();
                }
            }
        });

        let mut count = 0_usize;
        while count < 4 * 256 {
            if let Some(byte) = consumer.pop().unwrap() {
                assert_eq!((count % 256) as u8, byte);
                count += 1;
            }
        }
    });
}

proptest! {
    #[test]
    fn test_bytes_popped_in_push_order(data in proptest::collection::vec(any::<u8>(), 0..64), split in 0_usize..64) {
        let mut ring: RingBuffer<64> = RingBuffer::new();
        let (mut producer, mut consumer) = ring.split();
        let split = split.min(data.len());
        let mut popped = vec![];

        producer.push_slice(&data[..split]).unwrap();
        while let Some(byte) = consumer.pop().unwrap() {
            popped.push(byte);
        }

        producer.push_slice(&data[split..]).unwrap();
        while let Some(byte) = consumer.pop().unwrap() {
            popped.push(byte);
        }

        prop_assert_eq!(data, popped);
    }

    #[test]
    fn test_overrun_iff_capacity_exceeded(length in 0_usize..40) {
        let mut ring: RingBuffer<32> = RingBuffer::new();
        let (mut producer, _consumer) = ring.split();

        let result = producer.push_slice(&vec![0xAA; length]);
        if length > 31 {
            prop_assert_eq!(Err(RingError::Overrun), result);
        } else {
            prop_assert_eq!(Ok(length), result);
        }
    }
}
