//! Property-based tests for the cadence runtime.
//!
//! Tests table resize integrity, message format matching, scheduler ordering,
//! and pool reclamation using proptest for randomized inputs.

use cadence_core::{
    Element, Message, MessagePool, PoolError, ReceiverId, Scheduler, Table, VECTOR_WIDTH,
};
use proptest::prelude::*;

fn element_strategy() -> impl Strategy<Value = Element> {
    prop_oneof![
        Just(Element::Bang),
        (-1000.0f32..1000.0).prop_map(Element::Float),
        "[a-z]{1,8}".prop_map(|s| Element::from(s.as_str())),
        any::<u32>().prop_map(Element::Hash),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// After any sequence of resizes the length matches, the shared prefix
    /// keeps its values, and everything past the old length reads 0.0.
    #[test]
    fn resize_preserves_prefix_and_zero_fills(
        initial in 1usize..200,
        sizes in prop::collection::vec(1usize..300, 1..8),
    ) {
        let start: Vec<f32> = (0..initial).map(|i| i as f32 + 1.0).collect();
        let mut table = Table::from_samples("t", &start).unwrap();
        let mut model = start.clone();

        for &n in &sizes {
            table.resize(n).unwrap();
            model.resize(n, 0.0);
            prop_assert_eq!(table.len(), n);
            prop_assert!(table.capacity() >= n);
            prop_assert_eq!(table.capacity() % VECTOR_WIDTH, 0);
            prop_assert_eq!(table.samples(), model.as_slice());
            prop_assert!(table.buffer()[n..].iter().all(|&s| s == 0.0));
        }
    }

    /// `has_format` matches exactly the element-type sequence.
    #[test]
    fn has_format_matches_type_codes(
        elements in prop::collection::vec(element_strategy(), 1..16),
    ) {
        let message = Message::from_elements(0, &elements).unwrap();
        let exact: String = elements.iter().map(|e| e.element_type().code()).collect();
        prop_assert!(message.has_format(&exact));

        let longer = format!("{exact}f");
        prop_assert!(!message.has_format(&longer));
        prop_assert!(!message.has_format(&exact[1..]));

        // flipping any one code breaks the match
        for i in 0..exact.len() {
            let mut changed: Vec<char> = exact.chars().collect();
            changed[i] = match changed[i] { 'b' => 'f', 'f' => 's', _ => 'b' };
            let changed: String = changed.into_iter().collect();
            prop_assert!(!message.has_format(&changed), "{} vs {}", exact, changed);
        }
    }

    /// Events come out in timestamp order, ties in scheduling order, and only
    /// when they fall before the bound.
    #[test]
    fn scheduler_orders_by_timestamp_then_fifo(
        stamps in prop::collection::vec(0u64..64, 1..100),
        bound in 0u64..80,
    ) {
        let mut pool = MessagePool::with_kilobytes(64);
        let mut scheduler = Scheduler::with_capacity(stamps.len());
        let receiver = ReceiverId::new(0);
        let mut expected = Vec::new();
        for (order, &ts) in stamps.iter().enumerate() {
            let handle = pool.alloc(Message::float(ts, order as f32)).unwrap();
            scheduler.schedule(ts, receiver, handle);
            expected.push((ts, order));
        }
        expected.sort();

        let mut seen = Vec::new();
        while let Some(event) = scheduler.pop_due(bound) {
            prop_assert!(event.timestamp < bound);
            let message = pool.free(event.handle).unwrap();
            seen.push((event.timestamp, message.get_float(0) as usize));
        }
        let due: Vec<_> = expected.iter().copied().filter(|&(ts, _)| ts < bound).collect();
        prop_assert_eq!(scheduler.len(), stamps.len() - due.len());
        prop_assert_eq!(pool.live_count(), scheduler.len());
        prop_assert_eq!(seen, due);
    }

    /// Cancelling any subset reclaims exactly those slots, and a stale handle
    /// is reported both by the scheduler and by the pool.
    #[test]
    fn cancellation_reclaims_pool_space(
        count in 1usize..30,
        cancel_mask in any::<u32>(),
    ) {
        let mut pool = MessagePool::with_kilobytes(16);
        let mut scheduler = Scheduler::default();
        let receiver = ReceiverId::new(0);
        let mut handles = Vec::new();
        for i in 0..count {
            let handle = pool.alloc(Message::float(10, i as f32)).unwrap();
            scheduler.schedule(10, receiver, handle);
            handles.push(handle);
        }

        let mut kept = count;
        for (i, &h) in handles.iter().enumerate() {
            if cancel_mask & (1 << i) != 0 {
                prop_assert!(scheduler.cancel(h));
                prop_assert!(pool.free(h).is_ok());
                prop_assert!(!scheduler.cancel(h));
                prop_assert_eq!(pool.free(h), Err(PoolError::StaleHandle));
                kept -= 1;
            }
        }
        prop_assert_eq!(pool.live_count(), kept);
        prop_assert_eq!(scheduler.len(), kept);
        prop_assert_eq!(pool.used_bytes(), kept * Message::float(0, 0.0).byte_size());

        // every remaining event still dispatches, in order
        let mut last = None;
        while let Some(event) = scheduler.pop_due(11) {
            let value = pool.free(event.handle).unwrap().get_float(0) as usize;
            prop_assert!(last.is_none_or(|l| l < value));
            last = Some(value);
        }
        prop_assert_eq!(pool.used_bytes(), 0);
    }
}
