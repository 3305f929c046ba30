use proptest::prelude::*;
use xdbg_core::Tracker;

proptest! {
    #[test]
    fn release_restores_count(sizes in prop::collection::vec(1usize..8192, 1..16)) {
        let tracker = Tracker::new();
        let start = tracker.leak_count();

        let buffers: Vec<_> = sizes
            .iter()
            .map(|&size| tracker.allocate(size, "prop:alloc"))
            .collect();
        prop_assert_eq!(tracker.leak_count(), start + sizes.len() as isize);

        for (buffer, &size) in buffers.iter().zip(&sizes) {
            prop_assert_eq!(buffer.len(), size);
            prop_assert!(buffer.iter().all(|&b| b == 0));
        }

        for buffer in buffers {
            tracker.release(buffer, "prop:alloc");
        }
        prop_assert_eq!(tracker.leak_count(), start);
    }

    #[test]
    fn reallocate_keeps_count(first in 1usize..4096, second in 1usize..4096) {
        let tracker = Tracker::new();
        let buffer = tracker.allocate(first, "prop:realloc");
        let buffer = tracker.reallocate(Some(buffer), second, "prop:realloc");
        prop_assert_eq!(tracker.leak_count(), 1);
        prop_assert_eq!(buffer.len(), second);
        drop(buffer);
        prop_assert!(tracker.checkpoint().is_clean());
    }
}
