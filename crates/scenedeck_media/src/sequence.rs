use std::time::Duration;

/// One entry in a [`Sequence`]: the item plus how long it stays current.
#[derive(Clone, Debug)]
struct TimedItem<T> {
    item: T,
    duration: Duration,
}

/// A time-addressable playlist over pre-decoded items.
///
/// The item list is fixed at construction; playback advances through
/// [`Sequence::update`] and the active item is a pure function of elapsed
/// time. Looping sequences wrap elapsed time modulo the total duration and
/// never finish; non-looping sequences clamp to the last item once elapsed
/// time exceeds the total.
pub struct Sequence<T> {
    items: Vec<TimedItem<T>>,
    total: Duration,
    looping: bool,
    elapsed: Duration,
    finished: bool,
}

impl<T> Sequence<T> {
    pub fn new(items: impl IntoIterator<Item = (T, Duration)>, looping: bool) -> Self {
        let items: Vec<TimedItem<T>> = items
            .into_iter()
            .map(|(item, duration)| TimedItem { item, duration })
            .collect();
        let total = items.iter().map(|entry| entry.duration).sum();

        Self {
            items,
            total,
            looping,
            elapsed: Duration::ZERO,
            finished: false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn total_duration(&self) -> Duration {
        self.total
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Advance playback by `delta`.
    ///
    /// Looping playback wraps modulo the total duration, keeping the
    /// overshoot so frame timing stays accurate across the wrap.
    pub fn update(&mut self, delta: Duration) {
        if self.finished {
            return;
        }

        self.elapsed += delta;

        if self.looping {
            if self.elapsed >= self.total && !self.total.is_zero() {
                let wrapped = self.elapsed.as_nanos() % self.total.as_nanos();
                self.elapsed = Duration::from_nanos(wrapped as u64);
            }
        } else if self.elapsed > self.total {
            self.elapsed = self.total;
            self.finished = true;
        }
    }

    /// The item active at the current elapsed time, or `None` for an empty
    /// sequence.
    pub fn current(&self) -> Option<&T> {
        // Prefix-sum walk over closed-open intervals; anything at or past
        // the final boundary holds on the last item.
        let mut acc = Duration::ZERO;
        for entry in &self.items {
            acc += entry.duration;
            if self.elapsed < acc {
                return Some(&entry.item);
            }
        }

        self.items.last().map(|entry| &entry.item)
    }

    /// True only for a non-looping sequence played past its total duration.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Rewind to the start. The item list is immutable, so a reset sequence
    /// replays identically.
    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
        self.finished = false;
    }
}
