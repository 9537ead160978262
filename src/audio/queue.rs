use rand::seq::SliceRandom;
use std::{collections::VecDeque, time::Duration};
use tracing::{debug, info};

use super::{error::PlayerError, track::Track};

/// Per-guild play queue.
///
/// Index 0 is the track currently playing (or about to play). Removing it is
/// the only way a track is consumed: [`finish_head`](Self::finish_head) for a
/// natural end, [`drop_head`](Self::drop_head) for skips and failures.
#[derive(Debug)]
pub struct MusicQueue {
    items: VecDeque<Track>,
    loop_enabled: bool,
    shuffle_enabled: bool,
    max_size: usize,
}

impl MusicQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            loop_enabled: false,
            shuffle_enabled: false,
            max_size,
        }
    }

    /// Appends a track and returns its position (0 = head).
    pub fn push(&mut self, track: Track) -> Result<usize, PlayerError> {
        if self.items.len() >= self.max_size {
            return Err(PlayerError::QueueFull { max: self.max_size });
        }

        info!("➕ Added to queue: {}", track.title());
        self.items.push_back(track);

        Ok(self.items.len() - 1)
    }

    pub fn head(&self) -> Option<&Track> {
        self.items.front()
    }

    /// Consumes the head after it played to completion.
    ///
    /// With loop enabled the track goes back to the tail.
    pub fn finish_head(&mut self) -> Option<Track> {
        let finished = self.items.pop_front()?;

        if self.loop_enabled {
            debug!("🔁 Re-queued by loop: {}", finished.title());
            self.items.push_back(finished.clone());
        }

        Some(finished)
    }

    /// Consumes the head without looping it (skip, open failure, playback error).
    pub fn drop_head(&mut self) -> Option<Track> {
        self.items.pop_front()
    }

    /// Empties the queue, returning how many tracks were removed.
    pub fn clear(&mut self) -> usize {
        let cleared = self.items.len();
        self.items.clear();
        if cleared > 0 {
            info!("🗑️ Queue cleared: {} tracks removed", cleared);
        }
        cleared
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.loop_enabled = !self.loop_enabled;
        if self.loop_enabled {
            info!("🔁 Queue loop enabled");
        } else {
            info!("➡️ Queue loop disabled");
        }
        self.loop_enabled
    }

    /// Flips shuffle. Turning it on reorders everything behind the head once;
    /// later enqueues keep FIFO order.
    pub fn toggle_shuffle(&mut self) -> bool {
        self.shuffle_enabled = !self.shuffle_enabled;
        if self.shuffle_enabled {
            self.shuffle_tail();
            info!("🔀 Shuffle enabled");
        } else {
            info!("➡️ Shuffle disabled");
        }
        self.shuffle_enabled
    }

    fn shuffle_tail(&mut self) {
        if self.items.len() < 3 {
            return;
        }

        // `SliceRandom::shuffle` is Fisher-Yates.
        let tail = &mut self.items.make_contiguous()[1..];
        tail.shuffle(&mut rand::thread_rng());
    }

    pub fn is_loop(&self) -> bool {
        self.loop_enabled
    }

    pub fn is_shuffle(&self) -> bool {
        self.shuffle_enabled
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn tracks(&self) -> Vec<Track> {
        self.items.iter().cloned().collect()
    }

    pub fn info(&self) -> QueueInfo {
        QueueInfo {
            tracks: self.tracks(),
            loop_enabled: self.loop_enabled,
            shuffle_enabled: self.shuffle_enabled,
            total_duration: self.items.iter().map(Track::duration).sum(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueInfo {
    pub tracks: Vec<Track>,
    pub loop_enabled: bool,
    pub shuffle_enabled: bool,
    pub total_duration: Duration,
}

impl QueueInfo {
    pub fn current(&self) -> Option<&Track> {
        self.tracks.first()
    }

    /// Everything queued behind the head.
    pub fn upcoming(&self) -> &[Track] {
        self.tracks.get(1..).unwrap_or_default()
    }

    /// Returns one page of upcoming tracks. Pages are 1-based; a page past
    /// the end yields the last one.
    pub fn page(&self, page: usize, items_per_page: usize) -> QueuePage {
        let upcoming = self.upcoming();
        let items_per_page = items_per_page.max(1);
        let total_pages = upcoming.len().div_ceil(items_per_page).max(1);
        let safe_page = page.clamp(1, total_pages);
        let start = (safe_page - 1) * items_per_page;
        let end = start.saturating_add(items_per_page).min(upcoming.len());

        QueuePage {
            items: upcoming.get(start..end).unwrap_or_default().to_vec(),
            first_position: start + 1,
            current_page: safe_page,
            total_pages,
            total_items: upcoming.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueuePage {
    pub items: Vec<Track>,
    /// Queue position of `items[0]`.
    pub first_position: usize,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn track(title: &str) -> Track {
        Track::new(title, format!("https://example.com/{title}")).with_duration_secs(60)
    }

    fn titles(queue: &MusicQueue) -> Vec<String> {
        queue.tracks().iter().map(|t| t.title().to_string()).collect()
    }

    #[test]
    fn push_returns_position_in_fifo_order() {
        let mut queue = MusicQueue::new(10);
        assert_eq!(queue.push(track("A")).unwrap(), 0);
        assert_eq!(queue.push(track("B")).unwrap(), 1);
        assert_eq!(queue.push(track("C")).unwrap(), 2);
        assert_eq!(titles(&queue), vec!["A", "B", "C"]);
    }

    #[test]
    fn push_beyond_capacity_fails() {
        let mut queue = MusicQueue::new(1);
        queue.push(track("A")).unwrap();
        assert!(matches!(
            queue.push(track("B")),
            Err(PlayerError::QueueFull { max: 1 })
        ));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn loop_reappends_on_natural_finish() {
        let mut queue = MusicQueue::new(10);
        queue.push(track("A")).unwrap();
        queue.push(track("B")).unwrap();
        queue.toggle_loop();

        let finished = queue.finish_head().unwrap();
        assert_eq!(finished.title(), "A");
        assert_eq!(titles(&queue), vec!["B", "A"]);
    }

    #[test]
    fn loop_does_not_reappend_on_drop() {
        let mut queue = MusicQueue::new(10);
        queue.push(track("A")).unwrap();
        queue.push(track("B")).unwrap();
        queue.toggle_loop();

        queue.drop_head();
        assert_eq!(titles(&queue), vec!["B"]);
    }

    #[test]
    fn finish_without_loop_discards() {
        let mut queue = MusicQueue::new(10);
        queue.push(track("A")).unwrap();
        queue.finish_head();
        assert!(queue.is_empty());
        assert!(queue.finish_head().is_none());
    }

    #[test]
    fn shuffle_keeps_head_and_membership() {
        let mut queue = MusicQueue::new(100);
        for i in 0..30 {
            queue.push(track(&format!("T{i}"))).unwrap();
        }
        let before: HashSet<String> = titles(&queue).into_iter().collect();

        assert!(queue.toggle_shuffle());
        assert_eq!(queue.head().unwrap().title(), "T0");
        let after: HashSet<String> = titles(&queue).into_iter().collect();
        assert_eq!(before, after);

        assert!(!queue.toggle_shuffle());
        let after_second: HashSet<String> = titles(&queue).into_iter().collect();
        assert_eq!(before, after_second);
        assert_eq!(queue.len(), 30);
    }

    #[test]
    fn disabling_shuffle_does_not_reorder() {
        let mut queue = MusicQueue::new(100);
        for i in 0..10 {
            queue.push(track(&format!("T{i}"))).unwrap();
        }
        queue.toggle_shuffle();
        let shuffled = titles(&queue);
        queue.toggle_shuffle();
        assert_eq!(titles(&queue), shuffled);
    }

    #[test]
    fn clear_reports_removed_count() {
        let mut queue = MusicQueue::new(10);
        queue.push(track("A")).unwrap();
        queue.push(track("B")).unwrap();
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn info_sums_durations_and_pages_upcoming() {
        let mut queue = MusicQueue::new(100);
        for i in 0..12 {
            queue.push(track(&format!("T{i}"))).unwrap();
        }

        let info = queue.info();
        assert_eq!(info.total_duration, Duration::from_secs(12 * 60));
        assert_eq!(info.current().unwrap().title(), "T0");
        assert_eq!(info.upcoming().len(), 11);

        let page = info.page(2, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.first_position, 6);
        assert_eq!(page.items.first().unwrap().title(), "T6");

        let beyond = info.page(9, 5);
        assert_eq!(beyond.current_page, 3);
        assert_eq!(beyond.first_position, 11);
        assert_eq!(beyond.items.len(), 1);
    }

    #[test]
    fn huge_page_numbers_clamp_to_the_last_page() {
        let mut queue = MusicQueue::new(100);
        for i in 0..4 {
            queue.push(track(&format!("T{i}"))).unwrap();
        }

        let page = queue.info().page(usize::MAX, 2);
        assert_eq!(page.current_page, 2);
        assert_eq!(page.items.first().unwrap().title(), "T3");

        let page = queue.info().page(usize::MAX, usize::MAX);
        assert_eq!(page.current_page, 1);
        assert_eq!(page.items.len(), 3);
    }

    #[test]
    fn empty_info_has_single_empty_page() {
        let info = QueueInfo::default();
        assert!(info.current().is_none());
        let page = info.page(1, 10);
        assert_eq!(page.total_pages, 1);
        assert!(page.items.is_empty());
    }
}
