/// Near-bottom distance used to resume follow mode deterministically.
const AUTO_FOLLOW_RESUME_THRESHOLD: f64 = 24.0;
/// Small delta used to ignore sub-pixel scroll jitter.
const SCROLL_DELTA_EPSILON: f64 = 1.0;

/// Decides when the message list should jump to its end.
///
/// Every new message and every reopen scrolls to the end. Between those, a
/// reader who scrolled up is left alone until they come back near the tail.
#[derive(Debug, Clone)]
pub struct ScrollTracker {
    pending_scroll_to_bottom: bool,
    follow_bottom: bool,
    last_revision: Option<u64>,
    last_scroll_top: f64,
    was_open: bool,
}

impl ScrollTracker {
    pub fn new() -> Self {
        Self {
            pending_scroll_to_bottom: false,
            follow_bottom: true,
            last_revision: None,
            last_scroll_top: 0.0,
            was_open: false,
        }
    }

    pub fn is_following_bottom(&self) -> bool {
        self.follow_bottom
    }

    pub fn request_scroll_to_bottom(&mut self) {
        self.pending_scroll_to_bottom = true;
        self.follow_bottom = true;
    }

    /// Feeds the state of a freshly rendered frame.
    pub fn observe_frame(&mut self, is_open: bool, revision: u64) {
        let reopened = is_open && !self.was_open;
        let mutated = self.last_revision != Some(revision);
        if reopened || mutated {
            self.request_scroll_to_bottom();
        }

        self.was_open = is_open;
        self.last_revision = Some(revision);
    }

    /// Feeds a user scroll of the list element.
    pub fn observe_scroll(&mut self, scroll_top: f64, scroll_height: f64, client_height: f64) {
        let delta = scroll_top - self.last_scroll_top;
        let near_bottom = scroll_height - client_height - scroll_top <= AUTO_FOLLOW_RESUME_THRESHOLD;

        if self.pending_scroll_to_bottom {
            self.follow_bottom = true;
        } else if self.follow_bottom {
            if delta < -SCROLL_DELTA_EPSILON && !near_bottom {
                self.follow_bottom = false;
            }
        } else if delta > SCROLL_DELTA_EPSILON && near_bottom {
            self.follow_bottom = true;
        }

        self.last_scroll_top = scroll_top;
    }

    /// Returns whether the platform should scroll to the end now.
    pub fn take_pending_scroll(&mut self) -> bool {
        let should_scroll = std::mem::take(&mut self.pending_scroll_to_bottom);
        should_scroll || (self.follow_bottom && self.was_open)
    }
}

impl Default for ScrollTracker {
    fn default() -> Self {
        Self::new()
    }
}
