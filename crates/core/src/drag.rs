//! Pointer-driven repositioning of the inline widget chrome.
//!
//! The controller is a two-state machine. Entering `Dragging` acquires the
//! document-level move/up listeners as a guard value `G`; leaving it drops
//! the guard, which is what unregisters them. There is no other exit, so the
//! listeners cannot outlive the gesture.

/// Pointer travel (in CSS pixels) after which a gesture counts as a drag
/// rather than a click.
pub const DRAG_CLICK_SLOP: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn distance_to(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const fn new(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }
}

/// What the pointer went down on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitRegion {
    DragHandle,
    Header,
    /// Close button, text input and other controls inside the header.
    Interactive,
    Content,
}

impl HitRegion {
    pub fn starts_drag(self) -> bool {
        matches!(self, Self::DragHandle | Self::Header)
    }
}

/// Clamps a candidate top-left so the element stays inside the viewport.
///
/// # Arguments
/// * `candidate` - Requested top-left corner
/// * `element` - Size of the dragged element
/// * `viewport` - Size of the visible viewport
///
/// # Returns
/// A position with `0 <= x <= viewport.width - element.width` (same for y).
/// An element larger than the viewport is pinned at 0 on that axis.
pub fn clamp_position(candidate: Point, element: Size, viewport: Size) -> Point {
    let max_x = (viewport.width - element.width).max(0.0);
    let max_y = (viewport.height - element.height).max(0.0);
    let axis = |value: f64, max: f64| {
        if value.is_finite() {
            value.clamp(0.0, max)
        } else {
            0.0
        }
    };

    Point::new(axis(candidate.x, max_x), axis(candidate.y, max_y))
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Gesture {
    pointer_origin: Point,
    element_origin: Point,
    moved: bool,
}

#[derive(Debug)]
enum DragState<G> {
    Idle,
    Dragging { gesture: Gesture, listeners: G },
}

#[derive(Debug)]
pub struct DragController<G> {
    state: DragState<G>,
    position: Option<Point>,
    element: Size,
    viewport: Size,
    suppress_click: bool,
}

impl<G> DragController<G> {
    pub fn new(viewport: Size) -> Self {
        Self {
            state: DragState::Idle,
            position: None,
            element: Size::default(),
            viewport,
            suppress_click: false,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Explicit top-left once the user has dragged the chrome; `None` keeps
    /// the configured corner anchoring.
    pub fn position(&self) -> Option<Point> {
        self.position
    }

    /// Starts a gesture when the pointer lands on a handle region.
    ///
    /// `acquire_listeners` runs only when the controller actually enters
    /// `Dragging`. Every pointer-down clears a pending click suppression.
    pub fn pointer_down(
        &mut self,
        region: HitRegion,
        pointer: Point,
        element: Rect,
        acquire_listeners: impl FnOnce() -> G,
    ) -> bool {
        self.suppress_click = false;
        if !region.starts_drag() || self.is_dragging() {
            return false;
        }

        self.element = element.size;
        self.state = DragState::Dragging {
            gesture: Gesture {
                pointer_origin: pointer,
                element_origin: element.origin,
                moved: false,
            },
            listeners: acquire_listeners(),
        };
        true
    }

    /// Returns the clamped top-left for this move, or `None` while idle.
    pub fn pointer_move(&mut self, pointer: Point) -> Option<Point> {
        let DragState::Dragging { gesture, .. } = &mut self.state else {
            return None;
        };

        if !gesture.moved && pointer.distance_to(gesture.pointer_origin) > DRAG_CLICK_SLOP {
            gesture.moved = true;
        }
        if !gesture.moved {
            return None;
        }

        let candidate = Point::new(
            gesture.element_origin.x + (pointer.x - gesture.pointer_origin.x),
            gesture.element_origin.y + (pointer.y - gesture.pointer_origin.y),
        );
        let next = clamp_position(candidate, self.element, self.viewport);
        self.position = Some(next);
        Some(next)
    }

    /// Ends the gesture and releases its listeners. Returns whether the
    /// gesture was a drag, in which case the next click is suppressed.
    pub fn pointer_up(&mut self) -> bool {
        match std::mem::replace(&mut self.state, DragState::Idle) {
            DragState::Dragging { gesture, listeners } => {
                drop(listeners);
                self.suppress_click = gesture.moved;
                gesture.moved
            }
            DragState::Idle => false,
        }
    }

    /// Pointer-cancel and the pointer leaving the viewport end the gesture
    /// exactly like a release.
    pub fn cancel(&mut self) -> bool {
        self.pointer_up()
    }

    /// Consumes the suppression left by a completed drag.
    pub fn take_click_suppression(&mut self) -> bool {
        std::mem::take(&mut self.suppress_click)
    }

    pub fn viewport_resized(&mut self, viewport: Size) {
        self.viewport = viewport;
        self.reclamp();
    }

    /// The chrome changes size when it opens or closes.
    pub fn element_resized(&mut self, element: Size) {
        self.element = element;
        self.reclamp();
    }

    fn reclamp(&mut self) {
        if let Some(position) = self.position {
            self.position = Some(clamp_position(position, self.element, self.viewport));
        }
    }
}
