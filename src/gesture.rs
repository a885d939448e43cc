//! Turns raw pointer contacts into pan deltas or pinch updates.
//!
//! One contact pans, two contacts pinch. The two never blend: while a second
//! contact is down, movement only drives scale.

use crate::events::{PointerEvent, PointerId};
use crate::processing::layout::Offset;

const MAX_CONTACTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureAction {
    Pan(Offset),
    Pinch {
        initial_scale: f32,
        initial_distance: f32,
        current_distance: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PinchStart {
    distance: f32,
    scale: f32,
}

#[derive(Debug, Default, Clone)]
pub struct GestureTracker {
    contacts: Vec<(PointerId, Offset)>,
    pinch: Option<PinchStart>,
}

impl GestureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_contacts(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_pinching(&self) -> bool {
        self.pinch.is_some()
    }

    /// Feeds one event. `current_scale` is the committed photo scale, used as
    /// the pinch baseline when a second contact lands.
    pub fn handle(&mut self, event: PointerEvent, current_scale: f32) -> Option<GestureAction> {
        match event {
            PointerEvent::Down { id, position } => {
                if self.contacts.iter().any(|(c, _)| *c == id) {
                    self.update(id, position);
                    return None;
                }
                if self.contacts.len() >= MAX_CONTACTS {
                    return None;
                }
                self.contacts.push((id, position));
                if let [(_, a), (_, b)] = self.contacts.as_slice() {
                    let distance = a.distance(b);
                    self.pinch = (distance > 0.0).then_some(PinchStart {
                        distance,
                        scale: current_scale,
                    });
                }
                None
            }
            PointerEvent::Move { id, position } => {
                let previous = self.update(id, position)?;
                match self.contacts.as_slice() {
                    [_] => Some(GestureAction::Pan(Offset::new(
                        position.x - previous.x,
                        position.y - previous.y,
                    ))),
                    [(_, a), (_, b)] => {
                        let start = self.pinch?;
                        Some(GestureAction::Pinch {
                            initial_scale: start.scale,
                            initial_distance: start.distance,
                            current_distance: a.distance(b),
                        })
                    }
                    _ => None,
                }
            }
            PointerEvent::Up { id } => {
                self.contacts.retain(|(c, _)| *c != id);
                // the remaining contact pans from where it is now
                self.pinch = None;
                None
            }
            PointerEvent::Cancel => {
                self.contacts.clear();
                self.pinch = None;
                None
            }
        }
    }

    /// Stores the new position and returns the previous one for tracked ids.
    fn update(&mut self, id: PointerId, position: Offset) -> Option<Offset> {
        let slot = self.contacts.iter_mut().find(|(c, _)| *c == id)?;
        Some(std::mem::replace(&mut slot.1, position))
    }
}
