//! Finger slot cache.
//!
//! The controller reports contacts by hardware slot. The cache turns that into
//! a stable reporting order: a slot joins the end of the down order when it is
//! first pressed and keeps its position while it stays down. A lift is kept for
//! one more update so it can be reported with its last coordinates, then the
//! slot is purged and may be reused.

use heapless::Vec;

use crate::bitset::SlotMask;
use crate::event::{FingerState, TouchFrame};
use crate::reg::MAX_SLOTS;

/// Last known state of one hardware slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FingerSlot {
  pub state: FingerState,
  pub x: u16,
  pub y: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FingerCache {
  valid: SlotMask,
  dirty: SlotMask,
  down_order: Vec<u8, MAX_SLOTS>,
  slots: [FingerSlot; MAX_SLOTS],
  scan_time: u64,
}

impl FingerCache {
  pub const fn new() -> Self {
    Self {
      valid: SlotMask::new(),
      dirty: SlotMask::new(),
      down_order: Vec::new(),
      slots: [FingerSlot { state: FingerState::NotPresent, x: 0, y: 0 }; MAX_SLOTS],
      scan_time: 0,
    }
  }

  /// Fold a fresh touch frame into the cache.
  pub fn update(&mut self, frame: &TouchFrame, timestamp: u64) {
    self.purge();

    for (i, sample) in frame.samples.iter().enumerate() {
      let present = sample.state.is_present();

      if present && !self.valid.contains(i) && !self.down_order.is_full() {
        self.valid.set(i);
        // capacity checked above
        let _ = self.down_order.push(i as u8);
      }

      if !self.valid.contains(i) {
        continue;
      }

      let slot = &mut self.slots[i];
      slot.state = sample.state;
      if present {
        slot.x = sample.x;
        slot.y = sample.y;
      } else {
        self.dirty.set(i);
        self.valid.clear(i);
      }
    }

    self.scan_time = timestamp;
  }

  /// Drop slots that were reported lifted by the previous update.
  fn purge(&mut self) {
    for i in 0..MAX_SLOTS {
      if !self.dirty.contains(i) {
        continue;
      }

      let at = self.down_order.iter().position(|&id| id as usize == i);
      debug_assert!(at.is_some(), "dirty slot {} missing from down order", i);
      match at {
        Some(at) => {
          self.down_order.remove(at);
        }
        None => error!("dirty slot {} missing from down order", i),
      }
      self.dirty.clear(i);
    }
  }

  /// Slot ids in reporting order.
  pub fn down_order(&self) -> &[u8] {
    &self.down_order
  }

  pub fn down_count(&self) -> usize {
    self.down_order.len()
  }

  pub fn slot(&self, id: usize) -> Option<&FingerSlot> {
    self.slots.get(id)
  }

  /// Slots currently pressed.
  pub fn valid(&self) -> &SlotMask {
    &self.valid
  }

  /// Slots lifted in the last update, purged by the next one.
  pub fn dirty(&self) -> &SlotMask {
    &self.dirty
  }

  pub fn scan_time(&self) -> u64 {
    self.scan_time
  }
}
