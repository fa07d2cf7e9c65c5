//! Multi-touch reports.
//!
//! One poll may leave more contacts in the cache than fit in a report. The
//! caller keeps a [`ReportCursor`] and keeps filling reports until it is
//! drained; only the first report of a poll carries the total contact count.

use bitfield_struct::bitfield;

use crate::cache::FingerCache;
use crate::reg::REPORT_CAPACITY;

/// Report id of the multi-touch input report.
pub const REPORT_ID_MULTITOUCH: u8 = 0x01;
/// Serialized size of a [`Report`].
pub const REPORT_LEN: usize = 1 + REPORT_CAPACITY * CONTACT_LEN + 2 + 1 + 1;

const CONTACT_LEN: usize = 5;

/// Maps controller coordinates to display coordinates.
pub trait Translate {
  fn translate(&self, x: u16, y: u16) -> (u16, u16);
}

impl<F> Translate for F
where
  F: Fn(u16, u16) -> (u16, u16),
{
  fn translate(&self, x: u16, y: u16) -> (u16, u16) {
    self(x, y)
  }
}

/// Reports controller coordinates unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Passthrough;

impl Translate for Passthrough {
  fn translate(&self, x: u16, y: u16) -> (u16, u16) {
    (x, y)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Contact {
  /// Hardware slot id. The wire format keeps only the low 3 bits, so slots 8
  /// and 9 serialize as 0 and 1.
  pub id: u8,
  pub confidence: bool,
  /// The finger is still down; clear on the report of a lift.
  pub tip_switch: bool,
  pub x: u16,
  pub y: u16,
}

/// Flags byte of a serialized contact.
#[bitfield(u8)]
struct ContactFlags {
  confidence: bool,
  tip_switch: bool,
  #[bits(3)]
  id: u8,
  #[bits(3)]
  __: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Report {
  pub report_id: u8,
  pub contacts: heapless::Vec<Contact, REPORT_CAPACITY>,
  /// Scan timestamp truncated to 16 bits.
  pub scan_time: u16,
  /// Contacts in this poll on the first report, zero on the rest.
  pub contact_count: u8,
  pub button: bool,
}

impl Report {
  /// Wire layout: report id, five contacts of flags (confidence bit 0, tip
  /// switch bit 1, id bits 2-4) and little-endian X and Y, little-endian scan
  /// time, contact count, button. Unused contacts are zero.
  ///
  /// Contact ids are truncated to 3 bits; slots 8 and 9 share ids with slots 0
  /// and 1 on the wire.
  pub fn to_bytes(&self) -> [u8; REPORT_LEN] {
    let mut out = [0u8; REPORT_LEN];
    out[0] = self.report_id;

    for (i, contact) in self.contacts.iter().enumerate() {
      let at = 1 + i * CONTACT_LEN;
      let flags = ContactFlags::new()
        .with_confidence(contact.confidence)
        .with_tip_switch(contact.tip_switch)
        .with_id(contact.id & 0x07);
      out[at] = flags.into();
      out[at + 1..at + 3].copy_from_slice(&contact.x.to_le_bytes());
      out[at + 3..at + 5].copy_from_slice(&contact.y.to_le_bytes());
    }

    let tail = 1 + REPORT_CAPACITY * CONTACT_LEN;
    out[tail..tail + 2].copy_from_slice(&self.scan_time.to_le_bytes());
    out[tail + 2] = self.contact_count;
    out[tail + 3] = u8::from(self.button);
    out
  }
}

/// Drain position within one poll's contacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReportCursor {
  pub reported: usize,
  pub total: usize,
}

impl ReportCursor {
  pub const fn new(total: usize) -> Self {
    Self { reported: 0, total }
  }

  /// More contacts remain to be reported for this poll.
  pub const fn pending(&self) -> bool {
    self.reported < self.total
  }
}

/// Fill the next report from the cache's down order, advancing `cursor`.
pub fn fill_next_report<T: Translate + ?Sized>(cache: &FingerCache, cursor: &mut ReportCursor, translate: &T) -> Report {
  let mut report = Report {
    report_id: REPORT_ID_MULTITOUCH,
    scan_time: (cache.scan_time() & 0xFFFF) as u16,
    contact_count: if cursor.reported == 0 { cursor.total as u8 } else { 0 },
    ..Report::default()
  };

  let count = cursor.total.saturating_sub(cursor.reported).min(REPORT_CAPACITY);
  for &id in cache.down_order().iter().skip(cursor.reported).take(count) {
    let Some(slot) = cache.slot(id as usize) else {
      continue;
    };
    let (x, y) = translate.translate(slot.x, slot.y);
    // at most REPORT_CAPACITY contacts are taken
    let _ = report.contacts.push(Contact { id, confidence: true, tip_switch: slot.state.is_present(), x, y });
  }
  cursor.reported += count;

  report
}
