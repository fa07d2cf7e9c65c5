//! In-memory RMI4 device for unit tests.
//!
//! Registers are plain memory per page unless a packet register is installed
//! at an address, in which case reads at that address return the queued packet
//! instead. Every write (including page selects) is logged.

use std::collections::VecDeque;
use std::vec::Vec;

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation, SevenBitAddress};

use crate::descriptor::tests::encode;
use crate::reg::PAGE_SELECT_ADDRESS;

const PAGES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FakeError;

impl embedded_hal::i2c::Error for FakeError {
  fn kind(&self) -> ErrorKind {
    ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)
  }
}

/// A logged register write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Op {
  pub page: u8,
  pub reg: u8,
  pub data: Vec<u8>,
}

impl Op {
  pub(crate) fn write(reg: u8, data: &[u8]) -> Self {
    Self::on(0, reg, data)
  }

  pub(crate) fn on(page: u8, reg: u8, data: &[u8]) -> Self {
    Self { page, reg, data: data.to_vec() }
  }
}

struct Packet {
  page: u8,
  reg: u8,
  queue: VecDeque<Vec<u8>>,
}

pub(crate) struct FakeDevice {
  page: u8,
  pointer: u8,
  memory: [[u8; 256]; PAGES],
  packets: Vec<Packet>,
  log: Vec<Op>,
  fail_reads: bool,
  fail_writes: bool,
  address: Option<u8>,
  reads: usize,
}

impl FakeDevice {
  pub(crate) fn new() -> Self {
    Self {
      page: 0,
      pointer: 0,
      memory: [[0; 256]; PAGES],
      packets: Vec::new(),
      log: Vec::new(),
      fail_reads: false,
      fail_writes: false,
      address: None,
      reads: 0,
    }
  }

  /// Store `bytes` in plain memory starting at `reg`.
  pub(crate) fn set(&mut self, page: u8, reg: u8, bytes: &[u8]) {
    let start = reg as usize;
    self.memory[page as usize][start..start + bytes.len()].copy_from_slice(bytes);
  }

  pub(crate) fn memory(&self, page: u8, reg: u8, len: usize) -> &[u8] {
    let start = reg as usize;
    &self.memory[page as usize][start..start + len]
  }

  /// Install a packet register that always reads back `bytes`.
  pub(crate) fn packet(&mut self, page: u8, reg: u8, bytes: &[u8]) {
    self.packets.retain(|p| !(p.page == page && p.reg == reg));
    self.queue(page, reg, bytes);
  }

  /// Queue another read result on a packet register. Each read pops one
  /// entry; the last entry is returned for every read after that.
  pub(crate) fn queue(&mut self, page: u8, reg: u8, bytes: &[u8]) {
    match self.packets.iter_mut().find(|p| p.page == page && p.reg == reg) {
      Some(p) => p.queue.push_back(bytes.to_vec()),
      None => self.packets.push(Packet { page, reg, queue: VecDeque::from([bytes.to_vec()]) }),
    }
  }

  /// Install a register descriptor at `reg`, `reg + 1` and `reg + 2`.
  pub(crate) fn descriptor(&mut self, page: u8, reg: u8, items: &[(u16, u32, &[u16])]) {
    let (presence, structure) = encode(items);
    self.packet(page, reg, &[presence.len() as u8]);
    self.packet(page, reg + 1, &presence);
    self.packet(page, reg + 2, &structure);
  }

  pub(crate) fn writes(&self) -> &[Op] {
    &self.log
  }

  pub(crate) fn writes_to(&self, reg: u8) -> Vec<&Op> {
    self.log.iter().filter(|op| op.reg == reg).collect()
  }

  pub(crate) fn clear_log(&mut self) {
    self.log.clear();
  }

  pub(crate) fn fail_reads(&mut self, fail: bool) {
    self.fail_reads = fail;
  }

  pub(crate) fn fail_writes(&mut self, fail: bool) {
    self.fail_writes = fail;
  }

  pub(crate) fn last_address(&self) -> Option<u8> {
    self.address
  }

  pub(crate) fn reads(&self) -> usize {
    self.reads
  }

  fn read(&mut self, buf: &mut [u8]) -> Result<(), FakeError> {
    if self.fail_reads {
      return Err(FakeError);
    }
    self.reads += 1;
    let (page, reg) = (self.page, self.pointer);

    if let Some(p) = self.packets.iter_mut().find(|p| p.page == page && p.reg == reg) {
      let bytes = if p.queue.len() > 1 { p.queue.pop_front().unwrap_or_default() } else { p.queue[0].clone() };
      buf.fill(0);
      let n = bytes.len().min(buf.len());
      buf[..n].copy_from_slice(&bytes[..n]);
      return Ok(());
    }

    let start = reg as usize;
    let end = (start + buf.len()).min(256);
    buf.fill(0);
    buf[..end - start].copy_from_slice(&self.memory[page as usize][start..end]);
    Ok(())
  }

  fn write(&mut self, bytes: &[u8]) -> Result<(), FakeError> {
    let Some((&reg, data)) = bytes.split_first() else {
      return Ok(());
    };
    self.pointer = reg;
    if data.is_empty() {
      return Ok(());
    }
    if self.fail_writes {
      return Err(FakeError);
    }

    self.log.push(Op::on(self.page, reg, data));
    if reg == PAGE_SELECT_ADDRESS {
      self.page = data[0];
    } else {
      self.set(self.page, reg, data);
    }
    Ok(())
  }
}

impl ErrorType for FakeDevice {
  type Error = FakeError;
}

impl I2c<SevenBitAddress> for FakeDevice {
  fn transaction(&mut self, address: SevenBitAddress, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
    self.address = Some(address);
    for op in operations {
      match op {
        Operation::Write(bytes) => self.write(bytes)?,
        Operation::Read(buf) => self.read(buf)?,
      }
    }
    Ok(())
  }
}

// A touchpad with F34, F01 and F12 on page 0 and F1A on page 1.
//
// interrupt bits: F34 0, F01 1, F12 2-3, F1A 4
pub(crate) const F01_QUERY: u8 = 0x50;
pub(crate) const F01_CTRL: u8 = 0x3A;
pub(crate) const F01_DATA: u8 = 0x13;
pub(crate) const F12_QUERY: u8 = 0x20;
pub(crate) const F12_CTRL: u8 = 0x40;
pub(crate) const F12_DATA: u8 = 0x06;
pub(crate) const F01_IRQ: u8 = 0x02;
pub(crate) const F12_IRQ: u8 = 0x0C;
pub(crate) const F1A_IRQ: u8 = 0x10;

/// Header bytes in front of the finger records.
pub(crate) const PAYLOAD_OFFSET: usize = 1;
pub(crate) const FINGERS: usize = 10;
/// Header, ten 8-byte records and a trailing 2-byte register.
pub(crate) const PACKET_LEN: usize = PAYLOAD_OFFSET + FINGERS * 8 + 2;

/// Device status byte: code in bits 0-3, flash programming bit 6, unconfigured bit 7.
pub(crate) const STATUS_OK: u8 = 0x00;
pub(crate) const STATUS_UNCONFIGURED: u8 = 0x80;
pub(crate) const STATUS_FLASH_PROG: u8 = 0x40;

pub(crate) fn pdt_entry(query: u8, command: u8, control: u8, data: u8, irqs: u8, number: u8) -> [u8; 6] {
  [query, command, control, data, irqs & 0x07, number]
}

impl FakeDevice {
  pub(crate) fn touchpad() -> Self {
    let mut dev = Self::new();
    dev.set(0, 0xE9, &pdt_entry(0x60, 0x5F, 0x5E, 0x12, 1, 0x34));
    dev.set(0, 0xE3, &pdt_entry(F01_QUERY, 0x4F, F01_CTRL, F01_DATA, 1, 0x01));
    dev.set(0, 0xDD, &pdt_entry(F12_QUERY, 0x00, F12_CTRL, F12_DATA, 2, 0x12));
    dev.set(1, 0xE9, &pdt_entry(0x10, 0x00, 0x11, 0x12, 1, 0x1A));

    let mut query = [0u8; 21];
    query[0] = 0x01; // Synaptics
    query[1] = 0x03;
    query[2..4].copy_from_slice(&[0x21, 0x03]);
    query[4..7].copy_from_slice(&[25, 6, 14]);
    query[7..9].copy_from_slice(&[0x81, 0x01]);
    query[9..11].copy_from_slice(&[0x05, 0x02]);
    query[11..21].copy_from_slice(b"TM3276-001");
    dev.set(0, F01_QUERY, &query);

    dev.set(0, F12_QUERY, &[0x01 | 0x08]);
    dev.descriptor(0, F12_QUERY + 1, &[(0, 1, &[0]), (5, 4, &[0])]);
    dev.descriptor(0, F12_QUERY + 4, &[(8, 14, &[0, 1]), (20, 3, &[0])]);
    let fingers: Vec<u16> = (0..FINGERS as u16).collect();
    dev.descriptor(0, F12_QUERY + 7, &[(0, PAYLOAD_OFFSET as u32, &[0]), (1, (FINGERS * 8) as u32, &fingers), (2, 2, &[0])]);

    dev.status(STATUS_OK, 0);
    dev.touch(&[]);
    dev
  }

  /// Replace the F01 status/interrupt record.
  pub(crate) fn status(&mut self, status: u8, irq: u8) {
    self.packet(0, F01_DATA, &[status, irq]);
  }

  /// Queue another F01 status/interrupt record.
  pub(crate) fn queue_status(&mut self, status: u8, irq: u8) {
    self.queue(0, F01_DATA, &[status, irq]);
  }

  /// Replace the F12 touch packet with `(slot, object type, x, y)` records.
  pub(crate) fn touch(&mut self, contacts: &[(usize, u8, u16, u16)]) {
    let packet = touch_packet(contacts);
    self.packet(0, F12_DATA, &packet);
  }
}

pub(crate) fn touch_packet(contacts: &[(usize, u8, u16, u16)]) -> Vec<u8> {
  let mut packet = std::vec![0u8; PACKET_LEN];
  for &(slot, ty, x, y) in contacts {
    let at = PAYLOAD_OFFSET + slot * 8;
    packet[at] = ty;
    packet[at + 1..at + 3].copy_from_slice(&x.to_le_bytes());
    packet[at + 3..at + 5].copy_from_slice(&y.to_le_bytes());
  }
  packet
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FakePinError;

impl embedded_hal::digital::Error for FakePinError {
  fn kind(&self) -> embedded_hal::digital::ErrorKind {
    embedded_hal::digital::ErrorKind::Other
  }
}

/// Attention line that is always asserted, or always fails.
pub(crate) struct FakeAttn {
  fail: bool,
  waits: usize,
}

impl FakeAttn {
  pub(crate) fn new() -> Self {
    Self { fail: false, waits: 0 }
  }

  pub(crate) fn failing() -> Self {
    Self { fail: true, waits: 0 }
  }

  pub(crate) fn waits(&self) -> usize {
    self.waits
  }

  fn edge(&mut self) -> Result<(), FakePinError> {
    self.waits += 1;
    if self.fail {
      Err(FakePinError)
    } else {
      Ok(())
    }
  }
}

impl embedded_hal::digital::ErrorType for FakeAttn {
  type Error = FakePinError;
}

impl embedded_hal_async::digital::Wait for FakeAttn {
  async fn wait_for_high(&mut self) -> Result<(), Self::Error> {
    self.edge()
  }

  async fn wait_for_low(&mut self) -> Result<(), Self::Error> {
    self.edge()
  }

  async fn wait_for_rising_edge(&mut self) -> Result<(), Self::Error> {
    self.edge()
  }

  async fn wait_for_falling_edge(&mut self) -> Result<(), Self::Error> {
    self.edge()
  }

  async fn wait_for_any_edge(&mut self) -> Result<(), Self::Error> {
    self.edge()
  }
}
