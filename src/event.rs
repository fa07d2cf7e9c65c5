use embedded_hal::i2c::{I2c, SevenBitAddress};

use crate::cursor::Cursor;
use crate::reg::{FunctionNumber, ObjectType, F12_DATA1_BYTES_PER_OBJ, MAX_PACKET_LEN, MAX_SLOTS};
use crate::{DecodeError, Error, Rmi4};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FingerState {
  #[default]
  NotPresent,
  Present,
}

impl FingerState {
  pub const fn is_present(self) -> bool {
    matches!(self, Self::Present)
  }
}

/// One hardware finger slot as read from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FingerSample {
  pub state: FingerState,
  pub x: u16,
  pub y: u16,
}

impl FingerSample {
  pub const fn present(x: u16, y: u16) -> Self {
    Self { state: FingerState::Present, x, y }
  }

  pub const fn lifted(x: u16, y: u16) -> Self {
    Self { state: FingerState::NotPresent, x, y }
  }
}

/// Every finger slot from one touch packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TouchFrame {
  pub samples: [FingerSample; MAX_SLOTS],
}

impl TouchFrame {
  /// Decode a raw F12 data packet.
  ///
  /// Finger records start at `payload_offset` and are 8 bytes apart: object
  /// type, X and Y as little-endian `u16`s, then padding. Only the first
  /// `max_fingers` records are read; later slots stay not present.
  pub fn parse(packet: &[u8], payload_offset: usize, max_fingers: usize) -> Result<Self, DecodeError> {
    if payload_offset >= packet.len() {
      return Err(DecodeError::NoDataAvailable);
    }

    let mut cursor = Cursor::new(packet);
    cursor.skip(payload_offset)?;

    let mut frame = Self::default();
    for sample in frame.samples.iter_mut().take(max_fingers) {
      let mut record = Cursor::new(cursor.take(F12_DATA1_BYTES_PER_OBJ)?);
      let kind = ObjectType::from_bits(record.u8()?);
      let x = record.u16_le()?;
      let y = record.u16_le()?;

      sample.state = if kind.is_contact() { FingerState::Present } else { FingerState::NotPresent };
      sample.x = x;
      sample.y = y;
    }

    Ok(frame)
  }

  /// Number of slots reported present.
  pub fn present(&self) -> usize {
    self.samples.iter().filter(|s| s.state.is_present()).count()
  }
}

impl<I, E, T> Rmi4<I, T>
where
  I: I2c<SevenBitAddress, Error = E>,
{
  /// Read one touch packet from the 2-D sensor.
  pub fn read_touch_frame(&mut self) -> Result<TouchFrame, Error<E>> {
    let (packet_size, payload_offset, max_fingers) = match &self.layout {
      Some(layout) => (layout.packet_size, layout.payload_offset, layout.max_fingers),
      None => return Err(Error::InvalidDeviceState),
    };
    let sensor = *self.functions.find(FunctionNumber::SENSOR_2D).ok_or_else(|| {
      error!("2-D sensor function missing");
      Error::InvalidDeviceState
    })?;
    self.change_page(sensor.page)?;

    if packet_size > MAX_PACKET_LEN {
      error!("touch packet of {} bytes exceeds {}", packet_size, MAX_PACKET_LEN);
      return Err(Error::ResourceExhausted);
    }
    let mut packet = [0u8; MAX_PACKET_LEN];
    let packet = &mut packet[..packet_size];
    self.read_bytes(sensor.data_base, packet)?;

    let frame = TouchFrame::parse(packet, payload_offset, max_fingers)?;
    trace!("{} fingers present", frame.present());
    Ok(frame)
  }
}
