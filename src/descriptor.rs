//! RMI4 register descriptors.
//!
//! Functions such as F12 do not have a fixed register map. Instead the query
//! space holds descriptors made of three packet registers:
//!
//! 1. presence size: length of the presence blob
//! 2. presence blob: structure size, then a bitmap of implemented registers
//! 3. structure blob: per implemented register, its size and sub-packet bitmap
//!
//! Integer fields use zero escalation: a zero byte means the real value follows
//! in a wider little-endian field.

use embedded_hal::i2c::{I2c, SevenBitAddress};
use heapless::Vec;

use crate::bitset::{PresenceMap, SubPacketMap};
use crate::cursor::Cursor;
use crate::reg::{MAX_PRESENCE_LEN, MAX_REGISTER_ITEMS, MAX_STRUCTURE_LEN, PRESENCE_BITS, SUBPACKET_BITS};
use crate::{DecodeError, Error, Rmi4};

/// Continuation flag of a sub-packet bitmap byte.
const SUBPACKET_CONTINUES: u8 = 0x80;
const SUBPACKET_BITS_PER_BYTE: usize = 7;

/// One logical register described by a [`RegisterDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterDescriptorItem {
  /// Logical register id, the item's position in the presence bitmap.
  pub register: u16,
  /// Register size in bytes.
  pub size: u32,
  pub sub_packets: SubPacketMap,
  pub sub_packet_count: u16,
}

/// Decoded table of the logical registers a function implements.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterDescriptor {
  pub struct_size: u16,
  pub presence: PresenceMap,
  pub items: Vec<RegisterDescriptorItem, MAX_REGISTER_ITEMS>,
}

impl RegisterDescriptor {
  /// Decode a descriptor from its presence blob and structure blob.
  ///
  /// `structure` must hold at least the structure size announced by the
  /// presence blob; bytes past it are ignored.
  pub fn parse(presence: &[u8], structure: &[u8]) -> Result<Self, DecodeError> {
    let (struct_size, presence) = parse_presence(presence)?;

    let count = presence.population_count(PRESENCE_BITS);
    if count > MAX_REGISTER_ITEMS {
      return Err(DecodeError::ResourceExhausted);
    }

    let structure = structure.get(..struct_size as usize).ok_or(DecodeError::InvalidSchema)?;
    let mut cursor = Cursor::new(structure);
    let mut items = Vec::new();

    for register in presence.iter_set(PRESENCE_BITS) {
      let size = read_escalated(&mut cursor)?;
      let sub_packets = read_sub_packets(&mut cursor)?;
      let item = RegisterDescriptorItem {
        register: register as u16,
        size,
        sub_packets,
        sub_packet_count: sub_packets.population_count(SUBPACKET_BITS) as u16,
      };
      trace!("reg: {} size: {} subpackets: {}", item.register, item.size, item.sub_packet_count);
      items.push(item).map_err(|_| DecodeError::ResourceExhausted)?;
    }

    Ok(Self { struct_size, presence, items })
  }

  /// Look up an item by logical register id.
  pub fn item(&self, register: u16) -> Option<&RegisterDescriptorItem> {
    self.items.iter().find(|item| item.register == register)
  }

  /// Combined size of every described register, i.e. the size of one packet
  /// read across the whole register block. `None` when the sizes overflow.
  pub fn total_size(&self) -> Option<usize> {
    let total = self.items.iter().try_fold(0u32, |total, item| total.checked_add(item.size))?;
    usize::try_from(total).ok()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

/// Split a presence blob into the structure size and the presence bitmap.
/// An empty blob describes no registers.
fn parse_presence(blob: &[u8]) -> Result<(u16, PresenceMap), DecodeError> {
  if blob.len() > MAX_PRESENCE_LEN {
    return Err(DecodeError::InvalidSchema);
  }
  if blob.is_empty() {
    return Ok((0, PresenceMap::new()));
  }

  let mut cursor = Cursor::new(blob);
  let struct_size = match cursor.u8()? {
    0 => cursor.u16_le()?,
    size => u16::from(size),
  };

  let mut map = PresenceMap::new();
  for (i, byte) in cursor.rest().iter().enumerate() {
    for bit in 0..8 {
      if byte & (1 << bit) != 0 {
        map.set_run(i * 8 + bit, 1);
      }
    }
  }

  Ok((struct_size, map))
}

/// 1 byte; zero means 2 bytes follow; zero again means 4 bytes follow.
fn read_escalated(cursor: &mut Cursor<'_>) -> Result<u32, DecodeError> {
  let size = cursor.u8()?;
  if size != 0 {
    return Ok(u32::from(size));
  }
  let size = cursor.u16_le()?;
  if size != 0 {
    return Ok(u32::from(size));
  }
  cursor.u32_le()
}

/// Bytes contribute 7 bitmap bits each while their high bit is set. The loop
/// is bounded by the structure blob, and bits beyond the map capacity are
/// rejected rather than dropped. A blob that ends right where the bitmap would
/// start describes a register without sub-packets.
fn read_sub_packets(cursor: &mut Cursor<'_>) -> Result<SubPacketMap, DecodeError> {
  let mut map = SubPacketMap::new();
  let mut offset = 0;

  if cursor.remaining() == 0 {
    return Ok(map);
  }

  loop {
    let byte = cursor.u8()?;
    for bit in 0..SUBPACKET_BITS_PER_BYTE {
      if byte & (1 << bit) != 0 {
        if offset + bit >= SUBPACKET_BITS {
          return Err(DecodeError::InvalidSchema);
        }
        map.set_run(offset + bit, 1);
      }
    }
    offset += SUBPACKET_BITS_PER_BYTE;

    if byte & SUBPACKET_CONTINUES == 0 {
      return Ok(map);
    }
  }
}

impl<I, E, T> Rmi4<I, T>
where
  I: I2c<SevenBitAddress, Error = E>,
{
  /// Read and decode the register descriptor whose presence-size register is
  /// at `address` on the active page.
  pub fn read_register_descriptor(&mut self, address: u8) -> Result<RegisterDescriptor, Error<E>> {
    let size = self.read_u8(address)? as usize;
    if size == 0 {
      trace!("empty register descriptor at {=u8:#x}", address);
      return Ok(RegisterDescriptor::default());
    }
    if size > MAX_PRESENCE_LEN {
      error!("presence size {} exceeds {}", size, MAX_PRESENCE_LEN);
      return Err(Error::InvalidSchema);
    }

    let mut presence = [0u8; MAX_PRESENCE_LEN];
    self.read_bytes(address.wrapping_add(1), &mut presence[..size])?;

    let struct_size = match presence[0] {
      0 if size < 3 => return Err(Error::InvalidSchema),
      0 => u16::from_le_bytes([presence[1], presence[2]]) as usize,
      n => n as usize,
    };

    let mut structure: Vec<u8, MAX_STRUCTURE_LEN> = Vec::new();
    structure.resize(struct_size, 0).map_err(|_| Error::ResourceExhausted)?;
    if struct_size > 0 {
      self.read_bytes(address.wrapping_add(2), &mut structure)?;
    }

    Ok(RegisterDescriptor::parse(&presence[..size], &structure)?)
  }
}
