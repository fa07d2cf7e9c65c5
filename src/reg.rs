/******************************************************************************
 * Synaptics RMI4 register interface: Page Description Table, function        *
 * numbers and the fixed layouts this driver depends on.                      *
 * ========================================================================== *
 *                          RMI4 - Registers & Memory Map                     *
*******************************************************************************/

/// Default 7-bit I²C address of RMI4 touch controllers.
pub const DEFAULT_I2C_ADDR: u8 = 0x20;

/// Writing a page number here maps that register page into addresses 0x00..=0xFE.
pub(crate) const PAGE_SELECT_ADDRESS: u8 = 0xFF;

/// Address of the topmost Page Description Table entry on every page.
pub(crate) const FIRST_FUNCTION_ADDRESS: u8 = 0xE9;
/// PDT entries are laid out downward from [`FIRST_FUNCTION_ADDRESS`].
pub(crate) const FUNCTION_DESCRIPTOR_LEN: u8 = 6;

/// Upper bound on the functions tracked in the [`crate::FunctionTable`].
pub const MAX_FUNCTIONS: usize = 10;
/// Number of hardware finger slots tracked by the cache.
pub const MAX_SLOTS: usize = 10;
/// Contacts carried by a single output report.
pub const REPORT_CAPACITY: usize = 5;

/// Largest presence blob accepted by the register descriptor decoder.
pub(crate) const MAX_PRESENCE_LEN: usize = 35;
/// Scratch capacity for one structure blob.
pub(crate) const MAX_STRUCTURE_LEN: usize = 256;
/// Logical registers kept per register descriptor.
pub const MAX_REGISTER_ITEMS: usize = 32;
/// Scratch capacity for one touch data packet.
pub(crate) const MAX_PACKET_LEN: usize = 256;

/// Bits addressable by a presence bitmap: every byte of a maximal blob after the size byte.
pub const PRESENCE_BITS: usize = (MAX_PRESENCE_LEN - 1) * 8;
/// Bits addressable by a sub-packet bitmap.
pub const SUBPACKET_BITS: usize = 37 * 8;

// F01 (device control)
pub(crate) const F01_DATA_LEN: usize = 2;
pub(crate) const F01_CTRL_LEN: usize = 5;
pub(crate) const F01_QUERY_LEN: usize = 21;

// F12 (2-D sensor) general query bits
pub(crate) const F12_HAS_REGISTER_DESCRIPTOR: u8 = 1 << 0;
pub(crate) const F12_HAS_DRIBBLE: u8 = 1 << 3;
/// Query, control and data descriptors each occupy three packet registers.
pub(crate) const F12_DESCRIPTOR_STRIDE: u8 = 3;
/// Bytes per object record in F12 data register 1.
pub(crate) const F12_DATA1_BYTES_PER_OBJ: usize = 8;

/// RMI4 function numbers (always written in hex in the RMI4 documentation).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FunctionNumber(pub u8);

impl FunctionNumber {
  /// Page terminator / empty PDT slot.
  pub const NONE: Self = Self(0x00);
  /// F01: device control, status and interrupt sources.
  pub const DEVICE_CONTROL: Self = Self(0x01);
  /// F11: legacy 2-D sensor.
  pub const SENSOR_2D_LEGACY: Self = Self(0x11);
  /// F12: 2-D sensor described by register descriptors.
  pub const SENSOR_2D: Self = Self(0x12);
  /// F1A: 0-D capacitive buttons.
  pub const CAP_BUTTONS: Self = Self(0x1A);
  /// F34: flash programming.
  pub const FLASH: Self = Self(0x34);
}

impl From<FunctionNumber> for u8 {
  #[inline]
  fn from(f: FunctionNumber) -> Self {
    f.0
  }
}

/// F12 data register 1 object classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ObjectType {
  None,
  Finger,
  Stylus,
  Palm,
  Unclassified,
  Other(u8),
}

impl ObjectType {
  pub const fn from_bits(bits: u8) -> Self {
    match bits {
      0x00 => Self::None,
      0x01 => Self::Finger,
      0x02 => Self::Stylus,
      0x03 => Self::Palm,
      0x04 => Self::Unclassified,
      other => Self::Other(other),
    }
  }

  /// Fingers and styli are reported as contacts; everything else is ignored.
  pub const fn is_contact(self) -> bool {
    matches!(self, Self::Finger | Self::Stylus)
  }
}
