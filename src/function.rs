//! Page Description Table walk.
//!
//! Every register page carries a table of 6-byte function descriptors laid out
//! downward from [`FIRST_FUNCTION_ADDRESS`]. A function number of zero ends the
//! page; a zero at the very first address ends discovery.

use bitfield_struct::bitfield;
use embedded_hal::i2c::{I2c, SevenBitAddress};
use heapless::Vec;

use crate::reg::{FunctionNumber, FIRST_FUNCTION_ADDRESS, FUNCTION_DESCRIPTOR_LEN, MAX_FUNCTIONS};
use crate::{Error, Rmi4};

/// Fifth byte of a PDT entry.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) struct FunctionInfo {
  #[bits(3)]
  pub(crate) interrupt_sources: u8,
  #[bits(2)]
  __: u8,
  #[bits(2)]
  pub(crate) version: u8,
  ___: bool,
}

/// One entry of the Page Description Table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FunctionDescriptor {
  pub number: FunctionNumber,
  pub query_base: u8,
  pub command_base: u8,
  pub control_base: u8,
  pub data_base: u8,
  /// Interrupt status bits owned by this function.
  pub interrupt_sources: u8,
  pub version: u8,
  /// Register page the base addresses refer to.
  pub page: u8,
  /// This function's bits within the first interrupt status byte.
  pub irq_mask: u8,
}

impl FunctionDescriptor {
  fn from_raw(raw: [u8; FUNCTION_DESCRIPTOR_LEN as usize], page: u8) -> Self {
    let info = FunctionInfo::from(raw[4]);
    Self {
      number: FunctionNumber(raw[5]),
      query_base: raw[0],
      command_base: raw[1],
      control_base: raw[2],
      data_base: raw[3],
      interrupt_sources: info.interrupt_sources(),
      version: info.version(),
      page,
      irq_mask: 0,
    }
  }
}

/// Functions in discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FunctionTable {
  functions: Vec<FunctionDescriptor, MAX_FUNCTIONS>,
}

impl FunctionTable {
  pub const fn new() -> Self {
    Self { functions: Vec::new() }
  }

  pub fn find(&self, number: FunctionNumber) -> Option<&FunctionDescriptor> {
    self.functions.iter().find(|f| f.number == number)
  }

  pub fn contains(&self, number: FunctionNumber) -> bool {
    self.find(number).is_some()
  }

  pub fn iter(&self) -> impl Iterator<Item = &FunctionDescriptor> {
    self.functions.iter()
  }

  pub fn len(&self) -> usize {
    self.functions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.functions.is_empty()
  }

  /// Union of the interrupt masks of every function in `numbers`.
  pub fn irq_mask(&self, numbers: &[FunctionNumber]) -> u8 {
    self.iter().filter(|f| numbers.contains(&f.number)).fold(0, |mask, f| mask | f.irq_mask)
  }
}

/// Bits `start..start + count` of the interrupt status register, restricted
/// to its first byte.
const fn irq_run_mask(start: usize, count: usize) -> u8 {
  if start >= 8 {
    return 0;
  }
  let end = if start + count > 8 { 8 } else { start + count };
  ((1u16 << end) - (1u16 << start)) as u8
}

impl<I, E, T> Rmi4<I, T>
where
  I: I2c<SevenBitAddress, Error = E>,
{
  /// Walk the Page Description Table across pages and record every function.
  pub fn build_function_table(&mut self) -> Result<(), Error<E>> {
    let mut table = FunctionTable::new();
    let mut address = FIRST_FUNCTION_ADDRESS;
    let mut page = 0u8;
    let mut irq_base = 0usize;

    self.change_page(page)?;

    while address > 0 && table.len() < MAX_FUNCTIONS {
      let mut raw = [0u8; FUNCTION_DESCRIPTOR_LEN as usize];
      self.read_bytes(address, &mut raw)?;
      let mut function = FunctionDescriptor::from_raw(raw, page);

      if function.number == FunctionNumber::NONE {
        if address == FIRST_FUNCTION_ADDRESS {
          debug!("discovered {} functions", table.len());
          self.functions = table;
          return Ok(());
        }
        page = page.checked_add(1).ok_or(Error::MissingTerminator)?;
        self.change_page(page)?;
        address = FIRST_FUNCTION_ADDRESS;
        continue;
      }

      let sources = function.interrupt_sources as usize;
      function.irq_mask = irq_run_mask(irq_base, sources);
      irq_base += sources;

      trace!("function {:#x} on page {} irq {:#x}", function.number.0, page, function.irq_mask);
      // table.len() < MAX_FUNCTIONS holds inside the loop
      let _ = table.functions.push(function);

      address = match address.checked_sub(FUNCTION_DESCRIPTOR_LEN) {
        Some(next) => next,
        None => break,
      };
    }

    if table.len() >= MAX_FUNCTIONS {
      error!("more than {} functions", MAX_FUNCTIONS);
      return Err(Error::TooManyFunctions);
    }
    error!("no terminator, address down to {}", address);
    Err(Error::MissingTerminator)
  }
}
