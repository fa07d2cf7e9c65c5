use embedded_hal::i2c::{I2c, SevenBitAddress};

use crate::reg::PAGE_SELECT_ADDRESS;
use crate::{Error, Rmi4};

impl<I, E, T> Rmi4<I, T>
where
  I: I2c<SevenBitAddress, Error = E>,
{
  /// Map register page `page` into the 8-bit address space.
  ///
  /// Nothing is written when `page` is already active.
  pub(crate) fn change_page(&mut self, page: u8) -> Result<(), Error<E>> {
    if self.page == page {
      return Ok(());
    }
    self.write_bytes(PAGE_SELECT_ADDRESS, &[page])?;
    trace!("page {} -> {}", self.page, page);
    self.page = page;
    Ok(())
  }

  pub(crate) fn read_u8(&mut self, reg: u8) -> Result<u8, Error<E>> {
    let mut b = [0u8; 1];
    self.read_bytes(reg, &mut b)?;
    Ok(b[0])
  }

  pub(crate) fn read_bytes(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), Error<E>> {
    let addr = self.config.address;
    self.i2c.write_read(addr, &[reg], buf).map_err(Error::I2c)
  }

  pub(crate) fn write_bytes(&mut self, reg: u8, data: &[u8]) -> Result<(), Error<E>> {
    let len = data.len();
    if len > 31 {
      return Err(Error::BufferOverflow);
    }
    let mut buf = [0u8; 32];
    buf[0] = reg;
    buf[1..=len].copy_from_slice(data);
    let addr = self.config.address;
    self.i2c.write(addr, &buf[..=len]).map_err(Error::I2c)
  }
}
