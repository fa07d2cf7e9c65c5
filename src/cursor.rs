use crate::DecodeError;

/// Bounded reader over a byte buffer received from the device.
///
/// Every read checks the remaining length first and fails with
/// [`DecodeError::InvalidSchema`] instead of reading past the end.
pub(crate) struct Cursor<'a> {
  buf: &'a [u8],
  pos: usize,
}

impl<'a> Cursor<'a> {
  pub(crate) const fn new(buf: &'a [u8]) -> Self {
    Self { buf, pos: 0 }
  }

  pub(crate) const fn remaining(&self) -> usize {
    self.buf.len() - self.pos
  }

  pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
    if n > self.remaining() {
      return Err(DecodeError::InvalidSchema);
    }
    let out = &self.buf[self.pos..self.pos + n];
    self.pos += n;
    Ok(out)
  }

  pub(crate) fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
    self.take(n).map(|_| ())
  }

  pub(crate) fn u8(&mut self) -> Result<u8, DecodeError> {
    Ok(self.take(1)?[0])
  }

  pub(crate) fn u16_le(&mut self) -> Result<u16, DecodeError> {
    let b = self.take(2)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
  }

  pub(crate) fn u32_le(&mut self) -> Result<u32, DecodeError> {
    let b = self.take(4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
  }

  pub(crate) fn rest(&mut self) -> &'a [u8] {
    let out = &self.buf[self.pos..];
    self.pos = self.buf.len();
    out
  }
}
