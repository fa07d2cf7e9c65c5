use bitfield_struct::bitfield;
use embedded_hal::i2c::{I2c, SevenBitAddress};

use crate::reg::{FunctionNumber, F01_DATA_LEN, F01_QUERY_LEN};
use crate::{Error, Rmi4};

/// First F01 data register.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceStatus {
  #[bits(4)]
  pub code: StatusCode,
  #[bits(2)]
  __: u8,
  /// Bootloader mode; the device accepts no configuration.
  pub flash_prog: bool,
  /// The device lost its configuration, usually after a reset.
  pub unconfigured: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusCode {
  NoError,
  ResetOccurred,
  InvalidConfiguration,
  DeviceFailure,
  Unknown(u8),
}

impl StatusCode {
  pub const fn into_bits(self) -> u8 {
    match self {
      Self::NoError => 0,
      Self::ResetOccurred => 1,
      Self::InvalidConfiguration => 2,
      Self::DeviceFailure => 3,
      Self::Unknown(code) => code,
    }
  }

  pub const fn from_bits(bits: u8) -> Self {
    match bits {
      0 => Self::NoError,
      1 => Self::ResetOccurred,
      2 => Self::InvalidConfiguration,
      3 => Self::DeviceFailure,
      other => Self::Unknown(other),
    }
  }
}

/// Sticky record of abnormal device status codes.
///
/// None of these abort servicing; they are kept for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Diagnostics {
  pub reset_occurred: bool,
  pub invalid_configuration: bool,
  pub device_failure: bool,
  /// Most recent status code outside the documented set.
  pub unknown_status: Option<u8>,
}

impl Diagnostics {
  pub(crate) fn record(&mut self, code: StatusCode) {
    match code {
      StatusCode::NoError => {}
      StatusCode::ResetOccurred => {
        info!("device reset");
        self.reset_occurred = true;
      }
      StatusCode::InvalidConfiguration => {
        error!("status code 2: invalid configuration");
        self.invalid_configuration = true;
      }
      StatusCode::DeviceFailure => {
        error!("status code 3: device failure");
        self.device_failure = true;
      }
      StatusCode::Unknown(code) => {
        error!("unknown status code {}", code);
        self.unknown_status = Some(code);
      }
    }
  }
}

/// Device identity from the F01 query registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProductInfo {
  pub manufacturer_id: u8,
  pub properties: u8,
  pub product_info: [u8; 2],
  /// Build date, years since 2000.
  pub year: u8,
  pub month: u8,
  pub day: u8,
  pub tester_id: u16,
  pub serial_number: u16,
  /// ASCII product id, NUL padded.
  pub product_id: [u8; 10],
}

impl ProductInfo {
  pub fn from_bytes(buf: &[u8; F01_QUERY_LEN]) -> Self {
    let mut product_id = [0u8; 10];
    product_id.copy_from_slice(&buf[11..21]);
    Self {
      manufacturer_id: buf[0],
      properties: buf[1],
      product_info: [buf[2], buf[3]],
      year: buf[4] & 0x1F,
      month: buf[5] & 0x0F,
      day: buf[6] & 0x1F,
      tester_id: u16::from(buf[7] & 0x7F) | u16::from(buf[8] & 0x7F) << 7,
      serial_number: u16::from(buf[9] & 0x7F) | u16::from(buf[10] & 0x7F) << 7,
      product_id,
    }
  }

  /// Product id up to the first NUL, if it is valid UTF-8.
  pub fn product_id_str(&self) -> Option<&str> {
    let end = self.product_id.iter().position(|&b| b == 0).unwrap_or(self.product_id.len());
    core::str::from_utf8(&self.product_id[..end]).ok()
  }
}

impl<I, E, T> Rmi4<I, T>
where
  I: I2c<SevenBitAddress, Error = E>,
{
  /// Read and classify the device status, returning the interrupt status byte.
  ///
  /// Abnormal status codes are recorded in [`Diagnostics`]. A device that lost
  /// its configuration is reconfigured before returning.
  pub fn check_interrupts(&mut self) -> Result<u8, Error<E>> {
    let control = *self.functions.find(FunctionNumber::DEVICE_CONTROL).ok_or_else(|| {
      error!("device control function missing");
      Error::InvalidDeviceState
    })?;
    self.change_page(control.page)?;

    let mut data = [0u8; F01_DATA_LEN];
    self.read_bytes(control.data_base, &mut data)?;
    let status = DeviceStatus::from(data[0]);
    let irq = data[1];

    self.diagnostics.record(status.code());

    if status.flash_prog() {
      error!("device in flash programming mode");
      return Err(Error::ProgrammingMode);
    }

    if status.unconfigured() {
      warn!("device unconfigured, reconfiguring");
      self.configure()?;
    }

    if irq == 0 {
      warn!("interrupt with no cause");
    }
    Ok(irq)
  }

  pub fn read_product_info(&mut self) -> Result<ProductInfo, Error<E>> {
    let control = *self.functions.find(FunctionNumber::DEVICE_CONTROL).ok_or(Error::InvalidDeviceState)?;
    self.change_page(control.page)?;

    let mut buf = [0u8; F01_QUERY_LEN];
    self.read_bytes(control.query_base, &mut buf)?;
    let info = ProductInfo::from_bytes(&buf);
    debug!("manufacturer {} product {=[u8]:a}", info.manufacturer_id, &info.product_id[..]);
    Ok(info)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fake::{FakeDevice, FakeError, F01_CTRL, STATUS_FLASH_PROG, STATUS_OK, STATUS_UNCONFIGURED};
  use crate::Config;

  fn discovered(dev: FakeDevice) -> Rmi4<FakeDevice> {
    let mut rmi = Rmi4::new(dev, Config::default());
    rmi.build_function_table().expect("discovery");
    rmi
  }

  #[test]
  fn status_byte_layout() {
    let status = DeviceStatus::from(0b1100_0011);
    assert_eq!(status.code(), StatusCode::DeviceFailure);
    assert!(status.flash_prog());
    assert!(status.unconfigured());
    assert_eq!(DeviceStatus::from(0x0A).code(), StatusCode::Unknown(10));
  }

  #[test]
  fn returns_interrupt_byte() {
    let mut dev = FakeDevice::touchpad();
    dev.status(STATUS_OK, 0x0C);
    let mut rmi = discovered(dev);
    assert_eq!(rmi.check_interrupts(), Ok(0x0C));
    assert_eq!(rmi.diagnostics(), &Diagnostics::default());
  }

  #[test]
  fn zero_interrupt_byte_is_not_an_error() {
    let mut rmi = discovered(FakeDevice::touchpad());
    assert_eq!(rmi.check_interrupts(), Ok(0));
  }

  #[test]
  fn status_codes_are_sticky() {
    let mut dev = FakeDevice::touchpad();
    dev.status(0x01, 0x02);
    dev.queue_status(0x02, 0x02);
    dev.queue_status(0x07, 0x02);
    dev.queue_status(0x00, 0x02);
    let mut rmi = discovered(dev);

    for _ in 0..4 {
      assert_eq!(rmi.check_interrupts(), Ok(0x02));
    }
    let diag = rmi.diagnostics();
    assert!(diag.reset_occurred);
    assert!(diag.invalid_configuration);
    assert!(!diag.device_failure);
    assert_eq!(diag.unknown_status, Some(7));
  }

  #[test]
  fn programming_mode_aborts() {
    let mut dev = FakeDevice::touchpad();
    dev.status(STATUS_FLASH_PROG, 0x01);
    dev.queue_status(STATUS_OK, 0x01);
    let mut rmi = discovered(dev);

    assert_eq!(rmi.check_interrupts(), Err(Error::<FakeError>::ProgrammingMode));
    // not sticky
    assert_eq!(rmi.check_interrupts(), Ok(0x01));
  }

  #[test]
  fn unconfigured_device_is_reconfigured() {
    let mut dev = FakeDevice::touchpad();
    dev.status(STATUS_UNCONFIGURED | 0x01, 0x0C);
    let mut rmi = discovered(dev);
    rmi.i2c.clear_log();

    assert_eq!(rmi.check_interrupts(), Ok(0x0C));
    assert!(rmi.layout().is_some());
    assert!(rmi.diagnostics().reset_occurred);
    assert_eq!(rmi.i2c.writes_to(F01_CTRL).len(), 1);
    assert_eq!(rmi.i2c.memory(0, F01_CTRL, 5), &[0x80, 0xFF, 10, 20, 5]);
  }

  #[test]
  fn failed_reconfiguration_is_surfaced() {
    let mut dev = FakeDevice::touchpad();
    dev.status(STATUS_UNCONFIGURED, 0x0C);
    dev.set(0, crate::fake::F12_QUERY, &[0x00]);
    let mut rmi = discovered(dev);
    assert_eq!(rmi.check_interrupts(), Err(Error::UnsupportedDevice));
  }

  #[test]
  fn missing_device_control() {
    let mut rmi = Rmi4::new(FakeDevice::touchpad(), Config::default());
    assert_eq!(rmi.check_interrupts(), Err(Error::InvalidDeviceState));
  }

  #[test]
  fn product_info_fields() {
    let mut rmi = discovered(FakeDevice::touchpad());
    let info = rmi.read_product_info().expect("query");
    assert_eq!(info.manufacturer_id, 0x01);
    assert_eq!((info.year, info.month, info.day), (25, 6, 14));
    assert_eq!(info.tester_id, 0x01 | 0x01 << 7);
    assert_eq!(info.serial_number, 0x05 | 0x02 << 7);
    assert_eq!(info.product_id_str(), Some("TM3276-001"));
  }
}
