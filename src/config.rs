use bitfield_struct::bitfield;
use embedded_hal::i2c::{I2c, SevenBitAddress};

use crate::descriptor::RegisterDescriptor;
use crate::reg::{
  FunctionNumber, DEFAULT_I2C_ADDR, F01_CTRL_LEN, F12_DESCRIPTOR_STRIDE, F12_HAS_DRIBBLE, F12_HAS_REGISTER_DESCRIPTOR,
  MAX_SLOTS,
};
use crate::{Error, Rmi4};

/// Driver configuration.
///
/// ```no_run
/// use rmi4::{Config, DeviceSettings};
///
/// let config = Config::default()
///   .with_address(0x2C)
///   .with_device(DeviceSettings::default().with_doze_interval(20).with_no_sleep(1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
  /// 7-bit I²C address of the controller.
  pub address: u8,
  pub device: DeviceSettings,
}

impl Config {
  pub const fn new(address: u8, device: DeviceSettings) -> Self {
    Self { address, device }
  }

  pub const fn with_address(mut self, address: u8) -> Self {
    self.address = address;
    self
  }

  pub const fn with_device(mut self, device: DeviceSettings) -> Self {
    self.device = device;
    self
  }
}

impl Default for Config {
  fn default() -> Self {
    Self::new(DEFAULT_I2C_ADDR, DeviceSettings::new())
  }
}

/// Logical F01 device control settings.
///
/// Values are held wider than their registers; each one is truncated to its
/// physical width when the control block is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceSettings {
  /// 0 normal operation, 1 sensor sleep.
  pub sleep_mode: u32,
  /// Keep the device out of doze.
  pub no_sleep: u32,
  /// Halve the report rate when set.
  pub report_rate: u32,
  /// Written to the configured bit; the device clears it after a reset.
  pub configured: u32,
  /// Interrupt enable mask for the first eight interrupt sources.
  pub interrupt_enable: u32,
  /// Doze wake-up interval, 10 ms units.
  pub doze_interval: u32,
  pub doze_threshold: u32,
  /// Inactivity time before doze, 100 ms units.
  pub doze_holdoff: u32,
}

impl DeviceSettings {
  pub const fn new() -> Self {
    Self {
      sleep_mode: 0,
      no_sleep: 0,
      report_rate: 0,
      configured: 1,
      interrupt_enable: 0xFF,
      doze_interval: 10,
      doze_threshold: 20,
      doze_holdoff: 5,
    }
  }

  pub const fn with_sleep_mode(mut self, sleep_mode: u32) -> Self {
    self.sleep_mode = sleep_mode;
    self
  }

  pub const fn with_no_sleep(mut self, no_sleep: u32) -> Self {
    self.no_sleep = no_sleep;
    self
  }

  pub const fn with_report_rate(mut self, report_rate: u32) -> Self {
    self.report_rate = report_rate;
    self
  }

  pub const fn with_configured(mut self, configured: u32) -> Self {
    self.configured = configured;
    self
  }

  pub const fn with_interrupt_enable(mut self, interrupt_enable: u32) -> Self {
    self.interrupt_enable = interrupt_enable;
    self
  }

  pub const fn with_doze_interval(mut self, doze_interval: u32) -> Self {
    self.doze_interval = doze_interval;
    self
  }

  pub const fn with_doze_threshold(mut self, doze_threshold: u32) -> Self {
    self.doze_threshold = doze_threshold;
    self
  }

  pub const fn with_doze_holdoff(mut self, doze_holdoff: u32) -> Self {
    self.doze_holdoff = doze_holdoff;
    self
  }

  /// Physical F01 control block: device control byte, interrupt enable,
  /// doze interval, doze threshold, doze holdoff.
  pub fn to_bytes(&self) -> [u8; F01_CTRL_LEN] {
    let control = DeviceControl::new()
      .with_sleep_mode(SleepMode::from_bits(self.sleep_mode as u8))
      .with_no_sleep(self.no_sleep & 1 != 0)
      .with_report_rate(self.report_rate & 1 != 0)
      .with_configured(self.configured & 1 != 0);

    [
      control.into(),
      self.interrupt_enable as u8,
      self.doze_interval as u8,
      self.doze_threshold as u8,
      self.doze_holdoff as u8,
    ]
  }
}

impl Default for DeviceSettings {
  fn default() -> Self {
    Self::new()
  }
}

/// F01 device control register.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceControl {
  #[bits(2)]
  pub sleep_mode: SleepMode,
  pub no_sleep: bool,
  #[bits(3)]
  __: u8,
  pub report_rate: bool,
  pub configured: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SleepMode {
  Normal = 0b00,
  SensorSleep = 0b01,
  Reserved2 = 0b10,
  Reserved3 = 0b11,
}

impl SleepMode {
  pub const fn into_bits(self) -> u8 {
    self as _
  }

  pub const fn from_bits(bits: u8) -> Self {
    match bits & 0b11 {
      0b00 => Self::Normal,
      0b01 => Self::SensorSleep,
      0b10 => Self::Reserved2,
      _ => Self::Reserved3,
    }
  }
}

/// Register layout of the 2-D sensor, derived from its register descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorLayout {
  pub query: RegisterDescriptor,
  pub control: RegisterDescriptor,
  pub data: RegisterDescriptor,
  /// Bytes in one touch packet: every data register back to back.
  pub packet_size: usize,
  /// Bytes in front of the first finger record.
  pub payload_offset: usize,
  pub max_fingers: usize,
  pub has_dribble: bool,
  /// A 0-D capacitive button function is present.
  pub has_buttons: bool,
}

impl SensorLayout {
  /// Derive the touch packet geometry from the three descriptors. `None` when
  /// the finger register is missing or the packet size overflows.
  pub fn new(
    query: RegisterDescriptor,
    control: RegisterDescriptor,
    data: RegisterDescriptor,
    has_dribble: bool,
    has_buttons: bool,
  ) -> Option<Self> {
    let payload_offset = data.item(0).map_or(0, |item| item.size as usize);
    let fingers = data.item(1)?.sub_packet_count as usize;
    if fingers > MAX_SLOTS {
      warn!("{} fingers reported, tracking {}", fingers, MAX_SLOTS);
    }

    Some(Self {
      packet_size: data.total_size()?,
      payload_offset,
      max_fingers: fingers.min(MAX_SLOTS),
      has_dribble,
      has_buttons,
      query,
      control,
      data,
    })
  }
}

impl<I, E, T> Rmi4<I, T>
where
  I: I2c<SevenBitAddress, Error = E>,
{
  /// Read the 2-D sensor's register layout and program F01 device control.
  pub fn configure(&mut self) -> Result<(), Error<E>> {
    let sensor = *self.functions.find(FunctionNumber::SENSOR_2D).ok_or_else(|| {
      error!("2-D sensor function missing");
      Error::InvalidDeviceState
    })?;
    self.change_page(sensor.page)?;

    let mut address = sensor.query_base;
    let general = self.read_u8(address)?;
    if general & F12_HAS_REGISTER_DESCRIPTOR == 0 {
      error!("2-D sensor without register descriptors");
      return Err(Error::UnsupportedDevice);
    }
    let has_dribble = general & F12_HAS_DRIBBLE != 0;

    address = address.wrapping_add(1);
    let query = self.read_register_descriptor(address)?;
    address = address.wrapping_add(F12_DESCRIPTOR_STRIDE);
    let control = self.read_register_descriptor(address)?;
    address = address.wrapping_add(F12_DESCRIPTOR_STRIDE);
    let data = self.read_register_descriptor(address)?;
    if data.total_size().is_none() {
      error!("2-D sensor data registers overflow the packet size");
      return Err(Error::ResourceExhausted);
    }

    let has_buttons = self.functions.contains(FunctionNumber::CAP_BUTTONS);
    let layout = SensorLayout::new(query, control, data, has_dribble, has_buttons).ok_or_else(|| {
      error!("2-D sensor has no finger data register");
      Error::InvalidDeviceState
    })?;
    debug!(
      "packet {} bytes, payload at {}, {} fingers",
      layout.packet_size, layout.payload_offset, layout.max_fingers
    );
    self.layout = Some(layout);

    let control = *self.functions.find(FunctionNumber::DEVICE_CONTROL).ok_or_else(|| {
      error!("device control function missing");
      Error::InvalidDeviceState
    })?;
    self.change_page(control.page)?;

    let block = self.config.device.to_bytes();
    self.write_bytes(control.control_base, &block)
  }
}
