#![cfg_attr(not(test), no_std)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! `no_std` driver core for Synaptics RMI4 touch controllers on I²C.
//!
//! RMI4 devices describe themselves: a Page Description Table lists the
//! functions (capabilities) present, and newer functions such as the F12 2-D
//! sensor publish register descriptors instead of a fixed register map. This
//! crate decodes that schema and turns raw touch packets into a stream of
//! multi-touch reports with stable contact identity:
//!
//! - Walking the Page Description Table across register pages
//! - Decoding presence/structure register descriptors into typed tables
//! - Programming F01 device control from a logical [`Config`]
//! - Classifying device status and recovering from lost configuration
//! - Tracking up to ten finger slots in reporting order across lift/re-press
//! - Chunking each poll into five-contact [`Report`]s
//!
//! The bus is any `embedded-hal` 1.0 blocking I²C implementation. Bus timeouts
//! and retries are the responsibility of that implementation.
//!
//! ```no_run
//! use embedded_hal::i2c::{I2c, SevenBitAddress};
//! use rmi4::{Config, Rmi4};
//!
//! fn poll<I2C, E>(i2c: I2C, now: u64) -> Result<(), rmi4::Error<E>>
//! where
//!   I2C: I2c<SevenBitAddress, Error = E>,
//! {
//!   let mut touch = Rmi4::new(i2c, Config::default());
//!   touch.start()?;
//!
//!   loop {
//!     let serviced = touch.service_interrupts(now)?;
//!     if let Some(report) = serviced.report {
//!       let _bytes = report.to_bytes();
//!     }
//!     if serviced.complete {
//!       break;
//!     }
//!   }
//!   Ok(())
//! }
//! ```
mod fmt;

mod bitset;
mod cache;
mod config;
mod control;
mod cursor;
mod descriptor;
mod event;
mod function;
mod reg;
mod report;
mod rw;
mod service;
mod shared;

#[cfg(test)]
mod fake;

pub use bitset::{BitSet, PresenceMap, SetBits, SlotMask, SubPacketMap};
pub use cache::{FingerCache, FingerSlot};
pub use config::{Config, DeviceControl, DeviceSettings, SensorLayout, SleepMode};
pub use control::{DeviceStatus, Diagnostics, ProductInfo, StatusCode};
pub use descriptor::{RegisterDescriptor, RegisterDescriptorItem};
pub use event::{FingerSample, FingerState, TouchFrame};
pub use function::{FunctionDescriptor, FunctionTable};
pub use reg::{
  FunctionNumber, ObjectType, DEFAULT_I2C_ADDR, MAX_FUNCTIONS, MAX_REGISTER_ITEMS, MAX_SLOTS, PRESENCE_BITS,
  REPORT_CAPACITY, SUBPACKET_BITS,
};
pub use report::{fill_next_report, Contact, Passthrough, Report, ReportCursor, Translate, REPORT_ID_MULTITOUCH, REPORT_LEN};
pub use service::Serviced;
pub use shared::SharedRmi4;

/// Errors that can occur while talking to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
  /// I²C bus transaction failed with the underlying driver error.
  I2c(E),
  /// A write was larger than the bus scratch buffer.
  BufferOverflow,
  /// A register descriptor or data packet violates the RMI4 encoding.
  InvalidSchema,
  /// The 2-D sensor does not publish register descriptors.
  UnsupportedDevice,
  /// A required function or register is missing, or the driver is not configured.
  InvalidDeviceState,
  /// A decoded table or packet does not fit the driver's fixed buffers.
  ResourceExhausted,
  /// The poll produced no touch data.
  NoDataAvailable,
  /// The Page Description Table lists more functions than the table holds.
  TooManyFunctions,
  /// The Page Description Table walk ran out of addresses before a terminator.
  MissingTerminator,
  /// The device is in flash programming mode.
  ProgrammingMode,
  /// Waiting on the attention line failed.
  Attention,
}

/// Errors from decoding buffers already read from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
  InvalidSchema,
  ResourceExhausted,
  NoDataAvailable,
}

impl<E> From<DecodeError> for Error<E> {
  fn from(e: DecodeError) -> Self {
    match e {
      DecodeError::InvalidSchema => Error::InvalidSchema,
      DecodeError::ResourceExhausted => Error::ResourceExhausted,
      DecodeError::NoDataAvailable => Error::NoDataAvailable,
    }
  }
}

/// Controller context for one RMI4 touch controller.
///
/// The driver owns the I²C peripheral. Create it with [`Rmi4::new`], bring the
/// device up with [`Rmi4::start`] and then call [`Rmi4::service_interrupts`]
/// whenever the attention line asserts. All state lives in this value; the
/// function table and register descriptors are read-only after bring-up.
pub struct Rmi4<I, T = Passthrough> {
  i2c: I,
  config: Config,
  translate: T,
  page: u8,
  functions: FunctionTable,
  layout: Option<SensorLayout>,
  diagnostics: Diagnostics,
  product: Option<ProductInfo>,
  interrupt_status: u8,
  cache: FingerCache,
  cursor: ReportCursor,
}

impl<I> Rmi4<I, Passthrough> {
  /// Create a driver that reports controller coordinates unchanged.
  ///
  /// Nothing is sent to the device until [`Rmi4::start`] is called.
  pub fn new(i2c: I, config: Config) -> Self {
    Self::with_translation(i2c, config, Passthrough)
  }
}

impl<I, T> Rmi4<I, T> {
  /// Create a driver that maps every reported coordinate through `translate`.
  pub fn with_translation(i2c: I, config: Config, translate: T) -> Self {
    Self {
      i2c,
      config,
      translate,
      page: 0,
      functions: FunctionTable::new(),
      layout: None,
      diagnostics: Diagnostics::default(),
      product: None,
      interrupt_status: 0,
      cache: FingerCache::new(),
      cursor: ReportCursor::default(),
    }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Functions discovered by the last Page Description Table walk.
  pub fn functions(&self) -> &FunctionTable {
    &self.functions
  }

  /// 2-D sensor layout, once configured.
  pub fn layout(&self) -> Option<&SensorLayout> {
    self.layout.as_ref()
  }

  /// Sticky device status observed since creation.
  pub fn diagnostics(&self) -> &Diagnostics {
    &self.diagnostics
  }

  pub fn product_info(&self) -> Option<&ProductInfo> {
    self.product.as_ref()
  }

  pub fn cache(&self) -> &FingerCache {
    &self.cache
  }

  /// Register page currently mapped in.
  pub fn page(&self) -> u8 {
    self.page
  }

  /// Give the bus back.
  pub fn release(self) -> I {
    self.i2c
  }
}
