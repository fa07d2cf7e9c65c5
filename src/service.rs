use embedded_hal::i2c::{I2c, SevenBitAddress};
use embedded_hal_async::digital::Wait;

use crate::reg::FunctionNumber;
use crate::report::{fill_next_report, Report, ReportCursor, Translate};
use crate::{Error, Rmi4};

/// Outcome of one [`Rmi4::service_interrupts`] call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Serviced {
  pub report: Option<Report>,
  /// No interrupt sources and no undelivered contacts remain.
  pub complete: bool,
}

impl<I, E, T> Rmi4<I, T>
where
  I: I2c<SevenBitAddress, Error = E>,
  T: Translate,
{
  /// Bring the device up: discover functions, program device control, read
  /// the product identity and clear any stale interrupt status.
  pub fn start(&mut self) -> Result<(), Error<E>> {
    self.build_function_table()?;
    self.configure()?;
    self.product = Some(self.read_product_info()?);
    self.check_interrupts()?;

    self.interrupt_status = 0;
    self.cursor = ReportCursor::default();
    info!("rmi4 ready, {} functions", self.functions.len());
    Ok(())
  }

  /// Service the device after the attention line asserted.
  ///
  /// Each call produces at most one report. Call again until
  /// [`Serviced::complete`] is set; a poll with more contacts than fit in one
  /// report is spread over several calls. On error the outstanding interrupt
  /// sources are kept for the next call.
  pub fn service_interrupts(&mut self, now: u64) -> Result<Serviced, Error<E>> {
    let touch = self.functions.irq_mask(&[FunctionNumber::SENSOR_2D]);
    let buttons = self.functions.irq_mask(&[FunctionNumber::CAP_BUTTONS]);

    if self.interrupt_status == 0 {
      let irq = self.check_interrupts()?;
      let ignored = irq & !(touch | buttons);
      if ignored != 0 {
        debug!("ignoring interrupt sources {=u8:#x}", ignored);
      }
      self.interrupt_status = irq & (touch | buttons);
    }

    let mut report = None;
    if self.interrupt_status & touch != 0 {
      report = self.service_touch(now, touch)?;
    }

    if self.interrupt_status & buttons != 0 {
      trace!("button interrupt");
      self.interrupt_status &= !buttons;
    }

    Ok(Serviced { report, complete: self.interrupt_status == 0 })
  }

  fn service_touch(&mut self, now: u64, touch: u8) -> Result<Option<Report>, Error<E>> {
    if !self.cursor.pending() {
      let frame = match self.read_touch_frame() {
        Ok(frame) => frame,
        Err(Error::NoDataAvailable) => {
          trace!("no touch data");
          self.interrupt_status &= !touch;
          return Ok(None);
        }
        Err(e) => return Err(e),
      };

      self.cache.update(&frame, now);
      self.cursor = ReportCursor::new(self.cache.down_count());
      if self.cursor.total == 0 {
        self.interrupt_status &= !touch;
        return Ok(None);
      }
    }

    let report = fill_next_report(&self.cache, &mut self.cursor, &self.translate);
    if !self.cursor.pending() {
      self.interrupt_status &= !touch;
    }
    Ok(Some(report))
  }

  /// Wait for the attention line and drain everything the device has.
  ///
  /// `clock` supplies the scan timestamp of each poll and every report is
  /// handed to `sink`. Waiting is skipped while work from an earlier call is
  /// still outstanding.
  pub async fn service_attention<A, C, S>(&mut self, attn: &mut A, mut clock: C, mut sink: S) -> Result<(), Error<E>>
  where
    A: Wait,
    C: FnMut() -> u64,
    S: FnMut(Report),
  {
    if self.interrupt_status == 0 && !self.cursor.pending() {
      attn.wait_for_low().await.map_err(|_| Error::Attention)?;
    }

    loop {
      let serviced = self.service_interrupts(clock())?;
      if let Some(report) = serviced.report {
        sink(report);
      }
      if serviced.complete {
        return Ok(());
      }
    }
  }
}
