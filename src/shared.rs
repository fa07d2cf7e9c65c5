use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embedded_hal::i2c::{I2c, SevenBitAddress};
use embedded_hal_async::digital::Wait;

use crate::report::{Passthrough, Report, Translate};
use crate::{Error, Rmi4, Serviced};

/// A controller shared between tasks.
///
/// Every operation takes the lock for its whole duration, so bring-up and
/// servicing never interleave. The guard is released on every exit path,
/// including errors.
pub struct SharedRmi4<M: RawMutex, I, T = Passthrough> {
  inner: Mutex<M, Rmi4<I, T>>,
}

impl<M: RawMutex, I, T> SharedRmi4<M, I, T> {
  pub const fn new(rmi: Rmi4<I, T>) -> Self {
    Self { inner: Mutex::new(rmi) }
  }

  /// Exclusive access for anything not covered below.
  pub async fn lock(&self) -> MutexGuard<'_, M, Rmi4<I, T>> {
    self.inner.lock().await
  }

  pub fn into_inner(self) -> Rmi4<I, T> {
    self.inner.into_inner()
  }
}

impl<M, I, E, T> SharedRmi4<M, I, T>
where
  M: RawMutex,
  I: I2c<SevenBitAddress, Error = E>,
  T: Translate,
{
  pub async fn start(&self) -> Result<(), Error<E>> {
    self.inner.lock().await.start()
  }

  pub async fn service_interrupts(&self, now: u64) -> Result<Serviced, Error<E>> {
    self.inner.lock().await.service_interrupts(now)
  }

  /// [`Rmi4::service_attention`] under the lock. The lock is held while
  /// waiting for the attention line.
  pub async fn service_attention<A, C, S>(&self, attn: &mut A, clock: C, sink: S) -> Result<(), Error<E>>
  where
    A: Wait,
    C: FnMut() -> u64,
    S: FnMut(Report),
  {
    let mut rmi = self.inner.lock().await;
    rmi.service_attention(attn, clock, sink).await
  }
}
