use std::{
    cmp::Ordering,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, SystemTime},
};

use crate::{errors::TicketError, types::Timestamp};

/// Wall-clock source behind [`TicketClock`].
pub trait TimeSource: Send + Sync {
    fn now(&self) -> SystemTime;
    fn sleep(&self, d: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}

/// Clock that moves only when set, advanced or slept on.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    #[must_use]
    pub const fn new(start: SystemTime) -> Self {
        Self { now: Mutex::new(start) }
    }

    /// Clock positioned at the start of unit `ts`.
    #[must_use]
    pub fn at(ts: Timestamp) -> Self {
        Self::new(ts.to_system_time())
    }

    pub fn advance(&self, d: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += d;
    }

    pub fn set(&self, t: SystemTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = t;
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn now(&self) -> SystemTime {
        (**self).now()
    }

    fn sleep(&self, d: Duration) {
        (**self).sleep(d);
    }
}

/// Hands out strictly increasing timestamps.
///
/// All callers sharing one clock receive distinct units. If the wall clock has
/// not yet left the last issued unit the caller sleeps until it does; if it
/// moved backwards the next logical unit is issued instead.
#[derive(Debug)]
pub struct TicketClock<S = SystemClock> {
    source: S,
    last: Mutex<Option<Timestamp>>,
}

impl TicketClock<SystemClock> {
    #[must_use]
    pub const fn system() -> Self {
        Self::new(SystemClock)
    }
}

impl Default for TicketClock<SystemClock> {
    fn default() -> Self {
        Self::system()
    }
}

impl<S: TimeSource> TicketClock<S> {
    pub const fn new(source: S) -> Self {
        Self { source, last: Mutex::new(None) }
    }

    /// Reserve the next timestamp.
    ///
    /// After the wall clock steps back this is `last + 1`, ahead of wall time
    /// by the size of the step. Verifiers reading the same clock see such a
    /// timestamp as being in the future until wall time passes it.
    ///
    /// # Errors
    ///
    /// `ClockOutOfRange` when the wall clock is outside the ticket range or the
    /// unit counter is exhausted.
    pub fn next_timestamp(&self) -> Result<Timestamp, TicketError> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            let wall = self.source.now();
            let ts = Timestamp::from_system_time(wall)?;
            let Some(prev) = *last else {
                *last = Some(ts);
                return Ok(ts);
            };
            match ts.cmp(&prev) {
                Ordering::Greater => {
                    *last = Some(ts);
                    return Ok(ts);
                }
                Ordering::Equal => {
                    let next = prev.next().ok_or(TicketError::ClockOutOfRange)?;
                    let wait = next
                        .to_system_time()
                        .duration_since(wall)
                        .unwrap_or(Duration::ZERO);
                    tracing::trace!(?wait, "timestamp unit in use, waiting for the next");
                    self.source.sleep(wait);
                }
                Ordering::Less => {
                    let next = prev.next().ok_or(TicketError::ClockOutOfRange)?;
                    tracing::warn!(
                        wall = ts.units(),
                        last = prev.units(),
                        "wall clock moved backwards, issuing the next logical unit"
                    );
                    *last = Some(next);
                    return Ok(next);
                }
            }
        }
    }

    /// Current time without reserving it.
    ///
    /// # Errors
    ///
    /// `ClockOutOfRange`.
    pub fn now(&self) -> Result<Timestamp, TicketError> {
        Timestamp::from_system_time(self.source.now())
    }

    #[must_use]
    pub fn last_issued(&self) -> Option<Timestamp> {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub const fn source(&self) -> &S {
        &self.source
    }
}
