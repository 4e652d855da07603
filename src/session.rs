//! The sampling loop: baseline tick, then one presented snapshot per period.

use std::time::Duration;
use log::info;
use crate::collectors::Monitor;
use crate::errors::MonitorError;
use crate::render::Presenter;
use crate::shutdown::Shutdown;

/// Interruptible waiting between ticks.
pub trait Pause {
    /// Waits `period`; `false` means an interrupt cut it short.
    fn sleep(&self, period: Duration) -> bool;

    fn requested(&self) -> bool;
}

impl Pause for Shutdown {
    fn sleep(&self, period: Duration) -> bool {
        Shutdown::sleep(self, period)
    }

    fn requested(&self) -> bool {
        Shutdown::requested(self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ending {
    Completed,
    Interrupted,
}

/// Runs until interrupted, or for a single presented sample when `once` is set.
/// The presenter is closed on every exit path, so an interrupt is always
/// acknowledged.
pub fn run(
    monitor: &mut Monitor,
    presenter: &mut dyn Presenter,
    pause: &dyn Pause,
    period: Duration,
    once: bool,
) -> Result<Ending, MonitorError> {
    // The first reading of every process only establishes its baseline.
    monitor.tick();

    let ending = if once {
        sample_once(monitor, presenter, pause, period)?
    } else {
        info!("Sampling every {:?}", period);
        sample_forever(monitor, presenter, pause, period)?
    };
    presenter.close(ending == Ending::Interrupted)?;
    Ok(ending)
}

fn sample_once(
    monitor: &mut Monitor,
    presenter: &mut dyn Presenter,
    pause: &dyn Pause,
    period: Duration,
) -> Result<Ending, MonitorError> {
    if !pause.sleep(period) {
        return Ok(Ending::Interrupted);
    }
    presenter.present(&monitor.tick())?;
    Ok(Ending::Completed)
}

fn sample_forever(
    monitor: &mut Monitor,
    presenter: &mut dyn Presenter,
    pause: &dyn Pause,
    period: Duration,
) -> Result<Ending, MonitorError> {
    while pause.sleep(period) {
        let snapshot = monitor.tick();
        if pause.requested() {
            break;
        }
        presenter.present(&snapshot)?;
    }
    Ok(Ending::Interrupted)
}
