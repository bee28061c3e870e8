// Copyright (C) 2025 Paul Hampson
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License version 3 as  published by the
// Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <https://www.gnu.org/licenses/>.

use crate::calibration::{CalibrationStore, StoreError};
use crate::clock::{ClockSync, Monotonic};
use crate::load_cell::{LoadCellReader, LoadCellSensor, ReadError};
use crate::protocol::{Command, DeviceInfo, FrameEvent, ProtocolError, Reply, Response};
use crate::pulse::{PulseTimer, PulsesPerRevolution};
use core::time::Duration;
use embedded_hal_async::delay::DelayNs;
use embedded_storage::Storage;

#[derive(Clone, Copy, Debug)]
pub struct InterpreterConfig {
    pub info: DeviceInfo,
    /// Longest wait for the load cell before a command reports `HX711_timeout`.
    pub read_timeout: Duration,
}

/// Executes protocol commands against the rig's measurement components.
///
/// Every dispatched line produces exactly one [`Response`]. Protocol level failures are part
/// of that response; only a failed calibration write escapes as an error, and the caller is
/// expected to treat it as fatal.
pub struct Interpreter<'a, S, D, F, C> {
    reader: LoadCellReader<S, D, C>,
    calibration: CalibrationStore<F>,
    pulses: &'a PulseTimer,
    clock: ClockSync<C>,
    ppr: PulsesPerRevolution,
    config: InterpreterConfig,
    banner_sent: bool,
}

impl<'a, S, D, F, C> Interpreter<'a, S, D, F, C>
where
    S: LoadCellSensor,
    D: DelayNs,
    F: Storage,
    C: Monotonic + Copy,
{
    pub fn new(
        reader: LoadCellReader<S, D, C>,
        calibration: CalibrationStore<F>,
        pulses: &'a PulseTimer,
        clock: ClockSync<C>,
        config: InterpreterConfig,
    ) -> Self {
        Self {
            reader,
            calibration,
            pulses,
            clock,
            ppr: PulsesPerRevolution::DEFAULT,
            config,
            banner_sent: false,
        }
    }

    /// The READY line, handed out once per boot. Later connections get `None` so a host that
    /// reopens the port for every command never reads the banner as a command reply.
    pub fn take_banner(&mut self) -> Option<Response> {
        if self.banner_sent {
            return None;
        }
        self.banner_sent = true;
        Some(Ok(Reply::Ready(self.config.info)))
    }

    pub async fn process(
        &mut self,
        event: FrameEvent<'_>,
    ) -> Result<Option<Response>, StoreError<F::Error>> {
        match event {
            FrameEvent::Line(line) => self.handle_line(line).await,
            FrameEvent::Overflow => {
                warn!("Command line too long, discarding");
                Ok(Some(Err(ProtocolError::LineTooLong)))
            }
        }
    }

    /// Parses and runs one command line. `Ok(None)` means the line was blank.
    pub async fn handle_line(
        &mut self,
        line: &[u8],
    ) -> Result<Option<Response>, StoreError<F::Error>> {
        let command = match Command::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(None),
            Err(error) => {
                debug!("Rejected command line: {}", error.code());
                return Ok(Some(Err(error)));
            }
        };
        trace!("Dispatching {}", command.name());
        self.execute(command).await.map(Some)
    }

    async fn execute(&mut self, command: Command) -> Result<Response, StoreError<F::Error>> {
        let reply = match command {
            Command::Ping => Reply::Pong,
            Command::Info => Reply::Info(self.config.info),
            Command::Load => {
                let raw = match self.sample().await {
                    Ok(raw) => raw,
                    Err(error) => return Ok(Err(error)),
                };
                let mass_g = self.calibration.current().mass_grams(raw);
                Reply::Load {
                    mass_g,
                    raw,
                    ts: self.clock.now(),
                }
            }
            Command::Tare => {
                let raw = match self.sample().await {
                    Ok(raw) => raw,
                    Err(error) => return Ok(Err(error)),
                };
                let tare = raw.clamp(i32::MIN.into(), i32::MAX.into()) as i32;
                let slope = self.calibration.current().slope;
                self.calibration.save(slope, tare)?;
                Reply::Tare
            }
            Command::Speed => {
                let snapshot = self.pulses.snapshot();
                Reply::Speed {
                    rpm: snapshot.rpm(self.ppr),
                    period_ms: snapshot.last_period_ms(),
                    pulses: snapshot.total_pulses(),
                    ts: self.clock.now(),
                }
            }
            Command::SetTime { unix_ms } => {
                self.clock.set(unix_ms);
                Reply::SetTime
            }
            Command::SetCal { slope, tare } => {
                self.calibration.save(slope, tare)?;
                Reply::SetCal
            }
            Command::Cal => {
                let calibration = self.calibration.current();
                Reply::Cal {
                    slope: calibration.slope,
                    tare: calibration.tare,
                }
            }
            Command::ResetCal => {
                self.calibration.reset_to_defaults()?;
                Reply::ResetCal
            }
            Command::SetPpr(ppr) => {
                self.ppr = ppr;
                info!("Pulses per revolution set to {}", ppr.get());
                Reply::SetPpr
            }
            Command::Ppr => Reply::Ppr {
                ppr: self.ppr.get(),
            },
        };
        Ok(Ok(reply))
    }

    async fn sample(&mut self) -> Result<i64, ProtocolError> {
        self.reader
            .read(self.config.read_timeout)
            .await
            .map_err(|error| {
                if let ReadError::Sensor(_) = error {
                    error!("Load cell sensor fault");
                }
                ProtocolError::SensorTimeout
            })
    }

    pub fn calibration(&self) -> &CalibrationStore<F> {
        &self.calibration
    }

    pub fn pulses_per_revolution(&self) -> PulsesPerRevolution {
        self.ppr
    }
}
