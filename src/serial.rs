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

//! USB CDC-ACM transport for the command protocol.

use crate::config::{USB_MAX_PACKET_SIZE, USB_PID, USB_VID};
use crate::storage::{CalibrationStorage, fatal_storage_error};
use crate::time::EmbassyClock;
use defmt::{error, info};
use embassy_executor::Spawner;
use embassy_rp::peripherals::USB;
use embassy_rp::usb::{Driver, InterruptHandler};
use embassy_rp::{Peri, bind_interrupts};
use embassy_time::Delay;
use embassy_usb::class::cdc_acm::{CdcAcmClass, Receiver, Sender, State};
use embassy_usb::driver::EndpointError;
use embedded_io_async::Write;
use static_cell::StaticCell;
use testrig_core::protocol::render;
use testrig_core::{Interpreter, LineFramer, LoadCellSensor, Response};

bind_interrupts!(struct UsbIrqs {
    USBCTRL_IRQ => InterruptHandler<USB>;
});

type UsbDriver = Driver<'static, USB>;

pub type RigInterpreter<S> =
    Interpreter<'static, S, Delay, CalibrationStorage, EmbassyClock>;

/// Brings up the USB device and serves commands for as long as the firmware runs. The first
/// host connection after boot is greeted with the READY banner. Every connection starts with
/// an empty line buffer.
pub async fn serve<S>(
    usb_peripheral: Peri<'static, USB>,
    spawner: Spawner,
    mut interpreter: RigInterpreter<S>,
) where
    S: LoadCellSensor,
{
    let driver = Driver::new(usb_peripheral, UsbIrqs);

    let config = {
        let mut config = embassy_usb::Config::new(USB_VID, USB_PID);
        config.manufacturer = Some(crate::config::DEVICE_INFO.vendor);
        config.product = Some("Test rig telemetry");
        config.serial_number = Some("00000001");
        config.max_power = 100;
        config.max_packet_size_0 = USB_MAX_PACKET_SIZE;
        config
    };

    let mut builder = {
        static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
        static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
        static CONTROL_BUF: StaticCell<[u8; 64]> = StaticCell::new();

        embassy_usb::Builder::new(
            driver,
            config,
            CONFIG_DESCRIPTOR.init([0; 256]),
            BOS_DESCRIPTOR.init([0; 256]),
            &mut [], // no msos descriptors
            CONTROL_BUF.init([0; 64]),
        )
    };

    static STATE: StaticCell<State> = StaticCell::new();
    let state = STATE.init(State::new());
    let class = CdcAcmClass::new(&mut builder, state, u16::from(USB_MAX_PACKET_SIZE));

    let usb = builder.build();
    spawner.spawn(usb_task(usb)).unwrap();

    let (mut sender, mut receiver) = class.split();
    let mut framer = LineFramer::new();

    loop {
        receiver.wait_connection().await;
        info!("Host connected");
        framer.reset();
        let _ = session(&mut sender, &mut receiver, &mut framer, &mut interpreter).await;
        info!("Host disconnected");
    }
}

#[embassy_executor::task]
async fn usb_task(mut usb: embassy_usb::UsbDevice<'static, UsbDriver>) {
    usb.run().await;
}

struct Disconnected {}

impl From<EndpointError> for Disconnected {
    fn from(val: EndpointError) -> Self {
        match val {
            EndpointError::BufferOverflow => panic!("Buffer overflow"),
            EndpointError::Disabled => Disconnected {},
        }
    }
}

async fn session<S>(
    sender: &mut Sender<'static, UsbDriver>,
    receiver: &mut Receiver<'static, UsbDriver>,
    framer: &mut LineFramer,
    interpreter: &mut RigInterpreter<S>,
) -> Result<(), Disconnected>
where
    S: LoadCellSensor,
{
    if let Some(banner) = interpreter.take_banner() {
        send_response(sender, &banner).await?;
    }

    let mut rx_buf = [0u8; USB_MAX_PACKET_SIZE as usize];
    loop {
        let n = receiver.read_packet(&mut rx_buf).await?;
        for &byte in &rx_buf[..n] {
            let Some(event) = framer.push(byte) else {
                continue;
            };
            match interpreter.process(event).await {
                Ok(Some(response)) => send_response(sender, &response).await?,
                Ok(None) => {}
                Err(e) => fatal_storage_error(e),
            }
        }
    }
}

async fn send_response(
    sender: &mut Sender<'static, UsbDriver>,
    response: &Response,
) -> Result<(), Disconnected> {
    match render(response) {
        Ok(line) => sender.write_all(line.as_bytes()).await?,
        Err(_) => error!("Response does not fit the line buffer"),
    }
    Ok(())
}
