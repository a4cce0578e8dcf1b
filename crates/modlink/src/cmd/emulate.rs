use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::BytesMut;
use modlink_channel::{ACTIVATE_COMMAND, DEACTIVATE_COMMAND};
use modlink_thermal::{encode_frame, FRAME_SAMPLES, FRAME_SIZE, LINE_SIZE, SAMPLE_MASK, WIDTH};
use modlink_transport::{DeviceHandle, EmulatorSocket};
use tracing::{debug, info, warn};

use crate::cmd::{install_ctrlc_handler, EmulateArgs};
use crate::exit::{io_error, thermal_error, transport_error, CliError, CliResult, FAILURE, SUCCESS};

pub fn run(args: EmulateArgs) -> CliResult<i32> {
    let socket = EmulatorSocket::bind(&args.socket).map_err(|err| transport_error("bind failed", err))?;
    info!(path = %socket.path().display(), "sensor emulator listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut device = socket
        .accept()
        .map_err(|err| transport_error("accept failed", err))?;
    if !scan_for(&mut device, ACTIVATE_COMMAND).map_err(|err| io_error("read failed", err))? {
        return Err(CliError::new(FAILURE, "host disconnected before activation"));
    }
    info!("sensor activated");

    let deactivated = Arc::new(AtomicBool::new(false));
    let watcher = {
        let mut device = device
            .try_clone()
            .map_err(|err| transport_error("clone failed", err))?;
        let deactivated = deactivated.clone();
        thread::Builder::new()
            .name("modlink-emulate".to_string())
            .spawn(move || {
                match scan_for(&mut device, DEACTIVATE_COMMAND) {
                    Ok(true) => info!("sensor deactivated"),
                    Ok(false) => debug!("host closed connection"),
                    Err(err) => warn!(error = %err, "command read failed"),
                }
                deactivated.store(true, Ordering::SeqCst);
            })
            .map_err(|err| io_error("watcher", err))?
    };

    let interval = Duration::from_millis(args.interval);
    let mut wire = BytesMut::with_capacity(FRAME_SIZE);
    let mut sent = 0u64;
    'stream: while running.load(Ordering::SeqCst)
        && !deactivated.load(Ordering::SeqCst)
        && args.frames.is_none_or(|frames| sent < frames)
    {
        wire.clear();
        encode_frame(&synthetic_frame(sent), &mut wire)
            .map_err(|err| thermal_error("encode failed", err))?;
        for line in wire.chunks(LINE_SIZE) {
            if let Err(err) = device.write_all(line) {
                debug!(error = %err, "host went away");
                break 'stream;
            }
        }
        sent += 1;
        debug!(frame = sent, "frame sent");
        thread::sleep(interval);
    }

    if running.load(Ordering::SeqCst) {
        let _ = watcher.join();
    }
    info!(frames = sent, "sensor emulator done");
    Ok(SUCCESS)
}

/// Read until `command` appears in the stream. `Ok(false)` means EOF first.
fn scan_for(device: &mut DeviceHandle, command: &[u8]) -> std::io::Result<bool> {
    let mut window = Vec::with_capacity(64);
    let mut buf = [0u8; 64];
    loop {
        let n = match device.read(&mut buf) {
            Ok(0) => return Ok(false),
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        window.extend_from_slice(&buf[..n]);
        if window.windows(command.len()).any(|w| w == command) {
            return Ok(true);
        }
        let keep = command.len().saturating_sub(1).min(window.len());
        window.drain(..window.len() - keep);
    }
}

/// A warm vertical band that sweeps across the sensor one column per frame.
fn synthetic_frame(n: u64) -> Vec<u16> {
    let hot_column = (n % WIDTH as u64) as usize;
    (0..FRAME_SAMPLES)
        .map(|i| {
            let (x, y) = (i % WIDTH, i / WIDTH);
            let falloff = (x.abs_diff(hot_column) * 64 + y * 16).min(0x1FFF);
            (0x2000 - falloff) as u16 & SAMPLE_MASK
        })
        .collect()
}
