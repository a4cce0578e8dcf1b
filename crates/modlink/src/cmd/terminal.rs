use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::RecvTimeoutError;
use modlink_channel::{ChannelConfig, ChannelEvent, ChannelWriter, DisconnectCause, RawSink};
use tracing::{debug, info, warn};

use crate::cmd::{install_ctrlc_handler, open_channel, TerminalArgs};
use crate::exit::{channel_error, io_error, CliError, CliResult, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_data, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: TerminalArgs, format: OutputFormat) -> CliResult<i32> {
    let mut channel = open_channel(&args.device, args.socket, RawSink, ChannelConfig::raw())?;
    let events = channel.events();

    if let Some(data) = args.data {
        channel
            .write(data)
            .map_err(|err| channel_error("write failed", err))?;
    }
    if args.stdin {
        let writer = channel.writer();
        thread::Builder::new()
            .name("modlink-stdin".to_string())
            .spawn(move || forward_stdin(writer))
            .map_err(|err| io_error("stdin forwarder", err))?;
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        match events.recv_timeout(POLL_INTERVAL) {
            Ok(ChannelEvent::Data(data)) => {
                print_data(&data, channel.device(), format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Ok(ChannelEvent::Disconnected(DisconnectCause::PeerHangup)) => {
                info!("accessory hung up");
                break;
            }
            Ok(ChannelEvent::Disconnected(cause)) => {
                if cause.is_fault() {
                    return Err(CliError::new(
                        TRANSPORT_ERROR,
                        format!("accessory disconnected: {cause}"),
                    ));
                }
                break;
            }
            Ok(ChannelEvent::WriteFailed { len, message, .. }) => {
                warn!(len, %message, "write to accessory failed");
            }
            Ok(ChannelEvent::Ready | ChannelEvent::Image(_) | ChannelEvent::Stats(_)) => {}
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    channel
        .close()
        .map_err(|err| channel_error("close failed", err))?;
    Ok(SUCCESS)
}

fn forward_stdin(writer: ChannelWriter) {
    let mut stdin = std::io::stdin().lock();
    let mut buf = [0u8; 1024];
    loop {
        let n = match stdin.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!(error = %err, "stdin read failed");
                break;
            }
        };
        if let Err(err) = writer.write(Bytes::copy_from_slice(&buf[..n])) {
            debug!(error = %err, "stdin forwarding stopped");
            break;
        }
    }
}
