use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use modlink_channel::{ChannelConfig, ChannelEvent, ThermalSink};
use tracing::{info, warn};

use crate::cmd::{create_out_dir, install_ctrlc_handler, open_channel, save_image, ThermalArgs};
use crate::exit::{channel_error, CliError, CliResult, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_image, print_stats, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: ThermalArgs, format: OutputFormat) -> CliResult<i32> {
    create_out_dir(args.out.as_deref())?;

    let sink = ThermalSink::new();
    let mut channel = open_channel(&args.device, args.socket, sink, ChannelConfig::thermal())?;
    let events = channel.events();

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut received = 0usize;
    let mut stats = None;
    while running.load(Ordering::SeqCst) {
        match events.recv_timeout(POLL_INTERVAL) {
            Ok(ChannelEvent::Image(image)) => {
                let saved = match &args.out {
                    Some(dir) => Some(save_image(dir, &image)?),
                    None => None,
                };
                print_image(&image, channel.device(), saved.as_deref(), format);

                received = received.saturating_add(1);
                if args.count.is_some_and(|count| received >= count) {
                    break;
                }
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
            Ok(ChannelEvent::Stats(final_stats)) => stats = Some(final_stats),
            Ok(ChannelEvent::Ready | ChannelEvent::Data(_)) => {}
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    channel
        .close()
        .map_err(|err| channel_error("close failed", err))?;
    for event in events.try_iter() {
        if let ChannelEvent::Stats(final_stats) = event {
            stats = Some(final_stats);
        }
    }
    if args.stats {
        if let Some(stats) = stats {
            print_stats(stats, format);
        }
    }
    info!(frames = received, "thermal session ended");
    Ok(SUCCESS)
}
