use std::fs::File;

use modlink_channel::ThermalImage;
use modlink_thermal::{render, CaptureReader};
use tracing::info;

use crate::cmd::{create_out_dir, save_image, DecodeArgs};
use crate::exit::{io_error, thermal_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_image, print_stats, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    create_out_dir(args.out.as_deref())?;

    let file = File::open(&args.file).map_err(|err| io_error("open capture failed", err))?;
    let source = args.file.display().to_string();
    let mut reader = CaptureReader::with_chunk_size(file, args.chunk);

    let mut sequence = 0u64;
    while let Some(frame) = reader
        .next_frame()
        .map_err(|err| thermal_error("decode failed", err))?
    {
        let image = ThermalImage {
            sequence,
            min: frame.min(),
            max: frame.max(),
            bitmap: render(&frame),
        };
        sequence += 1;

        let saved = match &args.out {
            Some(dir) => Some(save_image(dir, &image)?),
            None => None,
        };
        print_image(&image, &source, saved.as_deref(), format);
    }

    let stats = reader.stats();
    info!(
        frames = stats.frames,
        desyncs = stats.desyncs,
        bytes = stats.bytes,
        "capture decoded"
    );
    if args.stats {
        print_stats(stats, format);
    }
    if stats.frames == 0 {
        return Err(CliError::new(
            DATA_INVALID,
            format!("{source}: no complete frame in capture"),
        ));
    }
    Ok(SUCCESS)
}
