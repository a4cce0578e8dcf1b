use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("modlink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: modlink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("MODLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "sensor: {}x{} @ {} bytes/frame",
        modlink_thermal::WIDTH,
        modlink_thermal::HEIGHT,
        modlink_thermal::FRAME_SIZE
    );
    println!("read_chunk: {}", modlink_channel::DEFAULT_READ_CHUNK);

    Ok(SUCCESS)
}
