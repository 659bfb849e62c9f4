use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("omnisoc {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: omnisoc");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("OMNISOC_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "serial: {}",
        if cfg!(unix) { "termios" } else { "unavailable" }
    );
    println!(
        "frame: max_values={}, max_bytes={}",
        omnisoc_frame::MAX_VALUES,
        omnisoc_frame::MAX_FRAME_SIZE
    );
    println!(
        "defaults: baud={}, read_timeout={:?}, liveness_timeout={:?}",
        omnisoc_transport::DEFAULT_BAUD_RATE,
        omnisoc_transport::DEFAULT_READ_TIMEOUT,
        omnisoc_link::DEFAULT_TIMEOUT_PERIOD
    );

    Ok(SUCCESS)
}
