use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cfg = audioscape::config::Config::parse();
    if cfg.list_devices {
        audioscape::audio::list_input_devices()?;
        return Ok(());
    }

    audioscape::logging::init(cfg.log_file.as_deref())?;
    audioscape::app::run(cfg)
}
