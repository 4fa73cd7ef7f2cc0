use gles_harness::{init_logging, run, HarnessConfig, LoggingConfig, ShaderSources};

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    let config = HarnessConfig::default().with_title("Single Triangle");
    if let Err(err) = run(config, ShaderSources::builtin()) {
        log::error!("{err:#}");
        return Err(err);
    }
    Ok(())
}
