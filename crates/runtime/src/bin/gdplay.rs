use std::env;
use std::path::PathBuf;

use gd_runtime::abort::abort;
use gd_runtime::{
    bootstrap, logging, ModuleLocator, NativeBackend, PlayerArgs, RuntimeConfig, RuntimeResult,
};
use tracing::info;

fn main() {
    let args = match PlayerArgs::parse_normalized(env::args_os()) {
        Ok(args) => args,
        Err(err) => err.exit(),
    };
    if let Err(err) = run(args) {
        abort(err);
    }
}

fn run(args: PlayerArgs) -> RuntimeResult<()> {
    let exe_dir = env::current_exe()?
        .parent()
        .map(PathBuf::from)
        .unwrap_or_default();
    let config = RuntimeConfig::load_from_dir(&exe_dir)?.resolve();
    logging::init_tracing(&config.log_level);

    if let Some(dir) = &args.cwd {
        env::set_current_dir(dir)?;
        info!(cwd = %dir.display(), "working directory changed");
    }

    let locator = ModuleLocator::for_current_exe(config.module_extension.clone())?;
    let mut session = bootstrap::start(&config, locator, Box::new(NativeBackend))?;
    session.run()?;
    info!(steps = session.steps(), "game exited");
    Ok(())
}
