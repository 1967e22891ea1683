use clap::Parser;
use env_logger::Env;

fn main() {
    let args = driver::Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    if let Err(err) = driver::run(args) {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}
