use openapi_glue::cli::main_with_args;
use openapi_glue::{init_logging, LogConfig};

fn main() {
    if let Err(e) = init_logging(&LogConfig::from_env()) {
        eprintln!("{e:#}");
    }
    std::process::exit(main_with_args(std::env::args_os()));
}
