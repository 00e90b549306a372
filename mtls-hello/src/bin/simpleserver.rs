use clap::{CommandFactory, Parser};
use mtls_hello::config::{single_dash_args, ServerFlavor, SimpleServerArgs};
use mtls_hello::{fatal, logging, server};

#[tokio::main]
async fn main() {
    logging::init_tracing();

    let args = SimpleServerArgs::parse_from(single_dash_args(std::env::args_os()));
    let opts = match args.into_options() {
        Ok(opts) => opts,
        Err(e) => {
            let usage = SimpleServerArgs::command().render_help().to_string();
            fatal(&e.into(), Some(&usage))
        }
    };

    if let Err(e) = server::run(opts, ServerFlavor::Simple).await {
        fatal(&e, None);
    }
}
