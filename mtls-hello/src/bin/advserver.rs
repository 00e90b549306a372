use clap::{CommandFactory, Parser};
use mtls_hello::config::{single_dash_args, AdvServerArgs, ServerFlavor};
use mtls_hello::{fatal, logging, server};

#[tokio::main]
async fn main() {
    logging::init_tracing();

    let args = AdvServerArgs::parse_from(single_dash_args(std::env::args_os()));
    let opts = match args.into_options() {
        Ok(opts) => opts,
        Err(e) => {
            let usage = AdvServerArgs::command().render_help().to_string();
            fatal(&e.into(), Some(&usage))
        }
    };

    tracing::info!("Client certificate policy: {}", opts.client_auth);

    if let Err(e) = server::run(opts, ServerFlavor::Advanced).await {
        fatal(&e, None);
    }
}
