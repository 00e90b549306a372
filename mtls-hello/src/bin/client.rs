use clap::{CommandFactory, Parser};
use mtls_hello::client::{build_client, render_reply, say_hello};
use mtls_hello::config::{single_dash_args, ClientArgs};
use mtls_hello::{fatal, logging};

#[tokio::main]
async fn main() {
    logging::init_tracing();

    let args = ClientArgs::parse_from(single_dash_args(std::env::args_os()));
    let opts = match args.into_options() {
        Ok(opts) => opts,
        Err(e) => {
            let usage = ClientArgs::command().render_help().to_string();
            fatal(&e.into(), Some(&usage))
        }
    };

    let client = match build_client(&opts) {
        Ok(client) => client,
        Err(e) => fatal(&e, None),
    };

    match say_hello(&client, &opts.srvhost).await {
        Ok(reply) => print!("{}", render_reply(&reply)),
        Err(e) => fatal(&e, None),
    }
}
