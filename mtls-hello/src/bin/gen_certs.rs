use anyhow::Result;
use clap::Parser;
use mtls_hello::config::single_dash_args;
use mtls_hello::devcerts::DevPki;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gen_certs")]
#[command(about = "Generates a development CA plus server and client certificates", long_about = None)]
struct Args {
    /// Directory the PEM files are written to
    #[arg(long, default_value = "certs")]
    out_dir: PathBuf,

    /// Extra server host names or IPs (localhost and 127.0.0.1 are always included)
    #[arg(long = "host")]
    hosts: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse_from(single_dash_args(std::env::args_os()));

    println!("🔐 Generating certificates in {:?}...\n", args.out_dir);

    let hosts: Vec<&str> = args.hosts.iter().map(String::as_str).collect();
    let files = DevPki::generate(&hosts)?.write_to(&args.out_dir)?;

    for path in [
        &files.ca_cert,
        &files.ca_key,
        &files.server_cert,
        &files.server_key,
        &files.client_cert,
        &files.client_key,
    ] {
        println!("   ✓ Saved {}", path.display());
    }

    println!("\n✅ All certificates generated successfully!");
    println!("\nTry it:");
    println!(
        "   advserver -host localhost -port 8443 -srvcert {} -srvkey {} -cacert {} -certopt 4",
        files.server_cert.display(),
        files.server_key.display(),
        files.ca_cert.display()
    );
    println!(
        "   client -srvhost localhost:8443 -cacert {} -clientcert {} -clientkey {}",
        files.ca_cert.display(),
        files.client_cert.display(),
        files.client_key.display()
    );

    Ok(())
}
