//! Generates a trusted setup file from a passphrase entered at the terminal.
//!
//! The passphrase is hashed into the secret evaluation point, the setup is
//! written with owner-only permissions, and every intermediate secret buffer
//! is overwritten before exit. The resulting file is a public artifact.
use ark_bn254::Fr;
use ark_ff::PrimeField;
use clap::Parser;
use rand::Rng;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use verkle_kzg::{
    constant::DOMAIN_SIZE,
    hasher::blake2b_256,
    kzg::{quasi_primitive_root_of_unity, TrustedSetup},
};

/// Passphrases shorter than this are rejected outright. The passphrase is
/// the only entropy source of the trapdoor.
const MIN_PASSPHRASE_BYTES: usize = 20;

#[derive(Parser)]
#[command(
    name = "kzg_setup",
    about = "Generate a trusted KZG setup file from an interactive passphrase"
)]
struct Args {
    /// Output file for the generated setup.
    #[arg(default_value = "example.setup")]
    file: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    match run(&Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    println!(
        "generating a new trusted KZG setup (D = {DOMAIN_SIZE}) into '{}'",
        args.file.display()
    );

    let mut passphrase = read_passphrase()?;
    let mut digest = blake2b_256(&passphrase);
    passphrase.fill(0);

    // Hash the digest a random number of further rounds so the secret is not
    // a single known function of the passphrase.
    let rounds = rand::thread_rng().gen_range(10..100);
    for _ in 0..rounds {
        digest = blake2b_256(&digest);
    }
    let mut secret = Fr::from_le_bytes_mod_order(&digest);
    digest.fill(0);

    let omega = quasi_primitive_root_of_unity(DOMAIN_SIZE as u16)?;
    info!(d = DOMAIN_SIZE, "computing the setup; this destroys the secret");
    let setup = TrustedSetup::generate_from_secret_powers(DOMAIN_SIZE as u16, omega, &mut secret)?;

    write_owner_only(&args.file, &setup.to_bytes())?;

    // Read the file back to validate the round trip before reporting success.
    let restored = TrustedSetup::from_file(&args.file)?;
    if restored != setup {
        return Err(format!(
            "setup written to '{}' does not read back identically",
            args.file.display()
        )
        .into());
    }
    info!(file = %args.file.display(), "trusted setup written and validated");
    println!(
        "success: the trusted setup has been generated and saved into '{}'",
        args.file.display()
    );
    Ok(())
}

/// Prompts until a long enough passphrase arrives, echo off.
fn read_passphrase() -> Result<Vec<u8>, std::io::Error> {
    loop {
        print!(
            "please enter a passphrase of at least {MIN_PASSPHRASE_BYTES} bytes \
             and press ENTER (CTRL-C to exit) > "
        );
        std::io::stdout().flush()?;
        let passphrase = rpassword::read_password()?.into_bytes();
        println!();
        if passphrase.len() < MIN_PASSPHRASE_BYTES {
            eprintln!("passphrase too short");
            continue;
        }
        return Ok(passphrase);
    }
}

#[cfg(unix)]
fn write_owner_only(path: &Path, data: &[u8]) -> Result<(), std::io::Error> {
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(data)
}

#[cfg(not(unix))]
fn write_owner_only(path: &Path, data: &[u8]) -> Result<(), std::io::Error> {
    std::fs::write(path, data)
}
