use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::convert::Infallible;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use vault_signer::config::{LowSPolicy, RecoveryFormat, SignerConfig};
use vault_signer::eip712::{
    encode_type, recover_address, sign_digest, type_hash, verify_address_str, Signature,
    SigningKey, TypedData,
};
use vault_signer::error::TypedSignError;
use vault_signer::utils::crypto::to_checksum_address;
use vault_signer::utils::logging;
use vault_signer::{log_debug, log_error, log_info, log_warn};

/// Hash, sign and verify EIP-712 typed data documents.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging on stderr
    #[arg(long, global = true)]
    debug: bool,

    /// Accept high-s signatures when verifying
    #[arg(long, global = true)]
    allow_high_s: bool,

    /// Emit v as 0/1 instead of 27/28
    #[arg(long, global = true)]
    raw_v: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the encoded type string and type hash of the primary type
    EncodeType {
        /// Typed data JSON file; stdin when omitted
        file: Option<PathBuf>,
    },
    /// Print the domain separator, struct hash and signing digest
    Hash {
        /// Typed data JSON file; stdin when omitted
        file: Option<PathBuf>,
    },
    /// Sign a typed data document
    Sign {
        /// Typed data JSON file; stdin when omitted
        file: Option<PathBuf>,

        /// Hex private key
        #[arg(
            long,
            env = "VAULT_SIGNER_PRIVATE_KEY",
            hide_env_values = true,
            value_parser = parse_secret
        )]
        private_key: SecretString,
    },
    /// Verify a signature over a typed data document
    Verify {
        /// Typed data JSON file; stdin when omitted
        file: Option<PathBuf>,

        /// 65-byte hex signature (r || s || v)
        #[arg(long)]
        signature: String,

        /// Expected signer address
        #[arg(long)]
        address: String,
    },
    /// Derive the address of a private key
    Address {
        /// Hex private key
        #[arg(
            long,
            env = "VAULT_SIGNER_PRIVATE_KEY",
            hide_env_values = true,
            value_parser = parse_secret
        )]
        private_key: SecretString,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EncodeTypeOutput {
    primary_type: String,
    encoded_type: String,
    type_hash: String,
}

#[derive(Serialize)]
struct SignOutput {
    signature: Signature,
    signer: String,
    digest: String,
    r: String,
    s: String,
    v: u8,
}

#[derive(Serialize)]
struct VerifyOutput {
    valid: bool,
    recovered: Option<String>,
}

#[derive(Serialize)]
struct AddressOutput {
    address: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    logging::init_from_env();
    if cli.debug {
        logging::enable_debug();
    }

    let json = cli.json;
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            report_error(&err, json);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = signer_config(&cli);
    for warning in config.validate() {
        log_warn!("cli", warning);
    }

    match cli.command {
        Command::EncodeType { file } => {
            let typed_data = load_typed_data(file.as_deref())?;
            let primary = &typed_data.primary_type;
            let output = EncodeTypeOutput {
                primary_type: primary.clone(),
                encoded_type: encode_type(&typed_data.types, primary)?,
                type_hash: format!("0x{}", hex::encode(type_hash(&typed_data.types, primary)?)),
            };

            if cli.json {
                print_json(&output)?;
            } else {
                println!("Primary type: {}", output.primary_type);
                println!("Encoded type: {}", output.encoded_type);
                println!("Type hash: {}", output.type_hash);
            }
        }
        Command::Hash { file } => {
            let typed_data = load_typed_data(file.as_deref())?;
            let output = typed_data.pre_image()?.hex();

            if cli.json {
                print_json(&output)?;
            } else {
                println!("Domain separator: {}", output.domain_separator);
                println!("Struct hash: {}", output.struct_hash);
                println!("Digest: {}", output.digest);
            }
        }
        Command::Sign { file, private_key } => {
            let key = load_key(&private_key)?;
            let typed_data = load_typed_data(file.as_deref())?;
            let digest = typed_data.signing_hash()?;
            let signature = sign_digest(&digest, &key, &config)?;

            let output = SignOutput {
                signature,
                signer: key.checksum_address(),
                digest: format!("0x{}", hex::encode(digest)),
                r: format!("0x{}", hex::encode(signature.r)),
                s: format!("0x{}", hex::encode(signature.s)),
                v: signature.v,
            };

            log_info!(
                "cli",
                "signed typed data",
                signer = output.signer,
                digest = output.digest
            );

            if cli.json {
                print_json(&output)?;
            } else {
                println!("Digest: {}", output.digest);
                println!("Signature: {}", output.signature);
                println!("Signer: {}", output.signer);
            }
        }
        Command::Verify {
            file,
            signature,
            address,
        } => {
            let typed_data = load_typed_data(file.as_deref())?;
            let signature = Signature::from_hex(&signature)?;
            let digest = typed_data.signing_hash()?;

            let valid = verify_address_str(&digest, &signature, &address, &config)?;
            let recovered = recover_address(&digest, &signature)
                .ok()
                .map(|a| to_checksum_address(a.as_bytes()));
            log_debug!("cli", "verification finished", valid = valid);

            let output = VerifyOutput { valid, recovered };
            if cli.json {
                print_json(&output)?;
            } else {
                println!("Valid: {}", output.valid);
                if let Some(ref recovered) = output.recovered {
                    println!("Recovered signer: {}", recovered);
                }
            }

            if !valid {
                return Ok(ExitCode::from(1));
            }
        }
        Command::Address { private_key } => {
            let key = load_key(&private_key)?;
            let output = AddressOutput {
                address: key.checksum_address(),
            };

            if cli.json {
                print_json(&output)?;
            } else {
                println!("{}", output.address);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Environment settings, then command-line overrides
fn signer_config(cli: &Cli) -> SignerConfig {
    let mut config = SignerConfig::from_env();
    if cli.allow_high_s {
        config = config.with_low_s(LowSPolicy::Allow);
    }
    if cli.raw_v {
        config = config.with_v_format(RecoveryFormat::Raw);
    }
    config
}

fn parse_secret(value: &str) -> Result<SecretString, Infallible> {
    Ok(SecretString::from(value))
}

fn load_key(private_key: &SecretString) -> Result<SigningKey> {
    Ok(SigningKey::from_hex(private_key.expose_secret())?)
}

fn load_typed_data(path: Option<&Path>) -> Result<TypedData> {
    let payload = match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read typed data from stdin")?;
            buffer
        }
    };

    Ok(TypedData::from_json(&payload)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report_error(err: &anyhow::Error, json: bool) {
    match (err.downcast_ref::<TypedSignError>(), json) {
        (Some(typed), true) => match serde_json::to_string(&typed.report()) {
            Ok(line) => println!("{}", line),
            Err(_) => log_error!("cli", typed.to_string()),
        },
        (None, true) => {
            let line = serde_json::json!({ "code": "io_error", "message": format!("{:#}", err) });
            println!("{}", line);
        }
        (Some(typed), false) => log_error!("cli", typed.to_string()),
        (None, false) => log_error!("cli", format!("{:#}", err)),
    }
}
