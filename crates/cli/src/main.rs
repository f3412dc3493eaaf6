use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use signature_kms::{
    CancellationToken, HashAlgorithm, Registry, RpcAuth, RpcOptions, SignerVerifier, local,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(name = "kms", about = "Sign and verify through registered KMS providers")]
struct Args {
    #[clap(long, env = "KMS_HASH_ALGORITHM", default_value = "sha256")]
    hash_algorithm: HashAlgorithm,
    #[clap(long, env = "KMS_KEY_VERSION")]
    key_version: Option<String>,
    #[clap(long, env = "KMS_REMOTE_VERIFICATION")]
    remote_verification: bool,
    #[clap(long, env = "KMS_RPC_ADDRESS")]
    rpc_address: Option<String>,
    #[clap(long, env = "KMS_RPC_TOKEN", hide_env_values = true)]
    rpc_token: Option<String>,
    #[clap(long, env = "RUST_LOG", default_value = "warn")]
    log_level: String,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List registered key reference prefixes
    Providers,
    /// Provision a new key and print its public key (DER, hex)
    ///
    /// Local keys are derived, not stored: pass the same --algorithm to
    /// later commands to reach this key.
    CreateKey {
        #[clap(long)]
        key_ref: String,
        /// Defaults to the provider's default algorithm
        #[clap(long)]
        algorithm: Option<String>,
    },
    /// Print the public key (DER, hex)
    PublicKey {
        #[clap(long)]
        key_ref: String,
        #[clap(flatten)]
        key: KeySelection,
    },
    /// Sign a message and print the signature (hex)
    Sign {
        #[clap(long)]
        key_ref: String,
        #[clap(long)]
        message: String,
        #[clap(flatten)]
        key: KeySelection,
    },
    /// Verify a hex signature over a message
    Verify {
        #[clap(long)]
        key_ref: String,
        #[clap(long)]
        message: String,
        #[clap(long)]
        signature: String,
        #[clap(flatten)]
        key: KeySelection,
    },
}

#[derive(clap::Args, Debug, Default)]
struct KeySelection {
    /// Create a key of this algorithm before using it
    #[clap(long)]
    algorithm: Option<String>,
}

impl Args {
    fn rpc_options(&self) -> RpcOptions {
        let mut opts = RpcOptions::default().with_remote_verification(self.remote_verification);
        if let Some(version) = &self.key_version {
            opts = opts.with_key_version(version.clone());
        }
        if self.rpc_address.is_some() || self.rpc_token.is_some() {
            opts = opts.with_auth(RpcAuth {
                address: self.rpc_address.clone().unwrap_or_default(),
                token: self.rpc_token.clone().unwrap_or_default(),
                ..Default::default()
            });
        }
        opts
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log_level))
        .with_writer(std::io::stderr)
        .init();

    let registry = Registry::new();
    local::register(&registry);
    debug!(providers = ?registry.supported_providers(), "kms registry ready");

    let ctx = CancellationToken::new();
    let shutdown = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    run(&registry, &ctx, &args).await
}

async fn open(
    registry: &Registry,
    ctx: &CancellationToken,
    args: &Args,
    key_ref: &str,
) -> Result<Box<dyn SignerVerifier>> {
    registry
        .get(ctx, key_ref, args.hash_algorithm, args.rpc_options())
        .await
        .with_context(|| {
            format!(
                "opening {key_ref} (supported providers: {})",
                registry.supported_providers().join(", ")
            )
        })
}

/// Opens `key_ref` and, if an algorithm was requested, switches to that key.
async fn open_key(
    registry: &Registry,
    ctx: &CancellationToken,
    args: &Args,
    key_ref: &str,
    key: &KeySelection,
) -> Result<Box<dyn SignerVerifier>> {
    let signer = open(registry, ctx, args, key_ref).await?;
    if let Some(algorithm) = &key.algorithm {
        signer
            .create_key(ctx, algorithm)
            .await
            .with_context(|| format!("selecting {algorithm} key"))?;
        debug!(key_ref, %algorithm, "selected key algorithm");
    }
    Ok(signer)
}

async fn run(registry: &Registry, ctx: &CancellationToken, args: &Args) -> Result<()> {
    match &args.command {
        Command::Providers => {
            for prefix in registry.supported_providers() {
                println!("{prefix}");
            }
        }
        Command::CreateKey { key_ref, algorithm } => {
            let signer = open(registry, ctx, args, key_ref).await?;
            let algorithm = algorithm.clone().unwrap_or_else(|| signer.default_algorithm());
            let public_key = signer
                .create_key(ctx, &algorithm)
                .await
                .with_context(|| format!("creating {algorithm} key"))?;
            println!("{}", hex::encode(public_key.to_public_key_der()?));
        }
        Command::PublicKey { key_ref, key } => {
            let signer = open_key(registry, ctx, args, key_ref, key).await?;
            let public_key = signer.public_key(ctx).await.context("fetching public key")?;
            println!("{}", hex::encode(public_key.to_public_key_der()?));
        }
        Command::Sign {
            key_ref,
            message,
            key,
        } => {
            let signer = open_key(registry, ctx, args, key_ref, key).await?;
            let signature = signer
                .sign_message(ctx, message.as_bytes())
                .await
                .context("signing message")?;
            println!("{}", hex::encode(signature));
        }
        Command::Verify {
            key_ref,
            message,
            signature,
            key,
        } => {
            let signer = open_key(registry, ctx, args, key_ref, key).await?;
            let signature = hex::decode(signature.trim_start_matches("0x"))
                .context("decoding signature hex")?;
            signer
                .verify_signature(ctx, &signature, message.as_bytes())
                .await
                .context("verifying signature")?;
            println!("OK");
        }
    }
    Ok(())
}
