use bucket_kv::prelude::*;
use clap::{Parser, ValueEnum};
use color_eyre::eyre::{eyre, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Memory,
    Local,
    S3,
    Gcs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CodecArg {
    Json,
    Bincode,
}

/// Store, retrieve, print and delete a value through bucket-kv
#[derive(Debug, Parser)]
#[command(name = "kv-demo", version)]
struct Args {
    /// Bucket to store the value in
    #[arg(short, long, default_value = "bucket-kv-demo")]
    bucket: String,

    /// Prefix for the object path
    #[arg(long, default_value = "")]
    base_path: String,

    /// Key to use
    #[arg(short, long, default_value = "foo123")]
    key: String,

    /// Storage backend
    #[arg(long, value_enum, default_value_t = BackendArg::Local)]
    backend: BackendArg,

    /// Value codec
    #[arg(long, value_enum, default_value_t = CodecArg::Json)]
    codec: CodecArg,

    /// Root directory for the local backend
    #[arg(long, default_value = "./storage")]
    root: PathBuf,

    /// Region for the S3 backend
    #[arg(long, default_value = "us-east-1")]
    region: String,

    /// Endpoint URL for S3-compatible services
    #[arg(long)]
    endpoint: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Foo {
    bar: String,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    match args.backend {
        BackendArg::Memory => run_backend::<MemoryBackend>(&args, MemoryBackend::new()),
        BackendArg::Local => {
            let config = LocalConfig {
                root: args.root.clone(),
                ..Default::default()
            };
            run_backend::<LocalBackend>(&args, config)
        }
        BackendArg::S3 => run_s3(&args),
        BackendArg::Gcs => run_gcs(&args),
    }
}

#[cfg(feature = "s3")]
fn run_s3(args: &Args) -> color_eyre::Result<()> {
    let config = S3Config {
        region: args.region.clone(),
        endpoint_url: args.endpoint.clone(),
        path_style: args.endpoint.is_some(),
        ..Default::default()
    };
    run_backend::<S3Backend>(args, config)
}

#[cfg(not(feature = "s3"))]
fn run_s3(args: &Args) -> color_eyre::Result<()> {
    info!(region = %args.region, endpoint = ?args.endpoint, "S3 backend requested");
    Err(eyre!("kv-demo was built without the `s3` feature"))
}

#[cfg(feature = "gcs")]
fn run_gcs(args: &Args) -> color_eyre::Result<()> {
    run_backend::<GcsBackend>(args, GcsConfig::default())
}

#[cfg(not(feature = "gcs"))]
fn run_gcs(args: &Args) -> color_eyre::Result<()> {
    info!(bucket = %args.bucket, "GCS backend requested");
    Err(eyre!("kv-demo was built without the `gcs` feature"))
}

fn run_backend<B: ObjectBackend>(args: &Args, config: B::Config) -> color_eyre::Result<()> {
    match args.codec {
        CodecArg::Json => run::<B, JsonCodec>(args, config),
        CodecArg::Bincode => run::<B, BincodeCodec>(args, config),
    }
}

fn run<B: ObjectBackend, C: Codec + Default>(
    args: &Args,
    config: B::Config,
) -> color_eyre::Result<()> {
    let options = StoreOptions::<C>::new(&args.bucket).with_base_path(&args.base_path);
    let store = ObjectStoreAdapter::<B, C>::new(options, config)
        .wrap_err("failed to open key-value store")?;
    info!(path = %store.object_path(&args.key), "using object path");

    let result = interact_with_store(&store, &args.key);
    store.close().wrap_err("failed to close key-value store")?;
    result
}

/// Stores, retrieves, prints and deletes a value.
/// It's completely independent of the store implementation.
fn interact_with_store<S: Store>(store: &S, key: &str) -> color_eyre::Result<()> {
    let val = Foo {
        bar: "baz".to_string(),
    };
    store.set(key, &val)?;

    let retrieved: Option<Foo> = store.get(key)?;
    let retrieved = retrieved.ok_or_else(|| eyre!("Value not found"))?;
    println!("foo: {:?}", retrieved);

    store.delete(key)?;
    Ok(())
}
