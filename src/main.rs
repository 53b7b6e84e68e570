mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rangedl::config::{ClientConfig, RetryLimit, Setting, DEFAULT_USER_AGENT};
use rangedl::manager::{self, Request};
use rangedl::{cancel, logging, Outcome, ReqwestTransport};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL to download
    #[arg(index = 1)]
    url: Option<String>,

    /// URL to download (alternative to the positional argument)
    #[arg(long = "url", conflicts_with = "url")]
    url_flag: Option<String>,

    /// Output directory (default current directory)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// File name (default from server)
    #[arg(short = 'O', long = "file-name")]
    file_name: Option<String>,

    /// Overwrite an existing file and discard its checkpoint
    #[arg(short = 'f', long)]
    force: bool,

    /// Custom HTTP header, repeatable ("Name: value")
    #[arg(short = 'H', long = "header", value_parser = cli::parse_header)]
    headers: Vec<(String, String)>,

    /// Netscape cookies file
    #[arg(short = 'C', long = "cookies")]
    cookies: Option<PathBuf>,

    /// HTTP Referer
    #[arg(short = 'r', long)]
    referer: Option<String>,

    /// HTTP User-Agent
    #[arg(long = "ua", default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Proxy URL (http, https or socks5)
    #[arg(short = 'p', long)]
    proxy: Option<String>,

    /// Chunk size, e.g. 1M, 4M, 1G
    #[arg(short = 'c', long = "chunk-size", default_value = "1M", value_parser = cli::parse_chunk_size)]
    chunk_size: u64,

    /// Number of concurrent chunk downloads (1-16)
    #[arg(short = 'j', long = "threads", default_value = "4", value_parser = cli::parse_threads)]
    threads: usize,

    /// Maximum retry passes, -1 for infinite retry
    #[arg(short = 't', long = "max-retry", default_value_t = 3, allow_negative_numbers = true)]
    max_retry: i64,

    /// Disable HTTP/2
    #[arg(long = "no-h2")]
    no_h2: bool,

    /// Debug logging for this tool (RUST_LOG overrides)
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    logging::init_logging(args.verbose);

    let code = match run(args) {
        Ok(Outcome::Completed) => {
            println!("Download completed");
            0
        }
        Ok(Outcome::Cancelled) => 130,
        Err(e) => {
            eprintln!("Download failed: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}

fn run(args: Args) -> Result<Outcome> {
    let Some(url) = args.url.or(args.url_flag) else {
        bail!("please input URL");
    };
    cli::check_scheme(&url)?;

    let output_dir = args.output.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&output_dir).context("cannot create directory")?;

    let headers = cli::finalize_headers(args.headers, args.referer.as_deref(), &args.user_agent);
    let client_config = ClientConfig {
        user_agent: args.user_agent,
        proxy: args.proxy,
        cookies_file: args.cookies,
        http1_only: args.no_h2,
    };
    let setting = Setting {
        chunk_size: args.chunk_size,
        threads: args.threads,
        max_retry: RetryLimit::from_flag(args.max_retry),
        force: args.force,
        ..Setting::default()
    };
    let request = Request {
        url,
        output_dir,
        file_name: args.file_name,
        headers,
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let transport = Arc::new(ReqwestTransport::new(&client_config)?);
        let token = CancellationToken::new();
        let listener = cancel::listen(token.clone());

        let result = manager::download(transport, request, setting, token.clone()).await;
        token.cancel();
        if let Err(e) = listener.await {
            tracing::warn!(error = %e, "signal listener did not stop cleanly");
        }

        Ok::<_, anyhow::Error>(result?.outcome)
    })
}
