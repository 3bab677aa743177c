mod args;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use timeshift_sprite_core::{
    logging, ChannelCallback, Config, FetchCode, FetchResult, Session, SpriteFetcher,
};

use args::Args;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    args.validate()?;

    // 1. Load configuration
    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("Config validation error: {e}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!(
        domain = %args.domain,
        stream_id = %args.stream_id,
        start = args.start,
        end = args.end,
        "Fetching timeshift sprite thumbnails"
    );

    // 3. Build fetcher
    let fetcher = SpriteFetcher::with_http(config.fetcher.clone())?;
    fetcher.init_session(Session::new(
        args.domain.clone(),
        args.path.clone(),
        args.stream_id.clone(),
        args.start,
        args.end,
    ));
    let (callback, mut results) = ChannelCallback::channel();
    fetcher.set_callback(callback);

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create output directory {}", args.output.display()))?;

    // 4. Request offsets one at a time; a newer request would supersede an
    //    outstanding one
    let wait = Duration::from_secs(args.wait_seconds);
    let mut failures = 0usize;
    for &offset in &args.offsets {
        fetcher.get_thumbnail(offset);

        let result = match tokio::time::timeout(wait, results.recv()).await {
            Ok(Some(result)) => result,
            Ok(None) => {
                error!("Fetcher callback channel closed");
                failures += 1;
                break;
            }
            Err(_) => {
                warn!(offset, wait_seconds = args.wait_seconds, "Timed out waiting for thumbnail");
                failures += 1;
                continue;
            }
        };

        if let Err(e) = handle_result(&args.output, &args.stream_id, &result) {
            error!(offset, error = %e, "Thumbnail not saved");
            failures += 1;
        }
    }

    fetcher.clear();

    if failures > 0 {
        anyhow::bail!("{failures} of {} thumbnail(s) failed", args.offsets.len());
    }
    info!(count = args.offsets.len(), "All thumbnails saved");
    Ok(())
}

fn handle_result(output: &Path, stream_id: &str, result: &FetchResult) -> Result<()> {
    let image = match (&result.code, &result.image) {
        (FetchCode::Success, Some(image)) => image,
        (code, _) => anyhow::bail!("fetch failed with {code}"),
    };

    let file = thumbnail_path(output, stream_id, result.offset);
    image
        .save(&file)
        .with_context(|| format!("Failed to write {}", file.display()))?;
    info!(
        offset = result.offset,
        width = image.width(),
        height = image.height(),
        file = %file.display(),
        "Thumbnail saved"
    );
    Ok(())
}

fn thumbnail_path(output: &Path, stream_id: &str, offset: i64) -> PathBuf {
    output.join(format!("{stream_id}_{offset}.png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_path() {
        assert_eq!(
            thumbnail_path(Path::new("/tmp/out"), "stream1", 120),
            PathBuf::from("/tmp/out/stream1_120.png")
        );
    }

    #[test]
    fn test_failed_result_is_error() {
        let result = FetchResult {
            code: FetchCode::NetworkErr,
            offset: 10,
            image: None,
        };
        let err = handle_result(Path::new("."), "s", &result).unwrap_err();
        assert!(err.to_string().contains("NETWORK_ERR(-2)"));
    }
}
