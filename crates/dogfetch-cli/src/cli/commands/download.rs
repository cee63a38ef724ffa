use dogfetch::{DogService, FetchError};
use image::ImageFormat;
use tracing::info;

use crate::cli::args::DownloadArgs;
use crate::exit_codes;

/// Image loads are best effort, so a failed fetch has no error to report;
/// it exits with `IMAGE_UNAVAILABLE` instead.
pub async fn download(service: &DogService, args: DownloadArgs) -> Result<i32, FetchError> {
    let Some(bitmap) = service.image(&args.url).await else {
        eprintln!("error: could not load image from {}", args.url);
        return Ok(exit_codes::IMAGE_UNAVAILABLE);
    };

    if let Err(e) = bitmap
        .as_rgba()
        .save_with_format(&args.out, ImageFormat::Png)
    {
        eprintln!("error: writing {}: {e}", args.out.display());
        return Ok(exit_codes::WRITE_FAILED);
    }

    info!(
        url = %args.url,
        out = %args.out.display(),
        width = bitmap.width(),
        height = bitmap.height(),
        "image saved"
    );
    Ok(exit_codes::SUCCESS)
}
