//! Print a nutrition report for a saved detections file
//!
//! Usage: estimate_report <request.json> [--json]
//!
//! The file has the same shape as the estimate_nutrition tool parameters.
//! Configuration comes from the same NUTRISCAN_* environment variables as
//! the server.

use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use nutriscan::tools::estimate::{self, EstimateNutritionParams};
use nutriscan::{NutritionPipeline, PipelineConfig};

struct Args {
    request_path: PathBuf,
    json: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut request_path = None;
    let mut json = false;

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--json" => json = true,
            "-h" | "--help" => return Err(String::new()),
            flag if flag.starts_with('-') => return Err(format!("Unknown option: {}", flag)),
            path if request_path.is_none() => request_path = Some(PathBuf::from(path)),
            extra => return Err(format!("Unexpected argument: {}", extra)),
        }
    }

    request_path
        .map(|request_path| Args { request_path, json })
        .ok_or_else(|| "Missing request file".to_string())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("nutriscan=warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("{}", msg);
            }
            eprintln!("Usage: estimate_report <request.json> [--json]");
            std::process::exit(2);
        }
    };

    let text = std::fs::read_to_string(&args.request_path)?;
    let request: EstimateNutritionParams = serde_json::from_str(&text)?;

    let config = PipelineConfig::from_env()?;
    let store = config.load_store()?;
    let pipeline = NutritionPipeline::new(Arc::new(store), config)?;

    let response = estimate::estimate_nutrition(&pipeline, &request)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("Image: {}x{}", response.image_width, response.image_height);
    println!("Confidence threshold: {}", response.confidence_threshold);
    if let Some(warning) = &response.warning {
        println!("Warning: {}", warning);
    }
    println!();
    print!("{}", response.report);

    Ok(())
}
