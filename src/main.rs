//! Nutriscan
//!
//! An MCP server estimating nutrition from fruit/vegetable detections.

use std::sync::Arc;

use rmcp::ServiceExt;
use tokio::io::{stdin, stdout};
use tracing_subscriber::EnvFilter;

use nutriscan::build_info;
use nutriscan::mcp::NutriscanService;
use nutriscan::{NutritionPipeline, PipelineConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (output to stderr to not interfere with MCP stdio)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("nutriscan=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    // Print startup banner to stderr
    build_info::print_startup_banner();
    eprintln!("Starting MCP server on stdio...");

    let config = PipelineConfig::from_env()?;
    eprintln!(
        "Mode: {} | Lookup: {} | Confidence threshold: {}",
        config.mode,
        config.lookup_policy.as_str(),
        config.confidence_threshold
    );

    // Load reference data once; it is shared read-only by every request
    let store = config.load_store()?;
    eprintln!("Reference data: {} ({} entries)", store.source(), store.len());
    let pipeline = NutritionPipeline::new(Arc::new(store), config)?;

    // Create the nutriscan service
    let service = NutriscanService::new(pipeline);

    // Create stdio transport
    let transport = (stdin(), stdout());

    // Start the MCP server
    let server = service.serve(transport).await?;

    // Wait for the server to complete
    server.waiting().await?;

    Ok(())
}
