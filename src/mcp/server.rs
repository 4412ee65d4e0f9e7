//! Nutriscan MCP Server Implementation
//!
//! Implements the MCP server with all nutriscan tools.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::pipeline::NutritionPipeline;
use crate::tools::estimate::{self, EstimateError, EstimateNutritionParams};
use crate::tools::reference;
use crate::tools::status::StatusTracker;

/// Nutriscan MCP Service
#[derive(Clone)]
pub struct NutriscanService {
    pipeline: Arc<NutritionPipeline>,
    status_tracker: Arc<Mutex<StatusTracker>>,
    tool_router: ToolRouter<NutriscanService>,
}

impl NutriscanService {
    pub fn new(pipeline: NutritionPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            status_tracker: Arc::new(Mutex::new(StatusTracker::new())),
            tool_router: Self::tool_router(),
        }
    }
}

// ============================================================================
// Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct LookupFoodParams {
    /// Detector class name, e.g. "banana"
    pub class_name: String,
}

fn to_json<T: Serialize>(value: &T) -> Result<String, McpError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(format!("Serialization error: {}", e), None))
}

fn estimate_error(e: EstimateError) -> McpError {
    if e.is_caller_error() {
        McpError::invalid_params(e.to_string(), None)
    } else {
        tracing::error!(error = %e, "Estimate failed");
        McpError::internal_error(e.to_string(), None)
    }
}

#[tool_router]
impl NutriscanService {
    // --- Status ---

    #[tool(description = "Get the current status of the nutriscan service including build info, reference data and process information")]
    async fn nutriscan_status(&self) -> Result<CallToolResult, McpError> {
        let tracker = self.status_tracker.lock().await;
        let status = tracker.get_status(&self.pipeline);
        Ok(CallToolResult::success(vec![Content::text(to_json(&status)?)]))
    }

    #[tool(description = "Get instructions for estimating nutrition from detector output. Call this before the first estimate_nutrition call.")]
    fn estimate_instructions(&self) -> Result<CallToolResult, McpError> {
        use crate::tools::status::ESTIMATE_INSTRUCTIONS;
        Ok(CallToolResult::success(vec![Content::text(ESTIMATE_INSTRUCTIONS)]))
    }

    // --- Estimation ---

    #[tool(description = "Estimate the nutrition of the food visible in one image from object-detector output (class, confidence, bounding box and optional mask pixel count per detection)")]
    async fn estimate_nutrition(
        &self,
        Parameters(p): Parameters<EstimateNutritionParams>,
    ) -> Result<CallToolResult, McpError> {
        let response = estimate::estimate_nutrition(&self.pipeline, &p).map_err(estimate_error)?;
        self.status_tracker
            .lock()
            .await
            .record_estimate(response.report.is_empty());
        Ok(CallToolResult::success(vec![Content::text(to_json(&response)?)]))
    }

    // --- Reference Data ---

    #[tool(description = "Look up the reference nutrition values used for one detector class")]
    fn lookup_food(&self, Parameters(p): Parameters<LookupFoodParams>) -> Result<CallToolResult, McpError> {
        if p.class_name.trim().is_empty() {
            return Err(McpError::invalid_params("class_name must not be empty", None));
        }
        let response = reference::lookup_food(&self.pipeline, &p.class_name);
        Ok(CallToolResult::success(vec![Content::text(to_json(&response)?)]))
    }

    #[tool(description = "List the detector classes treated as food, and which of them lack reference data")]
    fn list_known_classes(&self) -> Result<CallToolResult, McpError> {
        let response = reference::list_known_classes(&self.pipeline);
        Ok(CallToolResult::success(vec![Content::text(to_json(&response)?)]))
    }
}

#[tool_handler]
impl ServerHandler for NutriscanService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "nutriscan".into(),
                version: crate::build_info::VERSION.into(),
                title: Some("Nutriscan".into()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Nutriscan - nutrition estimates for fruit and vegetables from object-detector output. \
                 Call estimate_instructions first. \
                 Estimate: estimate_nutrition. \
                 Reference data: lookup_food, list_known_classes. \
                 Service: nutriscan_status."
                    .into(),
            ),
        }
    }
}
