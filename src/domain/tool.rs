use super::models::SearchResult;
use super::query::{QueryService, DEFAULT_RADIUS_KM};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt::Write as _;
use tracing::error;

pub const TOOL_NAME: &str = "search_photo_albums";

const NO_RESULTS_MESSAGE: &str = "No photos found matching the search.";
const DEFAULT_LIMIT: i64 = 5;
const MIN_LIMIT: i64 = 1;
const MAX_LIMIT: i64 = 10;
const MIN_RADIUS_KM: f64 = 0.1;
const MAX_RADIUS_KM: f64 = 500.0;

#[derive(Debug, Deserialize)]
struct SearchArguments {
    query: String,
    limit: Option<i64>,
    location: Option<String>,
    #[serde(rename = "radiusKm")]
    radius_km: Option<f64>,
}

/// What goes back over the protocol boundary: a text block, flagged as an
/// error when the search could not be carried out.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResponse {
    pub content: String,
    pub is_error: bool,
}

impl ToolResponse {
    fn text(content: impl Into<String>) -> Self {
        ToolResponse {
            content: content.into(),
            is_error: false,
        }
    }

    fn error(content: impl Into<String>) -> Self {
        ToolResponse {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Exposes the photo search as a single callable tool. Out-of-range numeric
/// arguments are clamped rather than rejected, and every failure is turned
/// into an error-flagged response; the caller never sees a raw error.
pub struct PhotoSearchTool {
    service: QueryService,
}

impl PhotoSearchTool {
    pub fn new(service: QueryService) -> Self {
        PhotoSearchTool { service }
    }

    /// The tool contract as advertised to the protocol server.
    pub fn definition() -> Value {
        json!({
            "name": TOOL_NAME,
            "description": "Search a personal photo archive with a natural language description, optionally constrained to a radius around a named place.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Natural language description of the photos to find"
                    },
                    "limit": {
                        "type": "integer",
                        "minimum": MIN_LIMIT,
                        "maximum": MAX_LIMIT,
                        "default": DEFAULT_LIMIT,
                        "description": "Maximum number of results"
                    },
                    "location": {
                        "type": "string",
                        "description": "Optional place name to search around"
                    },
                    "radiusKm": {
                        "type": "number",
                        "minimum": MIN_RADIUS_KM,
                        "maximum": MAX_RADIUS_KM,
                        "default": DEFAULT_RADIUS_KM,
                        "description": "Search radius around the location in kilometers"
                    }
                },
                "required": ["query"]
            }
        })
    }

    pub async fn call(&self, arguments: Value) -> ToolResponse {
        let arguments: SearchArguments = match serde_json::from_value(arguments) {
            Ok(arguments) => arguments,
            Err(e) => return ToolResponse::error(format!("Invalid arguments: {}", e)),
        };

        let limit = arguments
            .limit
            .unwrap_or(DEFAULT_LIMIT)
            .clamp(MIN_LIMIT, MAX_LIMIT) as usize;
        let radius_km = arguments
            .radius_km
            .map(|radius| radius.clamp(MIN_RADIUS_KM, MAX_RADIUS_KM));

        match self
            .service
            .search(
                &arguments.query,
                limit,
                arguments.location.as_deref(),
                radius_km,
            )
            .await
        {
            Ok(results) if results.is_empty() => ToolResponse::text(NO_RESULTS_MESSAGE),
            Ok(results) => ToolResponse::text(format_results(&results)),
            Err(e) => {
                error!("Photo search failed: {:#}", e);
                ToolResponse::error(format!("Photo search failed: {}", e))
            }
        }
    }
}

fn format_results(results: &[SearchResult]) -> String {
    let mut out = format!("Found {} photo(s):\n", results.len());

    for (index, result) in results.iter().enumerate() {
        let _ = writeln!(out, "{}. {}{}", index + 1, result.title, result.extension);
        let _ = writeln!(out, "   URL: {}", result.url);
        match &result.coordinates {
            Some(coordinates) => {
                let _ = writeln!(
                    out,
                    "   GPS: {}, {}",
                    coordinates.latitude, coordinates.longitude
                );
            }
            None => {
                let _ = writeln!(out, "   no GPS data");
            }
        }
        if let Some(score) = result.score {
            let _ = writeln!(out, "   Similarity: {:.3}", score);
        }
    }

    out
}
