// ABOUTME: ToolHandler trait, ToolRegistry, and the builtin function tools agents can call.
// ABOUTME: Tool failures surface as {"error": ...} tool output so the model can react to them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

const YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
const QUOTE_MODULES: &str = "assetProfile,summaryDetail,defaultKeyStatistics,price";

/// Errors that can occur while executing a function tool.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response shape: {0}")]
    Shape(String),

    #[error("missing argument '{0}'")]
    MissingArg(&'static str),
}

/// A function tool agents can invoke. Implementations declare a JSON schema
/// and execute with JSON arguments from the model.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// The tool's name as declared to the model.
    fn name(&self) -> &str;

    /// Neutral declaration: `{ "name", "description", "parameters" }`.
    fn declaration(&self) -> Value;

    /// Execute the tool. Errors here are translated into an error payload
    /// by the caller, not propagated as a run failure.
    async fn call(&self, args: Value) -> Result<Value, ToolError>;
}

/// Registry mapping tool names to handlers.
#[derive(Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own name.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        self.handlers.insert(handler.name().to_string(), handler);
    }

    /// Look up a handler by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Declarations for the named tools, skipping names with no handler.
    pub fn declarations_for<'a>(&self, names: impl Iterator<Item = &'a str>) -> Vec<Value> {
        names
            .filter_map(|name| self.handlers.get(name))
            .map(|handler| handler.declaration())
            .collect()
    }
}

/// Build the registry of builtin function tools.
pub fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(FinancialDataTool::new()));
    registry
}

/// Fetches key financial metrics for a stock ticker from the Yahoo Finance
/// quoteSummary endpoint. Missing metrics are null; fetch failures become an
/// `{"error": ...}` payload returned as the tool output.
pub struct FinancialDataTool {
    client: reqwest::Client,
    base_url: String,
}

impl FinancialDataTool {
    pub fn new() -> Self {
        Self::with_base_url(YAHOO_BASE_URL.to_string())
    }

    /// Point the tool at an alternate endpoint, used by tests.
    pub fn with_base_url(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    async fn fetch(&self, ticker: &str) -> Result<Value, ToolError> {
        let url = format!(
            "{}/v10/finance/quoteSummary/{}?modules={}",
            self.base_url, ticker, QUOTE_MODULES
        );

        let body: Value = self
            .client
            .get(&url)
            // Yahoo rejects requests without a browser-ish user agent.
            .header("user-agent", "Mozilla/5.0 (compatible; agentdock)")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let result = body
            .pointer("/quoteSummary/result/0")
            .ok_or_else(|| ToolError::Shape("missing quoteSummary.result[0]".to_string()))?;

        Ok(extract_metrics(result))
    }
}

impl Default for FinancialDataTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull the metric set out of a quoteSummary result object. Yahoo wraps
/// numbers as {"raw": n, "fmt": "..."}; raw_num unwraps that.
fn extract_metrics(result: &Value) -> Value {
    json!({
        "company_name": result.pointer("/price/longName").cloned().unwrap_or(Value::Null),
        "sector": result.pointer("/assetProfile/sector").cloned().unwrap_or(Value::Null),
        "industry": result.pointer("/assetProfile/industry").cloned().unwrap_or(Value::Null),
        "market_cap": raw_num(result, "/price/marketCap"),
        "pe_ratio": raw_num(result, "/summaryDetail/trailingPE"),
        "forward_pe": raw_num(result, "/summaryDetail/forwardPE"),
        "dividend_yield": raw_num(result, "/summaryDetail/dividendYield"),
        "price_to_book": raw_num(result, "/defaultKeyStatistics/priceToBook"),
        "fifty_two_week_high": raw_num(result, "/summaryDetail/fiftyTwoWeekHigh"),
        "fifty_two_week_low": raw_num(result, "/summaryDetail/fiftyTwoWeekLow"),
        "average_volume": raw_num(result, "/summaryDetail/averageVolume"),
        "short_summary": result.pointer("/assetProfile/longBusinessSummary").cloned().unwrap_or(Value::Null),
    })
}

fn raw_num(result: &Value, path: &str) -> Value {
    let node = match result.pointer(path) {
        Some(n) => n,
        None => return Value::Null,
    };
    if node.is_number() {
        return node.clone();
    }
    node.get("raw").cloned().unwrap_or(Value::Null)
}

#[async_trait]
impl ToolHandler for FinancialDataTool {
    fn name(&self) -> &str {
        "get_financial_data"
    }

    fn declaration(&self) -> Value {
        json!({
            "name": "get_financial_data",
            "description": "Retrieves key financial data for a given stock ticker: company name, sector, industry, market cap, P/E ratios, dividend yield, price-to-book, 52-week range, and average volume.",
            "parameters": {
                "type": "object",
                "properties": {
                    "ticker": {
                        "type": "string",
                        "description": "The stock ticker symbol (e.g. 'GOOGL', 'MSFT')."
                    }
                },
                "required": ["ticker"]
            }
        })
    }

    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        let ticker = args
            .get("ticker")
            .and_then(|t| t.as_str())
            .ok_or(ToolError::MissingArg("ticker"))?
            .to_string();

        match self.fetch(&ticker).await {
            Ok(metrics) => Ok(metrics),
            Err(e) => {
                tracing::warn!(ticker = %ticker, error = %e, "financial data fetch failed");
                Ok(json!({
                    "error": format!("Could not retrieve data for {}. Error: {}", ticker, e)
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_registers_and_resolves() {
        let registry = builtin_registry();
        assert!(registry.get("get_financial_data").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn declarations_for_skips_unknown_names() {
        let registry = builtin_registry();
        let decls =
            registry.declarations_for(["get_financial_data", "made_up_tool"].into_iter());
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0]["name"], "get_financial_data");
        assert!(decls[0]["parameters"]["properties"]["ticker"].is_object());
    }

    #[test]
    fn extract_metrics_unwraps_raw_numbers() {
        let result = json!({
            "price": {
                "longName": "Alphabet Inc.",
                "marketCap": { "raw": 2100000000000u64, "fmt": "2.1T" }
            },
            "assetProfile": {
                "sector": "Communication Services",
                "industry": "Internet Content & Information",
                "longBusinessSummary": "Alphabet provides various products."
            },
            "summaryDetail": {
                "trailingPE": { "raw": 27.4, "fmt": "27.40" },
                "dividendYield": { "raw": 0.005, "fmt": "0.50%" },
                "fiftyTwoWeekHigh": { "raw": 200.0 },
                "fiftyTwoWeekLow": { "raw": 120.0 },
                "averageVolume": { "raw": 25000000 }
            },
            "defaultKeyStatistics": {
                "priceToBook": { "raw": 6.8 }
            }
        });

        let metrics = extract_metrics(&result);
        assert_eq!(metrics["company_name"], "Alphabet Inc.");
        assert_eq!(metrics["market_cap"].as_u64(), Some(2100000000000));
        assert_eq!(metrics["pe_ratio"].as_f64(), Some(27.4));
        assert_eq!(metrics["forward_pe"], Value::Null, "missing metric is null");
        assert_eq!(metrics["sector"], "Communication Services");
    }

    #[test]
    fn extract_metrics_tolerates_bare_numbers() {
        let result = json!({
            "summaryDetail": { "trailingPE": 31.5 }
        });
        let metrics = extract_metrics(&result);
        assert_eq!(metrics["pe_ratio"].as_f64(), Some(31.5));
        assert_eq!(metrics["company_name"], Value::Null);
    }

    #[tokio::test]
    async fn missing_ticker_argument_is_an_error() {
        let tool = FinancialDataTool::new();
        let err = tool.call(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::MissingArg("ticker")));
    }

    #[tokio::test]
    async fn fetch_failure_becomes_error_payload() {
        // Unroutable port: the request fails fast and the tool degrades to
        // an error payload instead of a hard failure.
        let tool = FinancialDataTool::with_base_url("http://127.0.0.1:1".to_string());
        let out = tool.call(json!({"ticker": "GOOGL"})).await.unwrap();
        let error = out["error"].as_str().unwrap();
        assert!(error.contains("GOOGL"));
    }

    #[tokio::test]
    #[cfg(feature = "live-test")]
    async fn live_fetch_returns_metrics() {
        let tool = FinancialDataTool::new();
        let out = tool.call(json!({"ticker": "MSFT"})).await.unwrap();
        assert!(out.get("error").is_none(), "live fetch failed: {}", out);
        assert!(out["company_name"].is_string());
    }
}
