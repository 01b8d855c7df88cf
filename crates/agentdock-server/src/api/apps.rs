// ABOUTME: App listing and detail API handlers over the discovered app set.
// ABOUTME: Exposes manifest metadata and the agent graph, never filesystem paths.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use agentdock_core::AgentApp;

use crate::app_state::SharedState;

/// Summary of an app for the list endpoint.
#[derive(Debug, Serialize)]
pub struct AppSummary {
    pub name: String,
    pub description: String,
    pub root_agent: String,
    pub agent_count: usize,
}

impl AppSummary {
    pub fn from_app(app: &AgentApp) -> Self {
        Self {
            name: app.name().to_string(),
            description: app.manifest.app.description.clone(),
            root_agent: app.graph.root_agent.clone(),
            agent_count: app.graph.agents.len(),
        }
    }
}

/// One agent in the detail view.
#[derive(Debug, Serialize)]
pub struct AgentView {
    pub name: String,
    pub model: Option<String>,
    pub description: String,
    pub tools: Vec<String>,
    pub agent_tools: Vec<String>,
    pub sub_agents: Vec<String>,
}

/// Full detail of an app.
#[derive(Debug, Serialize)]
pub struct AppDetail {
    pub name: String,
    pub description: String,
    pub provider: Option<String>,
    pub default_model: Option<String>,
    pub required_env: Vec<String>,
    pub root_agent: String,
    pub agents: Vec<AgentView>,
}

/// GET /api/apps - List all discovered apps.
pub async fn list_apps(State(state): State<SharedState>) -> Json<Vec<AppSummary>> {
    let mut summaries: Vec<AppSummary> = state
        .apps
        .values()
        .map(|app| AppSummary::from_app(app))
        .collect();
    summaries.sort_by(|a, b| a.name.cmp(&b.name));
    Json(summaries)
}

/// GET /api/apps/{app} - App detail including the agent graph.
pub async fn get_app(
    State(state): State<SharedState>,
    Path(app_name): Path<String>,
) -> impl IntoResponse {
    let Some(app) = state.app(&app_name) else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "app not found" })),
        )
            .into_response();
    };

    let agents = app
        .graph
        .agents
        .iter()
        .map(|a| AgentView {
            name: a.name.clone(),
            model: a.model.clone(),
            description: a.description.clone(),
            tools: a.tools.clone(),
            agent_tools: a.agent_tools.clone(),
            sub_agents: a.sub_agents.clone(),
        })
        .collect();

    Json(AppDetail {
        name: app.name().to_string(),
        description: app.manifest.app.description.clone(),
        provider: app.manifest.provider.name.clone(),
        default_model: app.manifest.provider.model.clone(),
        required_env: app.manifest.required_env.clone(),
        root_agent: app.graph.root_agent.clone(),
        agents,
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use crate::app_state::test_support::test_state;
    use crate::routes::create_router;
    use axum::body::Body;
    use http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn json_body(resp: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn list_apps_returns_discovered_apps() {
        let dir = TempDir::new().unwrap();
        let app = create_router(test_state(dir.path().to_path_buf()));

        let resp = app
            .oneshot(Request::get("/api/apps").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        let json = json_body(resp).await;
        let apps = json.as_array().unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0]["name"], "demo");
        assert_eq!(apps[0]["root_agent"], "helper");
        assert_eq!(apps[0]["agent_count"], 1);
    }

    #[tokio::test]
    async fn get_app_returns_agent_graph() {
        let dir = TempDir::new().unwrap();
        let app = create_router(test_state(dir.path().to_path_buf()));

        let resp = app
            .oneshot(Request::get("/api/apps/demo").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        let json = json_body(resp).await;
        assert_eq!(json["name"], "demo");
        assert_eq!(json["agents"][0]["name"], "helper");
    }

    #[tokio::test]
    async fn get_unknown_app_is_404() {
        let dir = TempDir::new().unwrap();
        let app = create_router(test_state(dir.path().to_path_buf()));

        let resp = app
            .oneshot(Request::get("/api/apps/ghost").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), 404);
    }
}
