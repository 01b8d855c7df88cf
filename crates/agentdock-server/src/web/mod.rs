// ABOUTME: Web UI route handlers serving HTML via Askama templates.
// ABOUTME: Provides browser-friendly views for apps, sessions, and the live activity feed.

use askama::Template;
use askama_derive_axum::IntoResponse as AskamaIntoResponse;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect};
use pulldown_cmark::{html, Event, Parser};
use ulid::Ulid;

use crate::api::apps::AppSummary;
use crate::app_state::{open_session, SharedState};

/// Index page showing discovered apps and provider status.
#[derive(Template, AskamaIntoResponse)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub apps: Vec<AppSummary>,
    pub any_provider: bool,
    pub default_provider: String,
}

/// GET / - Render the main index page.
pub async fn index(State(state): State<SharedState>) -> IndexTemplate {
    let mut apps: Vec<AppSummary> = state
        .apps
        .values()
        .map(|app| AppSummary::from_app(app))
        .collect();
    apps.sort_by(|a, b| a.name.cmp(&b.name));

    IndexTemplate {
        apps,
        any_provider: state.provider_status.any_available,
        default_provider: state.provider_status.default_provider.clone(),
    }
}

/// One agent row in the app page.
pub struct AgentRow {
    pub name: String,
    pub model: String,
    pub description: String,
    pub capabilities: String,
}

/// One session row in the app page.
pub struct SessionRowView {
    pub session_id: String,
    pub user_id: String,
    pub message_count: usize,
    pub running: bool,
}

/// App page with the agent graph and session list.
#[derive(Template, AskamaIntoResponse)]
#[template(path = "app.html")]
pub struct AppPageTemplate {
    pub name: String,
    pub description: String,
    pub root_agent: String,
    pub agents: Vec<AgentRow>,
    pub sessions: Vec<SessionRowView>,
}

/// GET /web/apps/{app} - Render the app page.
pub async fn app_page(
    State(state): State<SharedState>,
    Path(app_name): Path<String>,
) -> axum::response::Response {
    let Some(app) = state.app(&app_name) else {
        return (StatusCode::NOT_FOUND, "app not found").into_response();
    };

    let agents = app
        .graph
        .agents
        .iter()
        .map(|a| {
            let mut capabilities = Vec::new();
            if !a.tools.is_empty() {
                capabilities.push(format!("tools: {}", a.tools.join(", ")));
            }
            if !a.agent_tools.is_empty() {
                capabilities.push(format!("delegates to: {}", a.agent_tools.join(", ")));
            }
            if !a.sub_agents.is_empty() {
                capabilities.push(format!("transfers to: {}", a.sub_agents.join(", ")));
            }
            AgentRow {
                name: a.name.clone(),
                model: a.model.clone().unwrap_or_else(|| "default".to_string()),
                description: a.description.clone(),
                capabilities: capabilities.join(" · "),
            }
        })
        .collect();

    let mut sessions = Vec::new();
    for handle in state.sessions.list_for_app(&app_name).await {
        let session_state = handle.read_state().await;
        sessions.push(SessionRowView {
            session_id: handle.session_id.to_string(),
            user_id: session_state.user_id.clone(),
            message_count: session_state.transcript.len(),
            running: handle.is_running(),
        });
    }

    AppPageTemplate {
        name: app.name().to_string(),
        description: app.manifest.app.description.clone(),
        root_agent: app.graph.root_agent.clone(),
        agents,
        sessions,
    }
    .into_response()
}

/// POST /web/apps/{app}/sessions - Create a session and open its page.
pub async fn create_session(
    State(state): State<SharedState>,
    Path(app_name): Path<String>,
) -> axum::response::Response {
    if state.app(&app_name).is_none() {
        return (StatusCode::NOT_FOUND, "app not found").into_response();
    }

    match open_session(&state, &app_name, "user").await {
        Ok(handle) => Redirect::to(&format!(
            "/web/apps/{}/sessions/{}",
            app_name, handle.session_id
        ))
        .into_response(),
        Err(e) => {
            tracing::error!(app = %app_name, error = %e, "failed to open session");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to create session").into_response()
        }
    }
}

/// A transcript message rendered for display.
pub struct RenderedMessage {
    pub sender: String,
    pub is_user: bool,
    pub html: String,
}

/// Session page with the transcript and chat input.
#[derive(Template, AskamaIntoResponse)]
#[template(path = "session.html")]
pub struct SessionPageTemplate {
    pub app_name: String,
    pub session_id: String,
    pub messages: Vec<RenderedMessage>,
}

/// Transcript partial used to refresh the conversation after a run.
#[derive(Template, AskamaIntoResponse)]
#[template(path = "partials/transcript.html")]
pub struct TranscriptTemplate {
    pub messages: Vec<RenderedMessage>,
}

/// GET /web/apps/{app}/sessions/{id} - Render the session page.
pub async fn session_page(
    State(state): State<SharedState>,
    Path((app_name, id)): Path<(String, String)>,
) -> axum::response::Response {
    let Some((_, messages)) = load_messages(&state, &id).await else {
        return (StatusCode::NOT_FOUND, "session not found").into_response();
    };

    SessionPageTemplate {
        app_name,
        session_id: id,
        messages,
    }
    .into_response()
}

/// GET /web/apps/{app}/sessions/{id}/transcript - Transcript partial.
pub async fn transcript_partial(
    State(state): State<SharedState>,
    Path((_app_name, id)): Path<(String, String)>,
) -> axum::response::Response {
    let Some((_, messages)) = load_messages(&state, &id).await else {
        return (StatusCode::NOT_FOUND, "session not found").into_response();
    };

    TranscriptTemplate { messages }.into_response()
}

async fn load_messages(
    state: &SharedState,
    id: &str,
) -> Option<(Ulid, Vec<RenderedMessage>)> {
    let session_id = id.parse::<Ulid>().ok()?;
    let handle = state.sessions.get(session_id).await?;
    let session_state = handle.read_state().await;

    let messages = session_state
        .transcript
        .iter()
        .map(|m| RenderedMessage {
            sender: m.sender.clone(),
            is_user: m.is_user(),
            html: render_markdown(&m.content),
        })
        .collect();

    Some((session_id, messages))
}

/// Render agent markdown output as HTML for the transcript view.
/// Raw HTML in model output is downgraded to text so it gets escaped.
fn render_markdown(text: &str) -> String {
    let parser = Parser::new(text).map(|event| match event {
        Event::Html(html) => Event::Text(html),
        Event::InlineHtml(html) => Event::Text(html),
        other => other,
    });
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}
