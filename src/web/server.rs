//! HTTP server for the task tracker.
//!
//! Serves the server-rendered UI pages and mounts the REST API routes from
//! [`super::api`] on one axum router.

use axum::{
    Router,
    extract::{Form, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{api, auth, templates};
use crate::config::Config;
use crate::db::Database;
use crate::db::prefs::parse_reminder_time;
use crate::types::{NewTask, Task, TaskFilter, TaskPatch};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Arc<Database>, config: Arc<Config>) -> Self {
        Self { db, config }
    }
}

pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn not_found_page() -> Response {
    (StatusCode::NOT_FOUND, Html("<h1>Not found</h1>")).into_response()
}

/// Root endpoint - bounce straight to the task list.
async fn index() -> Redirect {
    Redirect::to("/tasks")
}

// =============================================================================
// Auth pages
// =============================================================================

#[derive(Debug, Deserialize)]
struct LoginPageParams {
    next: Option<String>,
}

fn render_login(next: &str, error: &str) -> Html<String> {
    Html(
        templates::LOGIN_TEMPLATE
            .replace("{next}", &html_escape(next))
            .replace("{error}", &html_escape(error)),
    )
}

async fn login_page(Query(params): Query<LoginPageParams>) -> Html<String> {
    render_login(params.next.as_deref().unwrap_or(""), "")
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    username: String,
    password: String,
    next: Option<String>,
}

async fn login_submit(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let next = form.next.as_deref().filter(|n| n.starts_with('/'));

    match state.db.authenticate(&form.username, &form.password) {
        Ok(Some(user)) => {
            let ttl = state.config.server.session_ttl_hours;
            match state.db.create_session(user.id, ttl) {
                Ok(token) => (
                    AppendHeaders([(header::SET_COOKIE, auth::session_cookie(&token))]),
                    Redirect::to(next.unwrap_or("/tasks")),
                )
                    .into_response(),
                Err(e) => {
                    tracing::error!("failed to create session: {e}");
                    render_login(next.unwrap_or(""), "Something went wrong, try again")
                        .into_response()
                }
            }
        }
        Ok(None) => render_login(next.unwrap_or(""), "Invalid username or password")
            .into_response(),
        Err(e) => {
            tracing::error!("login failed: {e}");
            render_login(next.unwrap_or(""), "Something went wrong, try again").into_response()
        }
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = auth::session_token(&headers) {
        let _ = state.db.delete_session(&token);
    }
    (
        AppendHeaders([(header::SET_COOKIE, auth::clear_session_cookie())]),
        Redirect::to("/user/login"),
    )
        .into_response()
}

fn render_signup(error: &str) -> Html<String> {
    Html(templates::SIGNUP_TEMPLATE.replace("{error}", &html_escape(error)))
}

async fn signup_page() -> Html<String> {
    render_signup("")
}

#[derive(Debug, Deserialize)]
struct SignupForm {
    username: String,
    #[serde(default)]
    email: String,
    password: String,
}

async fn signup_submit(State(state): State<AppState>, Form(form): Form<SignupForm>) -> Response {
    match state
        .db
        .create_user(&form.username, &form.email, &form.password)
    {
        Ok(_) => Redirect::to("/user/login").into_response(),
        Err(e) => render_signup(&e.to_string()).into_response(),
    }
}

// =============================================================================
// Preferences
// =============================================================================

fn render_preferences(enabled: bool, reminder_time: &str, error: &str) -> Html<String> {
    Html(
        templates::PREFERENCES_TEMPLATE
            .replace("{enabled_checked}", if enabled { "checked" } else { "" })
            .replace("{reminder_time}", &html_escape(reminder_time))
            .replace("{error}", &html_escape(error)),
    )
}

async fn preferences_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match auth::ui_user(&state, &headers, "/user/preferences") {
        Ok(user) => user,
        Err(redirect) => return redirect.into_response(),
    };

    match state.db.get_or_create_preferences(user.id) {
        Ok(prefs) => {
            render_preferences(prefs.reminder_enabled, &prefs.reminder_time, "").into_response()
        }
        Err(e) => {
            tracing::error!("failed to load preferences: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, Html("<h1>Error</h1>")).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct PreferencesForm {
    reminder_enabled: Option<String>,
    reminder_time: Option<String>,
}

async fn preferences_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<PreferencesForm>,
) -> Response {
    let user = match auth::ui_user(&state, &headers, "/user/preferences") {
        Ok(user) => user,
        Err(redirect) => return redirect.into_response(),
    };

    let enabled = form.reminder_enabled.is_some();

    // Browsers post HH:MM unless a seconds step is honored.
    let time = match form.reminder_time.as_deref() {
        None | Some("") => "00:00:00".to_string(),
        Some(t) if t.len() == 5 => format!("{}:00", t),
        Some(t) => t.to_string(),
    };
    if parse_reminder_time(&time).is_none() {
        return render_preferences(enabled, &time, "Enter a valid time (HH:MM:SS)")
            .into_response();
    }

    match state.db.update_preferences(user.id, enabled, &time) {
        Ok(_) => Redirect::to("/tasks").into_response(),
        Err(e) => {
            tracing::error!("failed to update preferences: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, Html("<h1>Error</h1>")).into_response()
        }
    }
}

// =============================================================================
// Task pages
// =============================================================================

#[derive(Debug, Deserialize)]
struct TasksPageParams {
    filter: Option<String>,
}

fn task_row(task: &Task) -> String {
    let done = if task.completed { " class=\"done\"" } else { "" };
    let toggle_label = if task.completed { "Reopen" } else { "Done" };
    format!(
        "        <li><span class=\"priority\">{priority}</span><span{done}>{title}</span><span class=\"badge\">{status}</span><span class=\"actions\"><a href=\"/toggle_complete_task/{id}\">{toggle}</a> <a href=\"/update_task/{id}\">Edit</a> <a href=\"/delete_task/{id}\">Delete</a></span></li>\n",
        priority = task.priority,
        done = done,
        title = html_escape(&task.title),
        status = task.status.label(),
        id = task.id,
        toggle = toggle_label,
    )
}

async fn tasks_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<TasksPageParams>,
) -> Response {
    let user = match auth::ui_user(&state, &headers, "/tasks") {
        Ok(user) => user,
        Err(redirect) => return redirect.into_response(),
    };

    let filter = TaskFilter {
        completed: match params.filter.as_deref() {
            Some("completed") => Some(true),
            Some("pending") => Some(false),
            _ => None,
        },
        ..Default::default()
    };

    let (tasks, counts) = match (
        state.db.list_tasks(user.id, &filter),
        state.db.task_counts(user.id),
    ) {
        (Ok(tasks), Ok(counts)) => (tasks, counts),
        _ => {
            return (StatusCode::INTERNAL_SERVER_ERROR, Html("<h1>Error</h1>")).into_response();
        }
    };

    let rows = if tasks.is_empty() {
        "        <li class=\"empty\">No tasks here yet.</li>\n".to_string()
    } else {
        tasks.iter().map(task_row).collect()
    };

    Html(
        templates::TASKS_TEMPLATE
            .replace("{completed}", &counts.completed.to_string())
            .replace("{total}", &counts.total.to_string())
            .replace("{rows}", &rows),
    )
    .into_response()
}

#[derive(Debug, Deserialize)]
struct TaskForm {
    title: String,
    #[serde(default)]
    description: String,
    priority: i32,
    completed: Option<String>,
}

fn render_task_form(heading: &str, action: &str, task: Option<&Task>) -> Html<String> {
    let (title, description, priority, checked) = match task {
        Some(t) => (
            html_escape(&t.title),
            html_escape(&t.description),
            t.priority.to_string(),
            if t.completed { "checked" } else { "" },
        ),
        None => (String::new(), String::new(), String::new(), ""),
    };

    Html(
        templates::TASK_FORM_TEMPLATE
            .replace("{heading}", heading)
            .replace("{action}", action)
            .replace("{title}", &title)
            .replace("{description}", &description)
            .replace("{priority}", &priority)
            .replace("{completed_checked}", checked),
    )
}

async fn add_task_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(redirect) = auth::ui_user(&state, &headers, "/add_task") {
        return redirect.into_response();
    }
    render_task_form("Add task", "/add_task", None).into_response()
}

async fn add_task_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<TaskForm>,
) -> Response {
    let user = match auth::ui_user(&state, &headers, "/add_task") {
        Ok(user) => user,
        Err(redirect) => return redirect.into_response(),
    };

    let input = NewTask {
        title: form.title,
        description: form.description,
        priority: form.priority,
        completed: form.completed.is_some(),
        ..Default::default()
    };

    match state.db.create_task(user.id, input) {
        Ok(_) => Redirect::to("/tasks").into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Html(format!("<h1>Invalid task</h1><p>{}</p>", html_escape(&e.to_string()))),
        )
            .into_response(),
    }
}

async fn edit_task_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<i64>,
) -> Response {
    let user = match auth::ui_user(&state, &headers, "/tasks") {
        Ok(user) => user,
        Err(redirect) => return redirect.into_response(),
    };

    match state.db.get_task(user.id, task_id) {
        Ok(Some(task)) => render_task_form(
            "Edit task",
            &format!("/update_task/{}", task_id),
            Some(&task),
        )
        .into_response(),
        Ok(None) => not_found_page(),
        Err(e) => {
            tracing::error!("failed to load task: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, Html("<h1>Error</h1>")).into_response()
        }
    }
}

async fn edit_task_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<i64>,
    Form(form): Form<TaskForm>,
) -> Response {
    let user = match auth::ui_user(&state, &headers, "/tasks") {
        Ok(user) => user,
        Err(redirect) => return redirect.into_response(),
    };

    // Form saves never touch status, so no history is written on this path.
    let patch = TaskPatch {
        title: Some(form.title),
        description: Some(form.description),
        priority: Some(form.priority),
        completed: Some(form.completed.is_some()),
        status: None,
    };

    match state.db.update_task(user.id, task_id, patch, false) {
        Ok(Some(_)) => Redirect::to("/tasks").into_response(),
        Ok(None) => not_found_page(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Html(format!("<h1>Invalid task</h1><p>{}</p>", html_escape(&e.to_string()))),
        )
            .into_response(),
    }
}

async fn delete_task_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<i64>,
) -> Response {
    let user = match auth::ui_user(&state, &headers, "/tasks") {
        Ok(user) => user,
        Err(redirect) => return redirect.into_response(),
    };

    match state.db.get_task(user.id, task_id) {
        Ok(Some(task)) => Html(
            templates::TASK_DELETE_TEMPLATE
                .replace("{title}", &html_escape(&task.title))
                .replace("{action}", &format!("/delete_task/{}", task_id)),
        )
        .into_response(),
        Ok(None) => not_found_page(),
        Err(e) => {
            tracing::error!("failed to load task: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, Html("<h1>Error</h1>")).into_response()
        }
    }
}

async fn delete_task_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<i64>,
) -> Response {
    let user = match auth::ui_user(&state, &headers, "/tasks") {
        Ok(user) => user,
        Err(redirect) => return redirect.into_response(),
    };

    // UI deletion is a soft delete; the row stays for the API's hard path.
    match state.db.soft_delete_task(user.id, task_id) {
        Ok(true) => Redirect::to("/tasks").into_response(),
        Ok(false) => not_found_page(),
        Err(e) => {
            tracing::error!("failed to delete task: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, Html("<h1>Error</h1>")).into_response()
        }
    }
}

async fn toggle_complete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<i64>,
) -> Response {
    let user = match auth::ui_user(&state, &headers, "/tasks") {
        Ok(user) => user,
        Err(_) => return Redirect::to("/user/login").into_response(),
    };

    // A miss (foreign or deleted task) is a silent no-op.
    let _ = state.db.toggle_complete(user.id, task_id);
    Redirect::to("/tasks").into_response()
}

// =============================================================================
// Router and lifecycle
// =============================================================================

/// Build the router with all UI and API routes.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // UI routes
        .route("/", get(index))
        .route("/user/login", get(login_page).post(login_submit))
        .route("/user/logout", get(logout))
        .route("/user/signup", get(signup_page).post(signup_submit))
        .route(
            "/user/preferences",
            get(preferences_page).post(preferences_submit),
        )
        .route("/tasks", get(tasks_page))
        .route("/add_task", get(add_task_page).post(add_task_submit))
        .route(
            "/update_task/{id}",
            get(edit_task_page).post(edit_task_submit),
        )
        .route(
            "/delete_task/{id}",
            get(delete_task_page).post(delete_task_submit),
        )
        .route("/toggle_complete_task/{id}", get(toggle_complete))
        // REST API routes
        .route(
            "/api/tasks",
            get(api::list_tasks).post(api::create_task),
        )
        .route(
            "/api/tasks/{id}",
            get(api::get_task)
                .patch(api::update_task)
                .put(api::update_task)
                .delete(api::delete_task),
        )
        .route("/api/tasks/{id}/history", get(api::task_history))
        .route("/api/history", get(api::list_history))
        .route("/api/health", get(api::health))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server on the configured port.
///
/// Returns a oneshot sender that can be used to signal shutdown,
/// and the actual address the server is bound to.
pub async fn start_server(
    db: Arc<Database>,
    config: Arc<Config>,
) -> anyhow::Result<(oneshot::Sender<()>, SocketAddr)> {
    let port = config.server.port;
    let state = AppState::new(db, config);
    let app = build_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("taskdeck listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("web server shutting down");
            })
            .await
        {
            tracing::error!("web server error: {}", e);
        }
    });

    Ok((shutdown_tx, bound_addr))
}
