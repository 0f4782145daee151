//! HTML templates for the server-rendered UI.
//!
//! Templates are embedded at compile time using `include_str!` and use
//! `{placeholder}` slots filled by the handlers.

/// The login page template.
pub const LOGIN_TEMPLATE: &str = include_str!("templates/login.html");

/// The signup page template.
pub const SIGNUP_TEMPLATE: &str = include_str!("templates/signup.html");

/// The task list page template with filters and completion counts.
pub const TASKS_TEMPLATE: &str = include_str!("templates/tasks.html");

/// The shared create/edit task form template.
pub const TASK_FORM_TEMPLATE: &str = include_str!("templates/task_form.html");

/// The delete confirmation page template.
pub const TASK_DELETE_TEMPLATE: &str = include_str!("templates/task_delete.html");

/// The reminder preferences page template.
pub const PREFERENCES_TEMPLATE: &str = include_str!("templates/preferences.html");
