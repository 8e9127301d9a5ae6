//! Minijinja templates for HTML reports and notification messages.
//!
//! Escaping follows the template name: `.html` templates are HTML
//! auto-escaped, `.txt` templates render verbatim. A fresh
//! [`minijinja::Environment`] is built per render call.

use minijinja::{context, Environment};

/// Report wrapped for a mail body or the `html` output format.
pub const REPORT_HTML: &str = "report.html";
/// Subject of the notification for a finished pass.
pub const SUCCESS_SUBJECT: &str = "success_subject.txt";
/// Subject of the notification for an aborted pass.
pub const FAILURE_SUBJECT: &str = "failure_subject.txt";

const TEMPLATES: &[(&str, &str)] = &[
    (REPORT_HTML, "<p>{{ title }}</p>\n<pre>{{ body }}</pre>\n"),
    (SUCCESS_SUBJECT, "{{ title }} has been done"),
    (FAILURE_SUBJECT, "{{ title }} has failed"),
];

fn build_env() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();
    for &(name, source) in TEMPLATES {
        env.add_template(name, source)?;
    }
    Ok(env)
}

/// Render the named template with `title` and `body` in scope.
pub fn render(name: &str, title: &str, body: &str) -> Result<String, minijinja::Error> {
    let env = build_env()?;
    env.get_template(name)?.render(context! { title, body })
}
