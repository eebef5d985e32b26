//! Landing page offering a login button per enabled provider.

use axum::extract::State;
use axum::response::Html;

use crate::AppState;

/// GET /
///
/// With an application allow-list configured, each provider gets one form per
/// application so the login is tagged with where the user is headed.
pub async fn index(State(app_state): State<AppState>) -> Html<String> {
    let gateway = &app_state.gateway;
    let mut forms = String::new();

    for provider in gateway.provider_ids() {
        if gateway.allowed_applications().is_empty() {
            forms.push_str(&login_form(provider, None));
        } else {
            for application in gateway.allowed_applications() {
                forms.push_str(&login_form(provider, Some(application.as_str())));
            }
        }
    }

    if forms.is_empty() {
        forms.push_str("\t<p>No login provider is configured.</p>\n");
    }

    Html(format!(
        "<!DOCTYPE html>
<html lang=\"en\">
<head>
\t<meta charset=\"UTF-8\">
\t<title>Login</title>
</head>
<body>
{forms}</body>
</html>"
    ))
}

fn login_form(provider: &str, application: Option<&str>) -> String {
    let provider_path = urlencoding::encode(provider);
    let (action, label) = match application {
        Some(application) => (
            format!(
                "/oauth/{provider_path}?application={}",
                urlencoding::encode(application)
            ),
            format!("Login with {provider} to {application}"),
        ),
        None => (
            format!("/oauth/{provider_path}"),
            format!("Login with {provider}"),
        ),
    };

    format!(
        "\t<form action=\"{}\" method=\"post\">\n\
         \t\t<input type=\"submit\" value=\"{}\">\n\
         \t</form>\n",
        html_escape::encode_double_quoted_attribute(&action),
        html_escape::encode_double_quoted_attribute(&label),
    )
}
