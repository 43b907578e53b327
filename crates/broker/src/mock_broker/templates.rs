//! HTML templates for the mock broker pages.

/// Escape HTML special characters to prevent XSS.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn hidden_inputs(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(name, value)| {
            format!(
                r#"        <input type="hidden" name="{}" value="{}" />"#,
                html_escape(name),
                html_escape(value)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Generate an auto-submitting form POST page delivering the callback.
///
/// This is what `response_mode=form_post` looks like from the browser: the
/// callback parameters arrive as a form body rather than a query string.
pub fn form_post_page(redirect_uri: &str, fields: &[(&str, &str)]) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Redirecting...</title>
</head>
<body onload="document.forms[0].submit()">
    <form method="POST" action="{redirect_uri}">
{inputs}
        <noscript>
            <p>JavaScript is disabled. Click the button below to continue.</p>
            <button type="submit">Continue</button>
        </noscript>
    </form>
</body>
</html>"#,
        redirect_uri = html_escape(redirect_uri),
        inputs = hidden_inputs(fields),
    )
}

/// Generate the confirmation page shown by the authorization endpoint.
///
/// `fields` are carried through to the confirm handler unchanged.
pub fn confirm_page(login_hint: &str, fields: &[(&str, &str)]) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Mock Broker Sign In (DEV ONLY)</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, sans-serif;
            max-width: 400px;
            margin: 100px auto;
            padding: 20px;
        }}
        .warning {{
            background: #fff3cd;
            border: 1px solid #ffc107;
            padding: 15px;
            border-radius: 8px;
            margin-bottom: 20px;
        }}
        button {{
            width: 100%;
            padding: 12px;
            margin-bottom: 10px;
            border: none;
            border-radius: 4px;
            cursor: pointer;
            font-size: 16px;
        }}
        .allow {{
            background: #007bff;
            color: white;
        }}
    </style>
</head>
<body>
    <div class="warning">
        <h2>Development Only</h2>
        <p>This is a <strong>mock broker</strong>. No email is sent.</p>
    </div>

    <p>Sign in as <strong>{login_hint}</strong>?</p>

    <form action="/auth/confirm" method="POST">
{inputs}
        <button class="allow" type="submit" name="decision" value="allow">Confirm</button>
        <button type="submit" name="decision" value="deny">Deny</button>
    </form>
</body>
</html>"#,
        login_hint = html_escape(login_hint),
        inputs = hidden_inputs(fields),
    )
}
