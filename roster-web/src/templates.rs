// Roster - membership and identity backend for an XMPP service provider
// Copyright (C) 2026 Roster Project Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tera::Tera;

use crate::markdown::make_markdown_filter;

pub fn init_templates(templates_dir: &str) -> Result<Arc<Tera>> {
    std::fs::create_dir_all(templates_dir).context("Failed to create templates directory")?;

    create_default_templates(templates_dir)?;

    let glob = format!("{}/**/*.html", templates_dir);
    let mut tera = Tera::new(&glob).context("Failed to load templates")?;
    tera.register_filter("markdown", make_markdown_filter());

    Ok(Arc::new(tera))
}

/// Write starter templates into the directory so a fresh deployment renders
/// something sensible. Existing files are never overwritten; operators are
/// expected to replace these with their own design.
fn create_default_templates(templates_dir: &str) -> Result<()> {
    let dir = Path::new(templates_dir);

    for (name, content) in DEFAULT_TEMPLATES {
        let path = dir.join(name);
        if !path.exists() {
            std::fs::write(&path, content)
                .with_context(|| format!("Failed to write template: {}", name))?;
        }
    }

    Ok(())
}

const DEFAULT_TEMPLATES: &[(&str, &str)] = &[
    (
        "base.html",
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{% block title %}{{ site_title | default(value="Roster") }}{% endblock %}</title>
</head>
<body>
    <nav>
        <a href="/">News</a>
        <a href="/contact">Contact</a>
        <a href="/certs">Certificates</a>
        {% if current_user %}
        <a href="/account">{{ current_user }}</a>
        <a href="/logout">Logout</a>
        {% else %}
        <a href="/login">Login</a>
        <a href="/register">Register</a>
        {% endif %}
    </nav>
    {% if message %}<p class="message">{{ message }}</p>{% endif %}
    {% if error %}<p class="error">{{ error }}</p>{% endif %}
    {% block content %}{% endblock %}
</body>
</html>
"#,
    ),
    (
        "index.html",
        r#"{% extends "base.html" %}
{% block content %}
{% for post in posts %}
<article>
    <h2><a href="/blog/{{ post.slug }}">{{ post.title }}</a></h2>
    <time>{{ post.publication_date }}</time>
    {{ post.text | markdown | safe }}
</article>
{% endfor %}
{% endblock %}
"#,
    ),
    (
        "post.html",
        r#"{% extends "base.html" %}
{% block title %}{{ post.title }}{% endblock %}
{% block content %}
<article>
    <h1>{{ post.title }}</h1>
    <time>{{ post.publication_date }}</time>
    {{ post.text | markdown | safe }}
</article>
{% endblock %}
"#,
    ),
    (
        "page.html",
        r#"{% extends "base.html" %}
{% block title %}{{ page.title }}{% endblock %}
{% block content %}
<h1>{{ page.title }}</h1>
{{ page.text | markdown | safe }}
{% endblock %}
"#,
    ),
    (
        "login.html",
        r#"{% extends "base.html" %}
{% block content %}
<h1>Login</h1>
<form method="post" action="/login">
    <input type="text" name="username" placeholder="user@example.com" required>
    <input type="password" name="password" required>
    <button type="submit">Login</button>
</form>
<p><a href="/account/reset-password">Forgot your password?</a></p>
{% endblock %}
"#,
    ),
    (
        "register.html",
        r#"{% extends "base.html" %}
{% block content %}
<h1>Register</h1>
<form method="post" action="/register">
    <input type="text" name="username" required>
    <select name="domain">
        {% for host in hosts %}<option{% if host == default_host %} selected{% endif %}>{{ host }}</option>{% endfor %}
    </select>
    <input type="email" name="email" required>
    <button type="submit">Register</button>
</form>
{% endblock %}
"#,
    ),
    (
        "set_password.html",
        r#"{% extends "base.html" %}
{% block content %}
<h1>Choose a password</h1>
<form method="post">
    <input type="password" name="password" required>
    <button type="submit">Set password</button>
</form>
{% endblock %}
"#,
    ),
    (
        "reset_password.html",
        r#"{% extends "base.html" %}
{% block content %}
<h1>Reset password</h1>
<form method="post" action="/account/reset-password">
    <input type="text" name="username" placeholder="user@example.com" required>
    <button type="submit">Send reset link</button>
</form>
{% endblock %}
"#,
    ),
    (
        "account.html",
        r#"{% extends "base.html" %}
{% block content %}
<h1>{{ current_user }}</h1>
<p>Email: {{ email | default(value="none") }}{% if confirmed %} (confirmed){% endif %}</p>

<h2>Change password</h2>
<form method="post" action="/account/password">
    <input type="password" name="current_password" required>
    <input type="password" name="new_password" required>
    <button type="submit">Change</button>
</form>

<h2>Change email</h2>
<form method="post" action="/account/set-email">
    <input type="email" name="email" required>
    <input type="text" name="gpg_fingerprint" placeholder="GPG fingerprint (optional)">
    <button type="submit">Change</button>
</form>

<h2>Notifications</h2>
<form method="post" action="/account/preferences">
    <label><input type="checkbox" name="notify_account_expires" value="true"
        {% if notify_account_expires %}checked{% endif %}> Warn before my account expires</label>
    <button type="submit">Save</button>
</form>

<h2>GPG keys</h2>
<form method="post" action="/account/gpg">
    <textarea name="key" placeholder="ASCII-armored public key"></textarea>
    <input type="text" name="fingerprint" required>
    <button type="submit">Upload</button>
</form>
<ul>
{% for key in gpg_keys %}<li>{{ key.fingerprint }}</li>{% endfor %}
</ul>

<h2>Recent activity</h2>
<ul>
{% for entry in log_entries %}
<li>{{ entry.created_at }}: {{ entry.message }} ({{ entry.address }})</li>
{% endfor %}
</ul>

<h2>Delete account</h2>
<form method="post" action="/account/delete">
    <button type="submit">Request deletion</button>
</form>
{% endblock %}
"#,
    ),
    (
        "delete_confirm.html",
        r#"{% extends "base.html" %}
{% block content %}
<h1>Confirm account deletion</h1>
<p>This permanently removes {{ jid }}.</p>
<form method="post">
    <input type="password" name="password" required>
    <button type="submit">Delete my account</button>
</form>
{% endblock %}
"#,
    ),
    (
        "contact.html",
        r#"{% extends "base.html" %}
{% block content %}
<h1>Contact</h1>
<form method="post" action="/contact">
    <input type="email" name="email" required>
    <input type="text" name="subject" required>
    <textarea name="message" required></textarea>
    <button type="submit">Send</button>
</form>
{% endblock %}
"#,
    ),
    (
        "admin_users.html",
        r#"{% extends "base.html" %}
{% block content %}
<h1>Accounts</h1>
<table>
    <tr><th>JID</th><th>Email</th><th>Last seen</th><th>Flags</th></tr>
    {% for user in users %}
    <tr>
        <td>{{ user.jid }}</td>
        <td>{{ user.email }}</td>
        <td>{{ user.last_activity }}</td>
        <td>{% if user.is_admin %}admin{% endif %} {% if user.blocked %}blocked{% endif %}</td>
    </tr>
    {% endfor %}
</table>
{% endblock %}
"#,
    ),
    (
        "certs.html",
        r#"{% extends "base.html" %}
{% block content %}
<h1>Certificates</h1>
<ul>
{% for hostname in hostnames %}
<li><a href="/certs/{{ hostname }}">{{ hostname }}</a></li>
{% endfor %}
</ul>
{% endblock %}
"#,
    ),
    (
        "cert.html",
        r#"{% extends "base.html" %}
{% block content %}
<h1>{{ cert.hostname }}</h1>
<dl>
    <dt>Hostnames</dt><dd>{{ cert.hostnames | join(sep=", ") }}</dd>
    <dt>Serial</dt><dd>{{ serial }}</dd>
    <dt>Valid from</dt><dd>{{ cert.valid_from }}</dd>
    <dt>Valid until</dt><dd>{{ cert.valid_until }}</dd>
    <dt>Key size</dt><dd>{{ cert.key_size }}</dd>
    <dt>SHA-256</dt><dd>{{ sha256 }}</dd>
    <dt>SHA-512</dt><dd>{{ sha512 }}</dd>
    <dt>TLSA</dt><dd>{{ cert.tlsa }}</dd>
</dl>
<pre>{{ cert.pem }}</pre>
{% endblock %}
"#,
    ),
    (
        "message.html",
        r#"{% extends "base.html" %}
{% block content %}
<h1>{{ heading }}</h1>
<p>{{ text }}</p>
{% endblock %}
"#,
    ),
];
