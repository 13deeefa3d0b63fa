//! Server-rendered HTML pages.
//!
//! Every value that came from a user or a backend passes through [`escape`].

use std::fmt::Write;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::{IndexView, Section, UploadedFile};

const STYLE: &str = "body{font-family:system-ui,sans-serif;margin:2rem auto;max-width:60rem;color:#222}\
section{border:1px solid #ddd;border-radius:6px;padding:1rem;margin-bottom:1rem}\
.notice{background:#e7f6e7;border:1px solid #9c9;padding:.5rem 1rem;border-radius:4px}\
.unavailable{color:#a40000}img{max-width:12rem;display:block;margin:.25rem 0}";

/// Escapes text for use in HTML element content and quoted attributes.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
<title>{title} - ABC Retail</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
<nav><a href=\"/Home/Index\">Home</a> | <a href=\"/Home/Database\">Customers (SQL)</a></nav>\n\
{body}</body>\n</html>\n",
        title = escape(title),
    )
}

// Renders the "unavailable" notice or hands the items to `render_items`.
fn section_body<T>(section: &Section<T>, empty: &str, render_items: impl FnOnce(&[T]) -> String) -> String {
    match section {
        Section::Unavailable { reason } => {
            format!("<p class=\"unavailable\">Backend unavailable: {}</p>\n", escape(reason))
        }
        Section::Loaded { items } if items.is_empty() => format!("<p><em>{}</em></p>\n", empty),
        Section::Loaded { items } => render_items(items),
    }
}

fn upload_list(files: &[UploadedFile]) -> String {
    let mut out = String::from("<ul>\n");
    for f in files {
        let url = escape(&f.url);
        let name = escape(&f.file_name);
        if f.is_image {
            let _ = writeln!(out, "<li><a href=\"{url}\">{name}</a><img src=\"{url}\" alt=\"{name}\"></li>");
        } else {
            let _ = writeln!(out, "<li><a href=\"{url}\" download>{name}</a></li>");
        }
    }
    out.push_str("</ul>\n");
    out
}

pub fn render_index(view: &IndexView) -> String {
    let mut body = String::from("<h1>ABC Retail</h1>\n");
    if let Some(notice) = view.notice {
        let _ = writeln!(body, "<p class=\"notice\">{}</p>", escape(notice.message()));
    }

    body.push_str(
        "<section id=\"customers\">\n<h2>Customers &amp; products</h2>\n\
<form method=\"post\" action=\"/Home/AddTable\">\n\
<input name=\"name\" placeholder=\"Customer name\" required>\n\
<input name=\"product\" placeholder=\"Product\" required>\n\
<button type=\"submit\">Add</button>\n</form>\n",
    );
    body.push_str(&section_body(&view.customers, "No customers yet.", |rows| {
        let mut out = String::from("<table>\n<tr><th>Name</th><th>Product</th></tr>\n");
        for row in rows {
            let _ = writeln!(out, "<tr><td>{}</td><td>{}</td></tr>", escape(&row.name), escape(&row.product));
        }
        out.push_str("</table>\n");
        out
    }));
    body.push_str("</section>\n");

    body.push_str(
        "<section id=\"queue\">\n<h2>Orders queue</h2>\n\
<form method=\"post\" action=\"/Home/AddQueue\">\n\
<input name=\"message\" placeholder=\"Order details\" required>\n\
<button type=\"submit\">Enqueue</button>\n</form>\n",
    );
    body.push_str(&section_body(&view.messages, "No new messages.", |messages| {
        let mut out = String::from("<ul>\n");
        for m in messages {
            let _ = writeln!(out, "<li>{}</li>", escape(m));
        }
        out.push_str("</ul>\n");
        out
    }));
    body.push_str("</section>\n");

    body.push_str(
        "<section id=\"images\">\n<h2>Product images</h2>\n\
<form method=\"post\" action=\"/Home/UploadBlob\" enctype=\"multipart/form-data\">\n\
<input type=\"file\" name=\"file\" accept=\"image/*\">\n\
<button type=\"submit\">Upload image</button>\n</form>\n",
    );
    body.push_str(&section_body(&view.images, "No images uploaded.", upload_list));
    body.push_str("</section>\n");

    body.push_str(
        "<section id=\"files\">\n<h2>Files</h2>\n\
<form method=\"post\" action=\"/Home/UploadFile\" enctype=\"multipart/form-data\">\n\
<input type=\"file\" name=\"file\">\n\
<button type=\"submit\">Upload file</button>\n</form>\n",
    );
    body.push_str(&section_body(&view.files, "No files uploaded.", upload_list));
    body.push_str("</section>\n");

    layout("Home", &body)
}

pub fn render_database(customers: &[String]) -> String {
    let mut body = String::from("<h1>Customers</h1>\n");
    if customers.is_empty() {
        body.push_str("<p><em>No customers in the database.</em></p>\n");
    } else {
        body.push_str("<ul id=\"customers\">\n");
        for name in customers {
            let _ = writeln!(body, "<li>{}</li>", escape(name));
        }
        body.push_str("</ul>\n");
    }
    layout("Customers", &body)
}

pub fn render_error(
    status: StatusCode,
    code: &str,
    message: &str,
    error_id: Option<Uuid>,
    at: DateTime<Utc>,
) -> String {
    let mut body = format!(
        "<h1>{} {}</h1>\n<p class=\"error\" data-code=\"{}\">{}</p>\n",
        status.as_u16(),
        escape(status.canonical_reason().unwrap_or("Error")),
        escape(code),
        escape(message),
    );
    if let Some(id) = error_id {
        let _ = writeln!(body, "<p>Error ID: <code>{}</code></p>", id);
    }
    let _ = writeln!(body, "<p><small>{}</small></p>", at.to_rfc3339());
    layout("Error", &body)
}
