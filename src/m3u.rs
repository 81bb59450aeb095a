use crate::resolver::ResolvedStream;

pub const M3U_HEADER: &str = "#EXTM3U";

/// Keeps attribute values from closing their quotes early
fn escape_attr(value: &str) -> String {
    value.replace('"', "'")
}

/// Appends the `#EXTINF` line and the URL line of one entry
pub fn push_entry(lines: &mut Vec<String>, stream: &ResolvedStream<'_>) {
    let item = stream.item;

    let mut attrs = vec![
        r#"tvg-id="""#.to_string(),
        format!(r#"tvg-name="{}""#, escape_attr(&item.title)),
    ];
    if let Some(logo) = &item.logo {
        attrs.push(format!(r#"tvg-logo="{}""#, escape_attr(logo)));
    }
    attrs.push(format!(
        r#"group-title="{}""#,
        escape_attr(item.display_group())
    ));

    lines.push(format!("#EXTINF:-1 {}, {}", attrs.join(" "), item.title));
    lines.push(stream.url.to_string());
}

/// Renders an extended M3U playlist. Lines are joined by `\n` without a trailing newline.
#[must_use]
pub fn render(header: &str, streams: &[ResolvedStream<'_>]) -> String {
    let mut lines = Vec::with_capacity(1 + streams.len() * 2);
    lines.push(header.to_string());
    for stream in streams {
        push_entry(&mut lines, stream);
    }

    lines.join("\n")
}
