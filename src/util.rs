//! Shared filename and path helpers.

/// Convert a slug to title case.
///
/// Splits on `-` and `_`, capitalizes each word.
/// "getting-started" -> "Getting Started"
/// "api_reference" -> "Api Reference"
pub fn title_case(s: &str) -> String {
    s.split(['-', '_'])
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// The basename of a filename: everything before the first dot.
///
/// Dot-files keep their leading segment, so `.htaccess.eco` gives `.htaccess`.
pub fn basename(filename: &str) -> String {
    match filename.strip_prefix('.') {
        Some(rest) => {
            let end = rest.find('.').unwrap_or(rest.len());
            format!(".{}", &rest[..end])
        }
        None => {
            let end = filename.find('.').unwrap_or(filename.len());
            filename[..end].to_string()
        }
    }
}

/// The dot-separated extensions of a filename, in the order they appear.
///
/// "post.html.md" -> ["html", "md"]
/// ".htaccess" -> ["htaccess"]
pub fn extensions(filename: &str) -> Vec<String> {
    filename
        .split('.')
        .skip(1)
        .filter(|ext| !ext.is_empty())
        .map(str::to_string)
        .collect()
}

/// The output filename for a basename and output extension.
///
/// A dot-file whose basename is already `.ext` keeps its name, so `.htaccess`
/// never becomes `.htaccess.htaccess`.
pub fn out_filename(basename: &str, extension: Option<&str>) -> String {
    match extension {
        None => basename.to_string(),
        Some(ext) if basename.strip_prefix('.') == Some(ext) => basename.to_string(),
        Some(ext) => format!("{basename}.{ext}"),
    }
}

/// The URL of a relative path, always rooted and slash-separated.
pub fn url_for(relative_path: &str) -> String {
    let path = relative_path.replace('\\', "/");
    format!("/{}", path.trim_start_matches('/'))
}

/// Join a slash-separated directory and a filename.
pub fn join_relative(dir: &str, filename: &str) -> String {
    if dir.is_empty() {
        filename.to_string()
    } else {
        format!("{}/{}", dir.trim_end_matches('/'), filename)
    }
}
