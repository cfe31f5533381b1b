//! Turn context keys and routes into Rust identifiers.
use proc_macro2::{Ident, Span};

use super::CodegenError;

/// Acronyms recognized inside runs of capital letters, e.g. `HTTPURLPrefix`.
const INITIALISMS: &[&str] = &[
    "api", "cpu", "db", "html", "http", "https", "id", "ip", "json", "jwt", "sql", "tls", "ttl",
    "ui", "uri", "url", "uuid", "xml",
];

/// Identifiers that can't be used even as raw identifiers.
const FORBIDDEN: &[&str] = &["self", "super", "crate", "Self"];

/// Split a context key into lowercase words.
///
/// Words are separated by `_`, `-`, `.` and case boundaries.
/// Runs of capital letters are segmented using a table of known initialisms, so that
/// `requestURL` yields `request`, `url` and `HTTPURLPrefix` yields `http`, `url`, `prefix`.
pub(super) fn words(key: &str) -> Vec<String> {
    let mut words = Vec::new();
    for chunk in key.split(['_', '-', '.']).filter(|c| !c.is_empty()) {
        let chars: Vec<char> = chunk.chars().collect();
        let mut start = 0;
        let mut i = 0;
        while i < chars.len() {
            if chars[i].is_ascii_uppercase() {
                let run_start = i;
                while i < chars.len() && chars[i].is_ascii_uppercase() {
                    i += 1;
                }
                // The last capital of a run followed by a lowercase letter starts a new word.
                let run_end = if i < chars.len() && chars[i].is_ascii_lowercase() && i - run_start > 1 {
                    i - 1
                } else {
                    i
                };
                if run_start > start {
                    words.push(lowercase(&chars[start..run_start]));
                }
                if run_end - run_start > 1 {
                    words.extend(split_initialisms(&lowercase(&chars[run_start..run_end])));
                    start = run_end;
                } else {
                    start = run_start;
                }
                i = run_end.max(run_start + 1);
            } else {
                i += 1;
            }
        }
        if start < chars.len() {
            words.push(lowercase(&chars[start..]));
        }
    }
    words
}

fn lowercase(chars: &[char]) -> String {
    chars.iter().collect::<String>().to_ascii_lowercase()
}

/// Greedily segment a lowercase run of capitals into known initialisms.
/// Whatever can't be matched is kept as a single word.
fn split_initialisms(run: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut rest = run;
    while !rest.is_empty() {
        let longest = INITIALISMS
            .iter()
            .filter(|i| rest.starts_with(**i))
            .max_by_key(|i| i.len());
        match longest {
            Some(initialism) => {
                words.push((*initialism).to_owned());
                rest = &rest[initialism.len()..];
            }
            None => {
                words.push(rest.to_owned());
                break;
            }
        }
    }
    words
}

/// `snake_case` rendition of a context key.
pub(super) fn snake_case(key: &str) -> String {
    words(key).join("_")
}

/// Build an identifier, falling back to a raw identifier for Rust keywords.
pub(super) fn ident(name: &str) -> Result<Ident, CodegenError> {
    if FORBIDDEN.contains(&name) {
        return Err(CodegenError::new(format!(
            "`{name}` can't be used as an identifier in generated code"
        )));
    }
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(CodegenError::new(format!(
            "`{name}` is not a valid identifier"
        )));
    }
    if syn::parse_str::<Ident>(name).is_ok() {
        Ok(Ident::new(name, Span::call_site()))
    } else {
        Ok(Ident::new_raw(name, Span::call_site()))
    }
}

/// The name of the generated function serving `method path`, e.g. `get_pets_id` for
/// `GET /pets/{id}`.
pub(super) fn route_fn_name(method: &str, path: &str) -> String {
    let mut name = method.to_ascii_lowercase();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        name.push_str("_root");
    }
    for segment in segments {
        let segment = segment.trim_start_matches('{').trim_end_matches('}');
        let segment = segment.trim_end_matches("...");
        let segment = heck::ToSnakeCase::to_snake_case(segment);
        for part in segment
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|p| !p.is_empty())
        {
            name.push('_');
            name.push_str(part);
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialisms_are_segmented() {
        assert_eq!(snake_case("requestURL"), "request_url");
        assert_eq!(snake_case("HTTPURLPrefix"), "http_url_prefix");
        assert_eq!(snake_case("userID"), "user_id");
        assert_eq!(snake_case("APIKey"), "api_key");
        assert_eq!(snake_case("user_id"), "user_id");
        assert_eq!(snake_case("request.id"), "request_id");
        assert_eq!(snake_case("X-Tenant"), "x_tenant");
        assert_eq!(snake_case("tenantName"), "tenant_name");
        assert_eq!(snake_case("JSONData2"), "json_data2");
        assert_eq!(snake_case("ABCThing"), "abc_thing");
    }

    #[test]
    fn keywords_become_raw_identifiers() {
        assert_eq!(ident("type").unwrap().to_string(), "r#type");
        assert_eq!(ident("user").unwrap().to_string(), "user");
        assert!(ident("self").is_err());
        assert!(ident("crate").is_err());
    }

    #[test]
    fn route_functions_are_named_after_method_and_path() {
        assert_eq!(route_fn_name("GET", "/"), "get_root");
        assert_eq!(route_fn_name("GET", "/pets/{id}"), "get_pets_id");
        assert_eq!(route_fn_name("POST", "/petTypes/{kind}/v1.2"), "post_pet_types_kind_v1_2");
        assert_eq!(route_fn_name("DELETE", "/files/{path...}"), "delete_files_path");
    }
}
