//! Operation id synthesis and URL template rewriting.

use once_cell::sync::Lazy;
use regex::Regex;

#[allow(clippy::expect_used)]
static OPERATION_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(\w+)\}").expect("valid placeholder regex"));

#[allow(clippy::expect_used)]
static URL_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}/]+)\}").expect("valid placeholder regex"));

fn first_upper_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Derive a camel-case operation id from a method and a path.
///
/// `get` + `/user/{name}` gives `getUserByName`. Every character that is not an
/// ASCII letter is dropped from the result, digits included.
pub fn make_operation_id(method: &str, path: &str) -> String {
    let joined: String = std::iter::once(method)
        .chain(path.split('/').skip(1))
        .enumerate()
        .map(|(i, part)| {
            if i > 0 {
                first_upper_case(part)
            } else {
                part.to_string()
            }
        })
        .collect();

    OPERATION_PLACEHOLDER
        .replace_all(&joined, |caps: &regex::Captures<'_>| {
            format!("By{}", first_upper_case(&caps[1]))
        })
        .chars()
        .filter(char::is_ascii_alphabetic)
        .collect()
}

/// Rewrite `{name}` placeholders into the host's `:name` syntax.
pub fn make_url(path: &str) -> String {
    URL_PLACEHOLDER.replace_all(path, ":$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_id_with_placeholder() {
        assert_eq!(make_operation_id("get", "/user/{name}"), "getUserByName");
    }

    #[test]
    fn test_operation_id_plain() {
        assert_eq!(make_operation_id("post", "/pet"), "postPet");
    }

    #[test]
    fn test_operation_id_strips_non_letters() {
        assert_eq!(make_operation_id("get", "/v1/store-2/{order_id}"), "getVStoreByOrderid");
    }

    #[test]
    fn test_operation_id_nested_placeholders() {
        assert_eq!(
            make_operation_id("delete", "/users/{userId}/posts/{postId}"),
            "deleteUsersByUserIdPostsByPostId"
        );
    }

    #[test]
    fn test_operation_id_placeholder_inside_segment() {
        assert_eq!(make_operation_id("get", "/files/report.{ext}"), "getFilesReportByExt");
    }

    #[test]
    fn test_operation_id_root_path() {
        assert_eq!(make_operation_id("get", "/"), "get");
    }

    #[test]
    fn test_make_url() {
        assert_eq!(make_url("/pets/{petId}"), "/pets/:petId");
        assert_eq!(
            make_url("/users/{userId}/posts/{postId}"),
            "/users/:userId/posts/:postId"
        );
        assert_eq!(make_url("/plain"), "/plain");
    }

    #[test]
    fn test_make_url_leaves_no_braces() {
        for path in ["/a/{x}", "/{x}/b/{y_z}", "/files/{file-name}", "/{x}{y}"] {
            let url = make_url(path);
            assert!(!url.contains('{') && !url.contains('}'), "{url}");
        }
        assert_eq!(make_url("/files/{file-name}"), "/files/:file-name");
    }
}
