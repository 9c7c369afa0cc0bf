use crate::ipc::types::Request;

/// Trimmed string param; None when absent, non-string, or blank.
pub fn str_param(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// String-array param; absent or non-array reads as empty.
pub fn str_list_param(req: &Request, key: &str) -> Vec<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
