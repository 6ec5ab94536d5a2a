/// Connection-string adjustments applied before any connection is
/// opened. The engine treats the strings as opaque otherwise.

/// Source connections must never write; apply read-only intent unless
/// the caller already chose one.
pub fn prepare_source(conn_str: &str) -> String {
    let with_intent = append_if_absent(conn_str, "ApplicationIntent", "ReadOnly");
    append_if_absent(&with_intent, "Connect Timeout", "0")
}

/// Target connections only get the unbounded connect timeout.
pub fn prepare_target(conn_str: &str) -> String {
    append_if_absent(conn_str, "Connect Timeout", "0")
}

fn append_if_absent(conn_str: &str, key: &str, value: &str) -> String {
    let has_key = conn_str.split(';').any(|pair| {
        pair.split_once('=')
            .is_some_and(|(k, _)| k.trim().eq_ignore_ascii_case(key))
    });
    if has_key {
        return conn_str.to_string();
    }

    let mut out = conn_str.trim_end().to_string();
    if !out.is_empty() && !out.ends_with(';') {
        out.push(';');
    }
    out.push_str(key);
    out.push('=');
    out.push_str(value);
    out
}
