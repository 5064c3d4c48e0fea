// ABOUTME: Minimal `{key}` placeholder rendering used by scripted agents and template tools.
// ABOUTME: String values render raw, other JSON values render as compact JSON, unknown keys stay literal.

use serde_json::{Map, Value};

/// Replace every `{key}` in `template` whose key is present in `vars`.
pub fn render(template: &str, vars: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };

        let key = &after[..close];
        match vars.get(key) {
            Some(value) if is_key(key) => out.push_str(&display(value)),
            _ => {
                // Not ours; emit the brace and keep scanning from the next char.
                out.push('{');
                rest = after;
                continue;
            }
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

fn is_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Merge `overlay` over `base`, overlay keys winning.
pub fn merged(base: &Map<String, Value>, overlay: &Map<String, Value>) -> Map<String, Value> {
    let mut vars = base.clone();
    for (k, v) in overlay {
        vars.insert(k.clone(), v.clone());
    }
    vars
}
