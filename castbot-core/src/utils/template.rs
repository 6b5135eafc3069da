//! `${name}` placeholder substitution used for localized strings and text
//! commands. Names may be dotted paths into the variables object
//! (`${sender.nickname}`). Placeholders without a value are left verbatim.

use serde_json::Value;

pub fn render(template: &str, vars: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        match after.find('}') {
            Some(end) => {
                let name = after[..end].trim();
                match lookup(vars, name) {
                    Some(value) => out.push_str(&value_to_text(value)),
                    None => out.push_str(&rest[start..start + 2 + end + 1]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

fn lookup<'a>(vars: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    path.split('.').try_fold(vars, |value, segment| value.get(segment))
}

/// Users render as their nickname so `${sender}` works for both a plain
/// name and a full sender object.
fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Object(map) => match map.get("nickname") {
            Some(Value::String(nick)) => nick.clone(),
            _ => value.to_string(),
        },
        other => other.to_string(),
    }
}
