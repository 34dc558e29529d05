//! Recursive `${VAR}` / `${VAR:default}` interpolation over a parsed YAML
//! tree, walking maps and lists. A bare `${VAR}` with no default is
//! required: an unset variable fails the load fast rather than silently
//! substituting an empty string.

use std::env;

use swapforge_core::error::ForgeError;

/// Replace every `${VAR}`/`${VAR:default}` placeholder in `value`.
pub fn interpolate_str(value: &str) -> Result<String, ForgeError> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(close) = after_open.find('}') else {
            // Unterminated placeholder: emit the rest verbatim.
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let inner = &after_open[..close];
        let (name, default) = match inner.split_once(':') {
            Some((n, d)) => (n, Some(d)),
            None => (inner, None),
        };
        match env::var(name) {
            Ok(v) => out.push_str(&v),
            Err(_) => match default {
                Some(d) => out.push_str(d),
                None => return Err(ForgeError::MissingEnvVar(name.to_string())),
            },
        }
        rest = &after_open[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Recursively interpolate every string leaf of a `serde_yaml::Value` tree.
pub fn interpolate_value(value: serde_yaml::Value) -> Result<serde_yaml::Value, ForgeError> {
    match value {
        serde_yaml::Value::String(s) => Ok(serde_yaml::Value::String(interpolate_str(&s)?)),
        serde_yaml::Value::Sequence(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(interpolate_value(item)?);
            }
            Ok(serde_yaml::Value::Sequence(out))
        }
        serde_yaml::Value::Mapping(map) => {
            let mut out = serde_yaml::Mapping::with_capacity(map.len());
            for (k, v) in map {
                out.insert(interpolate_value(k)?, interpolate_value(v)?);
            }
            Ok(serde_yaml::Value::Mapping(out))
        }
        other => Ok(other),
    }
}
