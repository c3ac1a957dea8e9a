//! Variable substitution in DXT manifests (spec §4.5 step 5).

use std::collections::HashMap;
use std::path::Path;

use crate::manifest::UserConfigValue;

/// Expands `${...}` placeholders in a single string value. When the value
/// came from a `${user_config.<key>}` substitution whose resolved value is
/// an array, the *token containing it* must instead be expanded into
/// multiple tokens by the caller — see [`expand_token`].
pub struct SubstitutionContext<'a> {
    pub dirname: &'a Path,
    pub home: Option<String>,
    pub desktop: Option<String>,
    pub documents: Option<String>,
    pub downloads: Option<String>,
    pub path_separator: &'a str,
    pub user_config: &'a HashMap<String, UserConfigValue>,
}

enum Replacement {
    Literal(String),
    Array(Vec<String>),
}

fn resolve_placeholder(name: &str, ctx: &SubstitutionContext) -> Option<Replacement> {
    match name {
        "__dirname" => Some(Replacement::Literal(ctx.dirname.display().to_string())),
        "HOME" => ctx.home.clone().map(Replacement::Literal),
        "DESKTOP" => ctx.desktop.clone().map(Replacement::Literal),
        "DOCUMENTS" => ctx.documents.clone().map(Replacement::Literal),
        "DOWNLOADS" => ctx.downloads.clone().map(Replacement::Literal),
        "pathSeparator" | "/" => Some(Replacement::Literal(ctx.path_separator.to_string())),
        other => other.strip_prefix("user_config.").and_then(|key| {
            ctx.user_config.get(key).map(|value| match value {
                UserConfigValue::String(s) => Replacement::Literal(s.clone()),
                UserConfigValue::Array(items) => Replacement::Array(items.clone()),
            })
        }),
    }
}

/// Expands one argv token. If the token is *exactly* `${user_config.key}`
/// and the resolved value is an array, returns one output token per array
/// element (spec: "the containing argument token is expanded into one
/// argument per array element"). Otherwise returns a single token with all
/// placeholders substituted as strings (joined with `,` for arrays, matching
/// environment-value join behavior when embedded mid-string).
pub fn expand_token(token: &str, ctx: &SubstitutionContext) -> Vec<String> {
    if let Some(inner) = token.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        if !inner.contains("${") {
            if let Some(Replacement::Array(items)) = resolve_placeholder(inner, ctx) {
                return items;
            }
        }
    }
    vec![substitute_string(token, ctx, ",")]
}

/// Expands all placeholders in a string meant for a single scalar field
/// (env value, working directory, or a non-exploded argv token). Arrays
/// resolved here are joined using `join_with` (path-list separator for
/// environment values).
pub fn substitute_string(input: &str, ctx: &SubstitutionContext, join_with: &str) -> String {
    let mut out = String::new();
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let name = &after[..end];
        match resolve_placeholder(name, ctx) {
            Some(Replacement::Literal(value)) => out.push_str(&value),
            Some(Replacement::Array(items)) => out.push_str(&items.join(join_with)),
            None => {
                out.push_str("${");
                out.push_str(name);
                out.push('}');
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ctx<'a>(
        dirname: &'a Path,
        user_config: &'a HashMap<String, UserConfigValue>,
    ) -> SubstitutionContext<'a> {
        SubstitutionContext {
            dirname,
            home: Some("/home/user".to_string()),
            desktop: Some("/home/user/Desktop".to_string()),
            documents: Some("/home/user/Documents".to_string()),
            downloads: Some("/home/user/Downloads".to_string()),
            path_separator: ":",
            user_config,
        }
    }

    #[test]
    fn expands_dirname_prefixed_command() {
        let dir = Path::new("/pkg");
        let cfg = HashMap::new();
        let ctx = ctx(dir, &cfg);
        let out = expand_token("${__dirname}/python3", &ctx);
        assert_eq!(out, vec!["/pkg/python3".to_string()]);
    }

    #[test]
    fn array_user_config_value_expands_into_multiple_argv_tokens() {
        let dir = Path::new("/pkg");
        let mut cfg = HashMap::new();
        cfg.insert(
            "allowed_dirs".to_string(),
            UserConfigValue::Array(vec!["/a".to_string(), "/b".to_string()]),
        );
        let ctx = ctx(dir, &cfg);
        let out = expand_token("${user_config.allowed_dirs}", &ctx);
        assert_eq!(out, vec!["/a".to_string(), "/b".to_string()]);
    }

    #[test]
    fn unknown_substitution_left_literal() {
        let dir = Path::new("/pkg");
        let cfg = HashMap::new();
        let ctx = ctx(dir, &cfg);
        let out = substitute_string("${NOT_A_REAL_VAR}", &ctx, ",");
        assert_eq!(out, "${NOT_A_REAL_VAR}");
    }

    #[test]
    fn array_value_embedded_mid_string_joins_with_separator() {
        let dir = Path::new("/pkg");
        let mut cfg = HashMap::new();
        cfg.insert(
            "dirs".to_string(),
            UserConfigValue::Array(vec!["/a".to_string(), "/b".to_string()]),
        );
        let ctx = ctx(dir, &cfg);
        let out = substitute_string("PATH=${user_config.dirs}", &ctx, ":");
        assert_eq!(out, "PATH=/a:/b");
    }
}
