use serde_json::Value;
use std::collections::BTreeMap;

/// Render a message template against a property bag.
///
/// Placeholders of the form `{name}` are replaced with the stringified
/// value of `properties["name"]`. Placeholders with no matching property,
/// and braces that never close, are left literal. Properties not referenced
/// by the template are simply ignored here; they stay on the event.
///
/// This is a pure function with no knowledge of any transport, so the
/// rendering contract can be tested in isolation.
pub fn render(template: &str, properties: &BTreeMap<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];

        match after_open.find(|c| c == '{' || c == '}') {
            // A well-formed `{name}` placeholder.
            Some(close) if after_open.as_bytes()[close] == b'}' => {
                let name = &after_open[..close];
                match properties.get(name) {
                    Some(value) => out.push_str(&stringify(value)),
                    // Unknown name: keep the placeholder literal.
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after_open[close + 1..];
            }
            // Another `{` before any `}`: the first brace is literal.
            Some(_) | None => {
                out.push('{');
                rest = after_open;
            }
        }
    }

    out.push_str(rest);
    out
}

/// String form of a property value for interpolation.
///
/// Strings substitute verbatim (no surrounding quotes); everything else
/// uses its JSON representation.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn substitutes_named_placeholder() {
        let bag = props(&[
            ("name", json!("AppService")),
            ("result", json!("Hello World!")),
        ]);
        let rendered = render("Retrieving result from {name}", &bag);
        assert_eq!(rendered, "Retrieving result from AppService");
    }

    #[test]
    fn unmatched_placeholder_stays_literal() {
        let bag = props(&[("name", json!("AppService"))]);
        assert_eq!(
            render("{name} returned {status}", &bag),
            "AppService returned {status}"
        );
    }

    #[test]
    fn empty_bag_leaves_template_untouched() {
        let bag = BTreeMap::new();
        assert_eq!(render("hello {who}", &bag), "hello {who}");
    }

    #[test]
    fn non_string_values_use_json_form() {
        let bag = props(&[
            ("count", json!(3)),
            ("ok", json!(true)),
            ("detail", json!({"code": 7})),
        ]);
        assert_eq!(
            render("count={count} ok={ok} detail={detail}", &bag),
            "count=3 ok=true detail={\"code\":7}"
        );
    }

    #[test]
    fn unterminated_brace_is_literal() {
        let bag = props(&[("name", json!("x"))]);
        assert_eq!(render("oops {name", &bag), "oops {name");
    }

    #[test]
    fn double_open_brace_keeps_first_literal() {
        let bag = props(&[("name", json!("x"))]);
        assert_eq!(render("a {{name} b", &bag), "a {x b");
    }

    #[test]
    fn repeated_placeholder_substitutes_each_time() {
        let bag = props(&[("n", json!(2))]);
        assert_eq!(render("{n} + {n}", &bag), "2 + 2");
    }

    #[test]
    fn empty_braces_stay_literal() {
        let bag = props(&[("n", json!(1))]);
        assert_eq!(render("set {} of {n}", &bag), "set {} of 1");
    }
}
