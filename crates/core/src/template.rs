use std::collections::BTreeMap;

/// Renders a prompt template against session variables.
///
/// `{{name}}` references resolve from `variables`; an unresolved reference
/// renders as the empty string. Prompts are user-facing, so rendering never
/// fails - malformed delimiters are passed through verbatim.
pub fn render(template: &str, variables: &BTreeMap<String, String>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                if let Some(value) = variables.get(key) {
                    output.push_str(value);
                }
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated expression: keep the raw text.
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::render;

    fn variables(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect()
    }

    #[test]
    fn substitutes_known_variables() {
        let rendered = render(
            "Pick a channel number from the list: {{channels}}",
            &variables(&[("channels", "[1] Alpha ;")]),
        );
        assert_eq!(rendered, "Pick a channel number from the list: [1] Alpha ;");
    }

    #[test]
    fn unresolved_reference_renders_as_empty_string() {
        let rendered = render("Hello {{name}}!", &variables(&[]));
        assert_eq!(rendered, "Hello !");
    }

    #[test]
    fn rendering_is_idempotent_for_unchanged_variables() {
        let vars = variables(&[("query", "alpha"), ("channels", "[1] Alpha ;")]);
        let template = "Looking for {{query}} in {{channels}}";
        assert_eq!(render(template, &vars), render(template, &vars));
    }

    #[test]
    fn unterminated_expression_is_passed_through() {
        let rendered = render("broken {{name", &variables(&[("name", "x")]));
        assert_eq!(rendered, "broken {{name");
    }

    #[test]
    fn multiple_references_resolve_in_order() {
        let rendered =
            render("{{a}}-{{b}}-{{a}}", &variables(&[("a", "left"), ("b", "right")]));
        assert_eq!(rendered, "left-right-left");
    }

    #[test]
    fn surrounding_whitespace_in_reference_is_ignored() {
        let rendered = render("Hello {{ name }}!", &variables(&[("name", "Ada")]));
        assert_eq!(rendered, "Hello Ada!");
    }
}
