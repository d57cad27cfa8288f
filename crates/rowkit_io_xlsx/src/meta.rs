//! Field annotation parser.
//!
//! An annotation is a `;`- or `,`-delimited list of clauses. A clause is a bare
//! keyword (`omit`, `timestamp`, `freeze`, `hidden`) or `key=value` with key one
//! of `title`, `width`, `format`, `style`, `validation`, `valuemap`. `style`,
//! `validation` and `valuemap` take JSON objects; delimiters inside `{}`, `[]`
//! or double quotes do not split clauses.
//!
//! ```text
//! title=姓名;width=12
//! timestamp,title="Entry, local"
//! valuemap={"true":"Yes","false":"No"};hidden
//! ```
//!
//! Unknown keys are skipped and malformed values are dropped; parsing never fails.

use std::collections::BTreeMap;

use crate::spec::{SpecCellFormat, SpecFieldDescriptor, SpecValidationRule};

/// Parse `annotation` for the field declared as `name`.
pub fn parse_field_annotation(name: &str, annotation: &str) -> SpecFieldDescriptor {
    parse_field_annotation_with_issues(name, annotation).0
}

/// Same as [`parse_field_annotation`], also returning dropped sub-options.
pub fn parse_field_annotation_with_issues(
    name: &str,
    annotation: &str,
) -> (SpecFieldDescriptor, Vec<String>) {
    let mut descriptor = SpecFieldDescriptor {
        name: name.to_string(),
        title: name.to_string(),
        ..Default::default()
    };
    let mut l_issues = Vec::new();

    for clause in split_annotation_clauses(annotation) {
        let Some((c_key, c_value)) = clause.split_once('=') else {
            match clause.to_ascii_lowercase().as_str() {
                "omit" => descriptor.if_omit = true,
                "timestamp" => descriptor.if_timestamp = true,
                "freeze" => descriptor.if_freeze = true,
                "hidden" => descriptor.if_hidden = true,
                _ => {}
            }
            continue;
        };

        let c_key = c_key.trim().to_ascii_lowercase();
        let c_value = c_value.trim();
        match c_key.as_str() {
            "title" => {
                let c_title = unquote_value(c_value);
                if !c_title.is_empty() {
                    descriptor.title = c_title;
                }
            }
            "width" => match unquote_value(c_value).parse::<f64>() {
                Ok(n_width) if n_width.is_finite() && n_width > 0.0 => {
                    descriptor.width = Some(n_width);
                }
                _ => l_issues.push(format!("{name}: ignored width {c_value:?}")),
            },
            "format" => {
                let c_format = unquote_value(c_value);
                if !c_format.is_empty() {
                    descriptor.num_format = Some(c_format);
                }
            }
            "style" => match serde_json::from_str::<SpecCellFormat>(c_value) {
                Ok(style) => descriptor.style = Some(style),
                Err(err) => l_issues.push(format!("{name}: ignored style: {err}")),
            },
            "validation" => match serde_json::from_str::<SpecValidationRule>(c_value) {
                Ok(rule) => match rule.check() {
                    Ok(()) => descriptor.validation = Some(rule),
                    Err(msg) => l_issues.push(format!("{name}: ignored validation: {msg}")),
                },
                Err(err) => l_issues.push(format!("{name}: ignored validation: {err}")),
            },
            "valuemap" => match serde_json::from_str::<BTreeMap<String, String>>(c_value) {
                Ok(dict_map) => descriptor.value_map = Some(dict_map),
                Err(err) => l_issues.push(format!("{name}: ignored valuemap: {err}")),
            },
            _ => {}
        }
    }

    (descriptor, l_issues)
}

/// Split an annotation into trimmed, non-empty clauses at top-level delimiters.
pub fn split_annotation_clauses(annotation: &str) -> Vec<&str> {
    let mut l_clauses = Vec::new();
    let mut n_depth = 0usize;
    let mut if_in_quote = false;
    let mut if_escaped = false;
    let mut n_start = 0usize;

    for (n_pos, chr) in annotation.char_indices() {
        if if_in_quote {
            match chr {
                _ if if_escaped => if_escaped = false,
                '\\' => if_escaped = true,
                '"' => if_in_quote = false,
                _ => {}
            }
            continue;
        }
        match chr {
            '"' => if_in_quote = true,
            '{' | '[' => n_depth += 1,
            '}' | ']' => n_depth = n_depth.saturating_sub(1),
            ';' | ',' if n_depth == 0 => {
                l_clauses.push(&annotation[n_start..n_pos]);
                n_start = n_pos + chr.len_utf8();
            }
            _ => {}
        }
    }
    l_clauses.push(&annotation[n_start..]);

    l_clauses
        .into_iter()
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .collect()
}

fn unquote_value(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        return serde_json::from_str::<String>(value)
            .unwrap_or_else(|_| value[1..value.len() - 1].to_string());
    }
    value.to_string()
}
