//! Per-role conformance reports.
//!
//! A report mirrors the evaluated check tree as one role sees it: subtrees
//! that are not relevant to the role are pruned, so two roles can get
//! different shapes of the same tree.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::check::{CheckNode, ConformanceStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConformanceReport {
    pub title: String,
    pub status: ConformanceStatus,
    #[serde(default)]
    pub conformant_exchange_count: usize,
    #[serde(default)]
    pub non_conformant_exchange_count: usize,
    #[serde(default)]
    pub sub_reports: Vec<ConformanceReport>,
    #[serde(default)]
    pub error_messages: Vec<String>,
}

impl ConformanceReport {
    /// Walk an evaluated check tree as `role` sees it.
    pub fn for_role(check: &CheckNode, role: &str) -> Self {
        let sub_reports = check
            .children()
            .iter()
            .filter(|child| child.status_for_role(role) != ConformanceStatus::NotRelevant)
            .map(|child| ConformanceReport::for_role(child, role))
            .collect();
        Self {
            title: check.title().to_string(),
            status: check.status_for_role(role),
            conformant_exchange_count: check.conformant_count(),
            non_conformant_exchange_count: check.non_conformant_count(),
            sub_reports,
            error_messages: check.errors().to_vec(),
        }
    }

    /// One report per role, keyed and ordered by role name.
    pub fn for_roles<'a>(
        check: &CheckNode,
        roles: impl IntoIterator<Item = &'a str>,
    ) -> BTreeMap<String, Self> {
        roles
            .into_iter()
            .map(|role| (role.to_string(), ConformanceReport::for_role(check, role)))
            .collect()
    }

    /// The report document: `{title, status, subReports, errorMessages}`
    /// plus the exchange counts.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Status of every scenario (the first level below the root).
    pub fn scenario_statuses(&self) -> Vec<(&str, ConformanceStatus)> {
        self.sub_reports
            .iter()
            .map(|report| (report.title.as_str(), report.status))
            .collect()
    }

    /// Indented plain-text rendering, one line per node.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        self.write_text(&mut out, 0);
        out
    }

    fn write_text(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let _ = writeln!(
            out,
            "{indent}{} {} [{}]",
            self.status.icon(),
            self.title,
            self.status.label()
        );
        for error in &self.error_messages {
            let _ = writeln!(out, "{indent}    - {error}");
        }
        for sub in &self.sub_reports {
            sub.write_text(out, depth + 1);
        }
    }

    /// A standalone HTML page with one section per role.
    ///
    /// Every depth gets its own collapsible block; `printable` expands all of
    /// them.
    pub fn to_html(reports_by_role: &BTreeMap<String, ConformanceReport>, printable: bool) -> String {
        let mut html = String::from(
            "<!DOCTYPE html>\n<html>\n<body style=\"font-family: sans-serif;\">\n<h1>Conformance Report</h1>\n",
        );
        for (role, report) in reports_by_role {
            let _ = write!(
                html,
                "<h2>{} conformance</h2><details open><summary>{} {} </summary>\n{}\n</details>\n",
                escape(role),
                report.status.icon(),
                report.status.label(),
                report.render_html(0, printable)
            );
        }
        html.push_str("</body>\n</html>");
        html
    }

    fn render_html(&self, level: usize, printable: bool) -> String {
        let children: String = self
            .sub_reports
            .iter()
            .map(|sub| sub.render_html(level + 1, printable))
            .collect::<Vec<_>>()
            .join("\n");
        let margin = level * 2;
        if level == 0 {
            return format!(
                "<div style=\"margin-left: {margin}em\">\n<h4>{}</h4>\n<div>{}</div>\n</div>\n{children}\n",
                escape(&self.title),
                self.html_errors()
            );
        }
        if level > 1 && self.sub_reports.is_empty() && self.error_messages.is_empty() {
            return format!(
                "<h5 style=\"margin-left: {margin}em\">{} {} ({})</h5>",
                self.status.icon(),
                escape(self.title.trim()),
                self.status.label()
            );
        }
        format!(
            "<div style=\"margin-left: {margin}em\">\n<details{}><summary>{} {}</summary>\n<div>{}</div>\n{children}\n</details></div>\n",
            if printable { " open" } else { "" },
            self.status.icon(),
            escape(&self.title),
            self.html_errors()
        )
    }

    fn html_errors(&self) -> String {
        self.error_messages
            .iter()
            .map(|error| format!("\n<div>{}</div>", escape(error)))
            .collect()
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::check::{CheckResult, ExchangeCheck, RoleFilter, TrafficIndex};
    use crate::error::CheckError;
    use crate::traffic::{Exchange, Message, Request, Response};

    struct Says(&'static str, Option<&'static str>);

    impl ExchangeCheck for Says {
        fn title(&self) -> String {
            self.0.to_string()
        }
        fn check(&self, _: &Exchange) -> Result<CheckResult, CheckError> {
            Ok(match self.1 {
                Some(error) => CheckResult::error(error),
                None => CheckResult::ok(),
            })
        }
    }

    fn evaluated_tree() -> CheckNode {
        let message = Message::new("a", "Subscriber", "b", "Publisher", 0);
        let exchange = Exchange::new(
            Request::new("GET", "/x", message.clone()),
            Response::new(500, message.with_json(json!({}))),
        );
        let id = Some(exchange.id);
        let mut tree = CheckNode::group(
            "Schedules",
            vec![CheckNode::group(
                "Supply - Get",
                vec![CheckNode::group(
                    "Get",
                    vec![
                        CheckNode::leaf(RoleFilter::only("Subscriber"), id, Says("url", None)),
                        CheckNode::leaf(
                            RoleFilter::only("Publisher"),
                            id,
                            Says("status", Some("Response status '500' <bad>")),
                        ),
                    ],
                )],
            )],
        );
        tree.evaluate(&TrafficIndex::new([exchange]));
        tree
    }

    #[test]
    fn roles_see_different_shapes() {
        let tree = evaluated_tree();
        let reports = ConformanceReport::for_roles(&tree, ["Publisher", "Subscriber"]);

        let publisher = &reports["Publisher"];
        assert_eq!(publisher.status, ConformanceStatus::NonConformant);
        let leaves = &publisher.sub_reports[0].sub_reports[0].sub_reports;
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].title, "status");
        assert_eq!(leaves[0].non_conformant_exchange_count, 1);

        let subscriber = &reports["Subscriber"];
        assert_eq!(subscriber.status, ConformanceStatus::Conformant);
        assert_eq!(
            subscriber.scenario_statuses(),
            vec![("Supply - Get", ConformanceStatus::Conformant)]
        );
    }

    #[test]
    fn json_document_shape() {
        let report = ConformanceReport::for_role(&evaluated_tree(), "Publisher");
        let json = report.to_json();
        assert_eq!(json["title"], "Schedules");
        assert_eq!(json["status"], "NON_CONFORMANT");
        assert_eq!(
            json["subReports"][0]["subReports"][0]["subReports"][0]["errorMessages"],
            json!(["Response status '500' <bad>"])
        );
        let back: ConformanceReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn html_has_one_section_per_role_and_escapes() {
        let tree = evaluated_tree();
        let reports = ConformanceReport::for_roles(&tree, ["Publisher", "Subscriber"]);
        let html = ConformanceReport::to_html(&reports, false);
        assert!(html.contains("<h2>Publisher conformance</h2><details open><summary>🚫 NON-CONFORMANT"));
        assert!(html.contains("<h2>Subscriber conformance</h2><details open><summary>✅ CONFORMANT"));
        assert!(html.contains("<div>Response status &#39;500&#39; &lt;bad&gt;</div>"));
        assert!(html.contains("margin-left: 4em"));
        assert!(!html.contains("<details open><summary>🚫 Supply - Get"));
        assert!(ConformanceReport::to_html(&reports, true).contains("<details open><summary>🚫 Supply - Get"));
    }

    #[test]
    fn text_rendering_indents() {
        let text = ConformanceReport::for_role(&evaluated_tree(), "Publisher").to_text();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("🚫 Schedules"));
        assert!(lines[1].starts_with("  🚫 Supply - Get"));
        assert!(text.contains("      - Response status '500' <bad>"));
    }
}
