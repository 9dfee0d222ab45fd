use anyhow::Result;
use serde::Serialize;
use std::fmt::Write;
use vhost_scanner::BlockRegion;

/// Result of a `status` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleStatus {
    pub enabled: bool,
    /// 1-based, inclusive.
    pub first_line: Option<usize>,
    pub last_line: Option<usize>,
    pub lines: Vec<String>,
    /// Rate limiting only: whether the main config defines the zones.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zones_defined: Option<bool>,
}

impl RuleStatus {
    pub fn from_region(lines: &[String], region: Option<BlockRegion>) -> Self {
        let Some(region) = region else {
            return Self {
                enabled: false,
                first_line: None,
                last_line: None,
                lines: Vec::new(),
                zones_defined: None,
            };
        };
        let (first, last) = region.display_lines();
        Self {
            enabled: true,
            first_line: Some(first),
            last_line: Some(last),
            lines: lines[region.start..=region.end]
                .iter()
                .map(|l| l.trim_end().to_string())
                .filter(|l| !l.trim().is_empty())
                .collect(),
            zones_defined: None,
        }
    }

    pub fn with_zones(mut self, defined: bool) -> Self {
        self.zones_defined = Some(defined);
        self
    }

    pub fn to_text(&self, title: &str) -> String {
        let mut out = String::new();
        match (self.first_line, self.last_line) {
            (Some(first), Some(last)) if self.enabled => {
                let _ = writeln!(out, "{title} is enabled (lines {first}-{last})");
                for line in &self.lines {
                    let _ = writeln!(out, "  {line}");
                }
            }
            _ => {
                let _ = writeln!(out, "{title} is not enabled");
            }
        }
        match self.zones_defined {
            Some(true) => out.push_str("rate limit zones are defined in the main config\n"),
            Some(false) => out.push_str("rate limit zones are missing from the main config\n"),
            None => {}
        }
        out
    }

    pub fn print(&self, title: &str, json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(self)?);
        } else {
            print!("{}", self.to_text(title));
        }
        Ok(())
    }
}
