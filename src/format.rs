use std::fmt::Write as _;
use std::str::FromStr;

use anyhow::{Result, bail};
use graft::driver::RunReport;
use graft::engine::GenerationRequest;
use serde::Serialize;

/// Output format for run reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// One line per request, grouped by round
    #[default]
    Text,
    /// JSON - machine-parseable
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => bail!("Invalid format '{s}'. Use: text or json"),
        }
    }
}

impl OutputFormat {
    pub fn render(self, report: &RunReport) -> Result<String> {
        match self {
            Self::Json => to_json(report),
            Self::Text => Ok(text(report)),
        }
    }
}

fn to_json<T: Serialize>(data: &T) -> Result<String> {
    serde_json::to_string_pretty(data).map_err(|e| anyhow::anyhow!("JSON serialization failed: {e}"))
}

fn text(report: &RunReport) -> String {
    let mut out = String::new();
    for round in &report.rounds {
        let _ = writeln!(
            out,
            "round {}: {} request(s), {} deferred",
            round.round,
            round.requests.len(),
            round.deferred.len()
        );
        for request in &round.requests {
            match request {
                GenerationRequest::Merge(d) => {
                    let _ = writeln!(
                        out,
                        "  merge {} -> {} ({} modules, {} interfaces, {} bindings)",
                        d.target,
                        d.merged,
                        d.modules.len(),
                        d.interfaces.len(),
                        d.bindings.len()
                    );
                    for module in &d.modules {
                        let _ = writeln!(out, "    module {module}");
                    }
                    for interface in &d.interfaces {
                        let _ = writeln!(out, "    interface {interface}");
                    }
                }
                GenerationRequest::Subcomponent(s) => {
                    let _ = writeln!(
                        out,
                        "  subcomponent {} -> {} (parent {})",
                        s.contribution, s.generated, s.trigger
                    );
                }
            }
        }
        for name in &round.deferred {
            let _ = writeln!(out, "  deferred {name}");
        }
    }
    out
}
