use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};

/// The six text blocks the model returns for one request.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DesignScheme {
    pub style: String,
    pub dimensions: String,
    pub friendly_design: String,
    pub modeling_keys: String,
    pub print_params: String,
    pub failure_risks: String,
}

impl DesignScheme {
    /// Wire names of the required fields, in display order.
    pub const FIELDS: [&'static str; 6] = [
        "style",
        "dimensions",
        "friendlyDesign",
        "modelingKeys",
        "printParams",
        "failureRisks",
    ];

    pub fn print_param_lines(&self) -> Vec<&str> {
        self.print_params.split('\n').collect()
    }

    pub fn failure_risk_lines(&self) -> Vec<&str> {
        self.failure_risks.split('\n').collect()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub prompt: String,
    pub scheme: DesignScheme,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
}

#[cfg(test)]
pub(crate) fn sample_scheme() -> DesignScheme {
    DesignScheme {
        style: "industrial".into(),
        dimensions: "80x50x10mm".into(),
        friendly_design: "no supports needed".into(),
        modeling_keys: "1.2mm wall, 0.4mm clearance".into(),
        print_params: "200C\n0.2mm layer\n20% infill".into(),
        failure_risks: "warping at corners".into(),
    }
}
